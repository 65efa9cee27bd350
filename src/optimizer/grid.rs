//! Exhaustive / randomized grid search

use crate::error::{Result, TuneError};
use super::search_space::{Candidate, SearchSpace};
use super::sequential::{Study, TrialResult};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::Instant;

/// Scores every point of an enumerated grid, in parallel when a pool is given
///
/// Discrete and categorical dimensions contribute every value; each continuous
/// dimension contributes its `grid_samples` uniform draws. The winner is the
/// first candidate in enumeration order that attains the minimum objective.
#[derive(Debug, Clone)]
pub struct GridSearch {
    seed: u64,
    pool: Option<Arc<ThreadPool>>,
}

impl GridSearch {
    /// Create a grid search whose continuous draws come from `seed`
    pub fn new(seed: u64) -> Self {
        Self { seed, pool: None }
    }

    /// Evaluate candidates on the given rayon pool
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Enumerate the candidates this search will evaluate
    pub fn candidates(&self, search_space: &SearchSpace) -> Vec<Candidate> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        search_space.grid(&mut rng)
    }

    /// Evaluate every candidate; any evaluation error fails the whole search
    pub fn run<F>(&self, search_space: &SearchSpace, objective: F) -> Result<Study>
    where
        F: Fn(&Candidate) -> Result<f64> + Sync,
    {
        self.run_candidates(self.candidates(search_space), objective)
    }

    /// Evaluate a pre-enumerated candidate list
    pub fn run_candidates<F>(&self, candidates: Vec<Candidate>, objective: F) -> Result<Study>
    where
        F: Fn(&Candidate) -> Result<f64> + Sync,
    {
        if candidates.is_empty() {
            return Err(TuneError::OptimizationError("grid is empty".to_string()));
        }

        let start = Instant::now();
        let score_all = || -> Vec<(Result<f64>, f64)> {
            candidates
                .par_iter()
                .map(|candidate| {
                    let trial_start = Instant::now();
                    let value = objective(candidate);
                    (value, trial_start.elapsed().as_secs_f64())
                })
                .collect()
        };

        let scored = match &self.pool {
            Some(pool) => pool.install(score_all),
            None => score_all(),
        };

        // `collect` keeps enumeration order, so ties resolve to the first-seen candidate
        let mut study = Study::new();
        for (trial_id, (candidate, (value, duration_secs))) in
            candidates.into_iter().zip(scored).enumerate()
        {
            study.add_trial(TrialResult {
                trial_id,
                params: candidate,
                value: value?,
                duration_secs,
            });
        }

        study.total_duration_secs = start.elapsed().as_secs_f64();
        Ok(study)
    }
}
