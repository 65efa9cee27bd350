//! Sequential model-based search and its trial history

use crate::error::Result;
use super::{
    config::SearchConfig,
    samplers::{create_sampler, Sampler},
    search_space::{Candidate, SearchSpace},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number
    pub trial_id: usize,
    /// Parameters used
    pub params: Candidate,
    /// Objective value (lower is better)
    pub value: f64,
    /// Trial duration in seconds
    pub duration_secs: f64,
}

/// Study containing all trials of one search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    /// All trial results in evaluation order
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
}

impl Study {
    /// Create a new study
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    /// Get the best parameters
    pub fn best_params(&self) -> Option<&Candidate> {
        self.best_trial().map(|t| &t.params)
    }

    /// Number of evaluated trials
    pub fn n_trials(&self) -> usize {
        self.trials.len()
    }

    /// Add a trial result; only a strict improvement replaces the incumbent
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();

        let is_better = match self.best_value() {
            None => true,
            Some(best_val) => result.value < best_val,
        };

        if is_better {
            self.best_trial_idx = Some(idx);
        }

        self.trials.push(result);
    }

    /// `(candidate, objective)` pairs in evaluation order
    pub fn history(&self) -> Vec<(Candidate, f64)> {
        self.trials.iter().map(|t| (t.params.clone(), t.value)).collect()
    }
}

/// Sequential model-based search over a fixed evaluation budget
pub struct SequentialSearch {
    config: SearchConfig,
    sampler: Box<dyn Sampler>,
}

impl SequentialSearch {
    /// Create a new search; `config` is expected to be validated
    pub fn new(config: SearchConfig, seed: u64) -> Self {
        let sampler = create_sampler(
            config.sampler,
            seed,
            config.n_startup_trials,
            config.gamma,
            config.n_ei_candidates,
        );
        Self { config, sampler }
    }

    /// Replace the sampler, e.g. with a custom proposal strategy
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Evaluation budget
    pub fn budget(&self) -> usize {
        self.config.max_evals
    }

    /// Run exactly `max_evals` evaluations; the first objective error aborts the search
    pub fn run<F>(&mut self, search_space: &SearchSpace, mut objective: F) -> Result<Study>
    where
        F: FnMut(&Candidate) -> Result<f64>,
    {
        let start = Instant::now();
        let mut study = Study::new();
        let mut history: Vec<(Candidate, f64)> = Vec::with_capacity(self.config.max_evals);

        for trial_id in 0..self.config.max_evals {
            let trial_start = Instant::now();

            let params = self.sampler.sample(search_space, &history);
            let value = objective(&params)?;

            debug!(trial = trial_id, value, best = study.best_value().unwrap_or(value), "sequential trial");

            history.push((params.clone(), value));
            study.add_trial(TrialResult {
                trial_id,
                params,
                value,
                duration_secs: trial_start.elapsed().as_secs_f64(),
            });
        }

        study.total_duration_secs = start.elapsed().as_secs_f64();
        Ok(study)
    }
}
