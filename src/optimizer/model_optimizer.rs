//! Per-family optimizer: search space + evaluator + strategy

use super::{
    config::SearchConfig,
    grid::GridSearch,
    search_space::{Candidate, SearchSpace},
    sequential::{SequentialSearch, Study},
};
use crate::data::DataSplit;
use crate::error::{Result, TuneError};
use crate::evaluation::{sanitize_objective, Objective, ObjectiveEvaluator};
use crate::family::{FamilyKind, ModelConfiguration, ModelFamily};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::training::TrainSettings;
use crate::utils::{derive_seed, fresh_seed, streams};
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::info;

/// Lifecycle of one optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Created,
    Running,
    Done,
    Failed,
}

/// Search algorithm chosen from the fold count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Sequential model-based search (holdout, `n_folds == 1`)
    Sequential,
    /// Grid search (cross-validation, `n_folds > 1`)
    Grid,
}

impl StrategyKind {
    pub fn for_folds(n_folds: usize) -> Self {
        if n_folds == 1 {
            StrategyKind::Sequential
        } else {
            StrategyKind::Grid
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::Grid => "grid",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tunes one model family against a shared split
///
/// ```no_run
/// use holdcv::prelude::*;
/// use std::sync::Arc;
///
/// # fn run(split: Arc<DataSplit>) -> holdcv::Result<()> {
/// let mut optimizer = ModelOptimizer::new(ModelFamily::default_for(FamilyKind::Svm), split, 1)?
///     .with_seed(7);
/// let best = optimizer.optimize()?;
/// println!("{}", best);
/// # Ok(())
/// # }
/// ```
pub struct ModelOptimizer {
    family: ModelFamily,
    space: SearchSpace,
    split: Arc<DataSplit>,
    n_folds: usize,
    search: SearchConfig,
    train: TrainSettings,
    seed: Option<u64>,
    objective: Option<Arc<dyn Objective>>,
    progress: Option<Sender<ProgressEvent>>,
    pool: Option<Arc<ThreadPool>>,
    configuration: Option<ModelConfiguration>,
    study: Option<Study>,
    state: SearchState,
}

impl fmt::Debug for ModelOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptimizer")
            .field("family", &self.family)
            .field("n_folds", &self.n_folds)
            .field("state", &self.state)
            .field("configuration", &self.configuration)
            .finish_non_exhaustive()
    }
}

impl ModelOptimizer {
    /// Fails only on a zero fold count or malformed ranges
    pub fn new(family: ModelFamily, split: Arc<DataSplit>, n_folds: usize) -> Result<Self> {
        if n_folds == 0 {
            return Err(TuneError::ConfigError("n_folds must be at least 1".to_string()));
        }
        let space = family.search_space()?;

        Ok(Self {
            family,
            space,
            split,
            n_folds,
            search: SearchConfig::default(),
            train: TrainSettings::default(),
            seed: None,
            objective: None,
            progress: None,
            pool: None,
            configuration: None,
            study: None,
            state: SearchState::Created,
        })
    }

    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_train_settings(mut self, train: TrainSettings) -> Self {
        self.train = train;
        self
    }

    /// Fix the seed; otherwise each `optimize()` draws a fresh one
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Score candidates with a custom objective instead of fitting classifiers
    pub fn with_objective(mut self, objective: Arc<dyn Objective>) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Pool hosting the search and every parallel model fit inside it
    pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn family(&self) -> &ModelFamily {
        &self.family
    }

    pub fn kind(&self) -> FamilyKind {
        self.family.kind()
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    pub fn strategy(&self) -> StrategyKind {
        StrategyKind::for_folds(self.n_folds)
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Winner of the last completed search
    pub fn configuration(&self) -> Option<&ModelConfiguration> {
        self.configuration.as_ref()
    }

    /// Trial history of the last completed search
    pub fn study(&self) -> Option<&Study> {
        self.study.as_ref()
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Run the search to completion and return the winning configuration
    ///
    /// Re-invoking runs a fresh search and overwrites the stored result.
    pub fn optimize(&mut self) -> Result<ModelConfiguration> {
        let seed = self.seed.unwrap_or_else(fresh_seed);
        self.state = SearchState::Running;

        info!(
            family = %self.kind(),
            strategy = %self.strategy(),
            n_folds = self.n_folds,
            "optimizer started"
        );

        // Both strategies run inside the shared pool so model-level rayon work stays capped
        let outcome = match &self.pool {
            Some(pool) => pool.install(|| self.run_search(seed)),
            None => self.run_search(seed),
        };

        match outcome {
            Ok((configuration, study)) => {
                info!(
                    family = %self.kind(),
                    trials = study.n_trials(),
                    best_objective = study.best_value().unwrap_or(f64::NAN),
                    duration_secs = study.total_duration_secs,
                    best = %configuration,
                    "optimizer finished"
                );
                self.configuration = Some(configuration.clone());
                self.study = Some(study);
                self.state = SearchState::Done;
                Ok(configuration)
            }
            Err(err) => {
                self.state = SearchState::Failed;
                Err(err)
            }
        }
    }

    fn run_search(&self, seed: u64) -> Result<(ModelConfiguration, Study)> {
        let objective: Arc<dyn Objective> = match &self.objective {
            Some(objective) => Arc::clone(objective),
            None => Arc::new(ObjectiveEvaluator::new(
                Arc::clone(&self.split),
                self.n_folds,
                seed,
                self.train.clone(),
            )?),
        };

        let strategy = self.strategy();
        let grid = match strategy {
            StrategyKind::Grid => {
                let mut grid = GridSearch::new(derive_seed(seed, streams::GRID));
                if let Some(pool) = &self.pool {
                    grid = grid.with_pool(Arc::clone(pool));
                }
                Some(grid)
            }
            StrategyKind::Sequential => None,
        };
        let candidates = grid.as_ref().map(|g| g.candidates(&self.space));
        let total = candidates.as_ref().map_or(self.search.max_evals, Vec::len);

        let reporter = ProgressReporter::new(self.kind(), total, self.progress.clone());
        reporter.started(strategy.name());

        // Positivity checks run before the evaluator; a violation aborts the search
        let score = |candidate: &Candidate| -> Result<f64> {
            let config = self.family.configuration(candidate)?;
            let value = objective.evaluate(&config)?;
            reporter.tick();
            Ok(sanitize_objective(value))
        };

        let result = match (grid, candidates) {
            (Some(grid), Some(candidates)) => grid.run_candidates(candidates, score),
            _ => {
                self.search.validate()?;
                SequentialSearch::new(self.search.clone(), derive_seed(seed, streams::SAMPLER))
                    .run(&self.space, score)
            }
        };
        reporter.finished(result.is_ok());
        let study = result?;

        let best = study
            .best_params()
            .ok_or_else(|| TuneError::OptimizationError("search produced no trials".to_string()))?;
        let configuration = self.family.configuration(best)?;
        Ok((configuration, study))
    }
}
