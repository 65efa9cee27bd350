//! Fork-join tuning of all four families over one split

use crate::config::TuningConfig;
use crate::data::DataSplit;
use crate::error::{Result, TuneError};
use crate::family::{FamilyKind, ModelConfiguration};
use crate::optimizer::ModelOptimizer;
use crate::progress::spawn_progress_logger;
use crate::snapshot::TuningSnapshot;
use crate::utils::{derive_seed, fresh_seed, ParallelConfig};
use ndarray::{Array1, Array2};
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info, warn};

// Stream offsets keeping the two rounds of a comparison apart
const HOLDOUT_ROUND: u64 = 0x486f;
const CV_ROUND: u64 = 0x4376;

/// Holdout and cross-validated snapshots of the same split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub n_folds: usize,
    pub holdout: TuningSnapshot,
    pub cross_validation: TuningSnapshot,
}

/// Runs one optimizer per family concurrently and assembles a [`TuningSnapshot`]
#[derive(Debug, Clone, Default)]
pub struct TuningCoordinator {
    config: TuningConfig,
}

impl TuningCoordinator {
    pub fn new(config: TuningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// One optimizer per family, each with its own derived seed
    pub fn build_optimizers(
        &self,
        split: Arc<DataSplit>,
        n_folds: usize,
        base_seed: u64,
        pool: Option<Arc<ThreadPool>>,
    ) -> Result<Vec<ModelOptimizer>> {
        FamilyKind::ALL
            .iter()
            .map(|&kind| {
                let mut optimizer =
                    ModelOptimizer::new(self.config.ranges.family(kind), Arc::clone(&split), n_folds)?
                        .with_search_config(self.config.search.clone())
                        .with_train_settings(self.config.train.clone())
                        .with_seed(derive_seed(base_seed, kind.index()));
                if let Some(pool) = &pool {
                    optimizer = optimizer.with_thread_pool(Arc::clone(pool));
                }
                Ok(optimizer)
            })
            .collect()
    }

    /// Tune all four families on `split`; any failure fails the whole round
    pub fn tune(&self, split: Arc<DataSplit>, n_folds: usize) -> Result<TuningSnapshot> {
        let seed = self.config.seed.unwrap_or_else(fresh_seed);
        self.tune_with_seed(split, n_folds, seed)
    }

    fn tune_with_seed(&self, split: Arc<DataSplit>, n_folds: usize, seed: u64) -> Result<TuningSnapshot> {
        let pool = ParallelConfig {
            n_threads: self.config.n_jobs,
        }
        .build_pool()?;
        let optimizers = self.build_optimizers(split, n_folds, seed, Some(pool))?;
        Self::run(optimizers, n_folds)
    }

    /// Tune with holdout and with `n_folds`-fold cross-validation
    pub fn compare(&self, split: Arc<DataSplit>, n_folds: usize) -> Result<ComparisonReport> {
        if n_folds < 2 {
            return Err(TuneError::ConfigError(format!(
                "comparison needs at least 2 folds, got {}",
                n_folds
            )));
        }
        let seed = self.config.seed.unwrap_or_else(fresh_seed);

        let holdout = self.tune_with_seed(Arc::clone(&split), 1, derive_seed(seed, HOLDOUT_ROUND))?;
        let cross_validation = self.tune_with_seed(split, n_folds, derive_seed(seed, CV_ROUND))?;

        Ok(ComparisonReport {
            n_folds,
            holdout,
            cross_validation,
        })
    }

    /// Run prepared optimizers, one thread each, and wait for all of them
    ///
    /// No snapshot is produced unless every optimizer succeeds; the first
    /// failure in family order is returned.
    pub fn run(optimizers: Vec<ModelOptimizer>, n_folds: usize) -> Result<TuningSnapshot> {
        let start = Instant::now();
        let (sender, logger) = spawn_progress_logger()?;
        let optimizers: Vec<ModelOptimizer> = optimizers
            .into_iter()
            .map(|optimizer| optimizer.with_progress(sender.clone()))
            .collect();
        drop(sender);

        info!(n_folds, families = optimizers.len(), "tuning round started");

        let outcomes: Vec<(FamilyKind, Result<ModelConfiguration>)> = thread::scope(|scope| {
            let spawned: Vec<_> = optimizers
                .into_iter()
                .map(|mut optimizer| {
                    let kind = optimizer.kind();
                    let handle = thread::Builder::new()
                        .name(format!("holdcv-{}", kind))
                        .spawn_scoped(scope, move || optimizer.optimize());
                    (kind, handle)
                })
                .collect();

            // Every worker is joined before any outcome is inspected
            spawned
                .into_iter()
                .map(|(kind, handle)| {
                    let outcome = match handle {
                        Ok(handle) => handle
                            .join()
                            .unwrap_or_else(|_| Err(TuneError::WorkerPanicked(kind.to_string()))),
                        Err(err) => Err(TuneError::from(err)),
                    };
                    (kind, outcome)
                })
                .collect()
        });

        if logger.join().is_err() {
            warn!("progress logger panicked");
        }

        let mut configurations = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(configuration) => configurations.push(configuration),
                Err(err) => {
                    error!(family = %kind, error = %err, "optimizer failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let snapshot = TuningSnapshot::from_configurations(n_folds, configurations)?;
        info!(
            n_folds,
            duration_secs = start.elapsed().as_secs_f64(),
            "tuning round finished"
        );
        Ok(snapshot)
    }
}

/// Tune all four families with default settings
pub fn tune(
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
    n_folds: usize,
) -> Result<TuningSnapshot> {
    let split = DataSplit::new(x_train, y_train, x_test, y_test)?;
    TuningCoordinator::default().tune(Arc::new(split), n_folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Objective;
    use crate::family::ModelFamily;
    use crate::optimizer::SearchConfig;
    use ndarray::array;

    fn split() -> Arc<DataSplit> {
        Arc::new(
            DataSplit::new(
                array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2]],
                array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
                array![[0.05], [1.05]],
                array![0.0, 1.0],
            )
            .unwrap(),
        )
    }

    fn stubbed(kind: FamilyKind, objective: Arc<dyn Objective>) -> ModelOptimizer {
        ModelOptimizer::new(ModelFamily::default_for(kind), split(), 1)
            .unwrap()
            .with_search_config(SearchConfig::new().with_max_evals(5))
            .with_seed(kind.index())
            .with_objective(objective)
    }

    #[test]
    fn test_run_collects_all_families() {
        let constant: Arc<dyn Objective> = Arc::new(|_: &ModelConfiguration| -> Result<f64> { Ok(1.0) });
        let optimizers = FamilyKind::ALL
            .iter()
            .map(|&kind| stubbed(kind, Arc::clone(&constant)))
            .collect();

        let snapshot = TuningCoordinator::run(optimizers, 1).unwrap();
        assert_eq!(snapshot.n_folds, 1);
    }

    #[test]
    fn test_panicking_worker_fails_round() {
        let constant: Arc<dyn Objective> = Arc::new(|_: &ModelConfiguration| -> Result<f64> { Ok(1.0) });
        let panicking: Arc<dyn Objective> =
            Arc::new(|_: &ModelConfiguration| -> Result<f64> { panic!("evaluator blew up") });

        let optimizers = vec![
            stubbed(FamilyKind::Svm, Arc::clone(&constant)),
            stubbed(FamilyKind::NeuralNetwork, panicking),
            stubbed(FamilyKind::DecisionTree, Arc::clone(&constant)),
            stubbed(FamilyKind::RandomForest, constant),
        ];

        let result = TuningCoordinator::run(optimizers, 1);
        assert!(matches!(result, Err(TuneError::WorkerPanicked(_))));
    }

    #[test]
    fn test_missing_family_is_config_error() {
        let constant: Arc<dyn Objective> = Arc::new(|_: &ModelConfiguration| -> Result<f64> { Ok(1.0) });
        let optimizers = vec![stubbed(FamilyKind::Svm, constant)];
        assert!(matches!(
            TuningCoordinator::run(optimizers, 1),
            Err(TuneError::ConfigError(_))
        ));
    }

    #[test]
    fn test_compare_rejects_holdout_fold_count() {
        let coordinator = TuningCoordinator::default();
        assert!(matches!(coordinator.compare(split(), 1), Err(TuneError::ConfigError(_))));
    }

    #[test]
    fn test_build_optimizers_derives_distinct_seeds() {
        let coordinator = TuningCoordinator::new(TuningConfig::new().with_seed(5)).unwrap();
        let optimizers = coordinator.build_optimizers(split(), 3, 5, None).unwrap();
        let kinds: Vec<FamilyKind> = optimizers.iter().map(|o| o.kind()).collect();
        assert_eq!(kinds, FamilyKind::ALL.to_vec());
        assert!(optimizers.iter().all(|o| o.n_folds() == 3));
    }
}
