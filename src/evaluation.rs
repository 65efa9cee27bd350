//! Turning a model configuration into a minimisation objective
//!
//! The objective is `1 / accuracy`. Zero (or undefined) accuracy maps to the
//! finite [`DEGENERATE_OBJECTIVE`], so search strategies never see a
//! non-finite value.

use crate::data::DataSplit;
use crate::error::{Result, TuneError};
use crate::family::ModelConfiguration;
use crate::training::{build_classifier, CVResults, CVStrategy, CrossValidator, TrainSettings};
use crate::utils::{derive_seed, map_maybe_parallel, streams};
use ndarray::{Array1, Array2, Axis};
use std::sync::Arc;
use tracing::{debug, warn};

/// Score assigned to a candidate whose accuracy is zero or undefined
pub const DEGENERATE_OBJECTIVE: f64 = 1e6;

/// `1 / accuracy`, or the sentinel when accuracy is not strictly positive
pub fn objective_from_accuracy(accuracy: f64) -> f64 {
    if accuracy > 0.0 && accuracy.is_finite() {
        1.0 / accuracy
    } else {
        DEGENERATE_OBJECTIVE
    }
}

/// Replace a non-finite objective with the sentinel
pub fn sanitize_objective(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        DEGENERATE_OBJECTIVE
    }
}

/// Anything that can score a configuration (lower is better)
pub trait Objective: Send + Sync {
    fn evaluate(&self, config: &ModelConfiguration) -> Result<f64>;
}

impl<F> Objective for F
where
    F: Fn(&ModelConfiguration) -> Result<f64> + Send + Sync,
{
    fn evaluate(&self, config: &ModelConfiguration) -> Result<f64> {
        self(config)
    }
}

/// Materialised train/validate arrays of one fold
struct Fold {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_valid: Array2<f64>,
    y_valid: Array1<f64>,
}

/// Holdout (`n_folds == 1`) or stratified k-fold (`n_folds > 1`) scorer
///
/// For k-fold the pool is the test rows followed by the train rows, shuffled
/// once per evaluator so that every candidate of a search sees the same folds.
pub struct ObjectiveEvaluator {
    split: Arc<DataSplit>,
    n_folds: usize,
    settings: TrainSettings,
    model_seed: u64,
    folds: Vec<Fold>,
}

impl ObjectiveEvaluator {
    pub fn new(split: Arc<DataSplit>, n_folds: usize, seed: u64, settings: TrainSettings) -> Result<Self> {
        if n_folds == 0 {
            return Err(TuneError::ConfigError("n_folds must be at least 1".to_string()));
        }

        let folds = if n_folds == 1 {
            if split.n_test() == 0 {
                return Err(TuneError::DataError(
                    "holdout evaluation needs a non-empty test split".to_string(),
                ));
            }
            Vec::new()
        } else {
            let (x, y) = split.merged_pool()?;
            let splitter = CrossValidator::new(CVStrategy::StratifiedKFold {
                n_splits: n_folds,
                shuffle: true,
            })
            .with_random_state(derive_seed(seed, streams::FOLDS));

            splitter
                .split(x.nrows(), Some(&y))?
                .into_iter()
                .map(|fold| Fold {
                    x_train: x.select(Axis(0), &fold.train_indices),
                    y_train: y.select(Axis(0), &fold.train_indices),
                    x_valid: x.select(Axis(0), &fold.test_indices),
                    y_valid: y.select(Axis(0), &fold.test_indices),
                })
                .collect()
        };

        Ok(Self {
            split,
            n_folds,
            settings,
            model_seed: derive_seed(seed, streams::MODEL),
            folds,
        })
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Holdout accuracy, or mean fold accuracy
    pub fn accuracy(&self, config: &ModelConfiguration) -> Result<f64> {
        if self.n_folds == 1 {
            let mut classifier = build_classifier(config, &self.settings, self.model_seed);
            classifier.fit(self.split.x_train(), self.split.y_train())?;
            return classifier.score(self.split.x_test(), self.split.y_test());
        }

        // Folds fan out only when this search is not already a rayon task
        let scores = map_maybe_parallel(&self.folds, |fold| -> Result<f64> {
            let mut classifier = build_classifier(config, &self.settings, self.model_seed);
            classifier.fit(&fold.x_train, &fold.y_train)?;
            classifier.score(&fold.x_valid, &fold.y_valid)
        })
        .into_iter()
        .collect::<Result<Vec<f64>>>()?;

        Ok(CVResults::from_scores(scores).mean_score)
    }
}

impl Objective for ObjectiveEvaluator {
    fn evaluate(&self, config: &ModelConfiguration) -> Result<f64> {
        let accuracy = self.accuracy(config)?;
        let objective = objective_from_accuracy(accuracy);
        if objective == DEGENERATE_OBJECTIVE {
            warn!(family = %config.kind(), %config, accuracy, "degenerate score");
        } else {
            debug!(family = %config.kind(), %config, accuracy, objective, "evaluated");
        }
        Ok(objective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::TreeConfig;
    use ndarray::array;

    fn split() -> Arc<DataSplit> {
        Arc::new(
            DataSplit::new(
                array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2]],
                array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
                array![[0.05], [0.15], [1.05], [1.15]],
                array![0.0, 0.0, 1.0, 1.0],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_zero_accuracy_is_sentinel() {
        assert_eq!(objective_from_accuracy(0.0), DEGENERATE_OBJECTIVE);
        assert_eq!(objective_from_accuracy(f64::NAN), DEGENERATE_OBJECTIVE);
        assert!(objective_from_accuracy(0.0).is_finite());
    }

    #[test]
    fn test_positive_accuracy_is_reciprocal() {
        assert_eq!(objective_from_accuracy(1.0), 1.0);
        assert_eq!(objective_from_accuracy(0.5), 2.0);
        assert!(objective_from_accuracy(1e-3) < DEGENERATE_OBJECTIVE);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_objective(f64::INFINITY), DEGENERATE_OBJECTIVE);
        assert_eq!(sanitize_objective(f64::NAN), DEGENERATE_OBJECTIVE);
        assert_eq!(sanitize_objective(1.25), 1.25);
    }

    #[test]
    fn test_holdout_evaluation() {
        let evaluator = ObjectiveEvaluator::new(split(), 1, 0, TrainSettings::default()).unwrap();
        let config = ModelConfiguration::DecisionTree(TreeConfig { max_depth: 2 });
        assert_eq!(evaluator.evaluate(&config).unwrap(), 1.0);
    }

    #[test]
    fn test_cross_validated_evaluation() {
        let evaluator = ObjectiveEvaluator::new(split(), 2, 9, TrainSettings::default()).unwrap();
        assert_eq!(evaluator.n_folds(), 2);

        let config = ModelConfiguration::DecisionTree(TreeConfig { max_depth: 2 });
        let objective = evaluator.evaluate(&config).unwrap();
        assert!(objective >= 1.0 && objective.is_finite());
    }

    #[test]
    fn test_zero_folds_rejected() {
        let result = ObjectiveEvaluator::new(split(), 0, 0, TrainSettings::default());
        assert!(matches!(result, Err(TuneError::ConfigError(_))));
    }

    #[test]
    fn test_more_folds_than_samples() {
        let result = ObjectiveEvaluator::new(split(), 11, 0, TrainSettings::default());
        assert!(matches!(result, Err(TuneError::DataError(_))));
    }

    #[test]
    fn test_closure_objective() {
        let stub = |_: &ModelConfiguration| -> Result<f64> { Ok(objective_from_accuracy(0.0)) };
        let config = ModelConfiguration::DecisionTree(TreeConfig { max_depth: 1 });
        assert_eq!(stub.evaluate(&config).unwrap(), DEGENERATE_OBJECTIVE);
    }
}
