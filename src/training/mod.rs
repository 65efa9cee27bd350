//! Classifier backend
//!
//! Built-in implementations of the four tuned families:
//! - Linear-kernel support vector machine (SMO, One-vs-Rest)
//! - Single-hidden-layer perceptron (`adam` / `sgd`)
//! - CART decision tree
//! - Bootstrap random forest
//!
//! plus the k-fold splitters used for cross-validated scoring.

pub mod cross_validation;
pub mod decision_tree;
pub mod neural_network;
pub mod random_forest;
pub mod svm;

pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{DecisionTree, TreeNode};
pub use neural_network::{MLPClassifier, MLPConfig, Solver};
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{SVMClassifier, SVMConfig};

use crate::error::{Result, TuneError};
use crate::family::ModelConfiguration;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A fit/predict classifier over integral labels stored as `f64`
pub trait Classifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Fraction of correctly predicted rows
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        if x.nrows() != y.len() {
            return Err(TuneError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        let predictions = self.predict(x)?;
        Ok(accuracy(y, &predictions))
    }
}

/// Training knobs that are not tuned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSettings {
    /// Epoch cap for the network
    pub ann_max_iterations: usize,
    /// Initial learning rate for the network
    pub ann_learning_rate: f64,
    /// Sweep cap for SMO
    pub svm_max_iterations: usize,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            ann_max_iterations: 200,
            ann_learning_rate: 0.001,
            svm_max_iterations: 1000,
        }
    }
}

impl TrainSettings {
    pub fn validate(&self) -> Result<()> {
        if self.ann_max_iterations == 0 || self.svm_max_iterations == 0 {
            return Err(TuneError::ConfigError(
                "iteration caps must be at least 1".to_string(),
            ));
        }
        if !(self.ann_learning_rate > 0.0 && self.ann_learning_rate.is_finite()) {
            return Err(TuneError::ConfigError(format!(
                "ann_learning_rate must be positive, got {}",
                self.ann_learning_rate
            )));
        }
        Ok(())
    }
}

/// Build an unfitted classifier for a family configuration
pub fn build_classifier(
    config: &ModelConfiguration,
    settings: &TrainSettings,
    seed: u64,
) -> Box<dyn Classifier> {
    match config {
        ModelConfiguration::Svm(svm) => Box::new(SVMClassifier::new(SVMConfig {
            c: svm.c,
            max_iter: settings.svm_max_iterations,
            random_state: Some(seed),
            ..SVMConfig::default()
        })),
        ModelConfiguration::NeuralNetwork(ann) => Box::new(MLPClassifier::new(MLPConfig {
            hidden_layers: vec![ann.hidden_neurons],
            solver: ann.solver,
            alpha: ann.alpha,
            learning_rate: settings.ann_learning_rate,
            max_epochs: settings.ann_max_iterations,
            random_state: Some(seed),
            ..MLPConfig::default()
        })),
        ModelConfiguration::DecisionTree(tree) => Box::new(
            DecisionTree::new()
                .with_max_depth(tree.max_depth)
                .with_random_state(seed),
        ),
        ModelConfiguration::RandomForest(forest) => Box::new(
            RandomForest::new(forest.n_estimators)
                .with_max_depth(forest.max_depth)
                .with_random_state(seed),
        ),
    }
}

/// Fraction of positions where the rounded labels agree; 0 for empty input
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t.round() == p.round())
        .count();
    correct as f64 / y_true.len() as f64
}

/// Sorted distinct labels, rounded to integers
pub(crate) fn class_labels(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().map(|v| v.round()).collect();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{ForestConfig, SvmConfig, TreeConfig};
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y_true = array![0.0, 1.0, 1.0, 2.0];
        let y_pred = array![0.0, 1.0, 0.0, 2.0];
        assert_eq!(accuracy(&y_true, &y_pred), 0.75);
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(accuracy(&empty, &empty), 0.0);
    }

    #[test]
    fn test_class_labels() {
        assert_eq!(class_labels(&array![2.0, 0.0, 2.0, 1.0]), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_build_and_score_each_family() {
        let x = array![[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [3.0, 3.0], [3.1, 2.9], [2.9, 3.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let settings = TrainSettings::default();

        let configs = [
            ModelConfiguration::Svm(SvmConfig { c: 1.0 }),
            ModelConfiguration::DecisionTree(TreeConfig { max_depth: 3 }),
            ModelConfiguration::RandomForest(ForestConfig { max_depth: 3, n_estimators: 5 }),
        ];
        for config in &configs {
            let mut clf = build_classifier(config, &settings, 3);
            clf.fit(&x, &y).unwrap();
            let score = clf.score(&x, &y).unwrap();
            assert!(score >= 0.8, "{} scored {}", config, score);
        }
    }

    #[test]
    fn test_settings_validation() {
        assert!(TrainSettings::default().validate().is_ok());
        let bad = TrainSettings { ann_learning_rate: 0.0, ..TrainSettings::default() };
        assert!(matches!(bad.validate(), Err(TuneError::ConfigError(_))));
    }
}
