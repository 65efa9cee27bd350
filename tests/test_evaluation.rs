//! Integration test: holdout and cross-validated objective evaluation

use holdcv::evaluation::objective_from_accuracy;
use holdcv::family::{AnnConfig, ForestConfig, SvmConfig, TreeConfig};
use holdcv::prelude::*;
use holdcv::training::Solver;
use ndarray::{array, Array1, Array2};
use std::sync::Arc;

/// Two well separated blobs, `n` rows per class
fn blobs(n: usize, offset: f64) -> (Array2<f64>, Array1<f64>) {
    let mut x = Array2::zeros((2 * n, 2));
    let mut y = Array1::zeros(2 * n);
    for i in 0..n {
        let jitter = (i as f64 * 0.37 + offset).sin() * 0.3;
        x[[i, 0]] = jitter;
        x[[i, 1]] = 0.5 - jitter;
        x[[n + i, 0]] = 4.0 + jitter;
        x[[n + i, 1]] = 3.5 - jitter;
        y[n + i] = 1.0;
    }
    (x, y)
}

fn separable_split() -> Arc<DataSplit> {
    let (x_train, y_train) = blobs(12, 0.0);
    let (x_test, y_test) = blobs(4, 1.3);
    Arc::new(DataSplit::new(x_train, y_train, x_test, y_test).unwrap())
}

fn all_configurations() -> Vec<ModelConfiguration> {
    vec![
        ModelConfiguration::Svm(SvmConfig { c: 1.0 }),
        ModelConfiguration::NeuralNetwork(AnnConfig {
            hidden_neurons: 5,
            solver: Solver::Adam,
            alpha: 0.0001,
        }),
        ModelConfiguration::DecisionTree(TreeConfig { max_depth: 3 }),
        ModelConfiguration::RandomForest(ForestConfig {
            max_depth: 3,
            n_estimators: 5,
        }),
    ]
}

#[test]
fn test_zero_accuracy_gives_sentinel() {
    // Every training label is 0 and every test label is 1
    let split = Arc::new(
        DataSplit::new(
            array![[0.0], [1.0], [2.0], [3.0]],
            array![0.0, 0.0, 0.0, 0.0],
            array![[0.5], [2.5]],
            array![1.0, 1.0],
        )
        .unwrap(),
    );
    let evaluator = ObjectiveEvaluator::new(split, 1, 0, TrainSettings::default()).unwrap();

    let objective = evaluator
        .evaluate(&ModelConfiguration::DecisionTree(TreeConfig { max_depth: 2 }))
        .unwrap();
    assert_eq!(objective, DEGENERATE_OBJECTIVE);
    assert!(objective.is_finite());
}

#[test]
fn test_holdout_scores_every_family() {
    let evaluator = ObjectiveEvaluator::new(separable_split(), 1, 17, TrainSettings::default()).unwrap();
    for configuration in all_configurations() {
        let objective = evaluator.evaluate(&configuration).unwrap();
        assert!(objective >= 1.0 && objective.is_finite(), "{} -> {}", configuration, objective);
    }
}

#[test]
fn test_tree_is_perfect_on_separable_data() {
    let config = ModelConfiguration::DecisionTree(TreeConfig { max_depth: 2 });

    let holdout = ObjectiveEvaluator::new(separable_split(), 1, 3, TrainSettings::default()).unwrap();
    let cv = ObjectiveEvaluator::new(separable_split(), 4, 3, TrainSettings::default()).unwrap();

    assert_eq!(holdout.evaluate(&config).unwrap(), objective_from_accuracy(1.0));
    assert_eq!(cv.evaluate(&config).unwrap(), objective_from_accuracy(1.0));
}

#[test]
fn test_cross_validation_is_reproducible_per_seed() {
    let config = ModelConfiguration::RandomForest(ForestConfig {
        max_depth: 2,
        n_estimators: 3,
    });
    let first = ObjectiveEvaluator::new(separable_split(), 3, 99, TrainSettings::default()).unwrap();
    let second = ObjectiveEvaluator::new(separable_split(), 3, 99, TrainSettings::default()).unwrap();

    assert_eq!(first.evaluate(&config).unwrap(), second.evaluate(&config).unwrap());
}

#[test]
fn test_holdout_requires_test_rows() {
    let (x_train, y_train) = blobs(3, 0.0);
    let split = Arc::new(
        DataSplit::new(x_train, y_train, Array2::zeros((0, 2)), Array1::zeros(0)).unwrap(),
    );

    assert!(matches!(
        ObjectiveEvaluator::new(Arc::clone(&split), 1, 0, TrainSettings::default()),
        Err(TuneError::DataError(_))
    ));
    // The pooled rows still allow cross-validation
    assert!(ObjectiveEvaluator::new(split, 2, 0, TrainSettings::default()).is_ok());
}

#[test]
fn test_folds_exceeding_pool_rejected() {
    let result = ObjectiveEvaluator::new(separable_split(), 100, 0, TrainSettings::default());
    assert!(matches!(result, Err(TuneError::DataError(_))));
}

#[test]
fn test_diverging_network_gives_sentinel() {
    let settings = TrainSettings {
        ann_learning_rate: 1e300,
        ..TrainSettings::default()
    };
    let config = ModelConfiguration::NeuralNetwork(AnnConfig {
        hidden_neurons: 4,
        solver: Solver::Sgd,
        alpha: 0.0001,
    });

    let holdout = ObjectiveEvaluator::new(separable_split(), 1, 5, settings.clone()).unwrap();
    assert_eq!(holdout.evaluate(&config).unwrap(), DEGENERATE_OBJECTIVE);

    let cv = ObjectiveEvaluator::new(separable_split(), 3, 5, settings).unwrap();
    assert_eq!(cv.evaluate(&config).unwrap(), DEGENERATE_OBJECTIVE);
}

#[test]
fn test_lbfgs_network_scores_under_holdout() {
    let evaluator = ObjectiveEvaluator::new(separable_split(), 1, 11, TrainSettings::default()).unwrap();
    let objective = evaluator
        .evaluate(&ModelConfiguration::NeuralNetwork(AnnConfig {
            hidden_neurons: 5,
            solver: Solver::Lbfgs,
            alpha: 0.0001,
        }))
        .unwrap();
    assert!(objective >= 1.0 && objective < DEGENERATE_OBJECTIVE);
}
