//! Integration test: concurrent tuning of all four families

use holdcv::config::FamilyRanges;
use holdcv::family::{AnnRanges, ForestRanges, SvmRanges, TreeRanges};
use holdcv::optimizer::SearchConfig;
use holdcv::prelude::*;
use holdcv::training::Solver;
use holdcv::utils::ParallelConfig;
use ndarray::{Array1, Array2};
use std::sync::{Arc, Mutex};

fn blobs(n: usize, offset: f64) -> (Array2<f64>, Array1<f64>) {
    let mut x = Array2::zeros((2 * n, 3));
    let mut y = Array1::zeros(2 * n);
    for i in 0..n {
        let jitter = (i as f64 * 0.61 + offset).cos() * 0.4;
        x[[i, 0]] = jitter;
        x[[i, 1]] = -jitter;
        x[[i, 2]] = 0.1 * i as f64;
        x[[n + i, 0]] = 3.0 + jitter;
        x[[n + i, 1]] = 2.5 - jitter;
        x[[n + i, 2]] = 0.1 * i as f64;
        y[n + i] = 1.0;
    }
    (x, y)
}

fn split() -> Arc<DataSplit> {
    let (x_train, y_train) = blobs(10, 0.0);
    let (x_test, y_test) = blobs(4, 0.8);
    Arc::new(DataSplit::new(x_train, y_train, x_test, y_test).unwrap())
}

fn small_config(seed: u64) -> TuningConfig {
    let ranges = FamilyRanges {
        svm: SvmRanges {
            c_grid_samples: 4,
            ..SvmRanges::default()
        },
        neural_network: AnnRanges {
            hidden_begin: 1,
            hidden_end: 5,
            hidden_step: 2,
            solvers: vec![Solver::Adam, Solver::Sgd],
            alpha_begin: 0.0001,
            alpha_end: 1.0,
            alpha_grid_samples: 2,
        },
        decision_tree: TreeRanges {
            depth_begin: 1,
            depth_end: 6,
        },
        random_forest: ForestRanges {
            depth_begin: 1,
            depth_end: 3,
            estimators_begin: 2,
            estimators_end: 4,
        },
    };
    TuningConfig::new()
        .with_search(SearchConfig::new().with_max_evals(12))
        .with_ranges(ranges)
        .with_n_jobs(2)
        .with_seed(seed)
}

fn stub_optimizers(failing: Option<FamilyKind>) -> Vec<ModelOptimizer> {
    FamilyKind::ALL
        .iter()
        .map(|&kind| {
            let objective: Arc<dyn Objective> = if Some(kind) == failing {
                Arc::new(|_: &ModelConfiguration| -> Result<f64> {
                    Err(TuneError::invalid_hyperparameter("C", -1.0, "C <= 0"))
                })
            } else {
                Arc::new(|_: &ModelConfiguration| -> Result<f64> { Ok(1.25) })
            };
            ModelOptimizer::new(ModelFamily::default_for(kind), split(), 1)
                .unwrap()
                .with_search_config(SearchConfig::new().with_max_evals(8))
                .with_seed(kind.index())
                .with_objective(objective)
        })
        .collect()
}

#[test]
fn test_failing_family_fails_the_round() {
    let result = TuningCoordinator::run(stub_optimizers(Some(FamilyKind::DecisionTree)), 1);
    assert!(matches!(result, Err(TuneError::InvalidHyperparameter { .. })));
}

#[test]
fn test_stub_round_produces_full_snapshot() {
    let snapshot = TuningCoordinator::run(stub_optimizers(None), 1).unwrap();
    assert_eq!(snapshot.configurations().len(), 4);
    for kind in FamilyKind::ALL {
        assert_eq!(snapshot.get(kind).kind(), kind);
    }
}

#[test]
fn test_holdout_round_with_real_evaluators() {
    let coordinator = TuningCoordinator::new(small_config(7)).unwrap();
    let snapshot = coordinator.tune(split(), 1).unwrap();

    assert_eq!(snapshot.n_folds, 1);
    assert!(snapshot.svm.c > 0.0);
    assert!((1..=6).contains(&snapshot.decision_tree.max_depth));
    assert!((1..=3).contains(&snapshot.random_forest.max_depth));
    assert!((2..=4).contains(&snapshot.random_forest.n_estimators));
    assert!([1, 3, 5].contains(&snapshot.ann.hidden_neurons));
}

#[test]
fn test_cross_validated_round_is_reproducible() {
    let coordinator = TuningCoordinator::new(small_config(21)).unwrap();
    let first = coordinator.tune(split(), 3).unwrap();
    let second = coordinator.tune(split(), 3).unwrap();

    assert_eq!(first.n_folds, 3);
    assert_eq!(first, second);
}

#[test]
fn test_compare_returns_both_rounds() {
    let coordinator = TuningCoordinator::new(small_config(3)).unwrap();
    let report = coordinator.compare(split(), 3).unwrap();

    assert_eq!(report.n_folds, 3);
    assert_eq!(report.holdout.n_folds, 1);
    assert_eq!(report.cross_validation.n_folds, 3);
}

#[test]
fn test_free_function_tunes_holdout() {
    let (x_train, y_train) = blobs(8, 0.0);
    let (x_test, y_test) = blobs(3, 0.4);

    let snapshot = holdcv::tune(x_train, y_train, x_test, y_test, 1).unwrap();
    assert_eq!(snapshot.n_folds, 1);
    assert!(snapshot.ann.alpha >= 0.0);
}

#[test]
fn test_free_function_rejects_bad_split() {
    let (x_train, y_train) = blobs(4, 0.0);
    let result = holdcv::tune(x_train, y_train, Array2::zeros((2, 1)), Array1::zeros(2), 1);
    assert!(matches!(result, Err(TuneError::ShapeError { .. })));
}

#[test]
fn test_snapshot_scores_on_validation_rows() {
    let coordinator = TuningCoordinator::new(small_config(5)).unwrap();
    let split = split();
    let snapshot = coordinator.tune(Arc::clone(&split), 1).unwrap();

    let (x_val, y_val) = blobs(5, 2.1);
    let scores = snapshot
        .score(&split, &x_val, &y_val, &coordinator.config().train, 5)
        .unwrap();
    assert_eq!(scores.len(), 4);
    assert!(scores[&FamilyKind::DecisionTree] > 0.9);
}

#[test]
fn test_single_job_caps_both_strategies() {
    let config = small_config(13).with_n_jobs(1);
    let coordinator = TuningCoordinator::new(config.clone()).unwrap();

    for n_folds in [1, 3] {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let objective: Arc<dyn Objective> = Arc::new(move |_: &ModelConfiguration| -> Result<f64> {
            recorder
                .lock()
                .unwrap()
                .push((rayon::current_num_threads(), rayon::current_thread_index()));
            Ok(1.0)
        });

        let pool = ParallelConfig { n_threads: config.n_jobs }.build_pool().unwrap();
        let optimizers = coordinator
            .build_optimizers(split(), n_folds, 13, Some(pool))
            .unwrap()
            .into_iter()
            .map(|optimizer| optimizer.with_objective(Arc::clone(&objective)))
            .collect();
        TuningCoordinator::run(optimizers, n_folds).unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(
            seen.iter().all(|&(threads, index)| threads == 1 && index == Some(0)),
            "n_folds = {}: {:?}",
            n_folds,
            *seen
        );
    }
}
