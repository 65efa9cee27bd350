//! holdcv - Hyperparameter tuning under holdout and k-fold cross-validation
//!
//! This crate tunes four classifier families on one train/test split:
//! - Linear support vector machine (`C`)
//! - Single-hidden-layer perceptron (`hidden_neurons`, `solver`, `alpha`)
//! - Decision tree (`max_depth`)
//! - Random forest (`max_depth`, `n_estimators`)
//!
//! With one fold each family is tuned by a sequential TPE search scored on
//! the holdout test rows; with more folds the family's grid is scored
//! exhaustively by stratified k-fold cross-validation. The four searches run
//! concurrently and their winners are returned as a [`TuningSnapshot`].
//!
//! # Modules
//!
//! ## Tuning
//! - [`coordinator`] - Concurrent tuning of all families, [`tune`]
//! - [`optimizer`] - Search spaces, samplers, sequential and grid strategies
//! - [`evaluation`] - Objective (`1 / accuracy`) under holdout or k-fold
//! - [`family`] - Family ranges and typed configurations
//! - [`snapshot`] - Aggregate of the tuned configurations
//!
//! ## Support
//! - [`training`] - Classifier backend and k-fold splitters
//! - [`data`] - Train/test split container
//! - [`config`] - Round-level configuration
//! - [`progress`] - Progress events and aggregation
//! - [`utils`] - Seed derivation and thread pools
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Tuning
pub mod coordinator;
pub mod evaluation;
pub mod family;
pub mod optimizer;
pub mod snapshot;

// Support
pub mod cli;
pub mod config;
pub mod data;
pub mod progress;
pub mod training;
pub mod utils;

pub use coordinator::tune;
pub use error::{Result, TuneError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Result, TuneError};

    // Tuning
    pub use crate::coordinator::{tune, ComparisonReport, TuningCoordinator};
    pub use crate::evaluation::{Objective, ObjectiveEvaluator, DEGENERATE_OBJECTIVE};
    pub use crate::family::{FamilyKind, ModelConfiguration, ModelFamily};
    pub use crate::optimizer::{ModelOptimizer, SearchConfig, SearchSpace, StrategyKind};
    pub use crate::snapshot::TuningSnapshot;

    // Support
    pub use crate::config::TuningConfig;
    pub use crate::data::DataSplit;
    pub use crate::training::{Classifier, TrainSettings};
}
