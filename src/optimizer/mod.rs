//! Hyperparameter search
//!
//! Provides:
//! - Declarative search spaces and candidate validation
//! - Tree-structured Parzen Estimator (TPE) and random samplers
//! - Sequential model-based search over a fixed evaluation budget
//! - Grid search with seeded draws for continuous dimensions
//! - [`ModelOptimizer`], binding a model family to one of the two strategies

mod config;
mod grid;
mod model_optimizer;
mod samplers;
mod search_space;
mod sequential;

pub use config::SearchConfig;
pub use grid::GridSearch;
pub use model_optimizer::{ModelOptimizer, SearchState, StrategyKind};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TpeSampler};
pub use search_space::{Candidate, Parameter, ParameterType, ParameterValue, SearchSpace};
pub use sequential::{SequentialSearch, Study, TrialResult};
