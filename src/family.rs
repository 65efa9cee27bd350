//! Model families, their tunable ranges and their typed configurations
//!
//! Each [`ModelFamily`] variant carries its own range declaration. It can turn that
//! declaration into a [`SearchSpace`], and turn a sampled [`Candidate`] back into a
//! validated [`ModelConfiguration`].

use crate::error::{Result, TuneError};
use crate::optimizer::{Candidate, Parameter, ParameterValue, SearchSpace};
use crate::training::Solver;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Regularisation strength of the linear SVM
pub const C_KEY: &str = "C";
/// Maximum tree depth (tree and forest)
pub const MAX_DEPTH_KEY: &str = "max_depth";
/// Number of trees in the forest
pub const N_ESTIMATORS_KEY: &str = "n_estimators";
/// Width of the network's single hidden layer
pub const HIDDEN_NEURONS_KEY: &str = "hidden_neurons";
/// Network solver name
pub const SOLVER_KEY: &str = "solver";
/// L2 penalty of the network
pub const ALPHA_KEY: &str = "alpha";

/// Tag identifying a model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyKind {
    Svm,
    NeuralNetwork,
    DecisionTree,
    RandomForest,
}

impl FamilyKind {
    /// All four families in snapshot order
    pub const ALL: [FamilyKind; 4] = [
        FamilyKind::Svm,
        FamilyKind::NeuralNetwork,
        FamilyKind::DecisionTree,
        FamilyKind::RandomForest,
    ];

    /// Short key used in logs and reports
    pub fn key(&self) -> &'static str {
        match self {
            FamilyKind::Svm => "svm",
            FamilyKind::NeuralNetwork => "ann",
            FamilyKind::DecisionTree => "tree",
            FamilyKind::RandomForest => "forest",
        }
    }

    /// Stable index, used to derive per-family seeds
    pub fn index(&self) -> u64 {
        match self {
            FamilyKind::Svm => 0,
            FamilyKind::NeuralNetwork => 1,
            FamilyKind::DecisionTree => 2,
            FamilyKind::RandomForest => 3,
        }
    }
}

impl fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Range of the linear SVM's `C`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmRanges {
    pub c_begin: f64,
    pub c_end: f64,
    /// Uniform draws of `C` in a grid search
    pub c_grid_samples: usize,
}

impl Default for SvmRanges {
    fn default() -> Self {
        Self {
            c_begin: 2f64.powi(-5),
            c_end: 4.0,
            c_grid_samples: 400,
        }
    }
}

/// Range of the decision tree's depth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeRanges {
    pub depth_begin: i64,
    pub depth_end: i64,
}

impl Default for TreeRanges {
    fn default() -> Self {
        Self {
            depth_begin: 1,
            depth_end: 40,
        }
    }
}

/// Ranges of the random forest
///
/// Depth and estimator bounds are independent fields. Set the estimator range
/// equal to the depth range to reproduce the legacy behaviour where both
/// dimensions were drawn from the depth bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestRanges {
    pub depth_begin: i64,
    pub depth_end: i64,
    pub estimators_begin: i64,
    pub estimators_end: i64,
}

impl Default for ForestRanges {
    fn default() -> Self {
        Self {
            depth_begin: 1,
            depth_end: 15,
            estimators_begin: 2,
            estimators_end: 40,
        }
    }
}

/// Ranges of the single-hidden-layer network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnRanges {
    pub hidden_begin: i64,
    pub hidden_end: i64,
    pub hidden_step: i64,
    pub solvers: Vec<Solver>,
    pub alpha_begin: f64,
    pub alpha_end: f64,
    /// Uniform draws of `alpha` in a grid search
    pub alpha_grid_samples: usize,
}

impl Default for AnnRanges {
    fn default() -> Self {
        Self {
            hidden_begin: 1,
            hidden_end: 50,
            hidden_step: 2,
            solvers: vec![Solver::Adam],
            alpha_begin: 0.0001,
            alpha_end: 5.0,
            alpha_grid_samples: 75,
        }
    }
}

/// A classifier family together with its tunable ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelFamily {
    Svm(SvmRanges),
    NeuralNetwork(AnnRanges),
    DecisionTree(TreeRanges),
    RandomForest(ForestRanges),
}

impl ModelFamily {
    /// Family with default ranges
    pub fn default_for(kind: FamilyKind) -> Self {
        match kind {
            FamilyKind::Svm => ModelFamily::Svm(SvmRanges::default()),
            FamilyKind::NeuralNetwork => ModelFamily::NeuralNetwork(AnnRanges::default()),
            FamilyKind::DecisionTree => ModelFamily::DecisionTree(TreeRanges::default()),
            FamilyKind::RandomForest => ModelFamily::RandomForest(ForestRanges::default()),
        }
    }

    pub fn kind(&self) -> FamilyKind {
        match self {
            ModelFamily::Svm(_) => FamilyKind::Svm,
            ModelFamily::NeuralNetwork(_) => FamilyKind::NeuralNetwork,
            ModelFamily::DecisionTree(_) => FamilyKind::DecisionTree,
            ModelFamily::RandomForest(_) => FamilyKind::RandomForest,
        }
    }

    /// Declarative search space; fails with `ConfigError` on malformed ranges
    pub fn search_space(&self) -> Result<SearchSpace> {
        let space = match self {
            ModelFamily::Svm(r) => SearchSpace::new()
                .add(Parameter::float(C_KEY, r.c_begin, r.c_end).with_grid_samples(r.c_grid_samples)),
            ModelFamily::DecisionTree(r) => {
                SearchSpace::new().int(MAX_DEPTH_KEY, r.depth_begin, r.depth_end)
            }
            ModelFamily::RandomForest(r) => SearchSpace::new()
                .int(MAX_DEPTH_KEY, r.depth_begin, r.depth_end)
                .int(N_ESTIMATORS_KEY, r.estimators_begin, r.estimators_end),
            ModelFamily::NeuralNetwork(r) => SearchSpace::new()
                .add(Parameter::stepped_int(
                    HIDDEN_NEURONS_KEY,
                    r.hidden_begin,
                    r.hidden_end,
                    r.hidden_step,
                ))
                .categorical(SOLVER_KEY, r.solvers.iter().map(|s| s.to_string()))
                .add(
                    Parameter::float(ALPHA_KEY, r.alpha_begin, r.alpha_end)
                        .with_grid_samples(r.alpha_grid_samples),
                ),
        };
        space.validate()?;
        Ok(space)
    }

    /// Turn a candidate into this family's configuration, enforcing positivity
    pub fn configuration(&self, candidate: &Candidate) -> Result<ModelConfiguration> {
        match self {
            ModelFamily::Svm(_) => {
                let c = float_param(candidate, C_KEY)?;
                if !(c > 0.0 && c.is_finite()) {
                    return Err(TuneError::invalid_hyperparameter(C_KEY, c, "C <= 0"));
                }
                Ok(ModelConfiguration::Svm(SvmConfig { c }))
            }
            ModelFamily::DecisionTree(_) => {
                let max_depth = positive_int_param(candidate, MAX_DEPTH_KEY, "depth <= 0")?;
                Ok(ModelConfiguration::DecisionTree(TreeConfig { max_depth }))
            }
            ModelFamily::RandomForest(_) => {
                let max_depth = positive_int_param(candidate, MAX_DEPTH_KEY, "depth <= 0")?;
                let n_estimators =
                    positive_int_param(candidate, N_ESTIMATORS_KEY, "estimators <= 0")?;
                Ok(ModelConfiguration::RandomForest(ForestConfig {
                    max_depth,
                    n_estimators,
                }))
            }
            ModelFamily::NeuralNetwork(_) => {
                let hidden_neurons =
                    positive_int_param(candidate, HIDDEN_NEURONS_KEY, "hidden_neurons <= 0")?;
                let solver_name = candidate
                    .get(SOLVER_KEY)
                    .and_then(ParameterValue::as_str)
                    .ok_or_else(|| missing(SOLVER_KEY))?;
                let solver: Solver = solver_name.parse()?;
                let alpha = float_param(candidate, ALPHA_KEY)?;
                if !alpha.is_finite() || alpha < 0.0 {
                    return Err(TuneError::invalid_hyperparameter(ALPHA_KEY, alpha, "alpha < 0"));
                }
                Ok(ModelConfiguration::NeuralNetwork(AnnConfig {
                    hidden_neurons,
                    solver,
                    alpha,
                }))
            }
        }
    }
}

fn missing(name: &str) -> TuneError {
    TuneError::invalid_hyperparameter(name, "<missing>", "candidate has no value for it")
}

fn float_param(candidate: &Candidate, name: &str) -> Result<f64> {
    candidate
        .get(name)
        .and_then(ParameterValue::as_float)
        .ok_or_else(|| missing(name))
}

fn positive_int_param(candidate: &Candidate, name: &str, reason: &str) -> Result<usize> {
    let value = candidate
        .get(name)
        .and_then(ParameterValue::as_int)
        .ok_or_else(|| missing(name))?;
    if value <= 0 {
        return Err(TuneError::invalid_hyperparameter(name, value, reason));
    }
    Ok(value as usize)
}

/// Best `C` of the linear SVM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmConfig {
    #[serde(rename = "C")]
    pub c: f64,
}

/// Best network hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnConfig {
    pub hidden_neurons: usize,
    pub solver: Solver,
    pub alpha: f64,
}

/// Best tree depth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
}

/// Best forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub max_depth: usize,
    pub n_estimators: usize,
}

/// Named hyperparameters of one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelConfiguration {
    Svm(SvmConfig),
    NeuralNetwork(AnnConfig),
    DecisionTree(TreeConfig),
    RandomForest(ForestConfig),
}

impl ModelConfiguration {
    pub fn kind(&self) -> FamilyKind {
        match self {
            ModelConfiguration::Svm(_) => FamilyKind::Svm,
            ModelConfiguration::NeuralNetwork(_) => FamilyKind::NeuralNetwork,
            ModelConfiguration::DecisionTree(_) => FamilyKind::DecisionTree,
            ModelConfiguration::RandomForest(_) => FamilyKind::RandomForest,
        }
    }
}

impl fmt::Display for ModelConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelConfiguration::Svm(c) => write!(f, "C={:.5}", c.c),
            ModelConfiguration::NeuralNetwork(c) => write!(
                f,
                "hidden_neurons={} solver={} alpha={:.5}",
                c.hidden_neurons, c.solver, c.alpha
            ),
            ModelConfiguration::DecisionTree(c) => write!(f, "max_depth={}", c.max_depth),
            ModelConfiguration::RandomForest(c) => {
                write!(f, "max_depth={} n_estimators={}", c.max_depth, c.n_estimators)
            }
        }
    }
}
