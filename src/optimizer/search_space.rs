//! Search space definition for hyperparameters

use crate::error::{Result, TuneError};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous range, used for regularisation strengths
    Float {
        low: f64,
        high: f64,
        log_scale: bool,
        /// Number of uniform draws when the space is enumerated as a grid
        grid_samples: usize,
    },
    /// Discrete ordered range `low, low + step, ..., <= high`
    Int { low: i64, high: i64, step: i64 },
    /// Finite categorical set
    Categorical { choices: Vec<String> },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: false,
                grid_samples: 1,
            },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: true,
                grid_samples: 1,
            },
        }
    }

    /// Create an integer parameter with unit step
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self::stepped_int(name, low, high, 1)
    }

    /// Create an integer parameter with a fixed step
    pub fn stepped_int(name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high, step },
        }
    }

    /// Create a categorical parameter
    pub fn categorical<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Set how many uniform draws a continuous parameter contributes to a grid
    pub fn with_grid_samples(mut self, n: usize) -> Self {
        if let ParameterType::Float { grid_samples, .. } = &mut self.param_type {
            *grid_samples = n;
        }
        self
    }

    /// Check the declared range
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            Err(TuneError::ConfigError(format!(
                "parameter '{}': {}",
                self.name, reason
            )))
        };

        match &self.param_type {
            ParameterType::Float {
                low,
                high,
                log_scale,
                grid_samples,
            } => {
                if !low.is_finite() || !high.is_finite() {
                    return fail(format!("non-finite range [{}, {}]", low, high));
                }
                if high < low {
                    return fail(format!("end {} < begin {}", high, low));
                }
                if !(high - low).is_finite() {
                    return fail(format!("width of [{}, {}] overflows", low, high));
                }
                if *log_scale && *low <= 0.0 {
                    return fail(format!("log-scale range must start above 0, got {}", low));
                }
                if *grid_samples == 0 {
                    return fail("grid_samples must be at least 1".to_string());
                }
            }
            ParameterType::Int { low, high, step } => {
                if high < low {
                    return fail(format!("end {} < begin {}", high, low));
                }
                if *low < 1 {
                    return fail(format!("begin must be >= 1, got {}", low));
                }
                if *step < 1 {
                    return fail(format!("step must be >= 1, got {}", step));
                }
            }
            ParameterType::Categorical { choices } => {
                if choices.is_empty() {
                    return fail("categorical set is empty".to_string());
                }
            }
        }
        Ok(())
    }

    /// Whether the parameter ranges over a continuum
    pub fn is_continuous(&self) -> bool {
        matches!(self.param_type, ParameterType::Float { .. })
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float {
                low,
                high,
                log_scale,
                ..
            } => {
                let val = if *log_scale {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    rng.gen_range(log_low..=log_high).exp().clamp(*low, *high)
                } else {
                    rng.gen_range(*low..=*high)
                };
                ParameterValue::Float(val)
            }
            ParameterType::Int { low, high, step } => {
                let n_steps = (high - low) / step;
                ParameterValue::Int(low + step * rng.gen_range(0..=n_steps))
            }
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::String(choices[idx].clone())
            }
        }
    }

    /// Values contributed to a grid enumeration
    pub fn grid_values(&self, rng: &mut impl Rng) -> Vec<ParameterValue> {
        match &self.param_type {
            ParameterType::Float { grid_samples, .. } => {
                (0..*grid_samples).map(|_| self.sample(rng)).collect()
            }
            ParameterType::Int { low, high, step } => (*low..=*high)
                .step_by(*step as usize)
                .map(ParameterValue::Int)
                .collect(),
            ParameterType::Categorical { choices } => choices
                .iter()
                .cloned()
                .map(ParameterValue::String)
                .collect(),
        }
    }

    /// Snap a real number onto this integer parameter's step grid
    pub fn snap_int(&self, value: f64) -> Option<i64> {
        match &self.param_type {
            ParameterType::Int { low, high, step } => {
                let n_steps = (high - low) / step;
                let k = ((value - *low as f64) / *step as f64).round();
                let k = (k.max(0.0) as i64).min(n_steps);
                Some(low + step * k)
            }
            _ => None,
        }
    }

    /// Whether `value` lies within the declared range (boundaries inclusive)
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (&self.param_type, value) {
            (ParameterType::Float { low, high, .. }, ParameterValue::Float(v)) => {
                *v >= *low && *v <= *high
            }
            (ParameterType::Int { low, high, step }, ParameterValue::Int(v)) => {
                *v >= *low && *v <= *high && (v - low) % step == 0
            }
            (ParameterType::Categorical { choices }, ParameterValue::String(s)) => {
                choices.iter().any(|c| c == s)
            }
            _ => false,
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::String(_) => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// One concrete hyperparameter assignment
pub type Candidate = BTreeMap<String, ParameterValue>;

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Add a categorical parameter
    pub fn categorical<I, S>(self, name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(Parameter::categorical(name, choices))
    }

    /// Validate every declared range; also rejects empty spaces and duplicate names
    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(TuneError::ConfigError("search space is empty".to_string()));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            p.validate()?;
            if self.parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(TuneError::ConfigError(format!(
                    "parameter '{}' declared twice",
                    p.name
                )));
            }
        }
        Ok(())
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> Candidate {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Whether every parameter of `candidate` lies inside its declared range
    pub fn contains(&self, candidate: &Candidate) -> bool {
        candidate.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .all(|p| candidate.get(&p.name).map_or(false, |v| p.contains(v)))
    }

    /// Whether any dimension is continuous
    pub fn has_continuous(&self) -> bool {
        self.parameters.iter().any(Parameter::is_continuous)
    }

    /// Cross product of every parameter's grid values, last parameter varying fastest
    pub fn grid(&self, rng: &mut impl Rng) -> Vec<Candidate> {
        let mut grid: Vec<Candidate> = vec![Candidate::new()];
        for param in &self.parameters {
            let values = param.grid_values(rng);
            grid = grid
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |v| {
                        let mut next = partial.clone();
                        next.insert(param.name.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        grid
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}
