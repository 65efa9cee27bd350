//! Search budget configuration

use crate::error::{Result, TuneError};
use serde::{Deserialize, Serialize};
use super::SamplerType;

/// Configuration for sequential model-based search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Exact number of objective evaluations per sequential search
    pub max_evals: usize,

    /// Sampler used to propose candidates
    pub sampler: SamplerType,

    /// Number of initial random samples before the model kicks in
    pub n_startup_trials: usize,

    /// Quantile separating good from bad observations
    pub gamma: f64,

    /// Candidates drawn per proposal when maximising expected improvement
    pub n_ei_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_evals: 100,
            sampler: SamplerType::Tpe,
            n_startup_trials: 10,
            gamma: 0.25,
            n_ei_candidates: 24,
        }
    }
}

impl SearchConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the evaluation budget
    pub fn with_max_evals(mut self, n: usize) -> Self {
        self.max_evals = n;
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    /// Builder method to set the number of random startup trials
    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Builder method to set gamma
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Reject budgets that could never produce a winner
    pub fn validate(&self) -> Result<()> {
        if self.max_evals == 0 {
            return Err(TuneError::ConfigError("max_evals must be at least 1".to_string()));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(TuneError::ConfigError(format!(
                "gamma must lie in (0, 1], got {}",
                self.gamma
            )));
        }
        if self.n_ei_candidates == 0 {
            return Err(TuneError::ConfigError(
                "n_ei_candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
