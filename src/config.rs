//! Round-level configuration, loadable from JSON

use crate::error::{Result, TuneError};
use crate::family::{AnnRanges, FamilyKind, ForestRanges, ModelFamily, SvmRanges, TreeRanges};
use crate::optimizer::SearchConfig;
use crate::training::TrainSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Range declarations of all four families
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyRanges {
    pub svm: SvmRanges,
    pub neural_network: AnnRanges,
    pub decision_tree: TreeRanges,
    pub random_forest: ForestRanges,
}

impl FamilyRanges {
    /// The family for `kind` with these ranges
    pub fn family(&self, kind: FamilyKind) -> ModelFamily {
        match kind {
            FamilyKind::Svm => ModelFamily::Svm(self.svm.clone()),
            FamilyKind::NeuralNetwork => ModelFamily::NeuralNetwork(self.neural_network.clone()),
            FamilyKind::DecisionTree => ModelFamily::DecisionTree(self.decision_tree.clone()),
            FamilyKind::RandomForest => ModelFamily::RandomForest(self.random_forest.clone()),
        }
    }

    /// All four families in snapshot order
    pub fn families(&self) -> Vec<ModelFamily> {
        FamilyKind::ALL.iter().map(|&kind| self.family(kind)).collect()
    }
}

/// Everything a tuning round needs besides the data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Sequential search budget and sampler settings
    pub search: SearchConfig,
    /// Per-family ranges
    pub ranges: FamilyRanges,
    /// Untuned training knobs
    pub train: TrainSettings,
    /// Cap on the pool hosting parallel grid evaluations (None = all cores)
    pub n_jobs: Option<usize>,
    /// Base seed; None draws a fresh one per round
    pub seed: Option<u64>,
}

impl TuningConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_ranges(mut self, ranges: FamilyRanges) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn with_train_settings(mut self, train: TrainSettings) -> Self {
        self.train = train;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check budgets, ranges and worker count
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.train.validate()?;
        for family in self.ranges.families() {
            family.search_space()?;
        }
        if self.n_jobs == Some(0) {
            return Err(TuneError::ConfigError("n_jobs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::SamplerType;

    #[test]
    fn test_defaults() {
        let config = TuningConfig::default();
        assert_eq!(config.search.max_evals, 100);
        assert_eq!(config.ranges.svm.c_grid_samples, 400);
        assert_eq!(config.ranges.random_forest.estimators_end, 40);
        assert_eq!(config.ranges.neural_network.alpha_grid_samples, 75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{
            "search": {"max_evals": 25, "sampler": "random"},
            "ranges": {"random_forest": {"estimators_end": 15}},
            "seed": 4
        }"#;
        let config: TuningConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.search.max_evals, 25);
        assert_eq!(config.search.sampler, SamplerType::Random);
        assert_eq!(config.ranges.random_forest.estimators_end, 15);
        assert_eq!(config.ranges.random_forest.depth_end, 15);
        assert_eq!(config.ranges.decision_tree.depth_end, 40);
        assert_eq!(config.seed, Some(4));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.json");

        let config = TuningConfig::new().with_n_jobs(2).with_seed(99);
        config.save_json(&path).unwrap();
        assert_eq!(TuningConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let mut config = TuningConfig::new();
        config.ranges.decision_tree.depth_begin = 0;
        assert!(matches!(config.validate(), Err(TuneError::ConfigError(_))));

        let config = TuningConfig::new().with_n_jobs(0);
        assert!(matches!(config.validate(), Err(TuneError::ConfigError(_))));
    }
}
