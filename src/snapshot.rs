//! Aggregate of the four tuned configurations of one round

use crate::data::DataSplit;
use crate::error::{Result, TuneError};
use crate::family::{AnnConfig, FamilyKind, ForestConfig, ModelConfiguration, SvmConfig, TreeConfig};
use crate::training::{build_classifier, TrainSettings};
use crate::utils::derive_seed;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Best configuration per family, all four present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSnapshot {
    /// Fold count the round was tuned with (1 = holdout)
    pub n_folds: usize,
    pub svm: SvmConfig,
    pub ann: AnnConfig,
    pub decision_tree: TreeConfig,
    pub random_forest: ForestConfig,
}

impl TuningSnapshot {
    /// Assemble from exactly one configuration per family
    pub fn from_configurations(
        n_folds: usize,
        configurations: impl IntoIterator<Item = ModelConfiguration>,
    ) -> Result<Self> {
        let mut svm = None;
        let mut ann = None;
        let mut decision_tree = None;
        let mut random_forest = None;

        for configuration in configurations {
            let kind = configuration.kind();
            let duplicate = match configuration {
                ModelConfiguration::Svm(c) => svm.replace(c).is_some(),
                ModelConfiguration::NeuralNetwork(c) => ann.replace(c).is_some(),
                ModelConfiguration::DecisionTree(c) => decision_tree.replace(c).is_some(),
                ModelConfiguration::RandomForest(c) => random_forest.replace(c).is_some(),
            };
            if duplicate {
                return Err(TuneError::ConfigError(format!("{} configured twice", kind)));
            }
        }

        let missing = |kind: FamilyKind| TuneError::ConfigError(format!("no configuration for {}", kind));
        Ok(Self {
            n_folds,
            svm: svm.ok_or_else(|| missing(FamilyKind::Svm))?,
            ann: ann.ok_or_else(|| missing(FamilyKind::NeuralNetwork))?,
            decision_tree: decision_tree.ok_or_else(|| missing(FamilyKind::DecisionTree))?,
            random_forest: random_forest.ok_or_else(|| missing(FamilyKind::RandomForest))?,
        })
    }

    /// The four configurations in family order
    pub fn configurations(&self) -> [ModelConfiguration; 4] {
        [
            ModelConfiguration::Svm(self.svm.clone()),
            ModelConfiguration::NeuralNetwork(self.ann.clone()),
            ModelConfiguration::DecisionTree(self.decision_tree.clone()),
            ModelConfiguration::RandomForest(self.random_forest.clone()),
        ]
    }

    pub fn get(&self, kind: FamilyKind) -> ModelConfiguration {
        match kind {
            FamilyKind::Svm => ModelConfiguration::Svm(self.svm.clone()),
            FamilyKind::NeuralNetwork => ModelConfiguration::NeuralNetwork(self.ann.clone()),
            FamilyKind::DecisionTree => ModelConfiguration::DecisionTree(self.decision_tree.clone()),
            FamilyKind::RandomForest => ModelConfiguration::RandomForest(self.random_forest.clone()),
        }
    }

    /// Refit every configuration on the merged pool and report validation accuracy
    pub fn score(
        &self,
        split: &DataSplit,
        x_val: &Array2<f64>,
        y_val: &Array1<f64>,
        settings: &TrainSettings,
        seed: u64,
    ) -> Result<BTreeMap<FamilyKind, f64>> {
        let (x, y) = split.merged_pool()?;
        self.configurations()
            .iter()
            .map(|configuration| -> Result<(FamilyKind, f64)> {
                let kind = configuration.kind();
                let mut classifier = build_classifier(configuration, settings, derive_seed(seed, kind.index()));
                classifier.fit(&x, &y)?;
                Ok((kind, classifier.score(x_val, y_val)?))
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Solver;
    use ndarray::array;

    fn configurations() -> Vec<ModelConfiguration> {
        vec![
            ModelConfiguration::RandomForest(ForestConfig { max_depth: 3, n_estimators: 4 }),
            ModelConfiguration::Svm(SvmConfig { c: 1.5 }),
            ModelConfiguration::DecisionTree(TreeConfig { max_depth: 2 }),
            ModelConfiguration::NeuralNetwork(AnnConfig {
                hidden_neurons: 5,
                solver: Solver::Adam,
                alpha: 0.001,
            }),
        ]
    }

    #[test]
    fn test_assembles_in_any_order() {
        let snapshot = TuningSnapshot::from_configurations(5, configurations()).unwrap();
        assert_eq!(snapshot.n_folds, 5);
        assert_eq!(snapshot.svm.c, 1.5);
        assert_eq!(snapshot.get(FamilyKind::DecisionTree), configurations()[2]);
    }

    #[test]
    fn test_missing_family_rejected() {
        let mut partial = configurations();
        partial.pop();
        let result = TuningSnapshot::from_configurations(1, partial);
        assert!(matches!(result, Err(TuneError::ConfigError(_))));
    }

    #[test]
    fn test_duplicate_family_rejected() {
        let mut doubled = configurations();
        doubled.push(ModelConfiguration::Svm(SvmConfig { c: 2.0 }));
        let result = TuningSnapshot::from_configurations(1, doubled);
        assert!(matches!(result, Err(TuneError::ConfigError(_))));
    }

    #[test]
    fn test_json() {
        let snapshot = TuningSnapshot::from_configurations(1, configurations()).unwrap();
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"C\": 1.5"));
        assert_eq!(TuningSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_score_reports_every_family() {
        let split = DataSplit::new(
            array![[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [3.0, 3.0], [3.1, 2.9], [2.9, 3.2]],
            array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            array![[0.15, 0.05], [3.05, 3.1]],
            array![0.0, 1.0],
        )
        .unwrap();
        let snapshot = TuningSnapshot::from_configurations(1, configurations()).unwrap();

        let scores = snapshot
            .score(&split, &array![[0.0, 0.1], [3.0, 3.1]], &array![0.0, 1.0], &TrainSettings::default(), 1)
            .unwrap();
        assert_eq!(scores.len(), 4);
        assert!(scores.values().all(|s| (0.0..=1.0).contains(s)));
    }
}
