//! Bootstrap random forest classifier

use crate::error::{Result, TuneError};
use crate::utils::derive_seed;
use super::decision_tree::DecisionTree;
use super::Classifier;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// All features
    All,
}

/// Random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Features per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: Option<u64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(TuneError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(TuneError::TrainingError("forest needs at least one tree".to_string()));
        }
        if n_samples == 0 {
            return Err(TuneError::TrainingError("cannot fit a forest on zero samples".to_string()));
        }

        let max_features = self.compute_max_features(x.ncols());
        let base_seed = match self.random_state {
            Some(seed) => seed,
            None => rand::random(),
        };

        // Trees are independent; per-tree seeds keep the fit reproducible
        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = derive_seed(base_seed, tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new()
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit_indices(x, y, &sample_indices)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(())
    }

    /// Majority vote; ties go to the smaller label
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(TuneError::ModelNotFitted);
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
                for preds in &all_predictions {
                    *votes.entry(preds[i].round() as i64).or_insert(0) += 1;
                }
                let mut winner = (0i64, 0usize);
                for (class, count) in votes {
                    if count > winner.1 {
                        winner = (class, count);
                    }
                }
                winner.0 as f64
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::accuracy;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.1], [0.2, 0.0], [0.1, 0.3], [0.3, 0.2],
            [2.0, 2.1], [2.2, 1.9], [1.9, 2.2], [2.1, 2.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_forest_fits_blobs() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(15).with_max_depth(3).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.n_trees(), 15);
        let pred = forest.predict(&x).unwrap();
        assert!(accuracy(&y, &pred) >= 0.875);
    }

    #[test]
    fn test_seeded_forest_is_reproducible() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(5).with_random_state(7);
        let mut b = RandomForest::new(5).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let rows = array![[1.0, 1.0], [0.5, 1.5]];
        assert_eq!(a.predict(&rows).unwrap(), b.predict(&rows).unwrap());
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(0);
        assert!(forest.fit(&x, &y).is_err());
    }

    #[test]
    fn test_max_features() {
        let forest = RandomForest::new(1);
        assert_eq!(forest.compute_max_features(9), 3);
        assert_eq!(forest.compute_max_features(1), 1);
        assert_eq!(forest.with_max_features(MaxFeatures::All).compute_max_features(4), 4);
    }
}
