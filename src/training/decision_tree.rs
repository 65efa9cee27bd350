//! CART decision tree classifier (Gini impurity)

use crate::error::{Result, TuneError};
use super::{class_labels, Classifier};
use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the majority class
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split (all when `None`)
    pub max_features: Option<usize>,
    /// Seed for feature subsampling
    pub random_state: Option<u64>,
    n_features: usize,
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Consider a random subset of features at each split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Depth of the fitted tree
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::depth)
    }

    /// Fit on rows selected by `indices` (duplicates allowed, as in a bootstrap sample)
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TuneError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(TuneError::TrainingError("cannot fit a tree on zero samples".to_string()));
        }

        self.n_features = x.ncols();
        self.classes = class_labels(y);
        let labels: Vec<usize> = y
            .iter()
            .map(|v| {
                self.classes
                    .iter()
                    .position(|c| c == &v.round())
                    .unwrap_or(0)
            })
            .collect();

        let mut rng = match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let root = self.build_tree(x, &labels, indices, 0, &mut rng);
        self.root = Some(root);
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        depth: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(labels, indices);

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure;

        let leaf = || TreeNode::Leaf {
            value: self.majority(&counts),
            n_samples,
        };

        if should_stop {
            return leaf();
        }

        match self.find_best_split(x, labels, indices, &counts, rng) {
            Some((feature_idx, threshold)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature_idx]] <= threshold);

                let left = Box::new(self.build_tree(x, labels, &left_indices, depth + 1, rng));
                let right = Box::new(self.build_tree(x, labels, &right_indices, depth + 1, rng));

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples,
                }
            }
            None => leaf(),
        }
    }

    /// Best (feature, threshold) by Gini gain, scanning each candidate feature in sorted order
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        parent_counts: &[usize],
        rng: &mut Xoshiro256PlusPlus,
    ) -> Option<(usize, f64)> {
        let n = indices.len();
        let n_try = self.max_features.unwrap_or(self.n_features).min(self.n_features);
        let features: Vec<usize> = if n_try < self.n_features {
            index::sample(rng, self.n_features, n_try).into_vec()
        } else {
            (0..self.n_features).collect()
        };

        let parent_impurity = gini(parent_counts, n);
        let mut best: Option<(usize, f64)> = None;
        let mut best_gain = 0.0f64;

        let mut sorted: Vec<usize> = indices.to_vec();
        for feature_idx in features {
            sorted.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left_counts = vec![0usize; parent_counts.len()];
            for pos in 0..n - 1 {
                left_counts[labels[sorted[pos]]] += 1;

                let current = x[[sorted[pos], feature_idx]];
                let next = x[[sorted[pos + 1], feature_idx]];
                if current >= next {
                    continue;
                }

                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let right_counts: Vec<usize> = parent_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(p, l)| p - l)
                    .collect();
                let weighted = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / n as f64;

                let gain = parent_impurity - weighted;
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best = Some((feature_idx, (current + next) / 2.0));
                }
            }
        }

        best
    }

    fn class_counts(&self, labels: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in indices {
            counts[labels[i]] += 1;
        }
        counts
    }

    /// Most frequent class; ties go to the smaller label
    fn majority(&self, counts: &[usize]) -> f64 {
        let mut best = 0;
        for (k, &c) in counts.iter().enumerate() {
            if c > counts[best] {
                best = k;
            }
        }
        self.classes.get(best).copied().unwrap_or(0.0)
    }

    fn predict_row(&self, root: &TreeNode, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TuneError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(TuneError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| self.predict_row(root, row)).collect())
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::accuracy;
    use ndarray::array;

    #[test]
    fn test_separable_data() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0], [5.0, 0.0], [6.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert_eq!(accuracy(&y, &pred), 1.0);
        assert_eq!(tree.depth(), Some(1));
    }

    #[test]
    fn test_max_depth_is_respected() {
        // xor-like labels need depth 2
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];

        let mut stump = DecisionTree::new().with_max_depth(1);
        stump.fit(&x, &y).unwrap();
        assert!(stump.depth().unwrap() <= 1);

        let mut deep = DecisionTree::new().with_max_depth(5);
        deep.fit(&x, &y).unwrap();
        assert!(deep.depth().unwrap() <= 5);
    }

    #[test]
    fn test_multiclass() {
        let x = array![[0.0], [0.1], [1.0], [1.1], [2.0], [2.1]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut tree = DecisionTree::new().with_max_depth(3);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[2.05], [0.05]]).unwrap(), array![2.0, 0.0]);
    }

    #[test]
    fn test_unfitted_predict() {
        let tree = DecisionTree::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(TuneError::ModelNotFitted)));
    }
}
