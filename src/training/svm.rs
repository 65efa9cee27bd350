//! Linear-kernel support vector classifier
//!
//! Trained with simplified SMO (Sequential Minimal Optimization). With a linear
//! kernel the primal weight vector is maintained alongside the multipliers, so
//! no kernel matrix is ever materialised. Multi-class problems use One-vs-Rest.

use crate::error::{Result, TuneError};
use super::{class_labels, Classifier};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of sweeps over the data
    pub max_iter: usize,
    /// Consecutive sweeps without change before stopping
    pub max_passes: usize,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            max_iter: 1000,
            max_passes: 5,
            random_state: Some(42),
        }
    }
}

/// A single binary separator for one class vs rest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearSeparator {
    weights: Array1<f64>,
    bias: f64,
}

impl LinearSeparator {
    fn score(&self, row: ArrayView1<f64>) -> f64 {
        self.weights.dot(&row) + self.bias
    }
}

/// Linear Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    classes: Vec<f64>,
    /// One separator for binary problems, one per class otherwise
    separators: Vec<LinearSeparator>,
    n_features: usize,
    is_fitted: bool,
}

impl SVMClassifier {
    /// Create a new SVM classifier
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            separators: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Distinct labels seen during fit
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// SMO on +1/-1 targets; returns the primal separator
    fn smo_train(&self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut Xoshiro256PlusPlus) -> LinearSeparator {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas = Array1::<f64>::zeros(n);
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        let sq_norms: Vec<f64> = x.rows().into_iter().map(|r| r.dot(&r)).collect();

        let mut passes = 0;
        let mut total_iter = 0;

        while n > 1 && passes < self.config.max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = weights.dot(&x.row(i)) + bias - y[i];

                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = weights.dot(&x.row(j)) + bias - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let k_ij = x.row(i).dot(&x.row(j));
                let eta = 2.0 * k_ij - sq_norms[i] - sq_norms[j];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alpha_j - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);

                let d_i = y[i] * (alpha_i - alpha_i_old);
                let d_j = y[j] * (alpha_j - alpha_j_old);

                let b1 = bias - e_i - d_i * sq_norms[i] - d_j * k_ij;
                let b2 = bias - e_j - d_i * k_ij - d_j * sq_norms[j];
                bias = if alpha_i > 0.0 && alpha_i < c {
                    b1
                } else if alpha_j > 0.0 && alpha_j < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                weights.scaled_add(d_i, &x.row(i));
                weights.scaled_add(d_j, &x.row(j));
                alphas[i] = alpha_i;
                alphas[j] = alpha_j;
                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        LinearSeparator { weights, bias }
    }
}

impl Classifier for SVMClassifier {
    /// Fit the classifier (binary directly, multi-class via One-vs-Rest)
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TuneError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(TuneError::TrainingError("cannot fit an SVM on zero samples".to_string()));
        }
        if !(self.config.c > 0.0 && self.config.c.is_finite()) {
            return Err(TuneError::invalid_hyperparameter("C", self.config.c, "C <= 0"));
        }

        self.n_features = x.ncols();
        self.classes = class_labels(y);
        self.separators.clear();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        // A single class needs no separator; prediction is constant
        let targets: Vec<f64> = match self.classes.len() {
            0 | 1 => Vec::new(),
            2 => vec![self.classes[1]],
            _ => self.classes.clone(),
        };

        for positive in targets {
            let y_binary = y.mapv(|v| if v.round() == positive { 1.0 } else { -1.0 });
            let separator = self.smo_train(x, &y_binary, &mut rng);
            self.separators.push(separator);
        }

        self.is_fitted = true;
        Ok(())
    }

    /// Predict class labels (binary and multi-class)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TuneError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TuneError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let fallback = self.classes.first().copied().unwrap_or(0.0);
        let predictions = x
            .rows()
            .into_iter()
            .map(|row| match self.separators.as_slice() {
                [] => fallback,
                [binary] => {
                    if binary.score(row) >= 0.0 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                }
                ovr => {
                    let mut best_score = f64::NEG_INFINITY;
                    let mut best_class = fallback;
                    for (k, separator) in ovr.iter().enumerate() {
                        let score = separator.score(row);
                        if score > best_score {
                            best_score = score;
                            best_class = self.classes[k];
                        }
                    }
                    best_class
                }
            })
            .collect();

        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::accuracy;
    use ndarray::array;

    #[test]
    fn test_svm_classifier_linear() {
        let x = array![
            [1.0, 1.0], [1.5, 1.2], [1.2, 0.8], [0.8, 1.1],
            [4.0, 4.0], [4.2, 3.8], [3.9, 4.3], [4.4, 4.1],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &y).unwrap();

        let pred = svm.predict(&x).unwrap();
        assert_eq!(accuracy(&y, &pred), 1.0);
    }

    #[test]
    fn test_svm_classifier_multiclass() {
        let x = array![
            [0.0, 0.0], [0.2, 0.1], [0.1, 0.3],
            [5.0, 0.0], [5.2, 0.1], [4.9, 0.2],
            [0.0, 5.0], [0.1, 5.2], [0.2, 4.9],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];

        let mut svm = SVMClassifier::new(SVMConfig { c: 4.0, ..SVMConfig::default() });
        svm.fit(&x, &y).unwrap();

        assert_eq!(svm.classes(), &[0.0, 1.0, 2.0]);
        let pred = svm.predict(&x).unwrap();
        assert!(accuracy(&y, &pred) >= 8.0 / 9.0);
    }

    #[test]
    fn test_single_class_predicts_constant() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 4.0];

        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&array![[10.0]]).unwrap(), array![4.0]);
    }

    #[test]
    fn test_rejects_non_positive_c() {
        let mut svm = SVMClassifier::new(SVMConfig { c: 0.0, ..SVMConfig::default() });
        let result = svm.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]);
        assert!(matches!(result, Err(TuneError::InvalidHyperparameter { .. })));
    }
}
