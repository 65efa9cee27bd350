//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! A feedforward network with ReLU hidden layers and a softmax output, trained
//! by minibatch backpropagation (`adam`, `sgd`) or by full-batch `lbfgs` over
//! the flattened weights. A fit whose loss stops being finite is kept as a
//! diverged model that scores zero.

use ndarray::{s, Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::{accuracy, class_labels, Classifier};
use crate::error::{Result, TuneError};

/// Weight-update rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    /// Adaptive moment estimation
    Adam,
    /// Momentum SGD with an adaptive learning rate
    Sgd,
    /// Limited-memory BFGS on the full batch
    Lbfgs,
}

impl Default for Solver {
    fn default() -> Self {
        Self::Adam
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Solver::Adam => f.write_str("adam"),
            Solver::Sgd => f.write_str("sgd"),
            Solver::Lbfgs => f.write_str("lbfgs"),
        }
    }
}

impl FromStr for Solver {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(Solver::Adam),
            "sgd" => Ok(Solver::Sgd),
            "lbfgs" => Ok(Solver::Lbfgs),
            other => Err(TuneError::invalid_hyperparameter(
                "solver",
                other,
                "expected one of lbfgs, sgd, adam",
            )),
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Weight-update rule
    pub solver: Solver,
    /// Initial learning rate
    pub learning_rate: f64,
    /// Maximum number of epochs (iterations for lbfgs)
    pub max_epochs: usize,
    /// Minibatch size (capped at the sample count)
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    /// Random seed
    pub random_state: Option<u64>,
    /// Momentum (sgd only)
    pub momentum: f64,
    /// Minimum loss improvement that counts as progress
    pub tol: f64,
    /// Epochs without progress before stopping (or, for sgd, shrinking the rate)
    pub n_iter_no_change: usize,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            solver: Solver::Adam,
            learning_rate: 0.001,
            max_epochs: 200,
            batch_size: 200,
            alpha: 0.0001,
            random_state: Some(1),
            momentum: 0.9,
            tol: 1e-4,
            n_iter_no_change: 10,
        }
    }
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const MIN_SGD_LEARNING_RATE: f64 = 1e-6;
const LBFGS_MEMORY: usize = 10;
const LBFGS_MAX_BACKTRACKS: usize = 30;
const ARMIJO_C1: f64 = 1e-4;
const LBFGS_FTOL: f64 = 2.2e-9;

/// Per-layer optimizer state for the minibatch solvers
enum SolverState {
    Adam {
        m_w: Vec<Array2<f64>>,
        v_w: Vec<Array2<f64>>,
        m_b: Vec<Array1<f64>>,
        v_b: Vec<Array1<f64>>,
        t: i32,
    },
    Sgd {
        velocities_w: Vec<Array2<f64>>,
        velocities_b: Vec<Array1<f64>>,
    },
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    classes: Vec<f64>,
    n_iter: usize,
    is_fitted: bool,
    diverged: bool,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            classes: Vec::new(),
            n_iter: 0,
            is_fitted: false,
            diverged: false,
        }
    }

    /// Epochs run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Whether the last fit ended with a non-finite loss
    pub fn diverged(&self) -> bool {
        self.diverged
    }

    /// Predict class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TuneError::ModelNotFitted);
        }
        if self.diverged {
            return Err(TuneError::TrainingError(format!(
                "network diverged after {} epochs",
                self.n_iter
            )));
        }
        if x.ncols() != self.n_features {
            return Err(TuneError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let (mut activations, _) = self.forward(x);
        activations.pop().ok_or(TuneError::ModelNotFitted)
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) -> Result<()> {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(self.classes.len());

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let scale = (6.0 / (n_in + n_out) as f64).sqrt();

            let weights: Vec<f64> = (0..n_in * n_out)
                .map(|_| rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights.push(Array2::from_shape_vec((n_in, n_out), weights)?);
            self.biases.push(Array1::zeros(n_out));
        }
        Ok(())
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.to_owned()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len().saturating_sub(1);

        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last { relu(&z) } else { softmax(&z) };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    /// Cross-entropy gradients with the L2 penalty folded in
    fn backward(
        &self,
        y_onehot: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y_onehot.nrows() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        let Some(output) = activations.last() else {
            return gradients;
        };
        let mut delta = (output - y_onehot) / n;

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.weights[i] * (self.config.alpha / n);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                let relu_grad = z_values[i - 1].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.weights[i].t()) * relu_grad;
            }
        }

        gradients.reverse();
        gradients
    }

    /// `None` for lbfgs, which keeps its curvature pairs in `fit_lbfgs`
    fn solver_state(&self) -> Option<SolverState> {
        let zeros_w = || -> Vec<Array2<f64>> {
            self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect()
        };
        let zeros_b = || -> Vec<Array1<f64>> {
            self.biases.iter().map(|b| Array1::zeros(b.len())).collect()
        };
        match self.config.solver {
            Solver::Adam => Some(SolverState::Adam {
                m_w: zeros_w(),
                v_w: zeros_w(),
                m_b: zeros_b(),
                v_b: zeros_b(),
                t: 0,
            }),
            Solver::Sgd => Some(SolverState::Sgd {
                velocities_w: zeros_w(),
                velocities_b: zeros_b(),
            }),
            Solver::Lbfgs => None,
        }
    }

    fn apply(&mut self, state: &mut SolverState, gradients: Vec<(Array2<f64>, Array1<f64>)>, lr: f64) {
        match state {
            SolverState::Adam { m_w, v_w, m_b, v_b, t } => {
                *t += 1;
                let step = lr * (1.0 - BETA2.powi(*t)).sqrt() / (1.0 - BETA1.powi(*t));
                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    m_w[i] = &m_w[i] * BETA1 + &grad_w * (1.0 - BETA1);
                    v_w[i] = &v_w[i] * BETA2 + &grad_w.mapv(|g| g * g) * (1.0 - BETA2);
                    m_b[i] = &m_b[i] * BETA1 + &grad_b * (1.0 - BETA1);
                    v_b[i] = &v_b[i] * BETA2 + &grad_b.mapv(|g| g * g) * (1.0 - BETA2);

                    self.weights[i] = &self.weights[i]
                        - &(&m_w[i] / &v_w[i].mapv(|v| v.sqrt() + ADAM_EPSILON)) * step;
                    self.biases[i] = &self.biases[i]
                        - &(&m_b[i] / &v_b[i].mapv(|v| v.sqrt() + ADAM_EPSILON)) * step;
                }
            }
            SolverState::Sgd { velocities_w, velocities_b } => {
                let momentum = self.config.momentum;
                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * momentum - &grad_w * lr;
                    velocities_b[i] = &velocities_b[i] * momentum - &grad_b * lr;

                    self.weights[i] = &self.weights[i] + &velocities_w[i];
                    self.biases[i] = &self.biases[i] + &velocities_b[i];
                }
            }
        }
    }

    /// Weights then biases, each layer in row-major order
    fn flatten_params(&self) -> Array1<f64> {
        self.weights
            .iter()
            .flat_map(|w| w.iter().copied())
            .chain(self.biases.iter().flat_map(|b| b.iter().copied()))
            .collect()
    }

    fn set_params(&mut self, params: &Array1<f64>) {
        let mut offset = 0;
        for w in self.weights.iter_mut() {
            for (dst, src) in w.iter_mut().zip(params.slice(s![offset..]).iter()) {
                *dst = *src;
            }
            offset += w.len();
        }
        for b in self.biases.iter_mut() {
            for (dst, src) in b.iter_mut().zip(params.slice(s![offset..]).iter()) {
                *dst = *src;
            }
            offset += b.len();
        }
    }

    /// Penalized full-batch loss and its flattened gradient at `params`
    fn loss_and_grad(
        &mut self,
        params: &Array1<f64>,
        x: &Array2<f64>,
        y_onehot: &Array2<f64>,
    ) -> (f64, Array1<f64>) {
        self.set_params(params);
        let (activations, z_values) = self.forward(x);
        let cross_entropy = activations
            .last()
            .map(|output| -(y_onehot * &output.mapv(|p| p.max(1e-12).ln())).sum())
            .unwrap_or(0.0);
        let loss = (cross_entropy + 0.5 * self.config.alpha * self.penalty()) / x.nrows() as f64;

        let gradients = self.backward(y_onehot, &activations, &z_values);
        let grad = gradients
            .iter()
            .flat_map(|(grad_w, _)| grad_w.iter().copied())
            .chain(gradients.iter().flat_map(|(_, grad_b)| grad_b.iter().copied()))
            .collect();
        (loss, grad)
    }

    fn penalty(&self) -> f64 {
        self.weights.iter().map(|w| w.mapv(|v| v * v).sum()).sum()
    }

    /// Minibatch epochs for adam and sgd; returns the last epoch loss
    fn fit_minibatch(
        &mut self,
        x: &Array2<f64>,
        y_onehot: &Array2<f64>,
        state: &mut SolverState,
        rng: &mut Xoshiro256PlusPlus,
    ) -> f64 {
        let n_samples = x.nrows();
        let batch_size = self.config.batch_size.clamp(1, n_samples);
        let mut learning_rate = self.config.learning_rate;
        let mut best_loss = f64::INFINITY;
        let mut loss = 0.0;
        let mut no_improvement = 0;

        for _epoch in 0..self.config.max_epochs {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            indices.shuffle(rng);

            let mut epoch_loss = 0.0;
            for batch_indices in indices.chunks(batch_size) {
                let x_batch = x.select(Axis(0), batch_indices);
                let y_batch = y_onehot.select(Axis(0), batch_indices);

                let (activations, z_values) = self.forward(&x_batch);
                if let Some(output) = activations.last() {
                    epoch_loss -= (&y_batch * &output.mapv(|p| p.max(1e-12).ln())).sum();
                }
                let gradients = self.backward(&y_batch, &activations, &z_values);
                self.apply(state, gradients, learning_rate);
            }

            loss = (epoch_loss + 0.5 * self.config.alpha * self.penalty()) / n_samples as f64;
            self.n_iter += 1;

            if !loss.is_finite() {
                return loss;
            }

            if loss > best_loss - self.config.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);

            if no_improvement >= self.config.n_iter_no_change {
                match self.config.solver {
                    Solver::Sgd if learning_rate / 5.0 > MIN_SGD_LEARNING_RATE => {
                        learning_rate /= 5.0;
                        no_improvement = 0;
                    }
                    _ => break,
                }
            }
        }
        loss
    }

    /// Full-batch L-BFGS with a backtracking Armijo line search; returns the final loss
    fn fit_lbfgs(&mut self, x: &Array2<f64>, y_onehot: &Array2<f64>) -> f64 {
        let mut params = self.flatten_params();
        let (mut loss, mut grad) = self.loss_and_grad(&params, x, y_onehot);
        let mut memory: VecDeque<(Array1<f64>, Array1<f64>, f64)> = VecDeque::with_capacity(LBFGS_MEMORY);

        for _iteration in 0..self.config.max_epochs {
            if !loss.is_finite() {
                break;
            }
            let grad_max = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if grad_max <= self.config.tol {
                break;
            }

            let mut direction = two_loop_direction(&grad, &memory);
            let mut slope = direction.dot(&grad);
            if !(slope < 0.0 && slope.is_finite()) {
                memory.clear();
                direction = grad.mapv(|g| -g);
                slope = -grad.dot(&grad);
            }
            let mut step = if memory.is_empty() {
                1.0 / grad.dot(&grad).sqrt().max(1.0)
            } else {
                1.0
            };

            let mut accepted = None;
            for _ in 0..LBFGS_MAX_BACKTRACKS {
                let candidate = &params + &(&direction * step);
                let (candidate_loss, candidate_grad) = self.loss_and_grad(&candidate, x, y_onehot);
                if candidate_loss.is_finite() && candidate_loss <= loss + ARMIJO_C1 * step * slope {
                    accepted = Some((candidate, candidate_loss, candidate_grad));
                    break;
                }
                step *= 0.5;
            }
            self.n_iter += 1;

            let Some((candidate, candidate_loss, candidate_grad)) = accepted else {
                break;
            };
            let s_k = &candidate - &params;
            let y_k = &candidate_grad - &grad;
            let curvature = s_k.dot(&y_k);
            if curvature > 1e-10 {
                if memory.len() == LBFGS_MEMORY {
                    memory.pop_front();
                }
                memory.push_back((s_k, y_k, 1.0 / curvature));
            }

            let scale = loss.abs().max(candidate_loss.abs()).max(1.0);
            let improvement = (loss - candidate_loss) / scale;
            params = candidate;
            loss = candidate_loss;
            grad = candidate_grad;
            if improvement <= LBFGS_FTOL {
                break;
            }
        }

        self.set_params(&params);
        loss
    }

    fn to_onehot(&self, y: &Array1<f64>) -> Array2<f64> {
        let mut onehot = Array2::zeros((y.len(), self.classes.len()));
        for (i, &label) in y.iter().enumerate() {
            let class_idx = self
                .classes
                .iter()
                .position(|&c| c == label.round())
                .unwrap_or(0);
            onehot[[i, class_idx]] = 1.0;
        }
        onehot
    }
}

impl Classifier for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(TuneError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TuneError::TrainingError("cannot fit a network on zero samples".to_string()));
        }
        if self.config.hidden_layers.iter().any(|&h| h == 0) {
            return Err(TuneError::invalid_hyperparameter(
                "hidden_layers",
                format!("{:?}", self.config.hidden_layers),
                "every layer needs at least one neuron",
            ));
        }

        self.n_features = x.ncols();
        self.classes = class_labels(y);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        self.initialize_weights(&mut rng)?;

        let y_onehot = self.to_onehot(y);
        self.n_iter = 0;
        let loss = match self.solver_state() {
            Some(mut state) => self.fit_minibatch(x, &y_onehot, &mut state, &mut rng),
            None => self.fit_lbfgs(x, &y_onehot),
        };

        self.diverged = !loss.is_finite();
        if self.diverged {
            warn!(solver = %self.config.solver, epochs = self.n_iter, "network loss diverged");
        }
        self.is_fitted = true;
        Ok(())
    }

    /// Zero for a diverged fit, otherwise the fraction of correct rows
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        if x.nrows() != y.len() {
            return Err(TuneError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.diverged {
            return Ok(0.0);
        }
        let predictions = self.predict(x)?;
        Ok(accuracy(y, &predictions))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;

        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut max_idx = 0;
                for (i, &p) in row.iter().enumerate() {
                    if p > row[max_idx] {
                        max_idx = i;
                    }
                }
                self.classes.get(max_idx).copied().unwrap_or(0.0)
            })
            .collect())
    }
}

/// L-BFGS two-loop recursion: approximate `-H * grad` from the stored pairs
fn two_loop_direction(grad: &Array1<f64>, memory: &VecDeque<(Array1<f64>, Array1<f64>, f64)>) -> Array1<f64> {
    let mut q = grad.to_owned();
    let mut alphas = Vec::with_capacity(memory.len());
    for (s_k, y_k, rho) in memory.iter().rev() {
        let a = rho * s_k.dot(&q);
        q.scaled_add(-a, y_k);
        alphas.push(a);
    }

    let gamma = match memory.back() {
        Some((s_k, y_k, _)) => s_k.dot(y_k) / y_k.dot(y_k),
        None => 1.0,
    };
    q.mapv_inplace(|v| v * gamma);

    for ((s_k, y_k, rho), a) in memory.iter().zip(alphas.into_iter().rev()) {
        let b = rho * y_k.dot(&q);
        q.scaled_add(a - b, s_k);
    }
    q.mapv_inplace(|v| -v);
    q
}

fn relu(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| v.max(0.0))
}

fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        for v in row.iter_mut() {
            *v = (*v - max).exp() / exp_sum;
        }
    }
    result
}
