//! Sampling strategies for sequential hyperparameter optimization

use super::search_space::{Candidate, Parameter, ParameterType, ParameterValue, SearchSpace};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::Normal;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerType {
    /// Uniform random sampling
    Random,
    /// Tree-structured Parzen Estimator
    #[default]
    Tpe,
}

/// Trait for hyperparameter samplers
pub trait Sampler: Send {
    /// Sample the next candidate given every `(candidate, objective)` observed so far
    fn sample(&mut self, search_space: &SearchSpace, history: &[(Candidate, f64)]) -> Candidate;
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    /// Create a new random sampler
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(Candidate, f64)]) -> Candidate {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler
///
/// History is split at the `gamma` quantile into a "good" and a "bad" set. Each
/// dimension gets a Parzen estimator `l(x)` over the good observations and `g(x)`
/// over the rest; `n_candidates` draws from `l` are ranked by `l(x) / g(x)`, which
/// is monotone in the expected improvement under the TPE model.
#[derive(Debug)]
pub struct TpeSampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TpeSampler {
    /// Create a new TPE sampler
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set number of expected-improvement candidates drawn per dimension
    pub fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }

    fn sample_numeric(&mut self, param: &Parameter, below: &[f64], above: &[f64]) -> ParameterValue {
        let (low, high, log_scale) = match &param.param_type {
            ParameterType::Float {
                low,
                high,
                log_scale,
                ..
            } => (*low, *high, *log_scale),
            ParameterType::Int { low, high, .. } => (*low as f64, *high as f64, false),
            ParameterType::Categorical { .. } => return param.sample(&mut self.rng),
        };

        let to_internal = |v: f64| if log_scale { v.ln() } else { v };
        let (lo, hi) = (to_internal(low), to_internal(high));

        let chosen = if hi - lo <= f64::EPSILON {
            lo
        } else {
            let good = ParzenEstimator::fit(below.iter().map(|&v| to_internal(v)), lo, hi);
            let bad = ParzenEstimator::fit(above.iter().map(|&v| to_internal(v)), lo, hi);

            let mut best = good.draw(&mut self.rng);
            let mut best_score = good.log_pdf(best) - bad.log_pdf(best);
            for _ in 1..self.n_candidates {
                let x = good.draw(&mut self.rng);
                let score = good.log_pdf(x) - bad.log_pdf(x);
                if score > best_score {
                    best = x;
                    best_score = score;
                }
            }
            best
        };

        match &param.param_type {
            ParameterType::Int { .. } => {
                ParameterValue::Int(param.snap_int(chosen).unwrap_or(low as i64))
            }
            _ => {
                let v = if log_scale { chosen.exp() } else { chosen };
                ParameterValue::Float(v.clamp(low, high))
            }
        }
    }

    fn sample_categorical(&mut self, choices: &[String], below: &[&str], above: &[&str]) -> ParameterValue {
        // Prior-smoothed frequencies: every choice starts with one pseudo-count
        let weights = |obs: &[&str]| -> Vec<f64> {
            choices
                .iter()
                .map(|c| 1.0 + obs.iter().filter(|o| **o == c.as_str()).count() as f64)
                .collect()
        };
        let good = weights(below);
        let bad = weights(above);
        let good_total: f64 = good.iter().sum();
        let bad_total: f64 = bad.iter().sum();

        let Ok(dist) = WeightedIndex::new(&good) else {
            return ParameterValue::String(choices[0].clone());
        };

        let mut best_idx = dist.sample(&mut self.rng);
        let ratio = |i: usize| (good[i] / good_total) / (bad[i] / bad_total);
        for _ in 1..self.n_candidates {
            let idx = dist.sample(&mut self.rng);
            if ratio(idx) > ratio(best_idx) {
                best_idx = idx;
            }
        }
        ParameterValue::String(choices[best_idx].clone())
    }
}

impl Sampler for TpeSampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(Candidate, f64)]) -> Candidate {
        // Use random sampling for startup trials
        if history.len() < self.n_startup_trials.max(2) {
            return search_space.sample(&mut self.rng);
        }

        let mut sorted: Vec<&(Candidate, f64)> = history.iter().collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len() - 1);
        let (good, bad) = sorted.split_at(n_good);

        let mut candidate = Candidate::new();
        for param in search_space.parameters() {
            let value = match &param.param_type {
                ParameterType::Categorical { choices } => {
                    let collect = |set: &[&(Candidate, f64)]| -> Vec<String> {
                        set.iter()
                            .filter_map(|(c, _)| c.get(&param.name).and_then(|v| v.as_str()).map(String::from))
                            .collect()
                    };
                    let below = collect(good);
                    let above = collect(bad);
                    let below: Vec<&str> = below.iter().map(String::as_str).collect();
                    let above: Vec<&str> = above.iter().map(String::as_str).collect();
                    self.sample_categorical(choices, &below, &above)
                }
                _ => {
                    let collect = |set: &[&(Candidate, f64)]| -> Vec<f64> {
                        set.iter()
                            .filter_map(|(c, _)| c.get(&param.name).and_then(|v| v.as_float()))
                            .filter(|v| v.is_finite())
                            .collect()
                    };
                    let below = collect(good);
                    let above = collect(bad);
                    self.sample_numeric(param, &below, &above)
                }
            };
            candidate.insert(param.name.clone(), value);
        }
        candidate
    }
}

/// One-dimensional Gaussian mixture over `[low, high]` with a wide prior component
#[derive(Debug, Clone)]
struct ParzenEstimator {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
    weights: Vec<f64>,
    low: f64,
    high: f64,
}

impl ParzenEstimator {
    fn fit(observations: impl Iterator<Item = f64>, low: f64, high: f64) -> Self {
        let range = high - low;
        let prior_mu = 0.5 * (low + high);

        let mut mus: Vec<f64> = observations.map(|v| v.clamp(low, high)).collect();
        mus.push(prior_mu);
        mus.sort_by(|a, b| a.total_cmp(b));

        // Bandwidth from the distance to the farther neighbour, clipped to a sane band
        let n = mus.len();
        let min_sigma = range / (n as f64 + 1.0).min(100.0);
        let sigmas: Vec<f64> = (0..n)
            .map(|i| {
                let left = if i == 0 { mus[i] - low } else { mus[i] - mus[i - 1] };
                let right = if i + 1 == n { high - mus[i] } else { mus[i + 1] - mus[i] };
                let sigma = if mus[i] == prior_mu { range } else { left.max(right) };
                sigma.clamp(min_sigma, range)
            })
            .collect();

        Self {
            weights: vec![1.0 / n as f64; n],
            mus,
            sigmas,
            low,
            high,
        }
    }

    fn draw(&self, rng: &mut impl Rng) -> f64 {
        let idx = rng.gen_range(0..self.mus.len());
        let (mu, sigma) = (self.mus[idx], self.sigmas[idx]);
        let Ok(normal) = Normal::new(mu, sigma) else {
            return mu;
        };
        for _ in 0..16 {
            let x = normal.sample(rng);
            if x >= self.low && x <= self.high {
                return x;
            }
        }
        mu
    }

    fn log_pdf(&self, x: f64) -> f64 {
        const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

        let terms: Vec<f64> = self
            .mus
            .iter()
            .zip(&self.sigmas)
            .zip(&self.weights)
            .map(|((mu, sigma), w)| {
                let z = (x - mu) / sigma;
                w.ln() - 0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            })
            .collect();

        // log-sum-exp
        let max = terms.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return max;
        }
        max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
    }
}

/// Create a sampler from type
pub fn create_sampler(
    sampler_type: SamplerType,
    seed: u64,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
) -> Box<dyn Sampler> {
    match sampler_type {
        SamplerType::Random => Box::new(RandomSampler::new(seed)),
        SamplerType::Tpe => Box::new(
            TpeSampler::new(seed)
                .with_n_startup(n_startup_trials)
                .with_gamma(gamma)
                .with_n_candidates(n_candidates),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic_history(space: &SearchSpace, sampler: &mut dyn Sampler, n: usize) -> Vec<(Candidate, f64)> {
        let mut history = Vec::new();
        for _ in 0..n {
            let c = sampler.sample(space, &history);
            let x = c["x"].as_float().unwrap();
            history.push((c, (x - 1.0).powi(2)));
        }
        history
    }

    #[test]
    fn test_random_sampler() {
        let space = SearchSpace::new().float("C", 0.001, 0.1).int("n", 10, 100);

        let mut sampler = RandomSampler::new(42);
        let params = sampler.sample(&space, &[]);

        assert!(params.contains_key("C"));
        assert!(params.contains_key("n"));
        assert!(space.contains(&params));
    }

    #[test]
    fn test_tpe_sampler_stays_in_bounds() {
        let space = SearchSpace::new()
            .float("x", 0.03125, 4.0)
            .add(Parameter::stepped_int("h", 1, 50, 2))
            .categorical("solver", ["adam", "sgd"]);

        let mut sampler = TpeSampler::new(3).with_n_startup(5);
        let mut history = Vec::new();
        for i in 0..60 {
            let c = sampler.sample(&space, &history);
            assert!(space.contains(&c), "out of range: {:?}", c);
            history.push((c, i as f64 % 7.0));
        }
    }

    #[test]
    fn test_tpe_concentrates_near_optimum() {
        let space = SearchSpace::new().float("x", 0.03125, 4.0);
        let mut sampler = TpeSampler::new(11);

        let history = quadratic_history(&space, &mut sampler, 80);
        let late: Vec<f64> = history[60..]
            .iter()
            .map(|(c, _)| c["x"].as_float().unwrap())
            .collect();
        let mean_dist = late.iter().map(|x| (x - 1.0).abs()).sum::<f64>() / late.len() as f64;

        // Uniform draws over [0.03, 4] average about 1.25 away from 1.0
        assert!(mean_dist < 0.8, "mean distance {}", mean_dist);
    }

    #[test]
    fn test_tpe_categorical_prefers_good_choice() {
        let space = SearchSpace::new().categorical("solver", ["adam", "sgd"]);
        let mut sampler = TpeSampler::new(5).with_n_startup(4);

        let mut history = Vec::new();
        for _ in 0..40 {
            let c = sampler.sample(&space, &history);
            let value = if c["solver"].as_str() == Some("adam") { 1.0 } else { 2.0 };
            history.push((c, value));
        }
        let adam = history[20..]
            .iter()
            .filter(|(c, _)| c["solver"].as_str() == Some("adam"))
            .count();
        assert!(adam > 10);
    }

    #[test]
    fn test_parzen_log_pdf_peaks_at_observation() {
        let est = ParzenEstimator::fit([1.0, 1.1].into_iter(), 0.0, 4.0);
        assert!(est.log_pdf(1.05) > est.log_pdf(3.5));
    }
}
