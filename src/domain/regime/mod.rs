//! Gaussian hidden Markov model of daily-return volatility regimes.
//!
//! Fitting runs Baum-Welch expectation-maximization from a deterministic
//! starting point (see [`seeding`]), so the same returns, state count and
//! options always produce the same parameters. A fitted [`RegimeModel`] is
//! immutable: it can be decoded against any number of return series, and it
//! carries the index of its high-volatility state as a named field.

pub mod algorithms;
pub mod labeler;
pub mod seeding;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use self::algorithms::{
    backward, emission_log_densities, forward, online_states, viterbi, LogParams,
};
use super::error::FitError;

/// Relative floor added to every state variance, as a fraction of the sample
/// variance of the training data.
const VARIANCE_FLOOR_RATIO: f64 = 1e-3;
const MIN_VARIANCE: f64 = 1e-12;
const STOCHASTIC_TOLERANCE: f64 = 1e-6;

/// Most likely state per observation, aligned with the decoded input.
pub type StatePath = Vec<usize>;

/// Complete set of fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeModelParams {
    pub n_states: usize,
    pub start_probabilities: Array1<f64>,
    pub transition_matrix: Array2<f64>,
    pub means: Array1<f64>,
    pub variances: Array1<f64>,
}

impl RegimeModelParams {
    /// Check shapes and probability constraints.
    pub fn validate(&self) -> Result<(), String> {
        let k = self.n_states;
        if k == 0 {
            return Err("state count must be at least 1".into());
        }
        if self.start_probabilities.len() != k
            || self.means.len() != k
            || self.variances.len() != k
            || self.transition_matrix.dim() != (k, k)
        {
            return Err(format!("parameter shapes do not match state count {k}"));
        }
        if !is_distribution(self.start_probabilities.view()) {
            return Err("start probabilities are not a distribution".into());
        }
        for (i, row) in self.transition_matrix.rows().into_iter().enumerate() {
            if !is_distribution(row) {
                return Err(format!("transition row {i} is not a distribution"));
            }
        }
        if self.means.iter().any(|m| !m.is_finite()) {
            return Err("means must be finite".into());
        }
        if self.variances.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err("variances must be finite and positive".into());
        }
        Ok(())
    }
}

fn is_distribution(values: ArrayView1<f64>) -> bool {
    values.iter().all(|p| p.is_finite() && *p >= 0.0)
        && (values.sum() - 1.0).abs() < STOCHASTIC_TOLERANCE
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub n_states: usize,
    pub max_iters: usize,
    /// Stop once the log-likelihood changes by less than this between iterations.
    pub tolerance: f64,
}

impl FitOptions {
    pub fn new(n_states: usize, max_iters: usize) -> Self {
        Self {
            n_states,
            max_iters,
            ..Self::default()
        }
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            n_states: 2,
            max_iters: 100_000,
            tolerance: 1e-4,
        }
    }
}

/// How an EM run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeModel {
    params: RegimeModelParams,
    high_volatility_state: usize,
    fit_summary: Option<FitSummary>,
}

impl RegimeModel {
    /// Fit with default tolerance.
    pub fn fit(returns: &[f64], n_states: usize, max_iters: usize) -> Result<Self, FitError> {
        Self::fit_with(returns, &FitOptions::new(n_states, max_iters))
    }

    pub fn fit_with(returns: &[f64], options: &FitOptions) -> Result<Self, FitError> {
        let k = options.n_states;
        if k < 1 {
            return Err(FitError::InvalidStateCount { n_states: k });
        }
        let minimum = k.max(2);
        if returns.len() < minimum {
            return Err(FitError::InsufficientData {
                observations: returns.len(),
                minimum,
            });
        }
        if let Some(index) = returns.iter().position(|r| !r.is_finite()) {
            return Err(FitError::NonFiniteObservation { index });
        }

        let sample_variance = sample_variance(returns);
        if sample_variance <= 0.0 {
            return Err(FitError::Degenerate {
                iteration: 0,
                reason: "training returns have zero variance".into(),
            });
        }
        let variance_floor = (sample_variance * VARIANCE_FLOOR_RATIO).max(MIN_VARIANCE);
        let mut params = seeding::initial_params(returns, k, variance_floor);
        let mut prev_ll = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        for iteration in 0..options.max_iters {
            let log_params = LogParams::new(&params);
            let log_b = emission_log_densities(returns, &params);
            let (log_alpha, ll) = forward(&log_params, &log_b);
            if !ll.is_finite() {
                return Err(FitError::Degenerate {
                    iteration,
                    reason: format!("log-likelihood is {ll}"),
                });
            }
            iterations = iteration + 1;

            if (ll - prev_ll).abs() < options.tolerance {
                converged = true;
                break;
            }
            prev_ll = ll;

            if iterations % 100 == 0 {
                debug!(iteration = iterations, log_likelihood = ll, "EM progress");
            }

            let log_beta = backward(&log_params, &log_b);
            params = maximization_step(
                returns,
                &params,
                &log_params,
                &log_b,
                &log_alpha,
                &log_beta,
                ll,
                variance_floor,
            );
            params.validate().map_err(|reason| FitError::Degenerate { iteration, reason })?;
        }

        if params.variances.iter().all(|&v| at_floor(v, variance_floor)) {
            return Err(FitError::Degenerate {
                iteration: iterations,
                reason: "every state variance collapsed to the floor".into(),
            });
        }

        let log_likelihood = score(&params, returns);
        if !log_likelihood.is_finite() {
            return Err(FitError::Degenerate {
                iteration: iterations,
                reason: format!("log-likelihood is {log_likelihood}"),
            });
        }

        if converged {
            info!(iterations, log_likelihood, "regime model converged");
        } else {
            info!(
                iterations,
                log_likelihood, "regime model stopped at iteration limit"
            );
        }

        let mut model = Self::from_params(params).map_err(|reason| FitError::Degenerate {
            iteration: iterations,
            reason,
        })?;
        model.fit_summary = Some(FitSummary {
            log_likelihood,
            iterations,
            converged,
        });
        Ok(model)
    }

    /// Rebuild a model from stored parameters, relabelling its high-volatility state.
    pub fn from_params(params: RegimeModelParams) -> Result<Self, String> {
        params.validate()?;
        let high_volatility_state = labeler::high_volatility_state(params.variances.view());
        Ok(Self {
            params,
            high_volatility_state,
            fit_summary: None,
        })
    }

    pub fn params(&self) -> &RegimeModelParams {
        &self.params
    }

    pub fn n_states(&self) -> usize {
        self.params.n_states
    }

    pub fn variances(&self) -> &Array1<f64> {
        &self.params.variances
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.params.means
    }

    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.params.transition_matrix
    }

    pub fn start_probabilities(&self) -> &Array1<f64> {
        &self.params.start_probabilities
    }

    pub fn high_volatility_state(&self) -> usize {
        self.high_volatility_state
    }

    /// Present only on models produced by `fit`, not on restored ones.
    pub fn fit_summary(&self) -> Option<&FitSummary> {
        self.fit_summary.as_ref()
    }

    /// Viterbi path over `returns`, one state per input value.
    pub fn decode(&self, returns: &[f64]) -> StatePath {
        let log_params = LogParams::new(&self.params);
        let log_b = emission_log_densities(returns, &self.params);
        viterbi(&log_params, &log_b)
    }

    /// State of each day given only the returns up to and including it.
    /// Entry `t` equals the last state of `decode(&returns[..=t])`.
    pub fn decode_online(&self, returns: &[f64]) -> StatePath {
        let log_params = LogParams::new(&self.params);
        let log_b = emission_log_densities(returns, &self.params);
        online_states(&log_params, &log_b)
    }

    /// Log-likelihood of `returns` under the model.
    pub fn log_likelihood(&self, returns: &[f64]) -> f64 {
        score(&self.params, returns)
    }
}

fn sample_variance(returns: &[f64]) -> f64 {
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n
}

/// Whether a variance carries nothing beyond the floor added to it.
fn at_floor(variance: f64, variance_floor: f64) -> bool {
    variance - variance_floor <= variance_floor * 1e-6
}

fn score(params: &RegimeModelParams, returns: &[f64]) -> f64 {
    let log_b = emission_log_densities(returns, params);
    forward(&LogParams::new(params), &log_b).1
}

/// Re-estimate parameters from forward/backward quantities. States with no
/// posterior mass keep their previous emission and transition parameters.
#[allow(clippy::too_many_arguments)]
fn maximization_step(
    observations: &[f64],
    params: &RegimeModelParams,
    log_params: &LogParams,
    log_b: &Array2<f64>,
    log_alpha: &Array2<f64>,
    log_beta: &Array2<f64>,
    log_likelihood: f64,
    variance_floor: f64,
) -> RegimeModelParams {
    let k = params.n_states;
    let n_obs = observations.len();
    let obs = ArrayView1::from(observations);

    let gamma = (log_alpha + log_beta).mapv(|v| (v - log_likelihood).exp());

    let mut xi_sum = Array2::<f64>::zeros((k, k));
    for t in 0..n_obs - 1 {
        let from = log_alpha.row(t).insert_axis(Axis(1));
        let to = (&log_b.row(t + 1) + &log_beta.row(t + 1)).insert_axis(Axis(0));
        let log_xi = &(&from + &to) + &log_params.transition;
        xi_sum += &log_xi.mapv(|v| (v - log_likelihood).exp());
    }

    let first = gamma.row(0);
    let start_probabilities = &first / first.sum();

    let mut transition_matrix = params.transition_matrix.clone();
    let row_totals = xi_sum.sum_axis(Axis(1));
    for (i, &total) in row_totals.iter().enumerate() {
        if total > 0.0 {
            transition_matrix
                .row_mut(i)
                .assign(&(&xi_sum.row(i) / total));
        }
    }

    let weights = gamma.sum_axis(Axis(0));
    let weighted_sums = gamma.t().dot(&obs);
    let mut means = params.means.clone();
    let mut variances = params.variances.clone();
    for j in 0..k {
        let weight = weights[j];
        if weight <= f64::MIN_POSITIVE {
            continue;
        }
        let mean = weighted_sums[j] / weight;
        let spread = gamma.column(j).dot(&obs.mapv(|x| (x - mean).powi(2)));
        means[j] = mean;
        variances[j] = spread / weight + variance_floor;
    }

    RegimeModelParams {
        n_states: k,
        start_probabilities,
        transition_matrix,
        means,
        variances,
    }
}
