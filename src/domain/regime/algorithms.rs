//! Log-space forward, backward and Viterbi passes for a univariate
//! Gaussian-emission hidden Markov model.
//!
//! Per-observation tables are `Array2<f64>` indexed `[[t, state]]`.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView1};

use super::RegimeModelParams;

/// Log density of `x` under N(mean, variance).
pub fn log_gaussian(x: f64, mean: f64, variance: f64) -> f64 {
    let diff = x - mean;
    -0.5 * ((2.0 * PI * variance).ln() + diff * diff / variance)
}

/// Numerically stable `ln(sum(exp(v)))`.
pub fn log_sum_exp(values: ArrayView1<f64>) -> f64 {
    let max = values.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.mapv(|v| (v - max).exp()).sum().ln()
}

/// First index holding the largest value.
fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.indexed_iter().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Parameters converted to log space once per pass.
pub struct LogParams {
    pub start: Array1<f64>,
    pub transition: Array2<f64>,
}

impl LogParams {
    pub fn new(params: &RegimeModelParams) -> Self {
        Self {
            start: params.start_probabilities.mapv(f64::ln),
            transition: params.transition_matrix.mapv(f64::ln),
        }
    }
}

/// Per-observation, per-state emission log densities.
pub fn emission_log_densities(observations: &[f64], params: &RegimeModelParams) -> Array2<f64> {
    Array2::from_shape_fn((observations.len(), params.means.len()), |(t, j)| {
        log_gaussian(observations[t], params.means[j], params.variances[j])
    })
}

/// Forward pass. Returns log alpha and the sequence log-likelihood.
pub fn forward(log_params: &LogParams, log_b: &Array2<f64>) -> (Array2<f64>, f64) {
    let (n_obs, k) = log_b.dim();
    let mut log_alpha = Array2::from_elem((n_obs, k), f64::NEG_INFINITY);
    if n_obs == 0 {
        return (log_alpha, 0.0);
    }

    log_alpha
        .row_mut(0)
        .assign(&(&log_params.start + &log_b.row(0)));

    for t in 1..n_obs {
        for j in 0..k {
            let terms = &log_alpha.row(t - 1) + &log_params.transition.column(j);
            log_alpha[[t, j]] = log_sum_exp(terms.view()) + log_b[[t, j]];
        }
    }

    let log_likelihood = log_sum_exp(log_alpha.row(n_obs - 1));
    (log_alpha, log_likelihood)
}

/// Backward pass. Returns log beta.
pub fn backward(log_params: &LogParams, log_b: &Array2<f64>) -> Array2<f64> {
    let (n_obs, k) = log_b.dim();
    let mut log_beta = Array2::zeros((n_obs, k));

    for t in (0..n_obs.saturating_sub(1)).rev() {
        let next = &log_b.row(t + 1) + &log_beta.row(t + 1);
        for i in 0..k {
            let terms = &log_params.transition.row(i) + &next;
            log_beta[[t, i]] = log_sum_exp(terms.view());
        }
    }

    log_beta
}

/// Viterbi scores `delta` and back-pointers `psi`.
fn viterbi_lattice(log_params: &LogParams, log_b: &Array2<f64>) -> (Array2<f64>, Array2<usize>) {
    let (n_obs, k) = log_b.dim();
    let mut delta = Array2::from_elem((n_obs, k), f64::NEG_INFINITY);
    let mut psi = Array2::<usize>::zeros((n_obs, k));
    if n_obs == 0 {
        return (delta, psi);
    }

    delta.row_mut(0).assign(&(&log_params.start + &log_b.row(0)));

    for t in 1..n_obs {
        for j in 0..k {
            let scores = &delta.row(t - 1) + &log_params.transition.column(j);
            let best = argmax(scores.view());
            delta[[t, j]] = scores[best] + log_b[[t, j]];
            psi[[t, j]] = best;
        }
    }

    (delta, psi)
}

/// Most likely state sequence. Ties resolve to the lowest state index.
pub fn viterbi(log_params: &LogParams, log_b: &Array2<f64>) -> Vec<usize> {
    let (delta, psi) = viterbi_lattice(log_params, log_b);
    let n_obs = delta.nrows();
    if n_obs == 0 {
        return Vec::new();
    }

    let mut path = vec![0; n_obs];
    path[n_obs - 1] = argmax(delta.row(n_obs - 1));
    for t in (0..n_obs - 1).rev() {
        path[t] = psi[[t + 1, path[t + 1]]];
    }

    path
}

/// Last state of the Viterbi path over each prefix `[0, t]`, computed in a
/// single forward pass. Ties resolve to the lowest state index.
pub fn online_states(log_params: &LogParams, log_b: &Array2<f64>) -> Vec<usize> {
    let (delta, _) = viterbi_lattice(log_params, log_b);
    delta.rows().into_iter().map(argmax).collect()
}
