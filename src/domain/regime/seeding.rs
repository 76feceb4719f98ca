//! Deterministic EM starting point.
//!
//! Observations are ranked by absolute deviation from the sample mean and cut
//! into `n_states` equal-count groups. Each group seeds one state's mean and
//! variance, so state 0 starts as the calmest and the last state as the most
//! volatile. Start probabilities are uniform and the transition matrix puts
//! `SELF_TRANSITION` on the diagonal. No randomness is involved: identical
//! input always yields identical initial parameters.

use ndarray::{s, Array1, Array2};

use super::RegimeModelParams;

const SELF_TRANSITION: f64 = 0.9;

pub fn initial_params(
    observations: &[f64],
    n_states: usize,
    variance_floor: f64,
) -> RegimeModelParams {
    let n = observations.len();
    let overall_mean = observations.iter().sum::<f64>() / n as f64;

    let mut ranked: Vec<f64> = observations.to_vec();
    ranked.sort_by(|a, b| {
        (a - overall_mean)
            .abs()
            .total_cmp(&(b - overall_mean).abs())
            .then(a.total_cmp(b))
    });
    let ranked = Array1::from(ranked);

    let mut means = Array1::<f64>::zeros(n_states);
    let mut variances = Array1::<f64>::zeros(n_states);
    for state in 0..n_states {
        let group = ranked.slice(s![state * n / n_states..(state + 1) * n / n_states]);
        let mean = group.mean().unwrap_or(overall_mean);
        let spread = group.mapv(|x| (x - mean).powi(2)).mean().unwrap_or(0.0);
        means[state] = mean;
        variances[state] = spread + variance_floor;
    }

    let transition_matrix = Array2::from_shape_fn((n_states, n_states), |(i, j)| {
        if n_states == 1 {
            1.0
        } else if i == j {
            SELF_TRANSITION
        } else {
            (1.0 - SELF_TRANSITION) / (n_states - 1) as f64
        }
    });

    RegimeModelParams {
        n_states,
        start_probabilities: Array1::from_elem(n_states, 1.0 / n_states as f64),
        transition_matrix,
        means,
        variances,
    }
}
