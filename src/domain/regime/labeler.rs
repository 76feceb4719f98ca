//! Maps fitted state variances to the high-volatility regime.

use ndarray::ArrayView1;

/// Index of the largest variance. Ties go to the lowest index; an empty array
/// yields 0.
pub fn high_volatility_state(variances: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in variances.indexed_iter().skip(1) {
        if v > variances[best] {
            best = i;
        }
    }
    best
}
