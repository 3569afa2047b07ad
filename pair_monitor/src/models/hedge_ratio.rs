/// models/hedge_ratio.rs — OLS Hedge Ratio
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// Regress the long leg on an intercept plus the short leg:
///
///   P1_t = a + β·P2_t + ε_t
///
///   β̂ = Σ(x_i − x̄)(y_i − ȳ) / Σ(x_i − x̄)²      x = P2, y = P1
///
/// Only the slope β̂ (the hedge ratio) is returned.  The residual
/// ε_t = P1_t − â − β̂·P2_t is orthogonal to P2 by construction, so the
/// spread P1 − β̂·P2 differs from it only by the constant â.
///
/// The window is never assumed stable: every fresh metrics build must call
/// this again.
/// ─────────────────────────────────────────────────────────────────────────

use ndarray::ArrayView1;

use crate::error::SignalError;

/// Relative tolerance: price2 is constant when Σ(x − x̄)² is this small
/// next to Σx².  Independent of the price level, so sub-cent assets still fit.
const REGRESSOR_REL_EPSILON: f64 = 1e-24;

/// Slope of the OLS fit `price1 ≈ a + β·price2`.
///
/// Fails with `InsufficientData` when the series are empty, of different
/// length, or shorter than `min_samples`, and with `DegenerateRegression`
/// when `price2` is constant.
pub fn estimate_hedge_ratio(
    price1:      &[f64],
    price2:      &[f64],
    min_samples: usize,
) -> Result<f64, SignalError> {
    let n = price1.len().min(price2.len());
    if price1.len() != price2.len() || n == 0 || n < min_samples {
        return Err(SignalError::InsufficientData {
            got:      n,
            required: min_samples.max(1),
        });
    }

    let y = ArrayView1::from(price1);
    let x = ArrayView1::from(price2);

    // Both means exist: n > 0 was checked above.
    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let dx = &x - x_mean;
    let dy = &y - y_mean;

    let sxx = dx.dot(&dx);
    let sxy = dx.dot(&dy);

    // Relative to the regressor's own magnitude, not an absolute variance.
    if sxx <= REGRESSOR_REL_EPSILON * x.dot(&x) {
        return Err(SignalError::DegenerateRegression);
    }

    let beta = sxy / sxx;
    if !beta.is_finite() {
        return Err(SignalError::DegenerateRegression);
    }
    Ok(beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize, base: f64, amp: f64, phase: f64) -> Vec<f64> {
        (0..n).map(|i| base + amp * ((i as f64) * 0.17 + phase).sin()).collect()
    }

    #[test]
    fn recovers_exact_linear_relation() {
        let p2 = wave(120, 50.0, 4.0, 0.0);
        let p1: Vec<f64> = p2.iter().map(|x| 3.0 + 1.75 * x).collect();
        let beta = estimate_hedge_ratio(&p1, &p2, 50).unwrap();
        assert!((beta - 1.75).abs() < 1e-9, "beta = {beta}");
    }

    #[test]
    fn residual_spread_is_orthogonal_to_regressor() {
        let p2 = wave(200, 2_000.0, 120.0, 0.3);
        let noise = wave(200, 0.0, 35.0, 1.9);
        let p1: Vec<f64> = p2.iter().zip(&noise).map(|(x, e)| 10_000.0 + 14.2 * x + e).collect();

        let beta = estimate_hedge_ratio(&p1, &p2, 50).unwrap();
        assert!(beta.is_finite());

        let spread: Vec<f64> = p1.iter().zip(&p2).map(|(a, b)| a - beta * b).collect();
        let n = spread.len() as f64;
        let s_mean = spread.iter().sum::<f64>() / n;
        let x_mean = p2.iter().sum::<f64>() / n;
        let cov: f64 = spread.iter().zip(&p2).map(|(s, x)| (s - s_mean) * (x - x_mean)).sum::<f64>() / n;
        let var_x: f64 = p2.iter().map(|x| (x - x_mean).powi(2)).sum::<f64>() / n;
        let var_s: f64 = spread.iter().map(|s| (s - s_mean).powi(2)).sum::<f64>() / n;
        let corr = cov / (var_x.sqrt() * var_s.sqrt());
        assert!(corr.abs() < 1e-8, "corr = {corr}");
    }

    #[test]
    fn rejects_short_window() {
        let p = wave(49, 10.0, 1.0, 0.0);
        let err = estimate_hedge_ratio(&p, &p, 50).unwrap_err();
        assert_eq!(err, SignalError::InsufficientData { got: 49, required: 50 });
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let p1 = wave(60, 10.0, 1.0, 0.0);
        let p2 = wave(59, 10.0, 1.0, 0.0);
        assert!(matches!(
            estimate_hedge_ratio(&p1, &p2, 50),
            Err(SignalError::InsufficientData { .. })
        ));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            estimate_hedge_ratio(&[], &[], 0),
            Err(SignalError::InsufficientData { got: 0, .. })
        ));
    }

    #[test]
    fn rejects_constant_regressor() {
        let p1 = wave(80, 10.0, 1.0, 0.0);
        let p2 = vec![42.0; 80];
        assert_eq!(
            estimate_hedge_ratio(&p1, &p2, 50),
            Err(SignalError::DegenerateRegression)
        );
    }

    #[test]
    fn fits_low_priced_regressor() {
        // sub-cent leg moving ±4 %: population variance is ~1e-13
        let p2: Vec<f64> = (0..210)
            .map(|i| 1.2e-5 * (1.0 + 0.04 * ((i as f64) * 0.17).sin()))
            .collect();
        let noise = wave(210, 0.0, 5.0, 1.9);
        let p1: Vec<f64> = p2.iter().zip(&noise).map(|(x, e)| 60_000.0 + 1e9 * x + e).collect();

        let beta = estimate_hedge_ratio(&p1, &p2, 50).unwrap();
        assert!((beta - 1e9).abs() / 1e9 < 0.05, "beta = {beta}");
    }

    #[test]
    fn rejects_constant_low_priced_regressor() {
        let p1 = wave(80, 10.0, 1.0, 0.0);
        let p2 = vec![1.2e-5; 80];
        assert_eq!(
            estimate_hedge_ratio(&p1, &p2, 50),
            Err(SignalError::DegenerateRegression)
        );
    }
}
