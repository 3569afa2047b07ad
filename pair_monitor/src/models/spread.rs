/// models/spread.rs — Spread & Z-Score Builder
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
///   S_t = P1_t − β·P2_t
///
///   Z_t = (S_t − S̄) / σ_S
///
///   S̄, σ_S are taken over the WHOLE supplied window (not rolling):
///   the fetched history is the normalisation baseline.  σ_S is the
///   population standard deviation (ddof = 0).
///
///   The "current" z-score is Z_{N−1}, the most recent bar.
/// ─────────────────────────────────────────────────────────────────────────

use serde::Serialize;
use statrs::statistics::Statistics;

use crate::error::SignalError;

/// Spread standard deviation at or below this is treated as zero.
pub const SPREAD_STD_EPSILON: f64 = 1e-12;

/// Output of one spread build.  Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadZScore {
    pub spread:  Vec<f64>,
    pub zscores: Vec<f64>,
    pub mean:    f64,
    pub std:     f64,
}

impl SpreadZScore {
    /// Z-score of the latest bar.
    pub fn current(&self) -> f64 {
        self.zscores.last().copied().unwrap_or(0.0)
    }
}

/// Build the spread and its whole-window z-score series.
pub fn build_spread(
    price1:      &[f64],
    price2:      &[f64],
    hedge_ratio: f64,
) -> Result<SpreadZScore, SignalError> {
    if price1.len() != price2.len() || price1.is_empty() {
        return Err(SignalError::InsufficientData {
            got:      price1.len().min(price2.len()),
            required: price1.len().max(price2.len()).max(1),
        });
    }

    let spread: Vec<f64> = price1
        .iter()
        .zip(price2)
        .map(|(p1, p2)| p1 - hedge_ratio * p2)
        .collect();

    let mean = spread.iter().mean();
    let std  = spread.iter().population_std_dev();

    if !std.is_finite() || std <= SPREAD_STD_EPSILON {
        return Err(SignalError::DegenerateSpread { std });
    }

    let zscores = spread.iter().map(|s| (s - mean) / std).collect();

    Ok(SpreadZScore { spread, zscores, mean, std })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::estimate_hedge_ratio;

    fn pair(n: usize) -> (Vec<f64>, Vec<f64>) {
        let p2: Vec<f64> = (0..n).map(|i| 30.0 + 3.0 * (i as f64 * 0.11).sin()).collect();
        let p1: Vec<f64> = p2
            .iter()
            .enumerate()
            .map(|(i, x)| 5.0 + 2.0 * x + 0.8 * (i as f64 * 0.53).cos())
            .collect();
        (p1, p2)
    }

    #[test]
    fn spread_is_elementwise() {
        let out = build_spread(&[10.0, 12.0, 9.0], &[4.0, 5.0, 3.0], 2.0).unwrap();
        assert_eq!(out.spread, vec![2.0, 2.0, 3.0]);
    }

    #[test]
    fn zscores_are_standardised_over_window() {
        let (p1, p2) = pair(210);
        let beta = estimate_hedge_ratio(&p1, &p2, 50).unwrap();
        let out = build_spread(&p1, &p2, beta).unwrap();

        let n = out.zscores.len() as f64;
        let mean = out.zscores.iter().sum::<f64>() / n;
        let var = out.zscores.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-9, "mean = {mean}");
        assert!((var.sqrt() - 1.0).abs() < 1e-9, "std = {}", var.sqrt());
    }

    #[test]
    fn current_is_last_element() {
        let (p1, p2) = pair(60);
        let out = build_spread(&p1, &p2, 2.0).unwrap();
        assert_eq!(out.current(), *out.zscores.last().unwrap());
        let expected = (out.spread[59] - out.mean) / out.std;
        assert!((out.current() - expected).abs() < 1e-12);
    }

    #[test]
    fn uses_population_std() {
        // spread = [1, 3] → mean 2, population std 1
        let out = build_spread(&[1.0, 3.0], &[0.0, 0.0], 1.0).unwrap();
        assert!((out.std - 1.0).abs() < 1e-12);
        assert!((out.zscores[0] + 1.0).abs() < 1e-12);
        assert!((out.zscores[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_spread_is_degenerate() {
        let p2: Vec<f64> = (0..60).map(|i| 10.0 + i as f64).collect();
        let p1: Vec<f64> = p2.iter().map(|x| 7.0 + 2.0 * x).collect();
        let err = build_spread(&p1, &p2, 2.0).unwrap_err();
        assert!(matches!(err, SignalError::DegenerateSpread { .. }));
    }
}
