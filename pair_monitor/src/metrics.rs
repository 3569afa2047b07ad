/// metrics.rs — Pair metrics snapshot
///
/// One snapshot = one pass of the signal pipeline over a fresh window:
///
///   Kline[] ×2 ──align──▶ closes ×2 ──OLS──▶ β ──▶ spread, Z[] ──▶ Z_current
///                                                     │
///                                                     ├─▶ OU half-life
///                                                     └─▶ ADF band
///
/// Alignment keeps the common TRAILING length of both series (positional,
/// not by timestamp) and rejects, never pads, windows shorter than the
/// minimum sample count.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::{Kline, PricePoint};
use crate::error::{MetricsError, SignalError};
use crate::models::{adf_test, build_spread, estimate_hedge_ratio, AdfResult, ReversionFit};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub hedge_ratio:     f64,
    pub current_z:       f64,
    pub z_history:       Vec<f64>,
    pub spread:          Vec<f64>,
    pub latest_price1:   f64,
    pub latest_price2:   f64,
    /// Open time of the newest bar used, epoch ms
    pub latest_bar_time: i64,
    pub samples:         usize,
    /// `None` when the spread shows no mean reversion
    pub half_life_bars:  Option<f64>,
    pub cointegration:   Option<AdfResult>,
    pub as_of:           DateTime<Utc>,
}

/// Result of one cache computation.  `Unavailable` is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsOutcome {
    Ready(MetricsSnapshot),
    Unavailable(MetricsError),
}

impl MetricsOutcome {
    pub fn snapshot(&self) -> Option<&MetricsSnapshot> {
        match self {
            MetricsOutcome::Ready(s) => Some(s),
            MetricsOutcome::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, MetricsOutcome::Ready(_))
    }
}

/// Truncate both series to their common trailing length.
pub fn align_series(
    series1:     &[Kline],
    series2:     &[Kline],
    min_samples: usize,
) -> Result<(Vec<PricePoint>, Vec<PricePoint>), SignalError> {
    let n = series1.len().min(series2.len());
    if n == 0 || n < min_samples {
        return Err(SignalError::InsufficientData { got: n, required: min_samples.max(1) });
    }
    let tail = |s: &[Kline]| s[s.len() - n..].iter().map(Kline::to_point).collect::<Vec<_>>();
    Ok((tail(series1), tail(series2)))
}

/// Run the full pipeline on two fetched series.
pub fn compute_snapshot(
    series1:     &[Kline],
    series2:     &[Kline],
    min_samples: usize,
) -> Result<MetricsSnapshot, MetricsError> {
    let (points1, points2) = align_series(series1, series2, min_samples)?;
    let p1: Vec<f64> = points1.iter().map(|p| p.close).collect();
    let p2: Vec<f64> = points2.iter().map(|p| p.close).collect();

    let hedge_ratio = estimate_hedge_ratio(&p1, &p2, min_samples)?;
    let built = build_spread(&p1, &p2, hedge_ratio)?;

    let half_life_bars = ReversionFit::estimate(&built.spread).map(|p| p.half_life);
    let cointegration = adf_test(&built.spread);

    let last1 = points1[points1.len() - 1];
    let last2 = points2[points2.len() - 1];

    Ok(MetricsSnapshot {
        hedge_ratio,
        current_z: built.current(),
        latest_price1: last1.close,
        latest_price2: last2.close,
        latest_bar_time: last1.timestamp_ms.max(last2.timestamp_ms),
        samples: p1.len(),
        half_life_bars,
        cointegration,
        as_of: Utc::now(),
        z_history: built.zscores,
        spread: built.spread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{synthetic_pair, klines_from_closes};

    #[test]
    fn aligns_on_trailing_bars() {
        let a = klines_from_closes(&(0..70).map(|i| i as f64).collect::<Vec<_>>());
        let b = klines_from_closes(&(0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let (pa, pb) = align_series(&a, &b, 50).unwrap();
        assert_eq!(pa.len(), 60);
        assert_eq!(pb.len(), 60);
        assert_eq!(pa[0].close, 10.0);
        assert_eq!(pa[59].close, 69.0);
        assert_eq!(pb[59].close, 159.0);
    }

    #[test]
    fn short_common_length_is_insufficient() {
        let (a, b) = synthetic_pair(210);
        let err = compute_snapshot(&a, &b[..49], 50).unwrap_err();
        assert_eq!(err, MetricsError::Signal(SignalError::InsufficientData { got: 49, required: 50 }));
    }

    #[test]
    fn snapshot_current_z_matches_history_tail() {
        let (a, b) = synthetic_pair(210);
        let snap = compute_snapshot(&a, &b, 50).unwrap();
        assert_eq!(snap.samples, 210);
        assert_eq!(snap.z_history.len(), 210);
        assert_eq!(snap.current_z, *snap.z_history.last().unwrap());
        assert_eq!(snap.latest_price1, a[209].close);
        assert_eq!(snap.latest_price2, b[209].close);
        assert!(snap.hedge_ratio.is_finite());
    }

    #[test]
    fn constant_leg_is_degenerate() {
        let (a, _) = synthetic_pair(100);
        let flat = klines_from_closes(&vec![5.0; 100]);
        let err = compute_snapshot(&a, &flat, 50).unwrap_err();
        assert_eq!(err, MetricsError::Signal(SignalError::DegenerateRegression));
    }
}
