/// strategy.rs — Exit classification and PnL heuristic
///
/// ─────────────────────────────────────────────────────────────────────────
/// CLASSIFICATION  (d = |Z_current|, first match wins)
/// ─────────────────────────────────────────────────────────────────────────
///
///   d <  0.3          → CloseNow     target reached
///   0.3 ≤ d < 1.0     → Approaching
///   d >  3.5          → Danger       divergence risk
///   otherwise         → Hold
///
/// Depends on the current z-score only; the entry z-score never changes the
/// classification.
///
/// ─────────────────────────────────────────────────────────────────────────
/// PNL HEURISTIC
/// ─────────────────────────────────────────────────────────────────────────
///
///   Δz     = |Z_entry| − |Z_current|          (> 0: moved toward the mean)
///   pnl_%  = Δz · k                           k = volatility factor (1.5)
///   pnl_$  = size · pnl_% / 100
///
/// A linear approximation: realised leg prices are deliberately ignored.
///
///   stop_z    = Z_entry ∓ 1  (one unit further from zero)
///   progress  = clamp(1 − |Z_current| / |Z_entry|, 0, 1),  0 if Z_entry = 0
/// ─────────────────────────────────────────────────────────────────────────

use anyhow::Result;
use serde::Serialize;

/// Percent notional move per unit of z-score travelled.
pub const DEFAULT_VOLATILITY_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneThresholds {
    /// |z| strictly below this → CloseNow
    pub close_now:   f64,
    /// |z| strictly below this → Approaching
    pub approaching: f64,
    /// |z| strictly above this → Danger
    pub danger:      f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self { close_now: 0.3, approaching: 1.0, danger: 3.5 }
    }
}

impl ZoneThresholds {
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.close_now
            && self.close_now <= self.approaching
            && self.approaching <= self.danger;
        if !ordered || !self.danger.is_finite() {
            anyhow::bail!(
                "thresholds must satisfy 0 <= close_now <= approaching <= danger, got {:?}",
                self
            );
        }
        Ok(())
    }

    pub fn classify(&self, current_z: f64) -> Classification {
        let d = current_z.abs();
        if d < self.close_now {
            Classification::CloseNow
        } else if d < self.approaching {
            Classification::Approaching
        } else if d > self.danger {
            Classification::Danger
        } else {
            Classification::Hold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    CloseNow,
    Approaching,
    Hold,
    Danger,
    /// Metrics unavailable for this pair
    Error,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::CloseNow    => "CLOSE NOW",
            Classification::Approaching => "approaching",
            Classification::Hold        => "hold",
            Classification::Danger      => "DANGER",
            Classification::Error       => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PnlEstimate {
    pub z_delta:     f64,
    pub pnl_percent: f64,
    pub pnl_usd:     f64,
}

pub fn estimate_pnl(entry_z: f64, current_z: f64, size_usd: f64, volatility_factor: f64) -> PnlEstimate {
    let z_delta = entry_z.abs() - current_z.abs();
    let pnl_percent = z_delta * volatility_factor;
    let pnl_usd = size_usd * (pnl_percent / 100.0);
    PnlEstimate { z_delta, pnl_percent, pnl_usd }
}

/// Advisory stop: one z unit further from zero than the entry.
pub fn stop_z(entry_z: f64) -> f64 {
    if entry_z < 0.0 { entry_z - 1.0 } else { entry_z + 1.0 }
}

/// Fraction of the way from entry to the mean, in [0, 1].
pub fn progress(entry_z: f64, current_z: f64) -> f64 {
    if entry_z == 0.0 {
        return 0.0;
    }
    (1.0 - current_z.abs() / entry_z.abs()).clamp(0.0, 1.0)
}
