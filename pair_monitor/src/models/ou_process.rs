/// models/ou_process.rs — Ornstein-Uhlenbeck fit of the spread
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// The spread is treated as an OU process, dS_t = θ(μ − S_t)dt + σ dW_t.
///
/// AR(1) DISCRETISATION (Δt = 1 bar):
///
///   S_t = a + b·S_{t-1} + ε_t          b = e^{−θ}
///
/// HALF-LIFE of mean reversion (bars):
///
///   t½ = −ln(2) / ln(b̂)
///
/// Only the persistence b̂ and the half-life are kept: the half-life is shown
/// next to a position but never feeds the exit classification.
/// ─────────────────────────────────────────────────────────────────────────

use serde::Serialize;

/// AR(1) persistence of a spread window and its half-life.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReversionFit {
    /// AR(1) coefficient b̂, in (0, 1) for a reverting spread
    pub persistence: f64,
    pub half_life:   f64,
}

impl ReversionFit {
    /// OLS slope of S_t on S_{t-1}.
    ///
    /// `None` for windows under 10 bars, a flat spread, or b̂ outside (0, 1).
    pub fn estimate(spread: &[f64]) -> Option<Self> {
        if spread.len() < 10 {
            return None;
        }
        let (prev, next) = (&spread[..spread.len() - 1], &spread[1..]);
        let m = prev.len() as f64;
        let prev_mean = prev.iter().sum::<f64>() / m;
        let next_mean = next.iter().sum::<f64>() / m;

        let (sxy, sxx) = prev.iter().zip(next).fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
            let dx = x - prev_mean;
            (sxy + dx * (y - next_mean), sxx + dx * dx)
        });
        if sxx < 1e-12 {
            return None;
        }

        let persistence = sxy / sxx;
        if !(persistence > 0.0 && persistence < 1.0) {
            return None;
        }
        Some(Self { persistence, half_life: -std::f64::consts::LN_2 / persistence.ln() })
    }
}
