/// models/cointegration.rs — Engle-Granger style ADF check on the spread
///
/// Δs_t = c + φ·s_{t-1} + e_t, t-stat of φ compared against Engle-Granger
/// critical values for two series with a constant (interpolated by sample
/// size).  Only a coarse p-value band is reported; the check is advisory
/// and never changes a position's classification.

use serde::Serialize;

/// (n, 1%, 5%, 10%) critical values, two-variable cointegration with constant.
const EG_CRITS: &[(usize, f64, f64, f64)] = &[
    (50,  -4.12, -3.46, -3.13),
    (100, -4.01, -3.40, -3.09),
    (250, -3.95, -3.37, -3.07),
    (500, -3.93, -3.35, -3.06),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PValueBand {
    /// p < 0.01
    Below1Pct,
    /// 0.01 ≤ p < 0.05
    Below5Pct,
    /// 0.05 ≤ p < 0.10
    Below10Pct,
    /// p ≥ 0.10
    NotSignificant,
}

impl PValueBand {
    /// Representative p-value of the band.
    pub fn approx_p(self) -> f64 {
        match self {
            PValueBand::Below1Pct      => 0.005,
            PValueBand::Below5Pct      => 0.03,
            PValueBand::Below10Pct     => 0.075,
            PValueBand::NotSignificant => 0.5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PValueBand::Below1Pct      => "p<0.01",
            PValueBand::Below5Pct      => "p<0.05",
            PValueBand::Below10Pct     => "p<0.10",
            PValueBand::NotSignificant => "p>=0.10",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdfResult {
    pub t_stat:   f64,
    pub crit_1:   f64,
    pub crit_5:   f64,
    pub crit_10:  f64,
    pub band:     PValueBand,
}

impl AdfResult {
    pub fn is_cointegrated(&self) -> bool {
        matches!(self.band, PValueBand::Below1Pct | PValueBand::Below5Pct)
    }
}

/// Run the ADF regression on a spread window.  `None` when the window is too
/// short or the lagged spread has no variance.
pub fn adf_test(spread: &[f64]) -> Option<AdfResult> {
    if spread.len() < 5 {
        return None;
    }
    let (x, dy): (Vec<f64>, Vec<f64>) = spread.windows(2).map(|w| (w[0], w[1] - w[0])).unzip();

    let n = x.len();
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_dy = dy.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for (xi, dyi) in x.iter().zip(&dy) {
        let dx = xi - mean_x;
        num += dx * (dyi - mean_dy);
        den += dx * dx;
    }
    if den.abs() < 1e-12 {
        return None;
    }
    let phi = num / den;

    let rss: f64 = x
        .iter()
        .zip(&dy)
        .map(|(xi, dyi)| {
            let err = dyi - (mean_dy + phi * (xi - mean_x));
            err * err
        })
        .sum();
    let sigma2 = rss / n.saturating_sub(2).max(1) as f64;
    let se_phi = (sigma2 / den).sqrt();
    let t_stat = if se_phi < 1e-12 {
        if phi < 0.0 { f64::NEG_INFINITY } else { 0.0 }
    } else {
        phi / se_phi
    };

    let (crit_1, crit_5, crit_10) = interpolate_crits(n);
    let band = if t_stat < crit_1 {
        PValueBand::Below1Pct
    } else if t_stat < crit_5 {
        PValueBand::Below5Pct
    } else if t_stat < crit_10 {
        PValueBand::Below10Pct
    } else {
        PValueBand::NotSignificant
    };

    Some(AdfResult { t_stat, crit_1, crit_5, crit_10, band })
}

fn interpolate_crits(n: usize) -> (f64, f64, f64) {
    let first = EG_CRITS[0];
    if n <= first.0 {
        return (first.1, first.2, first.3);
    }
    for w in EG_CRITS.windows(2) {
        let (n1, a1, b1, c1) = w[0];
        let (n2, a2, b2, c2) = w[1];
        if n <= n2 {
            let t = (n - n1) as f64 / (n2 - n1) as f64;
            let lerp = |a: f64, b: f64| a + t * (b - a);
            return (lerp(a1, a2), lerp(b1, b2), lerp(c1, c2));
        }
    }
    let last = EG_CRITS[EG_CRITS.len() - 1];
    (last.1, last.2, last.3)
}
