/// report.rs — Plain-text status table
///
/// Summary table (one row per active position) followed by a detail block
/// per position.  Error rows keep their place with placeholders.

use std::fmt;

use crate::engine::{EvaluationOutcome, PositionEvaluation};

const PLACEHOLDER: &str = "—";

pub struct StatusReport<'a> {
    pub exchange:     &'a str,
    pub bar_interval: &'a str,
    pub evaluations:  &'a [PositionEvaluation],
}

impl fmt::Display for StatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "════════════════════════════════════════════════════════════════════════")?;
        writeln!(f, "  PAIR MONITOR — {} {} — {} position(s)", self.exchange, self.bar_interval, self.evaluations.len())?;
        writeln!(f, "════════════════════════════════════════════════════════════════════════")?;

        if self.evaluations.is_empty() {
            writeln!(f, "  No active positions.  Add one with --position BTC/ETH:-2.3:1000")?;
            return writeln!(f, "════════════════════════════════════════════════════════════════════════");
        }

        writeln!(
            f,
            "  {:>3}  {:<14} {:>8} {:>9}  {:<12} {:>9} {:>11}",
            "#", "Pair", "Entry Z", "Current Z", "Status", "PnL %", "PnL $"
        )?;
        writeln!(f, "  ──────────────────────────────────────────────────────────────────────")?;
        for e in self.evaluations {
            match &e.outcome {
                EvaluationOutcome::Ready(r) => writeln!(
                    f,
                    "  {:>3}  {:<14} {:>8.2} {:>9.2}  {:<12} {:>8.2}% {:>11.2}",
                    e.position_id, e.pair_id, e.entry_z, r.current_z,
                    e.classification.label(), r.pnl_percent, r.pnl_usd
                )?,
                EvaluationOutcome::Error { .. } => writeln!(
                    f,
                    "  {:>3}  {:<14} {:>8.2} {:>9}  {:<12} {:>9} {:>11}",
                    e.position_id, e.pair_id, e.entry_z, PLACEHOLDER,
                    e.classification.label(), PLACEHOLDER, PLACEHOLDER
                )?,
            }
        }
        writeln!(f, "════════════════════════════════════════════════════════════════════════")?;

        for e in self.evaluations {
            writeln!(f, "  [{}] {}", e.position_id, e.pair_id)?;
            match &e.outcome {
                EvaluationOutcome::Ready(r) => {
                    writeln!(f, "      Hedge ratio : {:.4}   prices {:.4} / {:.4}", r.hedge_ratio, r.price1, r.price2)?;
                    writeln!(f, "      Stop Z      : {:.2}", r.stop_z)?;
                    writeln!(f, "      Progress    : {:.1}%", r.progress * 100.0)?;
                    match r.half_life_bars {
                        Some(h) => writeln!(f, "      Half-life   : {:.1} bars", h)?,
                        None    => writeln!(f, "      Half-life   : {}", PLACEHOLDER)?,
                    }
                    match &r.cointegration {
                        Some(adf) => writeln!(f, "      ADF         : t={:.2} ({})", adf.t_stat, adf.band.label())?,
                        None      => writeln!(f, "      ADF         : {}", PLACEHOLDER)?,
                    }
                }
                EvaluationOutcome::Error { reason } => {
                    writeln!(f, "      Error       : {}", reason)?;
                }
            }
        }
        Ok(())
    }
}
