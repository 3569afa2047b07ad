/// engine.rs — Position evaluation pass
///
/// ```text
///  PositionBook (borrowed for the whole pass)
///        │  active positions, insertion order, one at a time
///        ▼
///  MetricsCache::get_or_compute(exchange, asset1, asset2)
///        │
///        ├─ Ready(snapshot) ─▶ classify(Z) + PnL + stop + progress
///        └─ Unavailable(e)  ─▶ Error row (logged, never dropped)
/// ```
///
/// A failure on one pair never aborts the pass; mixed fresh / error rows
/// are the normal steady state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::MetricsCache;
use crate::config::AppConfig;
use crate::models::AdfResult;
use crate::metrics::MetricsOutcome;
use crate::position::{Position, PositionBook, PositionId};
use crate::strategy::{estimate_pnl, progress, stop_z, Classification, ZoneThresholds};

/// Market parameters shared by every position in a pass.
#[derive(Debug, Clone)]
pub struct MarketSettings {
    pub exchange:     String,
    pub bar_interval: String,
    pub window_bars:  usize,
}

impl From<&AppConfig> for MarketSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            exchange:     cfg.exchange.clone(),
            bar_interval: cfg.kline_interval.clone(),
            window_bars:  cfg.window_bars,
        }
    }
}

/// Live figures for a position whose metrics are available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    pub current_z:      f64,
    pub pnl_usd:        f64,
    pub pnl_percent:    f64,
    pub stop_z:         f64,
    pub progress:       f64,
    pub hedge_ratio:    f64,
    pub price1:         f64,
    pub price2:         f64,
    pub half_life_bars: Option<f64>,
    pub cointegration:  Option<AdfResult>,
    pub z_history:      Vec<f64>,
    pub as_of:          DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Ready(SignalReport),
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEvaluation {
    pub position_id:    PositionId,
    pub pair_id:        String,
    pub entry_z:        f64,
    pub size_usd:       f64,
    pub classification: Classification,
    pub outcome:        EvaluationOutcome,
}

impl PositionEvaluation {
    pub fn report(&self) -> Option<&SignalReport> {
        match &self.outcome {
            EvaluationOutcome::Ready(r) => Some(r),
            EvaluationOutcome::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.classification == Classification::Error
    }
}

pub struct PositionMonitor {
    cache:             Arc<MetricsCache>,
    market:            MarketSettings,
    thresholds:        ZoneThresholds,
    volatility_factor: f64,
}

impl PositionMonitor {
    pub fn new(
        cache:             Arc<MetricsCache>,
        market:            MarketSettings,
        thresholds:        ZoneThresholds,
        volatility_factor: f64,
    ) -> Self {
        Self { cache, market, thresholds, volatility_factor }
    }

    pub fn from_config(cache: Arc<MetricsCache>, cfg: &AppConfig) -> Self {
        Self::new(cache, MarketSettings::from(cfg), cfg.thresholds, cfg.volatility_factor)
    }

    pub fn market(&self) -> &MarketSettings {
        &self.market
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }

    /// Evaluate one position against fresh or cached metrics.
    pub async fn evaluate(&self, position: &Position) -> PositionEvaluation {
        let outcome = self
            .cache
            .get_or_compute(
                &self.market.exchange,
                &position.asset1,
                &position.asset2,
                self.market.window_bars,
                &self.market.bar_interval,
            )
            .await;
        self.assess(position, &outcome)
    }

    /// Evaluate every active position, in insertion order.
    ///
    /// Holding `&PositionBook` for the whole pass keeps the set fixed until
    /// the pass completes.
    pub async fn evaluate_all(&self, book: &PositionBook) -> Vec<PositionEvaluation> {
        let active = book.list_active_positions();
        let mut results = Vec::with_capacity(active.len());
        for position in active {
            results.push(self.evaluate(position).await);
        }

        let errors = results.iter().filter(|r| r.is_error()).count();
        info!(
            "Evaluated {} position(s): {} ok, {} error",
            results.len(),
            results.len() - errors,
            errors
        );
        results
    }

    /// Pure step: combine a position with a metrics outcome.
    pub fn assess(&self, position: &Position, outcome: &MetricsOutcome) -> PositionEvaluation {
        let (classification, outcome) = match outcome {
            MetricsOutcome::Ready(snapshot) => {
                let current_z = snapshot.current_z;
                let pnl = estimate_pnl(position.entry_z, current_z, position.size_usd, self.volatility_factor);
                let report = SignalReport {
                    current_z,
                    pnl_usd:        pnl.pnl_usd,
                    pnl_percent:    pnl.pnl_percent,
                    stop_z:         stop_z(position.entry_z),
                    progress:       progress(position.entry_z, current_z),
                    hedge_ratio:    snapshot.hedge_ratio,
                    price1:         snapshot.latest_price1,
                    price2:         snapshot.latest_price2,
                    half_life_bars: snapshot.half_life_bars,
                    cointegration:  snapshot.cointegration.clone(),
                    z_history:      snapshot.z_history.clone(),
                    as_of:          snapshot.as_of,
                };
                (self.thresholds.classify(current_z), EvaluationOutcome::Ready(report))
            }
            MetricsOutcome::Unavailable(e) => {
                warn!("Position #{} {}: metrics unavailable: {}", position.id, position.pair_id, e);
                (Classification::Error, EvaluationOutcome::Error { reason: e.to_string() })
            }
        };

        PositionEvaluation {
            position_id: position.id,
            pair_id:     position.pair_id.clone(),
            entry_z:     position.entry_z,
            size_usd:    position.size_usd,
            classification,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::error::ProviderError;
    use crate::test_support::{synthetic_pair, ScriptedProvider};

    fn monitor(provider: Arc<ScriptedProvider>) -> PositionMonitor {
        let cache = Arc::new(MetricsCache::new(provider, Duration::from_secs(300), Duration::from_secs(5), 50));
        let market = MarketSettings {
            exchange:     "binance".into(),
            bar_interval: "4h".into(),
            window_bars:  210,
        };
        PositionMonitor::new(cache, market, ZoneThresholds::default(), 1.5)
    }

    #[tokio::test]
    async fn network_failure_yields_error_row_without_stopping_the_pass() {
        let provider = Arc::new(ScriptedProvider::new());
        let (a, b) = synthetic_pair(210);
        provider.set("BTC", Ok(a.clone()));
        provider.set("ETH", Ok(b.clone()));
        provider.set("SOL", Ok(a));
        provider.set("AVAX", Err(ProviderError::Network("connection reset".into())));
        provider.set("LINK", Ok(b));

        let mut book = PositionBook::new();
        book.add_position("BTC", "ETH", -2.3, 1000.0).unwrap();
        book.add_position("SOL", "AVAX", 2.0, 500.0).unwrap();
        book.add_position("SOL", "LINK", 1.5, 250.0).unwrap();

        let results = monitor(provider).evaluate_all(&book).await;
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.pair_id.as_str()).collect::<Vec<_>>(),
            vec!["BTC/ETH", "SOL/AVAX", "SOL/LINK"]
        );

        assert!(!results[0].is_error());
        assert!(results[0].report().is_some());

        assert_eq!(results[1].classification, Classification::Error);
        assert!(results[1].report().is_none());
        match &results[1].outcome {
            EvaluationOutcome::Error { reason } => assert!(reason.contains("connection reset")),
            other => panic!("expected error row, got {other:?}"),
        }

        assert!(!results[2].is_error());
    }

    #[tokio::test]
    async fn closed_positions_are_not_evaluated() {
        let provider = Arc::new(ScriptedProvider::new());
        let (a, b) = synthetic_pair(210);
        provider.set("BTC", Ok(a));
        provider.set("ETH", Ok(b));

        let mut book = PositionBook::new();
        let id = book.add_position("BTC", "ETH", -2.0, 100.0).unwrap().id;
        book.close_position(id).unwrap();

        let results = monitor(provider.clone()).evaluate_all(&book).await;
        assert!(results.is_empty());
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn ready_row_carries_policy_figures() {
        let provider = Arc::new(ScriptedProvider::new());
        let (a, b) = synthetic_pair(210);
        provider.set("BTC", Ok(a));
        provider.set("ETH", Ok(b));
        let monitor = monitor(provider);

        let mut book = PositionBook::new();
        let position = book.add_position("BTC", "ETH", -2.3, 1000.0).unwrap().clone();

        let eval = monitor.evaluate(&position).await;
        let report = eval.report().expect("metrics available");
        let expected = estimate_pnl(-2.3, report.current_z, 1000.0, 1.5);
        assert_eq!(report.pnl_usd, expected.pnl_usd);
        assert_eq!(report.stop_z, stop_z(-2.3));
        assert_eq!(report.progress, progress(-2.3, report.current_z));
        assert_eq!(eval.classification, ZoneThresholds::default().classify(report.current_z));
        assert_eq!(report.z_history.len(), 210);
        assert_eq!(*report.z_history.last().unwrap(), report.current_z);
    }

    #[test]
    fn assess_uses_current_z_only_for_classification() {
        let provider = Arc::new(ScriptedProvider::new());
        let monitor = monitor(provider);
        let (a, b) = synthetic_pair(210);
        let mut snapshot = crate::metrics::compute_snapshot(&a, &b, 50).unwrap();
        snapshot.current_z = -1.0;
        let outcome = MetricsOutcome::Ready(snapshot);

        let mut book = PositionBook::new();
        let near = book.add_position("BTC", "ETH", -1.1, 1000.0).unwrap().clone();
        let far = book.add_position("SOL", "ETH", -4.0, 1000.0).unwrap().clone();

        let e1 = monitor.assess(&near, &outcome);
        let e2 = monitor.assess(&far, &outcome);
        assert_eq!(e1.classification, Classification::Hold);
        assert_eq!(e2.classification, Classification::Hold);

        // entry only moves the PnL: 0.1 z travelled vs 3.0
        assert!((e1.report().unwrap().pnl_percent - 0.15).abs() < 1e-9);
        assert!((e2.report().unwrap().pnl_percent - 4.5).abs() < 1e-9);
    }
}
