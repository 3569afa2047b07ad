pub mod cache;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod position;
pub mod report;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::MetricsCache;
pub use config::AppConfig;
pub use data::{ExchangeDataClient, Kline, PriceSeriesProvider};
pub use engine::{EvaluationOutcome, PositionEvaluation, PositionMonitor};
pub use error::{ConfigurationError, MetricsError, PositionError, ProviderError, SignalError};
pub use metrics::{MetricsOutcome, MetricsSnapshot};
pub use position::{Position, PositionBook, PositionStatus};
pub use strategy::{Classification, ZoneThresholds};
