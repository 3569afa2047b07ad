/// error.rs — Closed error taxonomy for the monitor
///
/// Signal errors come from the statistics, provider errors from the exchange
/// boundary.  Both collapse into `MetricsError`, which is what an
/// "unavailable" pair carries.  Configuration errors are the only ones that
/// reach the operator as a rejected action.
use thiserror::Error;

/// The statistic cannot be computed from the supplied window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("insufficient data: {got} aligned samples, need at least {required}")]
    InsufficientData { got: usize, required: usize },

    #[error("degenerate regression: price2 has zero variance")]
    DegenerateRegression,

    #[error("degenerate spread: standard deviation {std:.3e} is numerically zero")]
    DegenerateSpread { std: f64 },
}

/// Failure reported by a `PriceSeriesProvider`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("symbol not found on {exchange}: {symbol}")]
    SymbolNotFound { exchange: String, symbol: String },

    #[error("unsupported exchange: {0}")]
    UnsupportedExchange(String),

    #[error("unsupported bar interval for {exchange}: {interval}")]
    UnsupportedInterval { exchange: String, interval: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Reason a pair's metrics are unavailable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Rejected "add position" action.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("asset symbol must not be empty")]
    EmptyAsset,

    #[error("asset1 and asset2 are identical: {0}")]
    IdenticalAssets(String),

    #[error("entry z-score must be finite, got {0}")]
    InvalidEntryZ(f64),

    #[error("position size must be positive and finite, got {0}")]
    InvalidSize(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("position {0} not found")]
    NotFound(u64),

    #[error("position {id} is {from}, cannot move to {to}")]
    InvalidTransition {
        id:   u64,
        from: &'static str,
        to:   &'static str,
    },
}
