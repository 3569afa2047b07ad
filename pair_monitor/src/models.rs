pub mod cointegration;
pub mod hedge_ratio;
pub mod ou_process;
pub mod spread;

pub use cointegration::{adf_test, AdfResult, PValueBand};
pub use hedge_ratio::estimate_hedge_ratio;
pub use ou_process::ReversionFit;
pub use spread::{build_spread, SpreadZScore, SPREAD_STD_EPSILON};

/// Minimum aligned sample count when none is configured.
pub const DEFAULT_MIN_SAMPLES: usize = 50;
