/// config.rs — Centralised configuration loaded from .env
///
/// All parameters consumed by the monitor are defined here.
/// Loading happens once at startup; the engine and cache copy what they need.
use std::env;
use std::time::Duration;

use anyhow::Result;

use crate::data::{Endpoints, Exchange};
use crate::models::DEFAULT_MIN_SAMPLES;
use crate::strategy::{ZoneThresholds, DEFAULT_VOLATILITY_FACTOR};

/// Metrics cache lifetime (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
/// Per provider call (a few seconds; one dead market must not stall the pass)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;
/// 210 × 4h ≈ 35 days of history
pub const DEFAULT_WINDOW_BARS: usize = 210;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── Market data ──────────────────────────────────────────────────
    pub exchange:       String,
    pub kline_interval: String,
    /// Bars requested per asset
    pub window_bars:    usize,
    /// Minimum aligned samples for a usable pair
    pub min_samples:    usize,
    pub endpoints:      Endpoints,

    // ── Timing ───────────────────────────────────────────────────────
    pub cache_ttl:        Duration,
    pub fetch_timeout:    Duration,
    pub refresh_interval: Duration,

    // ── Exit policy ──────────────────────────────────────────────────
    pub thresholds: ZoneThresholds,
    /// PnL % per unit of z-score travelled
    pub volatility_factor: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchange:          "binance".into(),
            kline_interval:    "4h".into(),
            window_bars:       DEFAULT_WINDOW_BARS,
            min_samples:       DEFAULT_MIN_SAMPLES,
            endpoints:         Endpoints::default(),
            cache_ttl:         Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout:     Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            refresh_interval:  Duration::from_secs(300),
            thresholds:        ZoneThresholds::default(),
            volatility_factor: DEFAULT_VOLATILITY_FACTOR,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env

        let defaults = Self::default();
        let endpoints = Endpoints {
            binance:         env_or("BINANCE_REST_URL", &defaults.endpoints.binance),
            binance_futures: env_or("BINANCE_FUTURES_REST_URL", &defaults.endpoints.binance_futures),
            bybit:           env_or("BYBIT_REST_URL", &defaults.endpoints.bybit),
            okx:             env_or("OKX_REST_URL", &defaults.endpoints.okx),
        };

        let thresholds = ZoneThresholds {
            close_now:   parse_env("CLOSE_NOW_Z",   defaults.thresholds.close_now)?,
            approaching: parse_env("APPROACHING_Z", defaults.thresholds.approaching)?,
            danger:      parse_env("DANGER_Z",      defaults.thresholds.danger)?,
        };
        thresholds.validate()?;

        let cfg = Self {
            exchange:       env_or("MONITOR_EXCHANGE", &defaults.exchange).to_lowercase(),
            kline_interval: env_or("KLINE_INTERVAL", &defaults.kline_interval),
            window_bars:    parse_env("WINDOW_BARS", defaults.window_bars)?,
            min_samples:    parse_env("MIN_SAMPLES", defaults.min_samples)?,
            endpoints,

            cache_ttl:        Duration::from_secs(parse_env("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?),
            fetch_timeout:    Duration::from_secs(parse_env("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?),
            refresh_interval: Duration::from_secs(parse_env("REFRESH_INTERVAL_SECS", 300u64)?),

            thresholds,
            volatility_factor: parse_env("VOLATILITY_FACTOR", defaults.volatility_factor)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let exchange: Exchange = self.exchange.parse()?;
        exchange.interval_code(&self.kline_interval)?;
        if self.min_samples < 2 {
            anyhow::bail!("MIN_SAMPLES must be at least 2, got {}", self.min_samples);
        }
        if self.window_bars < self.min_samples {
            anyhow::bail!(
                "WINDOW_BARS ({}) is below MIN_SAMPLES ({}); no pair could ever be evaluated",
                self.window_bars, self.min_samples
            );
        }
        if self.fetch_timeout.is_zero() {
            anyhow::bail!("FETCH_TIMEOUT_SECS must be positive");
        }
        if !self.volatility_factor.is_finite() {
            anyhow::bail!("VOLATILITY_FACTOR must be finite");
        }
        self.thresholds.validate()
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}
