//! Scripted in-memory provider and synthetic series shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::data::{normalize_asset, Kline, PriceSeriesProvider};
use crate::error::ProviderError;

pub const BAR_MS: i64 = 4 * 60 * 60 * 1000;

pub fn klines_from_closes(closes: &[f64]) -> Vec<Kline> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Kline {
            open_time: 1_700_000_000_000 + i as i64 * BAR_MS,
            open:      c,
            high:      c,
            low:       c,
            close:     c,
            volume:    1.0,
        })
        .collect()
}

/// Cointegrated pair: leg1 ≈ 500 + 12·leg2 plus a bounded oscillating spread.
pub fn synthetic_pair(n: usize) -> (Vec<Kline>, Vec<Kline>) {
    let leg2: Vec<f64> = (0..n)
        .map(|i| 2_000.0 + 150.0 * (i as f64 * 0.05).sin() + 0.5 * i as f64)
        .collect();
    let leg1: Vec<f64> = leg2
        .iter()
        .enumerate()
        .map(|(i, p)| 500.0 + 12.0 * p + 40.0 * (i as f64 * 0.7).sin())
        .collect();
    (klines_from_closes(&leg1), klines_from_closes(&leg2))
}

#[derive(Default)]
pub struct ScriptedProvider {
    series: Mutex<HashMap<String, Result<Vec<Kline>, ProviderError>>>,
    calls:  Mutex<HashMap<String, usize>>,
    total:  AtomicUsize,
    delay:  Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn set(&self, asset: &str, response: Result<Vec<Kline>, ProviderError>) {
        self.series
            .lock()
            .unwrap()
            .insert(normalize_asset(asset), response);
    }

    pub fn calls(&self, asset: &str) -> usize {
        self.calls.lock().unwrap().get(&normalize_asset(asset)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSeriesProvider for ScriptedProvider {
    async fn fetch_series(
        &self,
        exchange:      &str,
        asset:         &str,
        _bar_interval: &str,
        limit:         usize,
    ) -> Result<Vec<Kline>, ProviderError> {
        let asset = normalize_asset(asset);
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(asset.clone()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.series.lock().unwrap().get(&asset).cloned();
        match response {
            Some(Ok(klines)) => {
                let start = klines.len().saturating_sub(limit);
                Ok(klines[start..].to_vec())
            }
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::SymbolNotFound {
                exchange: exchange.to_owned(),
                symbol:   asset,
            }),
        }
    }
}
