/// data.rs — Price Series Provider: public kline REST endpoints
///
/// The monitor only needs closes, but the provider hands back full bars so
/// the boundary matches what every exchange actually serves.
///
/// SUPPORTED EXCHANGES / SYMBOL RESOLUTION (first candidate with data wins):
///   binance          spot  /api/v3/klines      BTCUSDT
///                    perp  /fapi/v1/klines     BTCUSDT
///   binance_futures  perp  /fapi/v1/klines     BTCUSDT
///   bybit            spot  /v5/market/kline    BTCUSDT   (category=spot)
///                    perp  /v5/market/kline    BTCUSDT   (category=linear)
///   okx              spot  /api/v5/market/candles  BTC-USDT
///                    perp  /api/v5/market/candles  BTC-USDT-SWAP
///
/// Bybit and OKX return newest-first; every series leaves here ascending.
/// No paging: `limit` is clamped to the per-endpoint maximum.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Quote asset every symbol is resolved against.
pub const QUOTE_ASSET: &str = "USDT";

// ── Bars ─────────────────────────────────────────────────────────────────

/// OHLCV bar as served by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open:      f64,
    pub high:      f64,
    pub low:       f64,
    pub close:     f64,
    pub volume:    f64,
}

impl Kline {
    pub fn to_point(&self) -> PricePoint {
        PricePoint { timestamp_ms: self.open_time, close: self.close }
    }
}

/// The only part of a bar the signal engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub timestamp_ms: i64,
    pub close:        f64,
}

// ── Provider boundary ────────────────────────────────────────────────────

/// Source of ascending close-price history for one asset.
///
/// Symbol resolution (quote suffixes, perpetual contracts, case) is the
/// implementor's job; callers pass bare asset names such as `"BTC"`.
#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    async fn fetch_series(
        &self,
        exchange:     &str,
        asset:        &str,
        bar_interval: &str,
        limit:        usize,
    ) -> Result<Vec<Kline>, ProviderError>;
}

// ── Exchanges ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    Binance,
    BinanceFutures,
    Bybit,
    Okx,
}

impl Exchange {
    pub fn as_str(self) -> &'static str {
        match self {
            Exchange::Binance        => "binance",
            Exchange::BinanceFutures => "binance_futures",
            Exchange::Bybit          => "bybit",
            Exchange::Okx            => "okx",
        }
    }

    /// Exchange-specific spelling of a bar interval such as `"4h"`.
    pub fn interval_code(self, interval: &str) -> Result<String, ProviderError> {
        let code = match self {
            Exchange::Binance | Exchange::BinanceFutures => match interval {
                "1m" | "3m" | "5m" | "15m" | "30m" | "1h" | "2h" | "4h" | "6h" | "8h"
                | "12h" | "1d" | "3d" | "1w" | "1M" => Some(interval),
                _ => None,
            },
            Exchange::Bybit => match interval {
                "1m"  => Some("1"),
                "3m"  => Some("3"),
                "5m"  => Some("5"),
                "15m" => Some("15"),
                "30m" => Some("30"),
                "1h"  => Some("60"),
                "2h"  => Some("120"),
                "4h"  => Some("240"),
                "6h"  => Some("360"),
                "12h" => Some("720"),
                "1d"  => Some("D"),
                "1w"  => Some("W"),
                "1M"  => Some("M"),
                _     => None,
            },
            Exchange::Okx => match interval {
                "1m"  => Some("1m"),
                "3m"  => Some("3m"),
                "5m"  => Some("5m"),
                "15m" => Some("15m"),
                "30m" => Some("30m"),
                "1h"  => Some("1H"),
                "2h"  => Some("2H"),
                "4h"  => Some("4H"),
                "6h"  => Some("6H"),
                "12h" => Some("12H"),
                "1d"  => Some("1D"),
                "1w"  => Some("1W"),
                "1M"  => Some("1M"),
                _     => None,
            },
        };
        code.map(str::to_owned).ok_or_else(|| ProviderError::UnsupportedInterval {
            exchange: self.as_str().to_owned(),
            interval: interval.to_owned(),
        })
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance"                                  => Ok(Exchange::Binance),
            "binance_futures" | "binance-futures"
            | "binanceusdm"                            => Ok(Exchange::BinanceFutures),
            "bybit"                                    => Ok(Exchange::Bybit),
            "okx"                                      => Ok(Exchange::Okx),
            other => Err(ProviderError::UnsupportedExchange(other.to_owned())),
        }
    }
}

/// Bare base asset: trimmed, upper-cased, quote suffix stripped.
pub fn normalize_asset(asset: &str) -> String {
    let upper = asset.trim().to_uppercase();
    let base = upper
        .split(['/', '-', ':'])
        .next()
        .unwrap_or_default()
        .to_owned();
    match base.strip_suffix(QUOTE_ASSET) {
        Some(stripped) if !stripped.is_empty() => stripped.to_owned(),
        _ => base,
    }
}

/// One concrete market tried during symbol resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketCandidate {
    pub venue:  Venue,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    BinanceSpot,
    BinanceUsdm,
    BybitSpot,
    BybitLinear,
    OkxSpot,
    OkxSwap,
}

impl Venue {
    /// Largest page the endpoint serves.
    fn max_limit(self) -> usize {
        match self {
            Venue::BinanceSpot                     => 1000,
            Venue::BinanceUsdm                     => 1500,
            Venue::BybitSpot | Venue::BybitLinear  => 1000,
            Venue::OkxSpot | Venue::OkxSwap        => 300,
        }
    }
}

/// Candidate markets for `asset` on `exchange`, in resolution order.
pub fn symbol_candidates(exchange: Exchange, asset: &str) -> Vec<MarketCandidate> {
    let base = normalize_asset(asset);
    let concat = format!("{base}{QUOTE_ASSET}");
    let dashed = format!("{base}-{QUOTE_ASSET}");
    let c = |venue, symbol: &str| MarketCandidate { venue, symbol: symbol.to_owned() };
    match exchange {
        Exchange::Binance        => vec![c(Venue::BinanceSpot, &concat), c(Venue::BinanceUsdm, &concat)],
        Exchange::BinanceFutures => vec![c(Venue::BinanceUsdm, &concat)],
        Exchange::Bybit          => vec![c(Venue::BybitSpot, &concat), c(Venue::BybitLinear, &concat)],
        Exchange::Okx            => vec![c(Venue::OkxSpot, &dashed), c(Venue::OkxSwap, &format!("{dashed}-SWAP"))],
    }
}

// ── REST endpoints ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub binance:         String,
    pub binance_futures: String,
    pub bybit:           String,
    pub okx:             String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            binance:         "https://api.binance.com".into(),
            binance_futures: "https://fapi.binance.com".into(),
            bybit:           "https://api.bybit.com".into(),
            okx:             "https://www.okx.com".into(),
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// Unauthenticated kline client for the exchanges above.
pub struct ExchangeDataClient {
    client:    Client,
    endpoints: Endpoints,
    timeout:   Duration,
}

impl ExchangeDataClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("HTTP client build failed: {e}")))?;
        Ok(Self { client, endpoints, timeout })
    }

    fn url(&self, venue: Venue, symbol: &str, interval: &str, limit: usize) -> String {
        match venue {
            Venue::BinanceSpot => format!(
                "{}/api/v3/klines?symbol={}&interval={}&limit={}",
                self.endpoints.binance, symbol, interval, limit
            ),
            Venue::BinanceUsdm => format!(
                "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
                self.endpoints.binance_futures, symbol, interval, limit
            ),
            Venue::BybitSpot | Venue::BybitLinear => format!(
                "{}/v5/market/kline?category={}&symbol={}&interval={}&limit={}",
                self.endpoints.bybit,
                if venue == Venue::BybitSpot { "spot" } else { "linear" },
                symbol, interval, limit
            ),
            Venue::OkxSpot | Venue::OkxSwap => format!(
                "{}/api/v5/market/candles?instId={}&bar={}&limit={}",
                self.endpoints.okx, symbol, interval, limit
            ),
        }
    }

    async fn fetch_candidate(
        &self,
        candidate: &MarketCandidate,
        interval:  &str,
        limit:     usize,
    ) -> Result<Vec<Kline>, ProviderError> {
        let limit = limit.min(candidate.venue.max_limit());
        let url = self.url(candidate.venue, &candidate.symbol, interval, limit);
        debug!("GET {}", url);

        let resp = self.client.get(&url).send().await.map_err(|e| self.map_reqwest(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.map_reqwest(e))?;

        parse_klines(candidate, status, &body)
    }

    fn map_reqwest(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl PriceSeriesProvider for ExchangeDataClient {
    async fn fetch_series(
        &self,
        exchange:     &str,
        asset:        &str,
        bar_interval: &str,
        limit:        usize,
    ) -> Result<Vec<Kline>, ProviderError> {
        let exchange: Exchange = exchange.parse()?;
        let interval = exchange.interval_code(bar_interval)?;
        let interval = interval.as_str();

        resolve_series(exchange, asset, |candidate| async move {
            self.fetch_candidate(&candidate, interval, limit).await
        })
        .await
    }
}

/// Walk `asset`'s candidate markets on `exchange` in order.
///
/// An empty series or `SymbolNotFound` moves on to the next candidate; any
/// other error ends resolution.  `SymbolNotFound` for the bare asset comes
/// back only once every candidate has missed.
pub async fn resolve_series<F, Fut>(
    exchange:  Exchange,
    asset:     &str,
    mut fetch: F,
) -> Result<Vec<Kline>, ProviderError>
where
    F:   FnMut(MarketCandidate) -> Fut,
    Fut: Future<Output = Result<Vec<Kline>, ProviderError>>,
{
    for candidate in symbol_candidates(exchange, asset) {
        let venue = candidate.venue;
        let symbol = candidate.symbol.clone();
        match fetch(candidate).await {
            Ok(klines) if !klines.is_empty() => {
                debug!("{} {} resolved to {:?} {}", exchange, asset, venue, symbol);
                return Ok(klines);
            }
            Ok(_) | Err(ProviderError::SymbolNotFound { .. }) => {
                debug!("{} {:?} {} has no data, trying next candidate", exchange, venue, symbol);
            }
            Err(e) => {
                warn!("{} {:?} {} failed: {}", exchange, venue, symbol, e);
                return Err(e);
            }
        }
    }

    Err(ProviderError::SymbolNotFound {
        exchange: exchange.as_str().to_owned(),
        symbol:   normalize_asset(asset),
    })
}

// ── Response parsing ─────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct BinanceError {
    code: i64,
    msg:  String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope {
    ret_code: i64,
    ret_msg:  String,
    #[serde(default)]
    result:   Option<BybitResult>,
}

#[derive(Deserialize, Debug)]
struct BybitResult {
    #[serde(default)]
    list: Vec<Vec<Value>>,
}

#[derive(Deserialize, Debug)]
struct OkxEnvelope {
    code: String,
    msg:  String,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// Binance: invalid symbol.
const BINANCE_INVALID_SYMBOL: i64 = -1121;
/// Bybit: invalid / unsupported symbol.
const BYBIT_INVALID_SYMBOL: i64 = 10001;
/// OKX: instrument does not exist.
const OKX_NO_INSTRUMENT: &str = "51001";

/// Decode one candidate's HTTP response into ascending bars.
pub fn parse_klines(
    candidate: &MarketCandidate,
    status:    StatusCode,
    body:      &str,
) -> Result<Vec<Kline>, ProviderError> {
    let not_found = || ProviderError::SymbolNotFound {
        exchange: format!("{:?}", candidate.venue),
        symbol:   candidate.symbol.clone(),
    };

    let rows: Vec<Vec<Value>> = match candidate.venue {
        Venue::BinanceSpot | Venue::BinanceUsdm => {
            if !status.is_success() {
                return match serde_json::from_str::<BinanceError>(body) {
                    Ok(e) if e.code == BINANCE_INVALID_SYMBOL => Err(not_found()),
                    Ok(e) if status.is_client_error() => {
                        Err(ProviderError::InvalidResponse(format!("Binance error {}: {}", e.code, e.msg)))
                    }
                    _ => Err(ProviderError::Network(format!("HTTP {status}: {body}"))),
                };
            }
            serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?
        }
        Venue::BybitSpot | Venue::BybitLinear => {
            if !status.is_success() {
                return Err(ProviderError::Network(format!("HTTP {status}: {body}")));
            }
            let env: BybitEnvelope = serde_json::from_str(body)
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
            match env.ret_code {
                0 => env.result.map(|r| r.list).unwrap_or_default(),
                BYBIT_INVALID_SYMBOL => return Err(not_found()),
                code => {
                    return Err(ProviderError::InvalidResponse(format!("Bybit error {}: {}", code, env.ret_msg)))
                }
            }
        }
        Venue::OkxSpot | Venue::OkxSwap => {
            if !status.is_success() && status != StatusCode::BAD_REQUEST {
                return Err(ProviderError::Network(format!("HTTP {status}: {body}")));
            }
            let env: OkxEnvelope = serde_json::from_str(body)
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
            match env.code.as_str() {
                "0" => env.data,
                OKX_NO_INSTRUMENT => return Err(not_found()),
                code => return Err(ProviderError::InvalidResponse(format!("OKX error {}: {}", code, env.msg))),
            }
        }
    };

    let mut klines = rows
        .iter()
        .map(|row| row_to_kline(row))
        .collect::<Result<Vec<_>, _>>()?;
    klines.sort_by_key(|k| k.open_time);
    Ok(klines)
}

/// `[time, open, high, low, close, volume, ...]` with numbers or numeric strings.
fn row_to_kline(row: &[Value]) -> Result<Kline, ProviderError> {
    if row.len() < 6 {
        return Err(ProviderError::InvalidResponse(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let open_time = match &row[0] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ProviderError::InvalidResponse(format!("bad open time: {}", row[0])))?;

    Ok(Kline {
        open_time,
        open:   number(&row[1])?,
        high:   number(&row[2])?,
        low:    number(&row[3])?,
        close:  number(&row[4])?,
        volume: number(&row[5])?,
    })
}

fn number(v: &Value) -> Result<f64, ProviderError> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() => Ok(x),
        _ => Err(ProviderError::InvalidResponse(format!("bad numeric field: {v}"))),
    }
}
