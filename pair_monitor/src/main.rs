/// main.rs — Position monitor entry point
///
/// FLOW:
///   1. Load config from .env, apply command-line overrides
///   2. Open the positions given with --position
///   3. Evaluate every active position once and print the status table
///   4. With --watch: re-evaluate every REFRESH_INTERVAL_SECS and accept
///      operator commands on stdin until Ctrl-C
///
/// COMMANDS (--watch):
///   add BTC/ETH:-2.3:1000   close <id>   remove <id>
///   refresh                 list         quit
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pair_monitor::engine::PositionMonitor;
use pair_monitor::report::StatusReport;
use pair_monitor::{AppConfig, ExchangeDataClient, MetricsCache, PositionBook};

#[derive(Parser, Debug)]
#[command(name = "pair_monitor", about = "Monitor open pairs trades for z-score mean reversion")]
struct Args {
    /// Position as ASSET1/ASSET2:ENTRY_Z:SIZE_USD (long ASSET1, short ASSET2); repeatable
    #[arg(short, long = "position", value_name = "SPEC")]
    positions: Vec<String>,

    /// Exchange id: binance, binance_futures, bybit, okx
    #[arg(short, long)]
    exchange: Option<String>,

    /// Bar interval, e.g. 1h, 4h, 1d
    #[arg(short, long)]
    interval: Option<String>,

    /// Bars requested per asset
    #[arg(long)]
    window_bars: Option<usize>,

    /// Keep running: periodic refresh plus stdin commands
    #[arg(short, long)]
    watch: bool,

    /// Refresh period in seconds (with --watch)
    #[arg(long)]
    refresh_secs: Option<u64>,

    /// Print evaluations as JSON instead of the table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct PositionSpec {
    asset1:   String,
    asset2:   String,
    entry_z:  f64,
    size_usd: f64,
}

fn parse_position_spec(spec: &str) -> Result<PositionSpec> {
    let mut parts = spec.trim().splitn(3, ':');
    let pair = parts.next().unwrap_or_default();
    let entry_z = parts.next().context("missing entry z-score (expected ASSET1/ASSET2:Z:SIZE)")?;
    let size = parts.next().context("missing size in USD (expected ASSET1/ASSET2:Z:SIZE)")?;

    let (asset1, asset2) = pair
        .split_once('/')
        .with_context(|| format!("pair '{pair}' must look like ASSET1/ASSET2"))?;

    Ok(PositionSpec {
        asset1:   asset1.trim().to_owned(),
        asset2:   asset2.trim().to_owned(),
        entry_z:  entry_z.trim().parse().with_context(|| format!("bad entry z-score '{entry_z}'"))?,
        size_usd: size.trim().parse().with_context(|| format!("bad size '{size}'"))?,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Add(PositionSpec),
    Close(u64),
    Remove(u64),
    Refresh,
    List,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let id = || -> Result<u64> {
        rest.trim().parse().with_context(|| format!("'{verb}' needs a numeric position id"))
    };
    match verb.to_lowercase().as_str() {
        "add"     => Ok(Command::Add(parse_position_spec(rest)?)),
        "close"   => Ok(Command::Close(id()?)),
        "remove" | "delete" => Ok(Command::Remove(id()?)),
        "refresh" => Ok(Command::Refresh),
        "list"    => Ok(Command::List),
        "quit" | "exit" => Ok(Command::Quit),
        other => anyhow::bail!("unknown command '{other}'"),
    }
}

fn add_position(book: &mut PositionBook, spec: &PositionSpec) {
    match book.add_position(&spec.asset1, &spec.asset2, spec.entry_z, spec.size_usd) {
        Ok(p) => println!("Added #{} {}", p.id, p.pair_id),
        Err(e) => {
            error!("Rejected position {}/{}: {}", spec.asset1, spec.asset2, e);
            println!("Rejected: {e}");
        }
    }
}

/// One full pass over the book; the lock is held until printing is done.
async fn run_pass(monitor: &PositionMonitor, book: &Mutex<PositionBook>, json: bool) -> Result<()> {
    let book = book.lock().await;
    let evaluations = monitor.evaluate_all(&book).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluations)?);
    } else {
        let market = monitor.market();
        println!(
            "\n{}",
            StatusReport {
                exchange:     &market.exchange,
                bar_interval: &market.bar_interval,
                evaluations:  &evaluations,
            }
        );
    }
    Ok(())
}

/// Apply one operator command.  Returns `false` on quit.
async fn apply_command(
    cmd:     Command,
    monitor: &PositionMonitor,
    book:    &Mutex<PositionBook>,
    json:    bool,
) -> Result<bool> {
    match cmd {
        Command::Add(spec) => add_position(&mut *book.lock().await, &spec),
        Command::Close(id) => match book.lock().await.close_position(id) {
            Ok(p) => println!("Closed #{} {}", p.id, p.pair_id),
            Err(e) => println!("Rejected: {e}"),
        },
        Command::Remove(id) => match book.lock().await.remove_position(id) {
            Ok(p) => println!("Removed #{} {}", p.id, p.pair_id),
            Err(e) => println!("Rejected: {e}"),
        },
        Command::Refresh => {
            monitor.cache().invalidate_all();
            run_pass(monitor, book, json).await?;
        }
        Command::List => run_pass(monitor, book, json).await?,
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // ── Config ───────────────────────────────────────────────────────────
    let mut cfg = AppConfig::from_env()?;
    if let Some(exchange) = args.exchange {
        cfg.exchange = exchange.to_lowercase();
    }
    if let Some(interval) = args.interval {
        cfg.kline_interval = interval;
    }
    if let Some(window) = args.window_bars {
        cfg.window_bars = window;
    }
    if let Some(secs) = args.refresh_secs {
        cfg.refresh_interval = Duration::from_secs(secs.max(1));
    }
    cfg.validate()?;
    info!(
        "Config: exchange={} interval={} window={} min_samples={} ttl={}s timeout={}s",
        cfg.exchange, cfg.kline_interval, cfg.window_bars, cfg.min_samples,
        cfg.cache_ttl.as_secs(), cfg.fetch_timeout.as_secs()
    );
    info!(
        "Policy: close<{:.2} approaching<{:.2} danger>{:.2} vol_factor={:.2}",
        cfg.thresholds.close_now, cfg.thresholds.approaching, cfg.thresholds.danger,
        cfg.volatility_factor
    );

    // ── Wiring ───────────────────────────────────────────────────────────
    let provider = Arc::new(
        ExchangeDataClient::new(cfg.endpoints.clone(), cfg.fetch_timeout)
            .context("building exchange client")?,
    );
    let cache = Arc::new(MetricsCache::new(provider, cfg.cache_ttl, cfg.fetch_timeout, cfg.min_samples));
    let monitor = PositionMonitor::from_config(cache, &cfg);

    let book = Mutex::new(PositionBook::new());
    {
        let mut book = book.lock().await;
        for raw in &args.positions {
            match parse_position_spec(raw) {
                Ok(spec) => add_position(&mut book, &spec),
                Err(e) => {
                    error!("Ignoring --position '{}': {:#}", raw, e);
                    println!("Rejected: {e:#}");
                }
            }
        }
    }

    if !args.watch {
        return run_pass(&monitor, &book, args.json).await;
    }

    // ── Watch loop ───────────────────────────────────────────────────────
    info!("Watching — refresh every {}s, Ctrl-C to stop", cfg.refresh_interval.as_secs());
    let mut ticker = tokio::time::interval(cfg.refresh_interval);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_pass(&monitor, &book, args.json).await {
                    error!("Refresh failed: {e:#}");
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(cmd) => {
                        if !apply_command(cmd, &monitor, &book, args.json).await? {
                            break;
                        }
                    }
                    Err(e) => println!("{e:#}"),
                },
                Ok(None) => {
                    info!("stdin closed; continuing with timed refresh only");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, stopping");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_position_spec() {
        let spec = parse_position_spec("BTC/ETH:-2.3:1000").unwrap();
        assert_eq!(
            spec,
            PositionSpec { asset1: "BTC".into(), asset2: "ETH".into(), entry_z: -2.3, size_usd: 1000.0 }
        );
        assert!(parse_position_spec("BTC-ETH:-2.3:1000").is_err());
        assert!(parse_position_spec("BTC/ETH:-2.3").is_err());
        assert!(parse_position_spec("BTC/ETH:x:1000").is_err());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("close 3").unwrap(), Command::Close(3));
        assert_eq!(parse_command(" DELETE  7 ").unwrap(), Command::Remove(7));
        assert_eq!(parse_command("refresh").unwrap(), Command::Refresh);
        assert!(matches!(parse_command("add SOL/AVAX:2.1:500").unwrap(), Command::Add(_)));
        assert!(parse_command("close abc").is_err());
        assert!(parse_command("buy BTC").is_err());
    }
}
