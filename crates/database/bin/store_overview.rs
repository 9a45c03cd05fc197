use anyhow::{Context, Result};
use md_database::{HistoryDatabase, MarketDatabase, StoreConfig, StoreRole};

// Print what the store holds, one line per series.
// Opens read-only; writers in this or another process get StoreBusy until it exits.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .compact()
        .init();

    let mut config = StoreConfig::from_env().context("failed to read store configuration")?;
    if let Some(path) = std::env::args().nth(1) {
        config.path = path.into();
    }
    config.role = StoreRole::ReaderOnly;

    let db = MarketDatabase::open(&config)
        .with_context(|| format!("failed to open store at {}", config.path.display()))?;

    let bars = db.list_bar_summaries().context("failed to list bar summaries")?;
    let ticks = db.list_tick_summaries().context("failed to list tick summaries")?;

    println!("store: {} (tz {})", config.path.display(), config.timezone);
    println!("bar series: {}", bars.len());
    for o in &bars {
        println!(
            "  {:<16} {:<8} {:<4} {:>10}  {} -> {}",
            o.symbol,
            o.exchange.as_str(),
            o.interval.as_str(),
            o.count,
            o.start,
            o.end
        );
    }
    println!("tick series: {}", ticks.len());
    for o in &ticks {
        println!(
            "  {:<16} {:<8} {:>10}  {} -> {}",
            o.symbol,
            o.exchange.as_str(),
            o.count,
            o.start,
            o.end
        );
    }
    Ok(())
}
