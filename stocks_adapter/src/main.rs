//! Stocks adapter.
//!
//! This binary hosts the quote ingestion pipeline from `stocks_common`. It plays
//! the role of the host platform around the pipeline:
//!
//! - Configuration comes from CLI flags or environment (see `args`).
//! - The state store lives in memory and is optionally loaded from / saved to a
//!   JSON file around every cycle (see `snapshot`).
//! - Each cycle runs under a time budget; a cycle that exceeds it is abandoned.
//! - Without `--interval-secs` the adapter runs a single cycle and exits, which
//!   suits an external cron trigger. With it, cycles run on a fixed interval,
//!   one at a time, until Ctrl+C.
//!
//! Usage example (CLI):
//! ```bash
//! stocks-adapter --symbols AAPL,MSFT,SAP.DE --state-file ./quotes.json --interval-secs 900
//! ```
#![warn(missing_docs)]
mod args;
mod snapshot;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use stocks_common::{
    HttpQuoteFetcher, IngestorConfig, MemoryStateStore, QuoteIngestor, Result, RunOutcome,
    RunReport, SchemaRegistry, StocksError,
};
use tokio::time::{self, MissedTickBehavior};

use crate::args::Args;

/// Runs one cycle under `budget`.
async fn run_cycle(ingestor: &QuoteIngestor, budget: Duration) -> Option<RunReport> {
    match time::timeout(budget, ingestor.run()).await {
        Ok(report) => {
            if report.outcome != RunOutcome::Completed {
                warn!("Cycle ended early: {}", report.outcome);
            }
            Some(report)
        }
        Err(_) => {
            error!("Cycle exceeded its {}s budget and was abandoned", budget.as_secs());
            None
        }
    }
}

fn persist(store: &MemoryStateStore, state_file: Option<&Path>) {
    if let Some(path) = state_file {
        if let Err(e) = snapshot::save(store, path) {
            error!("Failed to save state to {}: {}", path.display(), e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), StocksError> {
    init_logger();
    let args = Args::parse();

    let registry = match &args.schema {
        Some(path) => SchemaRegistry::from_path(path)?,
        None => SchemaRegistry::builtin()?,
    };
    info!("Schema with {} fields loaded", registry.len());

    let store = Arc::new(match &args.state_file {
        Some(path) => snapshot::load(path)?,
        None => MemoryStateStore::new(),
    });
    let fetcher = HttpQuoteFetcher::new(Duration::from_secs(args.request_timeout_secs))?;
    let config = IngestorConfig::new(&args.symbols)
        .with_endpoint(&args.endpoint)
        .with_date_format(args.date_format());
    let ingestor = QuoteIngestor::new(config, Arc::new(registry), Arc::new(fetcher), store.clone());
    info!(
        "Quotes for [{}] from {}, dates in {}",
        ingestor.config().symbols,
        ingestor.config().endpoint,
        ingestor.config().date_format.locale()
    );
    let budget = Duration::from_secs(args.run_timeout_secs);

    match args.interval_secs {
        None => {
            run_cycle(&ingestor, budget).await;
            persist(&store, args.state_file.as_deref());
        }
        Some(secs) => {
            info!("Running every {}s. Press Ctrl+C to exit.", secs);
            let mut ticker = time::interval(Duration::from_secs(secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_cycle(&ingestor, budget).await;
                        persist(&store, args.state_file.as_deref());
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received. Shutting down adapter...");
                        break;
                    }
                }
            }
        }
    }

    info!("cleaned everything up...");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
