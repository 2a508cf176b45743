//! Command-line arguments for the stocks adapter.
//!
//! This module defines the CLI interface using `clap`. Every option that is
//! part of the adapter's configuration can also be supplied via environment.
use std::path::PathBuf;

use clap::Parser;
use log::warn;
use stocks_common::DateFormat;
use stocks_common::query::DEFAULT_ENDPOINT;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Fetches stock quotes into a state store", long_about = None)]
pub struct Args {
    /// Comma-separated ticker symbols, e.g. `AAPL,MSFT,SAP.DE`.
    #[clap(long, env = "STOCKS_SYMBOLS", default_value = "")]
    pub symbols: String,

    /// YQL endpoint of the quote API.
    #[clap(long, env = "STOCKS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// JSON field definition replacing the bundled one.
    #[clap(long)]
    pub schema: Option<PathBuf>,

    /// JSON file the state store is loaded from and saved to.
    #[clap(long, env = "STOCKS_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Run a cycle every N seconds instead of once.
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: Option<u64>,

    /// Time budget of one cycle; a cycle running longer is abandoned.
    #[clap(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub run_timeout_secs: u64,

    /// HTTP request timeout.
    #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_secs: u64,

    /// Locale used for dates (e.g. `de_DE`); defaults to the process locale.
    #[clap(long)]
    pub locale: Option<String>,
}

impl Args {
    /// Date format from `--locale`, or from the environment when absent or unknown.
    pub fn date_format(&self) -> DateFormat {
        match self.locale.as_deref() {
            Some(name) => DateFormat::from_locale_name(name).unwrap_or_else(|| {
                warn!("Unknown locale {}, using the process locale", name);
                DateFormat::from_env()
            }),
            None => DateFormat::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let args = Args::try_parse_from(["stocks-adapter", "--symbols", "AAPL,MSFT"]).unwrap();
        assert_eq!(args.symbols, "AAPL,MSFT");
        assert_eq!(args.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(args.run_timeout_secs, 15);
        assert_eq!(args.request_timeout_secs, 10);
        assert!(args.interval_secs.is_none());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Args::try_parse_from(["stocks-adapter", "--interval-secs", "0"]).is_err());
    }

    #[test]
    fn explicit_locale_wins() {
        let args = Args::try_parse_from(["stocks-adapter", "--locale", "de_DE.UTF-8"]).unwrap();
        assert_eq!(
            args.date_format().format_epoch_seconds(1700049600).as_deref(),
            Some("15.11.2023")
        );
    }
}
