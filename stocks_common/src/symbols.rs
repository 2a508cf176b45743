//! Ticker symbols and the configuration parser.
//!
//! The configured symbol list is a single comma-separated string. Every
//! segment becomes one `Symbol` verbatim: no trimming, no case folding and no
//! deduplication, so `"AAPL, MSFT"` yields `"AAPL"` and `" MSFT"`.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StocksError;
use crate::result::Result;

/// Separator between configured symbols.
pub const SYMBOL_SEPARATOR: char = ',';

/// Case-sensitive identifier of a tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Wraps a raw identifier.
    pub fn new(raw: &str) -> Self {
        Symbol(String::from(raw))
    }

    /// Text of the symbol.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Symbol::new(raw)
    }
}

/// Splits the raw configuration into symbols, keeping order and duplicates.
///
/// The result always has `raw.split(',').count()` entries, so an empty string
/// yields a single empty symbol. Use [`require_configured`] to reject lists
/// that carry no usable symbol.
pub fn parse(raw: &str) -> Vec<Symbol> {
    raw.split(SYMBOL_SEPARATOR).map(Symbol::new).collect()
}

/// Rejects symbol lists that are empty or only contain empty entries.
pub fn require_configured(symbols: Vec<Symbol>) -> Result<Vec<Symbol>> {
    if symbols.iter().all(|s| s.as_str().is_empty()) {
        return Err(StocksError::NoSymbolsConfigured);
    }
    Ok(symbols)
}
