//! Request construction for the YQL quote table.
//!
//! Building a request is pure: the same symbols always produce the same
//! `QueryTarget`, and nothing here touches the network.
use reqwest::{Method, Url};

use crate::error::StocksError;
use crate::result::Result;
use crate::symbols::Symbol;

/// Public YQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://query.yahooapis.com/v1/public/yql";
/// Table holding quote data.
pub const QUOTES_TABLE: &str = "yahoo.finance.quotes";
/// Data environment that makes community tables available.
pub const DATA_ENVIRONMENT: &str = "store://datatables.org/alltableswithkeys";
/// Requested response format.
pub const RESPONSE_FORMAT: &str = "json";

/// Fully described outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    /// HTTP method (always `GET`).
    pub method: Method,
    /// Endpoint with the encoded query parameters.
    pub url: Url,
    /// Unencoded YQL statement carried in the `q` parameter.
    pub statement: String,
}

/// Builds `QueryTarget`s against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    endpoint: Url,
}

impl QueryBuilder {
    /// Creates a builder for `endpoint`, which must be an absolute http(s) URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StocksError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(StocksError::InvalidEndpoint(format!(
                "{}: expected an http(s) URL",
                endpoint
            )));
        }
        Ok(Self { endpoint })
    }

    /// Builds the request for `symbols`.
    pub fn build(&self, symbols: &[Symbol]) -> Result<QueryTarget> {
        if symbols.is_empty() {
            return Err(StocksError::NoSymbolsConfigured);
        }

        let statement = statement(symbols);
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &statement)
            .append_pair("format", RESPONSE_FORMAT)
            .append_pair("env", DATA_ENVIRONMENT);

        Ok(QueryTarget {
            method: Method::GET,
            url,
            statement,
        })
    }
}

/// Renders `("A","B",...)`.
pub fn symbol_list(symbols: &[Symbol]) -> String {
    let quoted: Vec<String> = symbols.iter().map(|s| format!("\"{}\"", s)).collect();
    format!("({})", quoted.join(","))
}

/// Renders the YQL statement selecting quotes for `symbols`.
pub fn statement(symbols: &[Symbol]) -> String {
    format!(
        "select * from {} where symbol in {}",
        QUOTES_TABLE,
        symbol_list(symbols)
    )
}
