//! Quote retrieval over HTTP and parsing of the YQL response envelope.
//!
//! Expected body:
//! `{ "query": { "count": N, "results": { "quote": Record | [Record] } } }`.
//!
//! Transport problems (connection, timeout, HTTP status, unreadable body) are
//! reported as `StocksError::Fetch`; a body that does not have the shape above
//! is reported as `StocksError::MalformedResponse`. No request is retried.
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::StocksError;
use crate::query::QueryTarget;
use crate::result::Result;

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One symbol's raw fields as received from the API.
pub type QuoteRecord = Map<String, Value>;

/// Parsed quote batch.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResponse {
    /// Count reported by the API.
    pub count: u64,
    /// Records in response order.
    pub quotes: Vec<QuoteRecord>,
}

#[derive(Deserialize)]
struct Envelope {
    query: Option<QueryBlock>,
}

#[derive(Deserialize)]
struct QueryBlock {
    count: Option<u64>,
    results: Option<ResultsBlock>,
}

#[derive(Deserialize)]
struct ResultsBlock {
    quote: Option<OneOrMany>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(QuoteRecord),
    Many(Vec<Value>),
}

/// Non-object elements become empty records, which the mapper rejects one by one.
fn into_record(position: usize, element: Value) -> QuoteRecord {
    match element {
        Value::Object(record) => record,
        other => {
            warn!("Quote #{} is not an object: {}", position, other);
            QuoteRecord::new()
        }
    }
}

/// Parses a response body into a `QuoteResponse`.
pub fn parse_response(body: &str) -> Result<QuoteResponse> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| StocksError::MalformedResponse(format!("unexpected body: {}", e)))?;

    let query = envelope
        .query
        .ok_or_else(|| StocksError::MalformedResponse(String::from("missing `query`")))?;
    let count = query
        .count
        .ok_or_else(|| StocksError::MalformedResponse(String::from("missing `query.count`")))?;
    debug!("Getting response with {} quotes", count);

    let results = query
        .results
        .ok_or_else(|| StocksError::MalformedResponse(String::from("missing `query.results`")))?;
    let quotes = match results.quote {
        Some(OneOrMany::One(record)) => vec![record],
        Some(OneOrMany::Many(elements)) => elements
            .into_iter()
            .enumerate()
            .map(|(position, element)| into_record(position, element))
            .collect(),
        None => {
            return Err(StocksError::MalformedResponse(String::from(
                "missing `query.results.quote`",
            )));
        }
    };

    if quotes.len() as u64 != count {
        warn!(
            "Response reports {} quotes but carries {}; using the records received",
            count,
            quotes.len()
        );
    }
    Ok(QuoteResponse { count, quotes })
}

/// Source of quote batches.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Performs the request described by `target`.
    async fn fetch(&self, target: &QueryTarget) -> Result<QuoteResponse>;
}

/// `QuoteSource` backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpQuoteFetcher {
    client: Client,
}

impl HttpQuoteFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StocksError::Fetch(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteFetcher {
    async fn fetch(&self, target: &QueryTarget) -> Result<QuoteResponse> {
        debug!("Making request with {}", target.url);
        let response = self
            .client
            .request(target.method.clone(), target.url.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StocksError::Fetch(format!(
                "HTTP {} from {}: {}",
                status,
                target.url.host_str().unwrap_or_default(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_quote_object_becomes_one_record() {
        let body = json!({
            "query": {
                "count": 1,
                "results": { "quote": { "symbol": "AAPL", "Name": "Apple Inc." } }
            }
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.quotes.len(), 1);
        assert_eq!(response.quotes[0]["symbol"], json!("AAPL"));
    }

    #[test]
    fn quote_array_keeps_order() {
        let body = json!({
            "query": {
                "count": 2,
                "results": { "quote": [ { "symbol": "AAPL" }, { "symbol": "MSFT" } ] }
            }
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        let symbols: Vec<&Value> = response.quotes.iter().map(|q| &q["symbol"]).collect();
        assert_eq!(symbols, vec![&json!("AAPL"), &json!("MSFT")]);
    }

    #[test]
    fn count_mismatch_uses_received_records() {
        let body = json!({
            "query": { "count": 3, "results": { "quote": { "symbol": "AAPL" } } }
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        assert_eq!(response.count, 3);
        assert_eq!(response.quotes.len(), 1);
    }

    #[test]
    fn non_object_elements_do_not_drop_the_batch() {
        let body = json!({
            "query": {
                "count": 3,
                "results": { "quote": [ { "symbol": "AAPL" }, null, { "symbol": "MSFT" } ] }
            }
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        assert_eq!(response.quotes.len(), 3);
        assert_eq!(response.quotes[0]["symbol"], json!("AAPL"));
        assert!(response.quotes[1].is_empty());
        assert_eq!(response.quotes[2]["symbol"], json!("MSFT"));
    }

    #[test]
    fn zero_count_without_results_is_malformed() {
        let body = json!({ "query": { "count": 0, "results": null } }).to_string();
        assert!(matches!(
            parse_response(&body),
            Err(StocksError::MalformedResponse(_))
        ));

        let body = json!({ "query": { "count": 0, "results": {} } }).to_string();
        assert!(matches!(
            parse_response(&body),
            Err(StocksError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_envelope_parts_are_malformed() {
        for body in [
            json!({}).to_string(),
            json!({ "query": { "results": { "quote": [] } } }).to_string(),
            json!({ "error": { "description": "Query syntax error" } }).to_string(),
            json!({ "query": { "count": 1, "results": { "quote": "AAPL" } } }).to_string(),
            String::from("<html>502 Bad Gateway</html>"),
        ] {
            assert!(
                matches!(parse_response(&body), Err(StocksError::MalformedResponse(_))),
                "body {}",
                body
            );
        }
    }
}
