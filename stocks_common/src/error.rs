//! Error types shared by the ingestion pipeline and the adapter binary.
//!
//! The `StocksError` enum unifies configuration, network, response-shape and
//! state-store failures so every stage can propagate a single error type. The
//! pipeline recovers all of them locally; none is meant to crash the host.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by the pipeline and the adapter.
#[derive(Error, Debug)]
pub enum StocksError {
    /// The configured symbol list is empty.
    #[error("Configuration error: no symbols configured")]
    NoSymbolsConfigured,

    /// Transport failure while talking to the quote API (connect, timeout, status, body).
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The quote API answered with a document that does not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A quote record does not carry a usable `symbol` field.
    #[error("Quote record has no symbol")]
    MissingSymbol,

    /// A schema entry declares a kind the mapper does not understand.
    #[error("Unknown field kind: {0}")]
    UnknownFieldKind(String),

    /// The state store refused to create an object or write a state.
    #[error("State store error: {0}")]
    Store(String),

    /// The schema definition could not be loaded.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The configured API endpoint is not a valid base URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// I/O error originating from the standard library (schema or snapshot files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for StocksError {
    fn from(err: PoisonError<T>) -> Self {
        StocksError::MutexLock(err.to_string())
    }
}

impl From<reqwest::Error> for StocksError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StocksError::Fetch(format!("request timed out: {}", err))
        } else if err.is_decode() {
            StocksError::Fetch(format!("undecodable body: {}", err))
        } else {
            StocksError::Fetch(err.to_string())
        }
    }
}
