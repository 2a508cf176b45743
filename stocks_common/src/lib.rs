//!
//! Quote ingestion pipeline shared by the stocks adapter.
//!
//! This crate aggregates:
//! - `error`: unified error type `StocksError` used across the workspace.
//! - `result`: handy `Result<T, StocksError>` alias.
//! - `schema`: field name → kind registry driving metadata and coercion.
//! - `symbols`: ticker symbols and the configuration parser.
//! - `query`: YQL request construction.
//! - `fetcher`: HTTP retrieval and response envelope parsing.
//! - `mapper`: schema-driven coercion of quote records.
//! - `state`: storage objects, the `StateStore` surface and an in-memory store.
//! - `sync`: create-if-absent object scaffolding and value writes.
//! - `pipeline`: the per-cycle context and the `run` entry point.
#![warn(missing_docs)]
pub mod error;
pub mod fetcher;
pub mod mapper;
pub mod pipeline;
pub mod query;
pub mod result;
pub mod schema;
pub mod state;
pub mod symbols;
pub mod sync;

pub use error::StocksError;
pub use fetcher::{HttpQuoteFetcher, QuoteResponse, QuoteSource};
pub use mapper::DateFormat;
pub use pipeline::{IngestorConfig, QuoteIngestor, RunOutcome, RunReport};
pub use result::Result;
pub use schema::SchemaRegistry;
pub use state::{MemoryStateStore, StateStore, StoreSnapshot};
