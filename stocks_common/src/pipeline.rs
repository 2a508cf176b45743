//! One ingestion cycle: parse symbols, build the request, fetch, map, sync.
//!
//! All state of a cycle lives in a `RunContext` created at the start of the
//! run; nothing is carried over between cycles except the store content.
//! `QuoteIngestor::run` is the entry point for schedulers and never fails:
//! every error is logged and reflected in the returned `RunReport`.
use std::sync::Arc;

use log::{debug, error, info};
use strum_macros::Display;

use crate::error::StocksError;
use crate::fetcher::QuoteSource;
use crate::mapper::{DateFormat, ResponseMapper};
use crate::query::{DEFAULT_ENDPOINT, QueryBuilder, QueryTarget};
use crate::result::Result;
use crate::schema::SchemaRegistry;
use crate::state::StateStore;
use crate::symbols::{self, Symbol};
use crate::sync::StateSynchronizer;

/// Settings of an ingestor.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Comma-separated symbol list.
    pub symbols: String,
    /// Quote API endpoint.
    pub endpoint: String,
    /// Rendering of DATE fields.
    pub date_format: DateFormat,
}

impl IngestorConfig {
    /// Uses the public endpoint and the process locale.
    pub fn new(symbols: &str) -> Self {
        Self {
            symbols: String::from(symbols),
            endpoint: String::from(DEFAULT_ENDPOINT),
            date_format: DateFormat::from_env(),
        }
    }

    /// Replaces the endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = String::from(endpoint);
        self
    }

    /// Replaces the date format.
    pub fn with_date_format(mut self, date_format: DateFormat) -> Self {
        self.date_format = date_format;
        self
    }
}

/// Per-cycle inputs derived from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Symbols requested this cycle.
    pub symbols: Vec<Symbol>,
    /// Request for those symbols.
    pub target: QueryTarget,
}

impl RunContext {
    /// Parses and validates the symbols, then builds the request.
    pub fn prepare(config: &IngestorConfig) -> Result<Self> {
        let symbols = symbols::require_configured(symbols::parse(&config.symbols))?;
        let target = QueryBuilder::new(&config.endpoint)?.build(&symbols)?;
        Ok(Self { symbols, target })
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunOutcome {
    /// Response processed; individual records or writes may still have failed.
    Completed,
    /// No symbols configured; nothing was requested.
    NotConfigured,
    /// The request failed; nothing was written.
    FetchFailed,
    /// The response had an unexpected shape; nothing was written.
    MalformedResponse,
    /// Any other setup failure, e.g. an invalid endpoint.
    Failed,
}

impl From<&StocksError> for RunOutcome {
    fn from(err: &StocksError) -> Self {
        match err {
            StocksError::NoSymbolsConfigured => RunOutcome::NotConfigured,
            StocksError::Fetch(_) => RunOutcome::FetchFailed,
            StocksError::MalformedResponse(_) => RunOutcome::MalformedResponse,
            _ => RunOutcome::Failed,
        }
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// How the cycle ended.
    pub outcome: RunOutcome,
    /// Records contained in the response.
    pub quotes_received: usize,
    /// Records mapped and synchronized.
    pub records_synced: usize,
    /// Records rejected by the mapper.
    pub records_skipped: usize,
    /// Objects created in the store.
    pub objects_created: usize,
    /// Values written to the store.
    pub states_written: usize,
    /// Store operations that failed.
    pub store_failures: usize,
}

impl RunReport {
    fn empty(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            quotes_received: 0,
            records_synced: 0,
            records_skipped: 0,
            objects_created: 0,
            states_written: 0,
            store_failures: 0,
        }
    }
}

/// Runs ingestion cycles against a quote source and a state store.
pub struct QuoteIngestor {
    config: IngestorConfig,
    registry: Arc<SchemaRegistry>,
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn StateStore>,
}

impl QuoteIngestor {
    /// Creates an ingestor.
    pub fn new(
        config: IngestorConfig,
        registry: Arc<SchemaRegistry>,
        source: Arc<dyn QuoteSource>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            config,
            registry,
            source,
            store,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &IngestorConfig {
        &self.config
    }

    /// Runs one cycle, logging failures instead of returning them.
    pub async fn run(&self) -> RunReport {
        debug!("schedule started");
        match self.try_run().await {
            Ok(report) => {
                info!(
                    "Cycle: {} received, {} synced, {} skipped, {} written, {} store failures",
                    report.quotes_received,
                    report.records_synced,
                    report.records_skipped,
                    report.states_written,
                    report.store_failures
                );
                report
            }
            Err(e) => {
                error!("{}", e);
                RunReport::empty(RunOutcome::from(&e))
            }
        }
    }

    /// Runs one cycle, returning configuration, fetch and response-shape errors.
    ///
    /// Record-level and store-level failures are logged and counted in the report.
    pub async fn try_run(&self) -> Result<RunReport> {
        let context = RunContext::prepare(&self.config)?;
        debug!(
            "Requesting {} symbols: {}",
            context.symbols.len(),
            context.target.statement
        );

        let response = self.source.fetch(&context.target).await?;

        let mapper = ResponseMapper::new(&self.registry, self.config.date_format);
        let synchronizer = StateSynchronizer::new(&self.registry, &*self.store);
        let mut report = RunReport::empty(RunOutcome::Completed);
        report.quotes_received = response.quotes.len();

        let mut totals = synchronizer.ensure_root();
        for record in &response.quotes {
            match mapper.map(record) {
                Ok(mapped) => {
                    totals.add(synchronizer.sync(&mapped.symbol, &mapped.fields));
                    report.records_synced += 1;
                }
                Err(e) => {
                    error!("{}; record skipped", e);
                    report.records_skipped += 1;
                }
            }
        }

        report.objects_created = totals.objects_created;
        report.states_written = totals.states_written;
        report.store_failures = totals.failures;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{QuoteResponse, parse_response};
    use crate::state::{MemoryStateStore, State, StoreSnapshot};
    use async_trait::async_trait;
    use chrono::Locale;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves canned bodies and records the requested statements.
    struct CannedSource {
        body: std::result::Result<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl CannedSource {
        fn body(body: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                body: Ok(body.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                body: Err(String::from(message)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QuoteSource for CannedSource {
        async fn fetch(&self, target: &QueryTarget) -> Result<QuoteResponse> {
            self.requests.lock().unwrap().push(target.statement.clone());
            match &self.body {
                Ok(body) => parse_response(body),
                Err(message) => Err(StocksError::Fetch(message.clone())),
            }
        }
    }

    fn ingestor(
        symbols: &str,
        source: Arc<CannedSource>,
        store: Arc<MemoryStateStore>,
    ) -> QuoteIngestor {
        let registry = SchemaRegistry::from_json(
            r#"{
                "Name": {"type": "STRING"},
                "LastTradePriceOnly": {"type": "CURRENCY"},
                "LastTradeDate": {"type": "DATE"}
            }"#,
        )
        .unwrap();
        let config =
            IngestorConfig::new(symbols).with_date_format(DateFormat::new(Locale::en_US));
        QuoteIngestor::new(config, Arc::new(registry), source, store)
    }

    #[tokio::test]
    async fn full_cycle_writes_mapped_values() {
        let store = Arc::new(MemoryStateStore::new());
        let source = CannedSource::body(json!({
            "query": { "count": 2, "results": { "quote": [
                { "symbol": "AAPL", "Name": "Apple Inc.", "LastTradePriceOnly": 189.71 },
                { "symbol": "MSFT", "Name": "Microsoft Corporation", "LastTradePriceOnly": null }
            ] } }
        }));

        let report = ingestor("AAPL,MSFT", source.clone(), store.clone()).run().await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.quotes_received, 2);
        assert_eq!(report.records_synced, 2);
        assert_eq!(report.states_written, 3);
        // root + 2 channels + 2 * 3 fields
        assert_eq!(report.objects_created, 9);
        assert_eq!(
            source.requests(),
            vec![String::from(
                r#"select * from yahoo.finance.quotes where symbol in ("AAPL","MSFT")"#
            )]
        );
        assert_eq!(
            store.get_state("quotes.AAPL.LastTradePriceOnly").unwrap(),
            Some(State::acknowledged(json!(189.71)))
        );
        assert_eq!(store.get_state("quotes.MSFT.LastTradePriceOnly").unwrap(), None);
        assert!(store.get_object("quotes.MSFT.LastTradeDate").unwrap().is_some());
    }

    #[tokio::test]
    async fn null_element_is_skipped_and_batch_continues() {
        let store = Arc::new(MemoryStateStore::new());
        let source = CannedSource::body(json!({
            "query": { "count": 3, "results": { "quote": [
                { "symbol": "AAPL", "Name": "Apple Inc." },
                null,
                { "symbol": "MSFT", "Name": "Microsoft Corporation" }
            ] } }
        }));

        let report = ingestor("AAPL,MSFT", source, store.clone()).run().await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.quotes_received, 3);
        assert_eq!(report.records_synced, 2);
        assert_eq!(report.records_skipped, 1);
        assert_eq!(
            store.get_state("quotes.MSFT.Name").unwrap(),
            Some(State::acknowledged(json!("Microsoft Corporation")))
        );
    }

    #[test]
    fn config_is_kept_by_the_ingestor() {
        let store = Arc::new(MemoryStateStore::new());
        let ingestor = ingestor("AAPL,MSFT", CannedSource::body(json!({})), store);
        assert_eq!(ingestor.config().symbols, "AAPL,MSFT");
        assert_eq!(ingestor.config().endpoint, DEFAULT_ENDPOINT);
        assert_eq!(ingestor.config().date_format.locale(), Locale::en_US);
    }

    #[tokio::test]
    async fn blank_configuration_makes_no_request() {
        let store = Arc::new(MemoryStateStore::new());
        let source = CannedSource::body(json!({}));

        let report = ingestor("", source.clone(), store.clone()).run().await;

        assert_eq!(report.outcome, RunOutcome::NotConfigured);
        assert!(source.requests().is_empty());
        assert_eq!(store.snapshot().unwrap(), StoreSnapshot::default());
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let store = Arc::new(MemoryStateStore::new());
        let report = ingestor("AAPL", CannedSource::failing("connection refused"), store.clone())
            .run()
            .await;

        assert_eq!(report.outcome, RunOutcome::FetchFailed);
        assert_eq!(store.snapshot().unwrap(), StoreSnapshot::default());
    }

    #[tokio::test]
    async fn try_run_propagates_malformed_response() {
        let store = Arc::new(MemoryStateStore::new());
        let source = CannedSource::body(json!({ "query": { "count": 0, "results": null } }));

        let err = ingestor("AAPL", source, store.clone()).try_run().await.unwrap_err();
        assert!(matches!(err, StocksError::MalformedResponse(_)));
        assert_eq!(store.snapshot().unwrap(), StoreSnapshot::default());
    }

    #[tokio::test]
    async fn invalid_endpoint_fails_before_fetching() {
        let store = Arc::new(MemoryStateStore::new());
        let source = CannedSource::body(json!({}));
        let registry = Arc::new(SchemaRegistry::builtin().unwrap());
        let config = IngestorConfig::new("AAPL").with_endpoint("yql");

        let report = QuoteIngestor::new(config, registry, source.clone(), store).run().await;
        assert_eq!(report.outcome, RunOutcome::Failed);
        assert!(source.requests().is_empty());
    }

    #[test]
    fn context_keeps_symbols_verbatim() {
        let config = IngestorConfig::new("AAPL, MSFT");
        let context = RunContext::prepare(&config).unwrap();
        assert_eq!(context.symbols, vec![Symbol::new("AAPL"), Symbol::new(" MSFT")]);
        assert!(context.target.statement.ends_with(r#"("AAPL"," MSFT")"#));
    }
}
