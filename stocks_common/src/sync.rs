//! Object scaffolding and value writes for mapped quotes.
//!
//! Layout in the store:
//! - `quotes`: root channel
//! - `quotes.<symbol>`: one channel per symbol, named by the symbol
//! - `quotes.<symbol>.<field>`: one state per schema field
//!
//! Every object is created with "create if absent" semantics, so metadata set
//! by the first cycle is never reset. Store failures are logged as warnings
//! and counted; the remaining objects and values are still processed.
use log::{debug, warn};

use crate::mapper::CoercedValue;
use crate::result::Result;
use crate::schema::SchemaRegistry;
use crate::state::{State, StateStore, StorageObject};
use crate::symbols::Symbol;

/// Id of the root channel.
pub const ROOT_CHANNEL: &str = "quotes";

/// Id of a symbol's channel.
pub fn channel_id(symbol: &Symbol) -> String {
    format!("{}.{}", ROOT_CHANNEL, symbol)
}

/// Id of a field's state object.
pub fn state_id(symbol: &Symbol, field: &str) -> String {
    format!("{}.{}.{}", ROOT_CHANNEL, symbol, field)
}

/// Outcome of one `sync` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Objects that did not exist before.
    pub objects_created: usize,
    /// Values written.
    pub states_written: usize,
    /// Store operations that failed.
    pub failures: usize,
}

impl SyncSummary {
    fn record<T>(&mut self, id: &str, operation: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Cannot {} {}: {}", operation, id, e);
                self.failures += 1;
                None
            }
        }
    }

    /// Adds another summary to this one.
    pub fn add(&mut self, other: SyncSummary) {
        self.objects_created += other.objects_created;
        self.states_written += other.states_written;
        self.failures += other.failures;
    }
}

/// Writes mapped quotes into a `StateStore`.
pub struct StateSynchronizer<'a> {
    registry: &'a SchemaRegistry,
    store: &'a dyn StateStore,
}

impl<'a> StateSynchronizer<'a> {
    /// Creates a synchronizer for `registry`'s fields.
    pub fn new(registry: &'a SchemaRegistry, store: &'a dyn StateStore) -> Self {
        Self { registry, store }
    }

    /// Creates the root channel if absent.
    pub fn ensure_root(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();
        let created = self
            .store
            .set_object_not_exists(ROOT_CHANNEL, StorageObject::channel(ROOT_CHANNEL));
        if summary.record(ROOT_CHANNEL, "create", created) == Some(true) {
            summary.objects_created += 1;
        }
        summary
    }

    /// Creates the symbol's channel and every field object if absent, then writes `fields`.
    pub fn sync(&self, symbol: &Symbol, fields: &[(String, CoercedValue)]) -> SyncSummary {
        let mut summary = self.ensure_objects(symbol);

        for (field, coerced) in fields {
            let id = state_id(symbol, field);
            let written = self
                .store
                .set_state(&id, State::acknowledged(coerced.value.clone()));
            if summary.record(&id, "write", written).is_some() {
                summary.states_written += 1;
            }
        }
        summary
    }

    fn ensure_objects(&self, symbol: &Symbol) -> SyncSummary {
        let mut summary = SyncSummary::default();

        let channel = channel_id(symbol);
        let created = self
            .store
            .set_object_not_exists(&channel, StorageObject::channel(symbol.as_str()));
        if summary.record(&channel, "create", created) == Some(true) {
            debug!("Created channel {}", channel);
            summary.objects_created += 1;
        }

        for entry in self.registry.entries() {
            let spec = entry.kind.spec();
            let object = StorageObject::state(
                &entry.name,
                spec.map(|s| s.value_type),
                spec.map(|s| s.role),
                "",
            );
            let id = state_id(symbol, &entry.name);
            let created = self.store.set_object_not_exists(&id, object);
            if summary.record(&id, "create", created) == Some(true) {
                summary.objects_created += 1;
            }
        }
        summary
    }
}
