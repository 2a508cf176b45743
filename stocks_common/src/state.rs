//! State store surface consumed by the synchronizer.
//!
//! Objects are addressed by dotted ids (`quotes`, `quotes.AAPL`,
//! `quotes.AAPL.Name`). Channels group states; states carry the current value
//! together with an acknowledgement flag. Creation is always "create if
//! absent": once an object exists its metadata is never touched again.
//!
//! `MemoryStateStore` is the in-process implementation used by the adapter and
//! by tests. It can be exported to and restored from a `StoreSnapshot`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::error::StocksError;
use crate::result::Result;

/// Kind of a storage object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectType {
    /// Grouping node without a value.
    Channel,
    /// Leaf node holding a value.
    State,
}

/// Declared value type of a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    #[allow(missing_docs)]
    String,
    #[allow(missing_docs)]
    Number,
}

/// Storage role of a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Role {
    /// Generic value.
    #[serde(rename = "value")]
    #[strum(serialize = "value")]
    Value,
    /// Informational numeric value.
    #[serde(rename = "info")]
    #[strum(serialize = "info")]
    Info,
    /// Date rendered as text.
    #[serde(rename = "value.date")]
    #[strum(serialize = "value.date")]
    ValueDate,
}

/// Descriptive metadata of a storage object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCommon {
    /// Display name.
    pub name: String,
    /// Declared value type; `None` leaves it blank.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// Storage role; `None` leaves it blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Unit of measurement (empty for quote fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A node of the object tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    /// Channel or state.
    #[serde(rename = "type")]
    pub kind: ObjectType,
    /// Metadata, immutable after creation.
    pub common: ObjectCommon,
}

impl StorageObject {
    /// Creates a channel descriptor with the given display name.
    pub fn channel(name: &str) -> Self {
        StorageObject {
            kind: ObjectType::Channel,
            common: ObjectCommon {
                name: String::from(name),
                value_type: None,
                role: None,
                unit: None,
            },
        }
    }

    /// Creates a state descriptor.
    pub fn state(
        name: &str,
        value_type: Option<ValueType>,
        role: Option<Role>,
        unit: &str,
    ) -> Self {
        StorageObject {
            kind: ObjectType::State,
            common: ObjectCommon {
                name: String::from(name),
                value_type,
                role,
                unit: Some(String::from(unit)),
            },
        }
    }
}

/// Current value of a state object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Stored value.
    pub val: Value,
    /// `true` when the value is authoritative rather than a pending command.
    pub ack: bool,
}

impl State {
    /// Creates an acknowledged state.
    pub fn acknowledged(val: Value) -> Self {
        State { val, ack: true }
    }
}

/// Write surface offered by the host.
///
/// Both operations report failures as `StocksError::Store` so callers can log
/// them instead of dropping them silently.
pub trait StateStore: Send + Sync {
    /// Creates `id` with `object` unless it already exists.
    ///
    /// Returns `true` if the object was created, `false` if it was already present.
    fn set_object_not_exists(&self, id: &str, object: StorageObject) -> Result<bool>;

    /// Writes the current value of the state object `id`.
    fn set_state(&self, id: &str, state: State) -> Result<()>;

    /// Reads object metadata.
    fn get_object(&self, id: &str) -> Result<Option<StorageObject>>;

    /// Reads the current value of a state object.
    fn get_state(&self, id: &str) -> Result<Option<State>>;
}

/// Serializable content of a `MemoryStateStore`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Object tree keyed by id.
    #[serde(default)]
    pub objects: BTreeMap<String, StorageObject>,
    /// Current state values keyed by id.
    #[serde(default)]
    pub states: BTreeMap<String, State>,
}

/// Thread-safe in-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<StoreSnapshot>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from a previously exported snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    /// Exports a copy of the current content.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        Ok(self.inner.lock()?.clone())
    }
}

impl StateStore for MemoryStateStore {
    fn set_object_not_exists(&self, id: &str, object: StorageObject) -> Result<bool> {
        if id.is_empty() {
            return Err(StocksError::Store(String::from("object id must not be empty")));
        }
        let mut inner = self.inner.lock()?;
        if inner.objects.contains_key(id) {
            return Ok(false);
        }
        inner.objects.insert(String::from(id), object);
        Ok(true)
    }

    fn set_state(&self, id: &str, state: State) -> Result<()> {
        let mut inner = self.inner.lock()?;
        match inner.objects.get(id) {
            Some(object) if object.kind == ObjectType::State => {
                inner.states.insert(String::from(id), state);
                Ok(())
            }
            Some(_) => Err(StocksError::Store(format!("{} is not a state object", id))),
            None => Err(StocksError::Store(format!("object {} does not exist", id))),
        }
    }

    fn get_object(&self, id: &str) -> Result<Option<StorageObject>> {
        Ok(self.inner.lock()?.objects.get(id).cloned())
    }

    fn get_state(&self, id: &str) -> Result<Option<State>> {
        Ok(self.inner.lock()?.states.get(id).cloned())
    }
}
