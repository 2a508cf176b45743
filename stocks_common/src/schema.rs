//! Field schema for quote records.
//!
//! The registry maps every quote field name to a `FieldKind`. The kind drives
//! both the metadata of the state object created for the field and the
//! coercion applied to its raw value, through the table in `FieldKind::spec`.
//!
//! Definitions are JSON objects of the form
//! `{ "Name": { "type": "STRING" }, "LastTradeDate": { "type": "DATE" } }`.
//! Declaration order is kept; it is the order in which fields are mapped and
//! objects are created.
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use serde::Deserialize;
use serde_json::Value;
use strum_macros::EnumString;

use crate::error::StocksError;
use crate::mapper::{self, DateFormat};
use crate::result::Result;
use crate::state::{Role, ValueType};

/// Field list bundled with the crate.
const BUILTIN_DEFINITION: &str = include_str!("../resources/objectlist.json");

/// Declared kind of a quote field.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FieldKind {
    /// Free text, stored as a string.
    #[strum(to_string = "TEXT", serialize = "STRING")]
    Text,
    /// Numeric magnitude, stored as a number without conversion.
    #[strum(serialize = "CURRENCY")]
    Currency,
    /// Unix epoch in seconds, stored as a locale short date.
    #[strum(serialize = "DATE")]
    Date,
    /// Anything else; kept so it can be reported.
    #[strum(default)]
    Unknown(String),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => f.write_str("TEXT"),
            FieldKind::Currency => f.write_str("CURRENCY"),
            FieldKind::Date => f.write_str("DATE"),
            FieldKind::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Converts a raw value into its stored representation, `None` when it cannot.
pub type Coerce = fn(&Value, &DateFormat) -> Option<Value>;

/// Storage metadata and coercion rule attached to a kind.
#[derive(Clone, Copy)]
pub struct KindSpec {
    /// Declared value type of the state object.
    pub value_type: ValueType,
    /// Storage role of the state object.
    pub role: Role,
    /// Coercion applied by the mapper.
    pub coerce: Coerce,
}

impl fmt::Debug for KindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindSpec")
            .field("value_type", &self.value_type)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl FieldKind {
    /// Parses a kind name, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Self {
        FieldKind::from_str(raw.trim()).unwrap_or_else(|_| FieldKind::Unknown(String::from(raw)))
    }

    /// Looks up the metadata and coercion for this kind; `None` for unknown kinds.
    pub fn spec(&self) -> Option<KindSpec> {
        match self {
            FieldKind::Text => Some(KindSpec {
                value_type: ValueType::String,
                role: Role::Value,
                coerce: mapper::pass_through,
            }),
            FieldKind::Currency => Some(KindSpec {
                value_type: ValueType::Number,
                role: Role::Info,
                coerce: mapper::pass_through,
            }),
            FieldKind::Date => Some(KindSpec {
                value_type: ValueType::String,
                role: Role::ValueDate,
                coerce: mapper::epoch_seconds_to_date,
            }),
            FieldKind::Unknown(_) => None,
        }
    }
}

/// One field of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    /// Field name as it appears in quote records.
    pub name: String,
    /// Declared kind.
    pub kind: FieldKind,
}

#[derive(Deserialize)]
struct FieldDefinition {
    #[serde(rename = "type")]
    kind: String,
}

/// Immutable field-name → kind mapping.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entries: Vec<SchemaEntry>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Loads the field list bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DEFINITION)
    }

    /// Loads a definition from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a JSON definition.
    ///
    /// Unknown kinds are accepted and logged; they get blank metadata and are
    /// never mapped.
    pub fn from_json(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| StocksError::Schema(format!("invalid definition JSON: {}", e)))?;
        let Value::Object(fields) = root else {
            return Err(StocksError::Schema(String::from(
                "definition must be a JSON object keyed by field name",
            )));
        };

        let mut entries = Vec::with_capacity(fields.len());
        for (name, definition) in fields {
            let definition: FieldDefinition = serde_json::from_value(definition)
                .map_err(|e| StocksError::Schema(format!("field {}: {}", name, e)))?;
            let kind = FieldKind::parse(definition.kind.as_str());
            if let FieldKind::Unknown(raw) = &kind {
                warn!("{} (field {})", StocksError::UnknownFieldKind(raw.clone()), name);
            }
            entries.push(SchemaEntry { name, kind });
        }
        Ok(Self::from_entries(entries))
    }

    /// Builds a registry from explicit entries. Later duplicates replace earlier ones.
    pub fn from_entries(entries: Vec<SchemaEntry>) -> Self {
        let mut unique: Vec<SchemaEntry> = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        for entry in entries {
            if let Some(&position) = index.get(&entry.name) {
                unique[position] = entry;
                continue;
            }
            index.insert(entry.name.clone(), unique.len());
            unique.push(entry);
        }
        Self {
            entries: unique,
            index,
        }
    }

    /// Returns the entry declared for `field_name`.
    pub fn lookup(&self, field_name: &str) -> Option<&SchemaEntry> {
        self.index.get(field_name).map(|&i| &self.entries[i])
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no field is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
