//! Schema-driven coercion of quote records.
//!
//! Every schema field present in a record with a non-null value is converted
//! by the coercion attached to its kind. Absent and `null` fields are left out
//! of the result entirely, so a field that stops being reported keeps whatever
//! value the store already holds.
use std::env;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Locale};
use log::{debug, warn};
use serde_json::Value;

use crate::error::StocksError;
use crate::fetcher::QuoteRecord;
use crate::result::Result;
use crate::schema::{FieldKind, SchemaRegistry};
use crate::state::Role;
use crate::symbols::Symbol;

/// Record field identifying the quote's symbol.
pub const SYMBOL_FIELD: &str = "symbol";

/// Environment variables consulted for the date locale, most specific first.
const LOCALE_VARIABLES: [&str; 3] = ["LC_ALL", "LC_TIME", "LANG"];

/// The locale's short date representation.
const SHORT_DATE: &str = "%x";

/// Locale-aware short date rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormat {
    locale: Locale,
}

impl Default for DateFormat {
    fn default() -> Self {
        Self::new(Locale::POSIX)
    }
}

impl DateFormat {
    /// Renders dates with `locale`'s short date format.
    ///
    /// Locales whose short date uses directives chrono cannot render (e.g.
    /// the era years of `th_TH`) fall back to `POSIX`.
    pub fn new(locale: Locale) -> Self {
        if renders_short_date(locale) {
            Self { locale }
        } else {
            warn!("Short dates of {} cannot be rendered, using POSIX", locale);
            Self {
                locale: Locale::POSIX,
            }
        }
    }

    /// Resolves a POSIX locale name such as `de_DE.UTF-8` or `C`.
    pub fn from_locale_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if name == "C" || name.starts_with("C.") || name == "POSIX" {
            return Some(Self::new(Locale::POSIX));
        }

        let (head, modifier) = match name.split_once('@') {
            Some((head, modifier)) => (head, Some(modifier)),
            None => (name, None),
        };
        let language = head.split('.').next().unwrap_or(head);
        let with_modifier = modifier.map(|m| format!("{}@{}", language, m));

        with_modifier
            .as_deref()
            .and_then(|candidate| Locale::try_from(candidate).ok())
            .or_else(|| Locale::try_from(language).ok())
            .filter(|&locale| renders_short_date(locale))
            .map(Self::new)
    }

    /// Uses the process locale (`LC_ALL`, `LC_TIME`, `LANG`), falling back to `POSIX`.
    pub fn from_env() -> Self {
        for variable in LOCALE_VARIABLES {
            let Ok(value) = env::var(variable) else {
                continue;
            };
            if let Some(format) = Self::from_locale_name(&value) {
                return format;
            }
            if !value.trim().is_empty() {
                debug!("Ignoring unsupported locale {}={}", variable, value);
            }
        }
        Self::default()
    }

    /// Locale in use.
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Formats a Unix timestamp (seconds) as a local short date.
    pub fn format_epoch_seconds(&self, seconds: i64) -> Option<String> {
        let local = DateTime::from_timestamp(seconds, 0)?.with_timezone(&Local);
        let mut rendered = String::new();
        write!(rendered, "{}", local.format_localized(SHORT_DATE, self.locale)).ok()?;
        Some(rendered)
    }
}

fn renders_short_date(locale: Locale) -> bool {
    StrftimeItems::new_with_locale(SHORT_DATE, locale)
        .all(|item| !matches!(item, Item::Error))
}

/// Coercion for TEXT and CURRENCY fields: the raw value is stored unchanged.
pub fn pass_through(raw: &Value, _format: &DateFormat) -> Option<Value> {
    Some(raw.clone())
}

/// Coercion for DATE fields: epoch seconds (number or numeric text) to a short date.
pub fn epoch_seconds_to_date(raw: &Value, format: &DateFormat) -> Option<Value> {
    let seconds = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }?;
    format.format_epoch_seconds(seconds).map(Value::String)
}

/// A value ready to be written, with the role of its target object.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedValue {
    /// Stored value.
    pub value: Value,
    /// Role of the field's state object.
    pub role: Role,
}

/// Coerced fields of one record, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedQuote {
    /// Symbol the record belongs to.
    pub symbol: Symbol,
    /// `(field name, value)` pairs; absent fields are omitted.
    pub fields: Vec<(String, CoercedValue)>,
}

/// Applies a `SchemaRegistry` to quote records.
#[derive(Debug, Clone, Copy)]
pub struct ResponseMapper<'a> {
    registry: &'a SchemaRegistry,
    date_format: DateFormat,
}

impl<'a> ResponseMapper<'a> {
    /// Creates a mapper over `registry`.
    pub fn new(registry: &'a SchemaRegistry, date_format: DateFormat) -> Self {
        Self {
            registry,
            date_format,
        }
    }

    /// Coerces every declared field present in `record`.
    ///
    /// Fails with `MissingSymbol` when the record has no usable `symbol`.
    pub fn map(&self, record: &QuoteRecord) -> Result<MappedQuote> {
        let symbol = record_symbol(record).ok_or(StocksError::MissingSymbol)?;
        let mut fields = Vec::new();

        for entry in self.registry.entries() {
            let raw = match record.get(&entry.name) {
                Some(Value::Null) | None => {
                    debug!("Value not exists: {} ({})", entry.name, symbol);
                    continue;
                }
                Some(raw) => raw,
            };

            let Some(spec) = entry.kind.spec() else {
                if let FieldKind::Unknown(kind) = &entry.kind {
                    debug!(
                        "{}; skipping {} for {}",
                        StocksError::UnknownFieldKind(kind.clone()),
                        entry.name,
                        symbol
                    );
                }
                continue;
            };

            match (spec.coerce)(raw, &self.date_format) {
                Some(value) => {
                    debug!(
                        "Property: {} State: {} Symbol: {} Value: {}",
                        entry.name, value, symbol, raw
                    );
                    fields.push((
                        entry.name.clone(),
                        CoercedValue {
                            value,
                            role: spec.role,
                        },
                    ));
                }
                None => warn!(
                    "Cannot convert {} of {} to {}: {}",
                    entry.name, symbol, entry.kind, raw
                ),
            }
        }

        Ok(MappedQuote { symbol, fields })
    }
}

/// Reads the identifying symbol; empty text and non-scalar values do not count.
fn record_symbol(record: &QuoteRecord) -> Option<Symbol> {
    match record.get(SYMBOL_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(Symbol::new(s)),
        Value::Number(n) => Some(Symbol::new(&n.to_string())),
        _ => None,
    }
}
