//! Plugin options
//!
//! Options arrive as loosely typed JSON (from a config file or from code) and
//! are validated into [`ValidatedOptions`]:
//!
//! ```text
//! { "settings": "mysql://user@host/db", "decorate": true }
//! [ { "settings": { "host": "db", "database": "a" }, "decorate": "a" }, ... ]
//! ```
//!
//! A single object is a one-entry list. Every entry accepts only `settings`
//! (URL string or driver option object, defaulting to
//! [`DEFAULT_SETTINGS_URL`]) and `decorate` (`true` or a non-empty name).

use serde_json::{Map, Value};

use super::error::PluginError;
use crate::db::{ConnectionSettings, StructuredSettings, DEFAULT_SETTINGS_URL};

const KNOWN_KEYS: [&str; 2] = ["settings", "decorate"];

/// How one entry asks to be decorated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    /// `decorate: true`, under the default name
    Default,
    /// `decorate: "<name>"`
    Named(String),
}

/// One validated entry
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub settings: ConnectionSettings,
    pub decoration: Option<Decoration>,
}

/// Non-empty, ordered list of entries
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions {
    entries: Vec<ConnectionConfig>,
}

impl ValidatedOptions {
    pub fn entries(&self) -> &[ConnectionConfig] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConnectionConfig> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true once validated
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validate raw plugin options.
pub fn validate(raw: &Value) -> Result<ValidatedOptions, PluginError> {
    let entries = match raw {
        Value::Null => vec![validate_entry(&Map::new(), None)?],
        Value::Object(object) => vec![validate_entry(object, None)?],
        Value::Array(items) => {
            if items.is_empty() {
                return Err(PluginError::validation("value", "must contain at least 1 items"));
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(object) => validate_entry(object, Some(i)),
                    _ => Err(PluginError::validation(format!("[{}]", i), "must be of type object")),
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        _ => {
            return Err(PluginError::validation(
                "value",
                "must be an object or an array of objects",
            ))
        }
    };

    Ok(ValidatedOptions { entries })
}

fn validate_entry(object: &Map<String, Value>, index: Option<usize>) -> Result<ConnectionConfig, PluginError> {
    let field = |key: &str| match index {
        Some(i) => format!("[{}].{}", i, key),
        None => key.to_string(),
    };

    if let Some(unknown) = object.keys().find(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        return Err(PluginError::validation(field(unknown.as_str()), "is not allowed"));
    }

    let settings = match object.get("settings") {
        None => ConnectionSettings::Url(DEFAULT_SETTINGS_URL.to_string()),
        Some(Value::String(url)) if url.is_empty() => {
            return Err(PluginError::validation(field("settings"), "is not allowed to be empty"));
        }
        Some(Value::String(url)) => ConnectionSettings::Url(url.clone()),
        Some(value @ Value::Object(_)) => {
            let structured: StructuredSettings = serde_json::from_value(value.clone()).map_err(|e| {
                PluginError::validation(field("settings"), format!("is not a valid connection object: {}", e))
            })?;
            if structured.connection_limit == Some(0) {
                return Err(PluginError::validation(
                    field("settings.connectionLimit"),
                    "must be greater than 0",
                ));
            }
            ConnectionSettings::Structured(structured)
        }
        Some(_) => {
            return Err(PluginError::validation(
                field("settings"),
                "must be a connection URL string or a connection object",
            ));
        }
    };

    let decoration = match object.get("decorate") {
        None => None,
        Some(Value::Bool(true)) => Some(Decoration::Default),
        Some(Value::String(name)) if name.is_empty() => {
            return Err(PluginError::validation(field("decorate"), "is not allowed to be empty"));
        }
        Some(Value::String(name)) => Some(Decoration::Named(name.clone())),
        Some(_) => {
            return Err(PluginError::validation(
                field("decorate"),
                "must be true or a non-empty string",
            ));
        }
    };

    Ok(ConnectionConfig {
        settings,
        decoration,
    })
}
