//! Raw settings tree parsed from omnibus `gitlab.rb` text.
//!
//! The syntax is the declarative subset of Ruby used by omnibus files:
//! indexed assignments (`gitlab_rails['ldap_enabled'] = true`), the call form
//! (`external_url 'http://gitlab.example.com'`), and string, symbol, number,
//! boolean, `nil`, array, and hash literals. Values are stored as JSON values
//! so they can be merged and decoded with serde.

mod lexer;
mod parser;

#[cfg(test)]
mod tests;

use crate::{ConfigError, ParseError, REDACTED};
use lexer::Lexer;
use log::debug;
use parser::Parser;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Parsed settings keyed by nested path.
///
/// `Debug` output masks password values; see [`redact_secrets`].
#[derive(Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    root: Map<String, Value>,
}

impl Settings {
    /// Parse settings text into a tree.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        debug!("parsing settings (len={})", input.len());
        let tokens = Lexer::new(input).lex()?;
        let root = Parser::new(input, tokens).parse_document()?;
        debug!("parsed settings (sections={})", root.len());
        Ok(Self { root })
    }

    /// Wrap an existing JSON value; the value must be an object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ConfigError::Invalid(format!(
                "settings root must be a hash, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Look up a value by dotted path; `[n]` selects an array element.
    ///
    /// `gitlab_rails.omniauth_providers[0].args.issuer` walks the hash keys
    /// `gitlab_rails` and `omniauth_providers`, takes the first element, then
    /// continues through `args` and `issuer`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let (key, indices) = split_indices(first)?;
        let mut current = index_into(self.root.get(key)?, &indices)?;
        for segment in segments {
            let (key, indices) = split_indices(segment)?;
            current = index_into(current.as_object()?.get(key)?, &indices)?;
        }
        Some(current)
    }

    /// Top-level hash for a section such as `gitlab_rails`.
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.root.get(name).and_then(Value::as_object)
    }

    /// Borrow the root map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Clone the tree as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Clone the tree with every password value masked.
    pub fn redacted(&self) -> Value {
        let mut value = self.to_value();
        redact_secrets(&mut value);
        value
    }

    pub(crate) fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("root", &self.redacted())
            .finish()
    }
}

/// Replace the value of every hash key naming a password with `[REDACTED]`,
/// at any depth.
pub fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_secret_key(key) {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    redact_secrets(entry);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

/// Whether a settings key holds a password, e.g. `initial_root_password`.
pub fn is_secret_key(key: &str) -> bool {
    key.to_ascii_lowercase().contains("password")
}

/// Split `name[0][1]` into the key and its array indices.
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let key = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].trim().parse().ok()?);
        rest = &inner[close + 1..];
    }
    Some((key, indices))
}

fn index_into<'v>(mut value: &'v Value, indices: &[usize]) -> Option<&'v Value> {
    for idx in indices {
        value = value.as_array()?.get(*idx)?;
    }
    Some(value)
}

/// Human-readable JSON kind for diagnostics.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "hash",
    }
}
