//! Error types for settings parsing, validation, and access.

use std::fmt;
use thiserror::Error;

/// Malformed settings syntax, positioned at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// Human-readable description.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// A single missing or malformed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the field, e.g. `gitlab_rails.ldap_servers.main.port`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Paths of all violations, in report order.
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid setting(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  {violation}")?;
        }
        Ok(())
    }
}

/// Errors returned by accessors on a resolved config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The feature block exists in the schema but its toggle is off.
    #[error("feature `{0}` is disabled")]
    FeatureDisabled(&'static str),
    /// The requested value was never set.
    #[error("`{0}` is not configured")]
    NotConfigured(&'static str),
}

/// Errors returned while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a settings file failed.
    #[error("failed to read settings: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A settings file has malformed syntax.
    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: ParseError,
    },
    /// A JSON5 override layer has malformed syntax.
    #[error("failed to parse override: {0}")]
    OverrideParseFailed(#[from] json5::Error),
    /// Converting validated values into typed records failed.
    #[error("failed to decode settings: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// One or more fields failed validation.
    #[error("invalid settings: {0}")]
    Validation(#[from] ValidationError),
    /// An accessor was used on a feature that is off or absent.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Generic structural failure.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn parse(origin: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            origin: origin.into(),
            source,
        }
    }

    /// Violations carried by a validation failure, empty otherwise.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(err) => &err.violations,
            _ => &[],
        }
    }
}

