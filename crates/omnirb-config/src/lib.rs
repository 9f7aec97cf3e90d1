//! Typed loading and validation for omnibus `gitlab.rb` settings.
//!
//! Loading is a linear pipeline: settings text is parsed into a [`Settings`]
//! tree, override layers are merged in, the LDAP and SAML blocks are
//! validated (every violation is reported at once), and the result is exposed
//! as an immutable [`ResolvedConfig`].

mod error;
mod loader;
mod model;
mod settings;

/// Error types returned by parsing, validation, and accessors.
pub use error::{ConfigError, ConfigurationError, ParseError, ValidationError, Violation};
/// Layered loader types and options.
pub use loader::{
    ConfigLayer, ConfigLayerSource, DEFAULT_SETTINGS_PATH, LayerFormat, LayeredConfig,
    LoadOptions, ValidationMode, validate_settings,
};
/// Typed configuration records.
pub use model::*;
/// Raw parsed settings tree.
pub use settings::{Settings, is_secret_key, redact_secrets};
