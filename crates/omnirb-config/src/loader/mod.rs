//! Layered settings loader: parse, merge, validate, resolve.
//!
//! A load reads the base `gitlab.rb`, applies override layers in order,
//! validates the merged tree (collecting every violation), and produces an
//! immutable `ResolvedConfig`.

mod layer_io;
mod merge;
mod resolve;
mod schema;
mod utils;

#[cfg(test)]
mod tests;

use crate::{ConfigError, ResolvedConfig, Settings, ValidationError};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default settings path for omnibus installs.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/gitlab/gitlab.rb";

/// Effective config plus metadata about which layers were read.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: ResolvedConfig,
    /// Metadata for each layer considered during load.
    pub layers: Vec<ConfigLayer>,
}

/// Origin of a single layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// The base `gitlab.rb`.
    Base,
    /// An override applied after the base, in the order given.
    Override,
}

/// Syntax a layer is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFormat {
    /// The omnibus Ruby subset.
    Settings,
    /// JSON5 (also accepts plain JSON).
    Json5,
}

/// Metadata about a layer, including why it was skipped.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
    pub format: LayerFormat,
    /// Reason the layer was skipped, if it was.
    pub disabled_reason: Option<String>,
}

/// How strictly modelled blocks are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Unknown keys are ignored.
    #[default]
    Lenient,
    /// Unknown keys inside LDAP server entries, the SAML provider, and its
    /// args are violations.
    Strict,
}

/// Options controlling which files are loaded and how they are checked.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Base settings file.
    pub path: PathBuf,
    /// Override layers applied last, lowest precedence first.
    pub override_paths: Vec<PathBuf>,
    pub mode: ValidationMode,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new(DEFAULT_SETTINGS_PATH)
    }
}

impl LoadOptions {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            override_paths: Vec::new(),
            mode: ValidationMode::default(),
        }
    }

    /// Add an override layer that is applied after all earlier ones.
    pub fn with_override(mut self, path: impl AsRef<Path>) -> Self {
        self.override_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Reject unknown keys inside modelled blocks.
    pub fn strict(mut self) -> Self {
        self.mode = ValidationMode::Strict;
        self
    }
}

/// Validate a parsed tree, reporting every violation at once.
pub fn validate_settings(settings: &Settings, mode: ValidationMode) -> Result<(), ValidationError> {
    schema::validate_settings(settings, mode)
}

impl ResolvedConfig {
    /// Load a single settings file (no overrides).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading settings from path: {}", path.as_ref().display());
        let layer = layer_io::load_layer(ConfigLayerSource::Base, path.as_ref())?;
        Self::from_settings(layer.settings, ValidationMode::default())
    }

    /// Load settings from raw text (no overrides).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        Self::load_from_str_with_mode(contents, ValidationMode::default())
    }

    /// Load settings from raw text with an explicit validation mode.
    pub fn load_from_str_with_mode(
        contents: &str,
        mode: ValidationMode,
    ) -> Result<Self, ConfigError> {
        debug!("loading settings from raw contents (len={})", contents.len());
        let settings =
            Settings::parse(contents).map_err(|err| ConfigError::parse("settings", err))?;
        Self::from_settings(settings, mode)
    }

    /// Validate a parsed tree and resolve it into typed records.
    pub fn from_settings(settings: Settings, mode: ValidationMode) -> Result<Self, ConfigError> {
        schema::validate_settings(&settings, mode)?;
        resolve::resolve(settings)
    }

    /// Load the base file plus override layers.
    ///
    /// Overrides are deep-merged in order: hash keys merge recursively and any
    /// other value replaces what came before. A path listed twice is applied
    /// once, at its first position.
    pub fn load_layered(options: LoadOptions) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered settings (base={}, overrides={})",
            options.path.display(),
            options.override_paths.len()
        );
        let mut layers = Vec::new();
        let mut seen_paths = HashSet::new();

        let base = layer_io::load_layer(ConfigLayerSource::Base, &options.path)?;
        seen_paths.insert(utils::unique_path(&options.path));
        layers.push(base.meta.clone());
        let mut merged = base.settings;

        for path in &options.override_paths {
            if !seen_paths.insert(utils::unique_path(path)) {
                warn!("skipping duplicate layer (path={})", path.display());
                layers.push(ConfigLayer {
                    source: ConfigLayerSource::Override,
                    path: path.clone(),
                    format: layer_io::detect_format(path),
                    disabled_reason: Some("duplicate of an earlier layer".to_string()),
                });
                continue;
            }
            let layer = layer_io::load_layer(ConfigLayerSource::Override, path)?;
            debug!("merging override layer (path={})", path.display());
            merge::merge_maps(merged.root_mut(), layer.settings.as_map());
            layers.push(layer.meta);
        }

        let config = Self::from_settings(merged, options.mode)?;
        info!("layered settings loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }
}

/// Internal representation of a loaded layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    settings: Settings,
}
