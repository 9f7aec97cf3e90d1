//! IO helpers for reading settings layers from disk.

use super::{ConfigLayer, ConfigLayerSource, LayerFormat, LoadedLayer};
use crate::{ConfigError, Settings};
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Read and parse one layer; the file must exist.
pub(super) fn load_layer(source: ConfigLayerSource, path: &Path) -> Result<LoadedLayer, ConfigError> {
    let format = detect_format(path);
    debug!(
        "loading settings layer (source={:?}, format={:?}, path={})",
        source,
        format,
        path.display()
    );
    let contents = fs::read_to_string(path)?;
    let settings = match format {
        LayerFormat::Settings => Settings::parse(&contents)
            .map_err(|err| ConfigError::parse(layer_label(source, path), err))?,
        LayerFormat::Json5 => {
            let value: Value = json5::from_str(&contents)?;
            Settings::from_value(value)?
        }
    };
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: path.to_path_buf(),
            format,
            disabled_reason: None,
        },
        settings,
    })
}

/// `.json5` and `.json` layers are JSON5; everything else is settings syntax.
pub(super) fn detect_format(path: &Path) -> LayerFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json5") || ext.eq_ignore_ascii_case("json") => {
            LayerFormat::Json5
        }
        _ => LayerFormat::Settings,
    }
}

/// Build a user-friendly label for parse errors.
pub(super) fn layer_label(source: ConfigLayerSource, path: &Path) -> String {
    let name = match source {
        ConfigLayerSource::Base => "base",
        ConfigLayerSource::Override => "override",
    };
    format!("{name}({})", path.display())
}
