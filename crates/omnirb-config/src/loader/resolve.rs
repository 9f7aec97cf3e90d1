//! Turn a validated settings tree into typed records.

use super::schema::{RAILS_SECTION, toggle};
use crate::{
    CertFingerprint, ConfigError, FeatureToggles, LdapServerConfig, LdapSettings,
    OmniauthSettings, ResolvedConfig, RootCredential, SamlProviderConfig, Settings,
};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Suffix marking boolean feature toggles inside `gitlab_rails`.
const TOGGLE_SUFFIX: &str = "_enabled";

/// Args of the `saml` provider as written in settings.
#[derive(Debug, Deserialize)]
struct SamlArgs {
    assertion_consumer_service_url: String,
    idp_cert_fingerprint: String,
    idp_sso_target_url: String,
    issuer: String,
    name_identifier_format: String,
}

/// Build a `ResolvedConfig`; the tree must already be validated.
pub(super) fn resolve(settings: Settings) -> Result<ResolvedConfig, ConfigError> {
    let empty = Map::new();
    let rails = settings.section(RAILS_SECTION).unwrap_or(&empty);

    let feature_toggles = collect_toggles(&settings, rails);
    let ldap = if toggle(rails, "ldap_enabled") {
        Some(resolve_ldap(rails)?)
    } else {
        None
    };
    let omniauth = if toggle(rails, "omniauth_enabled") {
        Some(resolve_omniauth(rails)?)
    } else {
        None
    };

    let external_url = settings
        .get("external_url")
        .and_then(Value::as_str)
        .map(str::to_string);
    let root_credential = string_at(rails, "initial_root_password").map(RootCredential::new);
    let initial_license_file = string_at(rails, "initial_license_file").map(PathBuf::from);

    let config = ResolvedConfig {
        external_url,
        root_credential,
        initial_license_file,
        feature_toggles,
        ldap,
        omniauth,
        settings,
    };
    debug!(
        "resolved settings (toggles={}, ldap={}, omniauth={})",
        config.feature_toggles.len(),
        config.ldap.is_some(),
        config.omniauth.is_some()
    );
    Ok(config)
}

/// Collect `<section>['enable']` and `gitlab_rails['<name>_enabled']` flags.
fn collect_toggles(settings: &Settings, rails: &Map<String, Value>) -> FeatureToggles {
    let mut toggles = FeatureToggles::default();
    for (section, value) in settings.as_map() {
        if let Some(Value::Bool(enabled)) = value.as_object().and_then(|map| map.get("enable")) {
            toggles.insert(section.as_str(), *enabled);
        }
    }
    for (key, value) in rails {
        if let (Some(name), Value::Bool(enabled)) = (key.strip_suffix(TOGGLE_SUFFIX), value) {
            if !name.is_empty() {
                toggles.insert(name, *enabled);
            }
        }
    }
    for name in ["ldap", "omniauth"] {
        if toggles.get(name).is_none() {
            toggles.insert(name, false);
        }
    }
    toggles
}

fn resolve_ldap(rails: &Map<String, Value>) -> Result<LdapSettings, ConfigError> {
    let (name, entry) = rails
        .get("ldap_servers")
        .and_then(Value::as_object)
        .and_then(|servers| servers.iter().next())
        .ok_or_else(|| ConfigError::Invalid("ldap enabled without a server entry".to_string()))?;
    let mut server: LdapServerConfig = serde_json::from_value(entry.clone())?;
    server.name = name.clone();
    Ok(LdapSettings {
        prevent_sign_in: bool_at(rails, "prevent_ldap_sign_in").unwrap_or(false),
        server,
    })
}

fn resolve_omniauth(rails: &Map<String, Value>) -> Result<OmniauthSettings, ConfigError> {
    let allow_single_sign_on = match rails.get("omniauth_allow_single_sign_on") {
        Some(value) => serde_json::from_value(value.clone())?,
        None => Vec::new(),
    };
    let entries = rails
        .get("omniauth_providers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut providers = Vec::with_capacity(entries.len());
    let mut saml = None;
    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        providers.push(name.to_string());
        if name == "saml" {
            saml = Some(resolve_saml(entry)?);
        }
    }

    Ok(OmniauthSettings {
        allow_single_sign_on,
        block_auto_created_users: bool_at(rails, "omniauth_block_auto_created_users")
            .unwrap_or(true),
        auto_link_saml_user: bool_at(rails, "omniauth_auto_link_saml_user").unwrap_or(false),
        providers,
        saml,
    })
}

fn resolve_saml(entry: &Value) -> Result<SamlProviderConfig, ConfigError> {
    let args_value = entry.get("args").cloned().unwrap_or(Value::Null);
    let args: SamlArgs = serde_json::from_value(args_value)?;
    let idp_cert_fingerprint = CertFingerprint::parse(&args.idp_cert_fingerprint)
        .ok_or_else(|| ConfigError::Invalid("malformed idp_cert_fingerprint".to_string()))?;
    Ok(SamlProviderConfig {
        label: entry
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        assertion_consumer_service_url: args.assertion_consumer_service_url,
        idp_cert_fingerprint,
        idp_sso_target_url: args.idp_sso_target_url,
        issuer: args.issuer,
        name_identifier_format: args.name_identifier_format,
    })
}

fn string_at<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn bool_at(map: &Map<String, Value>, key: &str) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}
