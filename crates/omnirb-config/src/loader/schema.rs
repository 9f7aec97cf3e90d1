//! Schema validation for the LDAP and SAML blocks of a settings tree.
//!
//! Validation never stops at the first problem: every missing or malformed
//! field is recorded with its dotted path and returned together.

use super::ValidationMode;
use crate::settings::kind_of;
use crate::{CertFingerprint, LdapEncryption, Settings, ValidationError, Violation};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;
use url::Url;

/// Section holding the Rails application settings.
pub(super) const RAILS_SECTION: &str = "gitlab_rails";

/// Required fields of an LDAP server entry, in report order.
const LDAP_SERVER_FIELDS: [&str; 10] = [
    "label",
    "host",
    "port",
    "uid",
    "bind_dn",
    "password",
    "encryption",
    "base",
    "group_base",
    "timeout",
];

/// Required args of the SAML provider, in report order.
const SAML_ARG_FIELDS: [&str; 5] = [
    "assertion_consumer_service_url",
    "idp_cert_fingerprint",
    "idp_sso_target_url",
    "issuer",
    "name_identifier_format",
];

/// Boolean keys of `gitlab_rails` that are type-checked when present.
const RAILS_BOOL_KEYS: [&str; 5] = [
    "ldap_enabled",
    "prevent_ldap_sign_in",
    "omniauth_enabled",
    "omniauth_block_auto_created_users",
    "omniauth_auto_link_saml_user",
];

/// Accumulates violations for one validation pass.
struct Report {
    mode: ValidationMode,
    violations: Vec<Violation>,
}

impl Report {
    fn push(&mut self, path: &str, message: impl Into<String>) {
        let path = if path.is_empty() { "root" } else { path };
        self.violations.push(Violation {
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a whole settings tree.
pub(super) fn validate_settings(
    settings: &Settings,
    mode: ValidationMode,
) -> Result<(), ValidationError> {
    let mut report = Report {
        mode,
        violations: Vec::new(),
    };
    let root = settings.as_map();

    if let Some(value) = root.get("external_url") {
        expect_http_url(&mut report, value, "external_url");
    }
    for (section, value) in root {
        if let Some(enable) = value.as_object().and_then(|map| map.get("enable")) {
            expect_bool(&mut report, enable, &join_path(section, "enable"));
        }
    }
    if let Some(value) = root.get(RAILS_SECTION) {
        if let Some(rails) = expect_object(&mut report, value, RAILS_SECTION) {
            validate_rails(&mut report, rails);
        }
    }

    if report.violations.is_empty() {
        Ok(())
    } else {
        debug!("settings failed validation (violations={})", report.violations.len());
        Err(ValidationError {
            violations: report.violations,
        })
    }
}

/// Validate the `gitlab_rails` section.
fn validate_rails(report: &mut Report, rails: &Map<String, Value>) {
    if let Some(value) = rails.get("initial_root_password") {
        expect_non_empty_string(report, value, &rails_path("initial_root_password"));
    }
    if let Some(value) = rails.get("initial_license_file") {
        expect_non_empty_string(report, value, &rails_path("initial_license_file"));
    }
    for key in RAILS_BOOL_KEYS {
        if let Some(value) = rails.get(key) {
            expect_bool(report, value, &rails_path(key));
        }
    }
    let single_sign_on = rails
        .get("omniauth_allow_single_sign_on")
        .and_then(|value| {
            validate_string_array(report, value, &rails_path("omniauth_allow_single_sign_on"))
        });

    if toggle(rails, "ldap_enabled") {
        validate_ldap_servers(report, rails);
    } else {
        debug!("ldap disabled; skipping ldap_servers validation");
    }

    if toggle(rails, "omniauth_enabled") {
        let providers = validate_omniauth_providers(report, rails);
        for name in single_sign_on.unwrap_or_default() {
            if !providers.contains(name) {
                warn!("omniauth_allow_single_sign_on names unknown provider `{name}`");
            }
        }
    } else {
        debug!("omniauth disabled; skipping omniauth_providers validation");
    }
}

/// Validate `ldap_servers`: exactly one fully populated entry.
fn validate_ldap_servers(report: &mut Report, rails: &Map<String, Value>) {
    let path = rails_path("ldap_servers");
    let Some(value) = require(report, rails, "ldap_servers", &path) else {
        return;
    };
    let Some(servers) = expect_object(report, value, &path) else {
        return;
    };
    if servers.len() != 1 {
        report.push(
            &path,
            format!(
                "expected exactly one server entry, found {}",
                servers.len()
            ),
        );
    }
    for (name, entry) in servers {
        validate_ldap_server(report, entry, &join_path(&path, name));
    }
}

/// Validate a single LDAP server entry.
fn validate_ldap_server(report: &mut Report, value: &Value, path: &str) {
    let Some(map) = expect_object(report, value, path) else {
        return;
    };
    ensure_allowed_keys(report, map, &LDAP_SERVER_FIELDS, path);

    for field in LDAP_SERVER_FIELDS {
        let field_path = join_path(path, field);
        let Some(value) = require(report, map, field, &field_path) else {
            continue;
        };
        match field {
            "port" => {
                if let Some(port) = expect_integer(report, value, &field_path) {
                    if !(1..=i64::from(u16::MAX)).contains(&port) {
                        report.push(&field_path, "port must be between 1 and 65535");
                    }
                }
            }
            "timeout" => {
                if let Some(timeout) = expect_integer(report, value, &field_path) {
                    if timeout < 1 {
                        report.push(&field_path, "timeout must be a positive number of seconds");
                    }
                }
            }
            "encryption" => {
                if let Some(mode) = expect_string(report, value, &field_path) {
                    if LdapEncryption::parse(mode).is_none() {
                        report.push(
                            &field_path,
                            format!(
                                "invalid encryption `{mode}`, expected one of {}",
                                LdapEncryption::NAMES.join(", ")
                            ),
                        );
                    }
                }
            }
            _ => {
                expect_non_empty_string(report, value, &field_path);
            }
        }
    }
}

/// Validate `omniauth_providers` and return the declared provider names.
fn validate_omniauth_providers<'a>(
    report: &mut Report,
    rails: &'a Map<String, Value>,
) -> HashSet<&'a str> {
    let path = rails_path("omniauth_providers");
    let mut names = HashSet::new();
    let Some(value) = rails.get("omniauth_providers") else {
        debug!("omniauth enabled without providers");
        return names;
    };
    let Some(providers) = expect_array(report, value, &path) else {
        return names;
    };
    for (idx, entry) in providers.iter().enumerate() {
        let entry_path = format!("{path}[{idx}]");
        let Some(map) = expect_object(report, entry, &entry_path) else {
            continue;
        };
        let name_path = join_path(&entry_path, "name");
        let Some(name) = require(report, map, "name", &name_path)
            .and_then(|value| expect_non_empty_string(report, value, &name_path))
        else {
            continue;
        };
        if !names.insert(name) {
            report.push(&name_path, format!("duplicate provider `{name}`"));
            continue;
        }
        if name == "saml" {
            validate_saml_provider(report, map, &entry_path);
        }
    }
    names
}

/// Validate the `saml` provider entry and its args.
fn validate_saml_provider(report: &mut Report, map: &Map<String, Value>, path: &str) {
    ensure_allowed_keys(report, map, &["name", "label", "args"], path);

    let label_path = join_path(path, "label");
    if let Some(value) = require(report, map, "label", &label_path) {
        expect_non_empty_string(report, value, &label_path);
    }

    let args_path = join_path(path, "args");
    let Some(args) = require(report, map, "args", &args_path)
        .and_then(|value| expect_object(report, value, &args_path))
    else {
        return;
    };
    ensure_allowed_keys(report, args, &SAML_ARG_FIELDS, &args_path);

    for field in SAML_ARG_FIELDS {
        let field_path = join_path(&args_path, field);
        let Some(value) = require(report, args, field, &field_path)
            .and_then(|value| expect_non_empty_string(report, value, &field_path))
        else {
            continue;
        };
        match field {
            "assertion_consumer_service_url" | "idp_sso_target_url" => {
                if !is_http_url(value) {
                    report.push(&field_path, "expected an absolute http(s) URL");
                }
            }
            "idp_cert_fingerprint" => {
                if CertFingerprint::parse(value).is_none() {
                    report.push(
                        &field_path,
                        "expected 20 or 32 colon-separated hex bytes",
                    );
                }
            }
            _ => {
                if Url::parse(value).is_err() {
                    report.push(&field_path, "expected an absolute URI");
                }
            }
        }
    }
}

/// Whether a `gitlab_rails` toggle is set to `true`; absent means off.
pub(super) fn toggle(rails: &Map<String, Value>, key: &str) -> bool {
    matches!(rails.get(key), Some(Value::Bool(true)))
}

/// Fetch a required key; `nil` counts as missing.
fn require<'a>(
    report: &mut Report,
    map: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Option<&'a Value> {
    match map.get(key) {
        Some(Value::Null) | None => {
            report.push(path, "missing required field");
            None
        }
        Some(value) => Some(value),
    }
}

fn expect_object<'a>(
    report: &mut Report,
    value: &'a Value,
    path: &str,
) -> Option<&'a Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        other => {
            report.push(path, format!("expected hash, found {}", kind_of(other)));
            None
        }
    }
}

fn expect_array<'a>(report: &mut Report, value: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        other => {
            report.push(path, format!("expected array, found {}", kind_of(other)));
            None
        }
    }
}

fn expect_string<'a>(report: &mut Report, value: &'a Value, path: &str) -> Option<&'a str> {
    match value {
        Value::String(text) => Some(text),
        other => {
            report.push(path, format!("expected string, found {}", kind_of(other)));
            None
        }
    }
}

fn expect_non_empty_string<'a>(
    report: &mut Report,
    value: &'a Value,
    path: &str,
) -> Option<&'a str> {
    let text = expect_string(report, value, path)?;
    if text.trim().is_empty() {
        report.push(path, "must not be empty");
        return None;
    }
    Some(text)
}

fn expect_bool(report: &mut Report, value: &Value, path: &str) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        other => {
            report.push(path, format!("expected bool, found {}", kind_of(other)));
            None
        }
    }
}

fn expect_integer(report: &mut Report, value: &Value, path: &str) -> Option<i64> {
    match value.as_i64() {
        Some(number) => Some(number),
        None if value.is_u64() => {
            report.push(path, "integer out of range");
            None
        }
        None => {
            report.push(path, format!("expected integer, found {}", kind_of(value)));
            None
        }
    }
}

fn expect_http_url(report: &mut Report, value: &Value, path: &str) {
    if let Some(text) = expect_non_empty_string(report, value, path) {
        if !is_http_url(text) {
            report.push(path, "expected an absolute http(s) URL");
        }
    }
}

/// Validate that a value is an array of strings.
fn validate_string_array<'a>(
    report: &mut Report,
    value: &'a Value,
    path: &str,
) -> Option<Vec<&'a str>> {
    let items = expect_array(report, value, path)?;
    let mut strings = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        if let Some(text) = expect_string(report, item, &format!("{path}[{idx}]")) {
            strings.push(text);
        }
    }
    Some(strings)
}

/// In strict mode, flag keys outside the modelled set.
fn ensure_allowed_keys(report: &mut Report, map: &Map<String, Value>, allowed: &[&str], path: &str) {
    if report.mode != ValidationMode::Strict {
        return;
    }
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            report.push(&join_path(path, key), "unknown key");
        }
    }
}

fn is_http_url(text: &str) -> bool {
    Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

fn rails_path(key: &str) -> String {
    join_path(RAILS_SECTION, key)
}

/// Join nested paths for error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
