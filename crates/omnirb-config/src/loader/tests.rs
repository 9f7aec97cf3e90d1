//! Tests for layered settings loading.

use super::*;
use crate::{ConfigurationError, LdapEncryption};
use omnirb_test_utils::{
    DEV_SETTINGS, LdapServerFixture, SamlProviderFixture, SettingsFixture, write_settings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn load_from_path_reads_base_file() {
    let temp = TempDir::new().expect("tmp");
    let path = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);

    let config = ResolvedConfig::load_from_path(&path).expect("config");
    assert_eq!(config.ldap_server().expect("ldap").port, 389);
    assert_eq!(
        config.external_url(),
        Some("http://gitlab.example.com")
    );
}

#[test]
fn missing_base_file_is_a_read_error() {
    let temp = TempDir::new().expect("tmp");
    let err = ResolvedConfig::load_from_path(temp.path().join("absent.rb")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

#[test]
fn settings_override_layer_wins() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let local = write_settings(
        temp.path(),
        "local.rb",
        "gitlab_rails['ldap_servers']['ldap_main']['port'] = 636\n\
         gitlab_rails['ldap_servers']['ldap_main']['encryption'] = 'simple_tls'\n",
    );

    let layered =
        ResolvedConfig::load_layered(LoadOptions::new(&base).with_override(&local)).expect("load");
    let server = layered.config.ldap_server().expect("ldap");
    assert_eq!(server.port, 636);
    assert_eq!(server.encryption, LdapEncryption::SimpleTls);
    assert_eq!(server.host, "localhost");
    assert_eq!(layered.layers.len(), 2);
    assert_eq!(layered.layers[1].source, ConfigLayerSource::Override);
    assert_eq!(layered.layers[1].format, LayerFormat::Settings);
}

#[test]
fn json5_override_can_disable_a_feature() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let ci = write_settings(
        temp.path(),
        "ci.json5",
        "{ gitlab_rails: { omniauth_enabled: false }, registry: { enable: true } }",
    );

    let layered =
        ResolvedConfig::load_layered(LoadOptions::new(&base).with_override(&ci)).expect("load");
    assert_eq!(layered.layers[1].format, LayerFormat::Json5);
    assert!(layered.config.is_enabled("registry"));
    assert_eq!(
        layered.config.saml().unwrap_err(),
        ConfigurationError::FeatureDisabled("omniauth")
    );
}

#[test]
fn later_overrides_take_precedence() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let first = write_settings(temp.path(), "a.rb", "gitlab_rails['ldap_servers']['ldap_main']['timeout'] = 5");
    let second = write_settings(temp.path(), "b.json", r#"{"gitlab_rails": {"ldap_servers": {"ldap_main": {"timeout": 30}}}}"#);

    let options = LoadOptions::new(&base)
        .with_override(&first)
        .with_override(&second);
    let layered = ResolvedConfig::load_layered(options).expect("load");
    assert_eq!(layered.config.ldap_server().expect("ldap").timeout, 30);
}

#[test]
fn duplicate_override_is_applied_once() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let local = write_settings(temp.path(), "local.rb", "registry['enable'] = true");

    let options = LoadOptions::new(&base)
        .with_override(&local)
        .with_override(&local);
    let layered = ResolvedConfig::load_layered(options).expect("load");
    assert_eq!(layered.layers.len(), 3);
    assert!(layered.layers[1].disabled_reason.is_none());
    assert_eq!(
        layered.layers[2].disabled_reason.as_deref(),
        Some("duplicate of an earlier layer")
    );
}

#[test]
fn override_can_break_validation() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let broken = write_settings(
        temp.path(),
        "broken.rb",
        "gitlab_rails['ldap_servers']['ldap_main']['port'] = 70000",
    );

    let err = ResolvedConfig::load_layered(LoadOptions::new(&base).with_override(&broken))
        .unwrap_err();
    let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
    assert_eq!(paths, vec!["gitlab_rails.ldap_servers.ldap_main.port"]);
}

#[test]
fn parse_error_in_override_names_the_layer() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let broken = write_settings(temp.path(), "broken.rb", "registry['enable'] = ");

    let err = ResolvedConfig::load_layered(LoadOptions::new(&base).with_override(&broken))
        .unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("override("), "{msg}");
    assert!(msg.contains("line 1"), "{msg}");
}

#[test]
fn json5_override_must_be_a_hash() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let list = write_settings(temp.path(), "list.json5", "[1, 2]");

    let err = ResolvedConfig::load_layered(LoadOptions::new(&base).with_override(&list))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn strict_mode_flags_unknown_keys_in_modelled_blocks() {
    let text = SettingsFixture::new()
        .ldap(LdapServerFixture::default().with("verify_certificates", "true"))
        .saml(SamlProviderFixture::default().with("attribute_statements", "{}"))
        .render();

    assert!(ResolvedConfig::load_from_str(&text).is_ok());

    let err = ResolvedConfig::load_from_str_with_mode(&text, ValidationMode::Strict).unwrap_err();
    let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "gitlab_rails.ldap_servers.ldap_main.verify_certificates",
            "gitlab_rails.omniauth_providers[0].args.attribute_statements",
        ]
    );
}

#[test]
fn default_options_point_at_omnibus_path() {
    let options = LoadOptions::default();
    assert_eq!(options.path, PathBuf::from(DEFAULT_SETTINGS_PATH));
    assert_eq!(options.mode, ValidationMode::Lenient);
    assert!(options.override_paths.is_empty());
    assert_eq!(LoadOptions::new("x.rb").strict().mode, ValidationMode::Strict);
}

#[test]
fn resolved_settings_keep_the_merged_tree() {
    let config = ResolvedConfig::load_from_str(DEV_SETTINGS).expect("config");
    assert_eq!(
        config.settings().get("gitlab_rails.ldap_servers.ldap_main.bind_dn"),
        Some(&json!("cn=admin,dc=example,dc=org"))
    );
}

#[test]
fn merge_replaces_scalars_and_arrays_but_merges_hashes() {
    let mut base = json!({ "a": { "x": 1, "list": [1, 2] }, "b": true });
    let overlay = json!({ "a": { "y": 2, "list": [3] }, "b": { "now": "hash" } });
    merge::merge_values(&mut base, &overlay);
    assert_eq!(
        base,
        json!({ "a": { "x": 1, "y": 2, "list": [3] }, "b": { "now": "hash" } })
    );
}

#[test]
fn layered_debug_masks_passwords() {
    let temp = TempDir::new().expect("tmp");
    let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
    let local = write_settings(
        temp.path(),
        "local.json5",
        "{ gitlab_rails: { ldap_servers: { ldap_main: { password: 'rotated-bind-pw' } } } }",
    );

    let layered =
        ResolvedConfig::load_layered(LoadOptions::new(&base).with_override(&local)).expect("load");
    assert_eq!(layered.config.ldap_server().expect("ldap").password.expose(), "rotated-bind-pw");
    let debug = format!("{layered:?}");
    assert!(!debug.contains("rotated-bind-pw"), "{debug}");
    assert!(!debug.contains("s3cret-Root-Pass"), "{debug}");
}
