//! Tests for the settings parser.

use super::*;
use omnirb_test_utils::DEV_SETTINGS;
use pretty_assertions::assert_eq;
use serde_json::json;

fn parse_err(input: &str) -> ParseError {
    Settings::parse(input).expect_err("parse should fail")
}

#[test]
fn parses_dev_settings() {
    let settings = Settings::parse(DEV_SETTINGS).expect("settings");
    assert_eq!(
        settings.get("external_url"),
        Some(&json!("http://gitlab.example.com"))
    );
    assert_eq!(settings.get("registry.enable"), Some(&json!(false)));
    assert_eq!(
        settings.get("gitlab_rails.ldap_servers.ldap_main.port"),
        Some(&json!(389))
    );
    assert_eq!(
        settings.get("gitlab_rails.omniauth_allow_single_sign_on"),
        Some(&json!(["saml"]))
    );
    assert_eq!(
        settings.get("gitlab_rails.omniauth_providers[0].args.name_identifier_format"),
        Some(&json!(
            "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent"
        ))
    );
    assert_eq!(
        settings.get("gitlab_rails.omniauth_providers[0].label"),
        Some(&json!("SAML Login"))
    );
}

#[test]
fn accepts_symbol_keys_labels_and_trailing_commas() {
    let input = "nginx[:listen] = { :port => 8080, https: false, 'extra': [1, 2,], 'none' => nil, }";
    let settings = Settings::parse(input).expect("settings");
    assert_eq!(
        settings.to_value(),
        json!({
            "nginx": {
                "listen": {
                    "port": 8080,
                    "https": false,
                    "extra": [1, 2],
                    "none": null
                }
            }
        })
    );
}

#[test]
fn resolves_string_escapes() {
    let input = r#"
a['single'] = 'it\'s a \\ path\n'
a['double'] = "tab\there \"quoted\" \#{not}"
"#;
    let settings = Settings::parse(input).expect("settings");
    assert_eq!(settings.get("a.single"), Some(&json!("it's a \\ path\\n")));
    assert_eq!(
        settings.get("a.double"),
        Some(&json!("tab\there \"quoted\" #{not}"))
    );
}

#[test]
fn parses_numbers() {
    let input = "n['big'] = 1_000_000; n['neg'] = -5; n['ratio'] = 0.25; n['exp'] = 1e3";
    let settings = Settings::parse(input).expect("settings");
    assert_eq!(settings.get("n.big"), Some(&json!(1_000_000)));
    assert_eq!(settings.get("n.neg"), Some(&json!(-5)));
    assert_eq!(settings.get("n.ratio"), Some(&json!(0.25)));
    assert_eq!(settings.get("n.exp"), Some(&json!(1000.0)));
}

#[test]
fn later_assignments_win_and_nested_indexes_merge() {
    let input = r#"
gitlab_rails['ldap_servers'] = { 'main' => { 'port' => 389, 'host' => 'a' } }
gitlab_rails['ldap_servers']['main']['port'] = 636
gitlab_rails['ldap_enabled'] = false
gitlab_rails['ldap_enabled'] = true
"#;
    let settings = Settings::parse(input).expect("settings");
    assert_eq!(
        settings.get("gitlab_rails.ldap_servers.main"),
        Some(&json!({ "port": 636, "host": "a" }))
    );
    assert_eq!(settings.get("gitlab_rails.ldap_enabled"), Some(&json!(true)));
}

#[test]
fn call_form_accepts_optional_parentheses() {
    let settings = Settings::parse("external_url('https://gitlab.test')\nroles ['redis']")
        .expect("settings");
    assert_eq!(settings.get("external_url"), Some(&json!("https://gitlab.test")));
    assert_eq!(settings.get("roles"), Some(&json!(["redis"])));
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let input = "# leading\n\n  registry['enable'] = true # trailing\n\n";
    let settings = Settings::parse(input).expect("settings");
    assert_eq!(settings.as_map().len(), 1);
    assert_eq!(settings.get("registry.enable"), Some(&json!(true)));
}

#[test]
fn empty_input_yields_empty_settings() {
    let settings = Settings::parse("# nothing here\n").expect("settings");
    assert!(settings.is_empty());
}

#[test]
fn reports_unterminated_string_position() {
    let err = parse_err("registry['enable'] = true\ngitlab_rails['x'] = 'open");
    assert_eq!((err.line, err.column), (2, 21));
    assert!(err.message.contains("unterminated string"));
}

#[test]
fn reports_unterminated_hash() {
    let err = parse_err("gitlab_rails['ldap_servers'] = {\n  'main' => {\n    'port' => 389\n  }\n");
    assert_eq!((err.line, err.column), (1, 32));
    assert!(err.message.contains("unterminated hash"));
}

#[test]
fn reports_unterminated_array() {
    let err = parse_err("gitlab_rails['x'] = [1, 2");
    assert!(err.message.contains("unterminated array"));
}

#[test]
fn rejects_invalid_number_literal() {
    let err = parse_err("gitlab_rails['port'] = 38x9");
    assert!(err.message.contains("invalid number literal `38x9`"));
    assert_eq!((err.line, err.column), (1, 24));
}

#[test]
fn rejects_missing_assignment() {
    let err = parse_err("gitlab_rails['x'] true");
    assert!(err.message.contains("expected `=`"));
}

#[test]
fn rejects_two_statements_on_one_line() {
    let err = parse_err("registry['enable'] = true gitlab_kas['enable'] = false");
    assert!(err.message.contains("expected end of statement"));
}

#[test]
fn rejects_assignment_through_scalar() {
    let err = parse_err("gitlab_rails['ldap_enabled'] = true\ngitlab_rails['ldap_enabled']['x'] = 1");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("gitlab_rails.ldap_enabled"));
}

#[test]
fn rejects_interpolation_and_unknown_identifiers() {
    let err = parse_err("a['b'] = \"#{ENV['HOME']}\"");
    assert!(err.message.contains("interpolation"));

    let err = parse_err("a['b'] = ENV");
    assert!(err.message.contains("unexpected identifier `ENV`"));
}

#[test]
fn rejects_local_variables() {
    let err = parse_err("password = 'x'");
    assert!(err.message.contains("local variable `password`"));
}

#[test]
fn get_returns_none_for_missing_or_mistyped_paths() {
    let settings = Settings::parse(DEV_SETTINGS).expect("settings");
    assert_eq!(settings.get("gitlab_rails.nope"), None);
    assert_eq!(settings.get("registry.enable.deeper"), None);
    assert_eq!(settings.get("gitlab_rails.omniauth_providers[5]"), None);
    assert_eq!(settings.get("gitlab_rails.omniauth_providers[x]"), None);
}

#[test]
fn from_value_requires_a_hash() {
    assert!(Settings::from_value(json!({ "registry": { "enable": true } })).is_ok());
    let err = Settings::from_value(json!([1, 2])).unwrap_err();
    assert!(format!("{err}").contains("settings root must be a hash"));
}

#[test]
fn quoted_key_with_hugging_colon() {
    let settings =
        Settings::parse("gitlab_rails['ldap_servers'] = {\"main\":'x', 'port': 389}").expect("parse");
    assert_eq!(
        settings.get("gitlab_rails.ldap_servers"),
        Some(&json!({ "main": "x", "port": 389 }))
    );
}

#[test]
fn quoted_symbol_values_still_lex() {
    let settings = Settings::parse("gitlab_rails['mode'] = :'plain'").expect("parse");
    assert_eq!(settings.get("gitlab_rails.mode"), Some(&json!("plain")));
}

#[test]
fn backslash_continuation_accepts_crlf() {
    let settings =
        Settings::parse("gitlab_rails['ldap_enabled'] = \\\r\n  true\r\nregistry['enable'] = false\r\n")
            .expect("parse");
    assert_eq!(settings.get("gitlab_rails.ldap_enabled"), Some(&json!(true)));
    assert_eq!(settings.get("registry.enable"), Some(&json!(false)));
}

#[test]
fn redact_secrets_masks_nested_passwords() {
    let mut value = json!({
        "initial_root_password": "pw",
        "ldap_servers": { "main": { "password": "bind", "port": 389 } },
        "providers": [{ "args": { "client_password": "x" } }]
    });
    redact_secrets(&mut value);
    assert_eq!(
        value,
        json!({
            "initial_root_password": "[REDACTED]",
            "ldap_servers": { "main": { "password": "[REDACTED]", "port": 389 } },
            "providers": [{ "args": { "client_password": "[REDACTED]" } }]
        })
    );
}
