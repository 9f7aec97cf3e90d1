//! Settings text fixtures with per-field overrides.

use std::fs;
use std::path::{Path, PathBuf};

/// Local development settings with LDAP and SAML both enabled.
pub const DEV_SETTINGS: &str = r#"
external_url 'http://gitlab.example.com'
gitlab_rails['initial_root_password']='s3cret-Root-Pass'
registry['enable']=false
prometheus_monitoring['enable']=false
gitlab_rails['initial_license_file']='/etc/gitlab/dev.gitlab-license'
gitlab_kas['enable']=false
gitlab_rails['ldap_enabled'] = true
gitlab_rails['ldap_servers'] = {
  'ldap_main' => {
    'label' => 'LDAP Main',
    'host' => 'localhost',
    'port' => 389,
    'uid' => 'uid',
    'bind_dn' => 'cn=admin,dc=example,dc=org',
    'password' => 'admin',
    'encryption' => 'plain',
    'base' => 'dc=example,dc=org',
    'group_base' => 'ou=groups,dc=example,dc=org',
    'timeout' => 10
  }
}
# keep the regular login form for local accounts
gitlab_rails['prevent_ldap_sign_in'] = true
gitlab_rails['omniauth_enabled'] = true
gitlab_rails['omniauth_allow_single_sign_on'] = ['saml']
gitlab_rails['omniauth_block_auto_created_users'] = false
gitlab_rails['omniauth_auto_link_saml_user'] = true
gitlab_rails['omniauth_providers'] = [
  {
    name: 'saml',
    args: {
             assertion_consumer_service_url: 'http://localhost/users/auth/saml/callback',
             idp_cert_fingerprint: 'A1:22:B3:44:C5:66:D7:88:E9:00:F1:12:23:34:45:56:67:78:89:9A',
             idp_sso_target_url: 'http://localhost:8080/simplesaml/saml2/idp/SSOService.php',
             issuer: 'http://app.example.com',
             name_identifier_format: 'urn:oasis:names:tc:SAML:2.0:nameid-format:persistent'
           },
    label: 'SAML Login'
  }
]
"#;

/// Write settings text to `dir/name`, creating parent directories.
pub fn write_settings(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(&path, contents).expect("write");
    path
}

/// One LDAP server entry rendered as a `gitlab_rails['ldap_servers']` hash.
#[derive(Debug, Clone)]
pub struct LdapServerFixture {
    pub name: String,
    /// Field name and its literal source text, in render order.
    pub fields: Vec<(String, String)>,
}

impl Default for LdapServerFixture {
    fn default() -> Self {
        let fields = [
            ("label", "'LDAP Main'"),
            ("host", "'ldap.example.org'"),
            ("port", "389"),
            ("uid", "'uid'"),
            ("bind_dn", "'cn=admin,dc=example,dc=org'"),
            ("password", "'admin'"),
            ("encryption", "'plain'"),
            ("base", "'dc=example,dc=org'"),
            ("group_base", "'ou=groups,dc=example,dc=org'"),
            ("timeout", "10"),
        ];
        Self {
            name: "ldap_main".to_string(),
            fields: fields
                .iter()
                .map(|(key, literal)| (key.to_string(), literal.to_string()))
                .collect(),
        }
    }
}

impl LdapServerFixture {
    /// Drop a field from the entry.
    pub fn without(mut self, field: &str) -> Self {
        self.fields.retain(|(key, _)| key != field);
        self
    }

    /// Replace (or add) a field with a literal such as `636` or `'start_tls'`.
    pub fn with(mut self, field: &str, literal: &str) -> Self {
        match self.fields.iter_mut().find(|(key, _)| key == field) {
            Some(entry) => entry.1 = literal.to_string(),
            None => self.fields.push((field.to_string(), literal.to_string())),
        }
        self
    }

    /// Render the hash literal for this entry, keyed by its name.
    pub fn render_entry(&self) -> String {
        let body = self
            .fields
            .iter()
            .map(|(key, literal)| format!("    '{key}' => {literal}"))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("  '{}' => {{\n{body}\n  }}", self.name)
    }

    /// Render the full `ldap_servers` assignment.
    pub fn render(&self) -> String {
        format!(
            "gitlab_rails['ldap_servers'] = {{\n{}\n}}\n",
            self.render_entry()
        )
    }
}

/// One SAML provider rendered inside `gitlab_rails['omniauth_providers']`.
#[derive(Debug, Clone)]
pub struct SamlProviderFixture {
    pub label: Option<String>,
    /// SAML arg name and its literal source text, in render order.
    pub args: Vec<(String, String)>,
}

impl Default for SamlProviderFixture {
    fn default() -> Self {
        let args = [
            (
                "assertion_consumer_service_url",
                "'https://gitlab.example.com/users/auth/saml/callback'",
            ),
            (
                "idp_cert_fingerprint",
                "'43:51:43:a1:b5:fc:8b:b7:0a:3a:a9:b1:0f:66:73:a8:b4:6d:6e:f5'",
            ),
            (
                "idp_sso_target_url",
                "'https://login.example.com/idp/sso'",
            ),
            ("issuer", "'https://gitlab.example.com'"),
            (
                "name_identifier_format",
                "'urn:oasis:names:tc:SAML:2.0:nameid-format:persistent'",
            ),
        ];
        Self {
            label: Some("'SAML Login'".to_string()),
            args: args
                .iter()
                .map(|(key, literal)| (key.to_string(), literal.to_string()))
                .collect(),
        }
    }
}

impl SamlProviderFixture {
    /// Drop an arg from the provider.
    pub fn without(mut self, arg: &str) -> Self {
        self.args.retain(|(key, _)| key != arg);
        self
    }

    /// Replace (or add) an arg with a literal.
    pub fn with(mut self, arg: &str, literal: &str) -> Self {
        match self.args.iter_mut().find(|(key, _)| key == arg) {
            Some(entry) => entry.1 = literal.to_string(),
            None => self.args.push((arg.to_string(), literal.to_string())),
        }
        self
    }

    pub fn without_label(mut self) -> Self {
        self.label = None;
        self
    }

    /// Render the provider hash literal.
    pub fn render_entry(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|(key, literal)| format!("      {key}: {literal}"))
            .collect::<Vec<_>>()
            .join(",\n");
        let label = self
            .label
            .as_ref()
            .map(|label| format!(",\n    label: {label}"))
            .unwrap_or_default();
        format!("  {{\n    name: 'saml',\n    args: {{\n{args}\n    }}{label}\n  }}")
    }

    /// Render the full `omniauth_providers` assignment.
    pub fn render(&self) -> String {
        format!(
            "gitlab_rails['omniauth_providers'] = [\n{}\n]\n",
            self.render_entry()
        )
    }
}

/// A complete settings file assembled from optional blocks.
#[derive(Debug, Clone, Default)]
pub struct SettingsFixture {
    pub root_password: Option<String>,
    pub ldap: Option<LdapServerFixture>,
    pub saml: Option<SamlProviderFixture>,
    /// Extra raw lines appended verbatim.
    pub extra: Vec<String>,
}

impl SettingsFixture {
    pub fn new() -> Self {
        Self {
            root_password: Some("changeme-1234".to_string()),
            ..Self::default()
        }
    }

    pub fn ldap(mut self, ldap: LdapServerFixture) -> Self {
        self.ldap = Some(ldap);
        self
    }

    pub fn saml(mut self, saml: SamlProviderFixture) -> Self {
        self.saml = Some(saml);
        self
    }

    pub fn line(mut self, line: &str) -> Self {
        self.extra.push(line.to_string());
        self
    }

    /// Render settings text; a present block also turns its toggle on.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(password) = &self.root_password {
            out.push_str(&format!(
                "gitlab_rails['initial_root_password'] = '{password}'\n"
            ));
        }
        out.push_str("registry['enable'] = false\n");
        out.push_str("prometheus_monitoring['enable'] = false\n");
        out.push_str("gitlab_kas['enable'] = false\n");
        match &self.ldap {
            Some(ldap) => {
                out.push_str("gitlab_rails['ldap_enabled'] = true\n");
                out.push_str(&ldap.render());
            }
            None => out.push_str("gitlab_rails['ldap_enabled'] = false\n"),
        }
        match &self.saml {
            Some(saml) => {
                out.push_str("gitlab_rails['omniauth_enabled'] = true\n");
                out.push_str("gitlab_rails['omniauth_allow_single_sign_on'] = ['saml']\n");
                out.push_str(&saml.render());
            }
            None => out.push_str("gitlab_rails['omniauth_enabled'] = false\n"),
        }
        for line in &self.extra {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
