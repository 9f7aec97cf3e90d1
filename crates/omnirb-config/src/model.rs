//! Typed configuration records and the resolved-config accessors.

use crate::{ConfigurationError, Settings};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Placeholder emitted wherever a secret would be printed.
pub const REDACTED: &str = "[REDACTED]";

/// A string value that never appears in `Debug` or serialized output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Initial administrator password (`gitlab_rails['initial_root_password']`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootCredential(Secret);

impl RootCredential {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Secret::new(password))
    }

    pub fn password(&self) -> &str {
        self.0.expose()
    }
}

/// Feature name to enabled flag, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureToggles(BTreeMap<String, bool>);

impl FeatureToggles {
    /// Whether `name` is present and on; unknown features are off.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Raw lookup distinguishing "off" from "never mentioned".
    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }
}

/// Transport security for an LDAP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LdapEncryption {
    Plain,
    SimpleTls,
    StartTls,
}

impl LdapEncryption {
    /// Accepted spellings, as written in settings files.
    pub const NAMES: [&'static str; 3] = ["plain", "simple_tls", "start_tls"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(Self::Plain),
            "simple_tls" => Some(Self::SimpleTls),
            "start_tls" => Some(Self::StartTls),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::SimpleTls => "simple_tls",
            Self::StartTls => "start_tls",
        }
    }
}

impl fmt::Display for LdapEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of `gitlab_rails['ldap_servers']`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapServerConfig {
    /// Key of the entry, e.g. `ldap_main`; a `name` field inside the entry
    /// is ignored.
    #[serde(skip_deserializing)]
    pub name: String,
    pub label: String,
    pub host: String,
    pub port: u16,
    pub uid: String,
    pub bind_dn: String,
    pub password: Secret,
    pub encryption: LdapEncryption,
    pub base: String,
    pub group_base: String,
    /// Connection timeout in seconds.
    pub timeout: u64,
}

/// LDAP block, present only when `ldap_enabled` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LdapSettings {
    /// `prevent_ldap_sign_in`: hide the LDAP tab on the sign-in page.
    pub prevent_sign_in: bool,
    pub server: LdapServerConfig,
}

/// Digest algorithm implied by a certificate fingerprint length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintAlgorithm {
    Sha1,
    Sha256,
}

impl FingerprintAlgorithm {
    /// Algorithm for a digest of `len` bytes, if supported.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            20 => Some(Self::Sha1),
            32 => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Colon-separated hex fingerprint of the IdP signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CertFingerprint(String);

impl CertFingerprint {
    /// Parse `AB:CD:...`; returns `None` unless every group is two hex digits
    /// and the digest length is a supported algorithm.
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = decode_fingerprint(value)?;
        FingerprintAlgorithm::from_len(bytes.len())?;
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decoded digest bytes.
    pub fn bytes(&self) -> Vec<u8> {
        decode_fingerprint(&self.0).unwrap_or_default()
    }

    pub fn algorithm(&self) -> FingerprintAlgorithm {
        match self.bytes().len() {
            32 => FingerprintAlgorithm::Sha256,
            _ => FingerprintAlgorithm::Sha1,
        }
    }
}

fn decode_fingerprint(value: &str) -> Option<Vec<u8>> {
    value
        .split(':')
        .map(|group| {
            if group.len() == 2 && group.bytes().all(|b| b.is_ascii_hexdigit()) {
                u8::from_str_radix(group, 16).ok()
            } else {
                None
            }
        })
        .collect()
}

/// The `saml` entry of `gitlab_rails['omniauth_providers']`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamlProviderConfig {
    /// Button label on the sign-in page.
    pub label: String,
    pub assertion_consumer_service_url: String,
    pub idp_cert_fingerprint: CertFingerprint,
    pub idp_sso_target_url: String,
    pub issuer: String,
    pub name_identifier_format: String,
}

impl SamlProviderConfig {
    pub fn assertion_consumer_service_url(&self) -> Option<Url> {
        Url::parse(&self.assertion_consumer_service_url).ok()
    }

    pub fn idp_sso_target_url(&self) -> Option<Url> {
        Url::parse(&self.idp_sso_target_url).ok()
    }
}

/// Omniauth block, present only when `omniauth_enabled` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmniauthSettings {
    /// Providers allowed to create accounts on first sign-in.
    pub allow_single_sign_on: Vec<String>,
    pub block_auto_created_users: bool,
    pub auto_link_saml_user: bool,
    /// Names of every configured provider, in declaration order.
    pub providers: Vec<String>,
    pub saml: Option<SamlProviderConfig>,
}

/// Fully validated settings, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub(crate) external_url: Option<String>,
    pub(crate) root_credential: Option<RootCredential>,
    pub(crate) initial_license_file: Option<PathBuf>,
    pub(crate) feature_toggles: FeatureToggles,
    pub(crate) ldap: Option<LdapSettings>,
    pub(crate) omniauth: Option<OmniauthSettings>,
    #[serde(skip)]
    pub(crate) settings: Settings,
}

impl ResolvedConfig {
    /// Initial administrator password.
    pub fn root_credential(&self) -> Result<&RootCredential, ConfigurationError> {
        self.root_credential
            .as_ref()
            .ok_or(ConfigurationError::NotConfigured("initial_root_password"))
    }

    pub fn feature_toggles(&self) -> &FeatureToggles {
        &self.feature_toggles
    }

    /// Shorthand for `feature_toggles().is_enabled(name)`.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.feature_toggles.is_enabled(name)
    }

    pub fn ldap(&self) -> Result<&LdapSettings, ConfigurationError> {
        self.ldap
            .as_ref()
            .ok_or(ConfigurationError::FeatureDisabled("ldap"))
    }

    /// The single configured LDAP server.
    pub fn ldap_server(&self) -> Result<&LdapServerConfig, ConfigurationError> {
        self.ldap().map(|ldap| &ldap.server)
    }

    pub fn omniauth(&self) -> Result<&OmniauthSettings, ConfigurationError> {
        self.omniauth
            .as_ref()
            .ok_or(ConfigurationError::FeatureDisabled("omniauth"))
    }

    /// The SAML provider; requires omniauth on and a `saml` provider entry.
    pub fn saml(&self) -> Result<&SamlProviderConfig, ConfigurationError> {
        self.omniauth()?
            .saml
            .as_ref()
            .ok_or(ConfigurationError::NotConfigured("saml provider"))
    }

    pub fn external_url(&self) -> Option<&str> {
        self.external_url.as_deref()
    }

    pub fn initial_license_file(&self) -> Option<&Path> {
        self.initial_license_file.as_deref()
    }

    /// The merged raw settings the config was resolved from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
