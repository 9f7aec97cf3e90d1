//! Test fixtures shared across omnirb crates.

pub mod fixtures;

pub use fixtures::{
    DEV_SETTINGS, LdapServerFixture, SamlProviderFixture, SettingsFixture, write_settings,
};
