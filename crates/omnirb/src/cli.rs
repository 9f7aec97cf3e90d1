//! Argument parsing and command dispatch for the `omnirb` binary.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::debug;
use omnirb_config::{
    ConfigError, DEFAULT_SETTINGS_PATH, LayeredConfig, LoadOptions, REDACTED, ResolvedConfig,
    is_secret_key, redact_secrets,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "omnirb", about = "Validate and inspect omnibus gitlab.rb settings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate settings and report every violation.
    Check(LoadArgs),
    /// Print the resolved config as JSON. Secrets are redacted.
    Show(LoadArgs),
    /// Print the raw merged value at a dotted path, e.g. `gitlab_rails.ldap_servers.main.port`.
    Get {
        path: String,
        #[command(flatten)]
        load: LoadArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Base settings file.
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    pub config: PathBuf,
    /// Override layer applied after the base; may be repeated.
    #[arg(long = "override", value_name = "PATH")]
    pub overrides: Vec<PathBuf>,
    /// Reject unknown keys inside LDAP and SAML blocks.
    #[arg(long)]
    pub strict: bool,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        let mut options = LoadOptions::new(&self.config);
        for path in &self.overrides {
            options = options.with_override(path);
        }
        if self.strict {
            options = options.strict();
        }
        options
    }

    fn load(&self) -> Result<LayeredConfig> {
        ResolvedConfig::load_layered(self.options())
            .with_context(|| format!("failed to load {}", self.config.display()))
    }
}

/// Output of a command plus whether it should exit successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub output: String,
    pub success: bool,
}

impl Report {
    fn ok(output: String) -> Self {
        Self {
            output,
            success: true,
        }
    }
}

/// Run a parsed command line.
///
/// Validation failures from `check` are a report with `success == false`;
/// every other failure is an error.
pub fn run(cli: Cli) -> Result<Report> {
    debug!("running command: {:?}", cli.command);
    match cli.command {
        Command::Check(load) => check(&load),
        Command::Show(load) => {
            let layered = load.load()?;
            let output = serde_json::to_string_pretty(&layered.config)
                .context("failed to serialize resolved config")?;
            Ok(Report::ok(output))
        }
        Command::Get { path, load } => {
            let layered = load.load()?;
            let Some(value) = layered.config.settings().get(&path) else {
                bail!("no setting at `{path}`");
            };
            if is_secret_path(&path) {
                return Ok(Report::ok(REDACTED.to_string()));
            }
            let mut value = value.clone();
            redact_secrets(&mut value);
            let output = match value {
                serde_json::Value::String(text) => text,
                other => serde_json::to_string_pretty(&other)
                    .context("failed to serialize setting")?,
            };
            Ok(Report::ok(output))
        }
    }
}

fn check(load: &LoadArgs) -> Result<Report> {
    match ResolvedConfig::load_layered(load.options()) {
        Ok(layered) => {
            let mut output = format!("ok: {}", load.config.display());
            for layer in layered.layers.iter().skip(1) {
                match &layer.disabled_reason {
                    Some(reason) => {
                        output.push_str(&format!("\n  skipped {} ({reason})", layer.path.display()))
                    }
                    None => output.push_str(&format!("\n  applied {}", layer.path.display())),
                }
            }
            let toggles = layered.config.feature_toggles();
            let enabled: Vec<_> = toggles
                .iter()
                .filter(|(_, on)| *on)
                .map(|(name, _)| name)
                .collect();
            if !enabled.is_empty() {
                output.push_str(&format!("\n  enabled: {}", enabled.join(", ")));
            }
            Ok(Report::ok(output))
        }
        Err(ConfigError::Validation(err)) => Ok(Report {
            output: format!("{}: {err}", load.config.display()),
            success: false,
        }),
        Err(err) => {
            Err(err).with_context(|| format!("failed to load {}", load.config.display()))
        }
    }
}

fn is_secret_path(path: &str) -> bool {
    path.rsplit('.').next().is_some_and(is_secret_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnirb_test_utils::{DEV_SETTINGS, write_settings};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn run_args(args: &[&str]) -> Result<Report> {
        let cli = Cli::try_parse_from(args).expect("args");
        run(cli)
    }

    #[test]
    fn check_reports_ok_for_valid_settings() {
        let temp = TempDir::new().expect("tmp");
        let path = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
        let path = path.to_str().expect("utf8");

        let report = run_args(&["omnirb", "check", "--config", path]).expect("run");
        assert!(report.success);
        assert!(report.output.starts_with("ok: "), "{}", report.output);
        assert!(report.output.contains("ldap"), "{}", report.output);
    }

    #[test]
    fn check_lists_violations_without_erroring() {
        let temp = TempDir::new().expect("tmp");
        let base = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
        let broken = write_settings(
            temp.path(),
            "broken.rb",
            "gitlab_rails['ldap_servers']['ldap_main']['port'] = 0",
        );

        let report = run_args(&[
            "omnirb",
            "check",
            "--config",
            base.to_str().expect("utf8"),
            "--override",
            broken.to_str().expect("utf8"),
        ])
        .expect("run");
        assert!(!report.success);
        assert!(
            report
                .output
                .contains("gitlab_rails.ldap_servers.ldap_main.port"),
            "{}",
            report.output
        );
    }

    #[test]
    fn check_propagates_parse_errors() {
        let temp = TempDir::new().expect("tmp");
        let path = write_settings(temp.path(), "gitlab.rb", "external_url = ");

        let err = run_args(&["omnirb", "check", "--config", path.to_str().expect("utf8")])
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to load"));
    }

    #[test]
    fn show_redacts_secrets() {
        let temp = TempDir::new().expect("tmp");
        let path = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);

        let report = run_args(&["omnirb", "show", "--config", path.to_str().expect("utf8")])
            .expect("run");
        assert!(report.success);
        assert!(!report.output.contains("s3cret-Root-Pass"));
        assert!(report.output.contains(REDACTED));
        let value: serde_json::Value = serde_json::from_str(&report.output).expect("json");
        assert_eq!(value["ldap"]["server"]["port"], serde_json::json!(389));
    }

    #[test]
    fn get_prints_raw_values() {
        let temp = TempDir::new().expect("tmp");
        let path = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
        let path = path.to_str().expect("utf8");

        let report = run_args(&["omnirb", "get", "external_url", "--config", path]).expect("run");
        assert_eq!(report.output, "http://gitlab.example.com");

        let report = run_args(&[
            "omnirb",
            "get",
            "gitlab_rails.ldap_servers.ldap_main.timeout",
            "--config",
            path,
        ])
        .expect("run");
        assert_eq!(report.output, "10");

        let report = run_args(&[
            "omnirb",
            "get",
            "gitlab_rails.initial_root_password",
            "--config",
            path,
        ])
        .expect("run");
        assert_eq!(report.output, REDACTED);
    }

    #[test]
    fn get_masks_passwords_inside_subtrees() {
        let temp = TempDir::new().expect("tmp");
        let path = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);
        let path = path.to_str().expect("utf8");

        for setting in ["gitlab_rails", "gitlab_rails.ldap_servers"] {
            let report = run_args(&["omnirb", "get", setting, "--config", path]).expect("run");
            assert!(!report.output.contains("s3cret-Root-Pass"), "{}", report.output);
            assert!(!report.output.contains("\"admin\""), "{}", report.output);
            assert!(report.output.contains(REDACTED), "{}", report.output);
        }

        let report = run_args(&["omnirb", "get", "gitlab_rails", "--config", path]).expect("run");
        let value: serde_json::Value = serde_json::from_str(&report.output).expect("json");
        assert_eq!(value["initial_root_password"], serde_json::json!(REDACTED));
        assert_eq!(
            value["ldap_servers"]["ldap_main"]["password"],
            serde_json::json!(REDACTED)
        );
        assert_eq!(value["ldap_servers"]["ldap_main"]["port"], serde_json::json!(389));
    }

    #[test]
    fn get_fails_for_unknown_path() {
        let temp = TempDir::new().expect("tmp");
        let path = write_settings(temp.path(), "gitlab.rb", DEV_SETTINGS);

        let err = run_args(&[
            "omnirb",
            "get",
            "gitlab_rails.nope",
            "--config",
            path.to_str().expect("utf8"),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "no setting at `gitlab_rails.nope`");
    }

    #[test]
    fn config_defaults_to_omnibus_path() {
        let cli = Cli::try_parse_from(["omnirb", "check", "--strict"]).expect("args");
        let Command::Check(load) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(load.config, PathBuf::from(DEFAULT_SETTINGS_PATH));
        assert!(load.strict);
        assert!(load.overrides.is_empty());
    }
}
