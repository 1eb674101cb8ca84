//! `logward config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logward_core::config::LogwardConfig;

use crate::cli::{ConfigAction, ConfigArgs, DEFAULT_CONFIG_PATH};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Load the effective configuration.
///
/// An explicit `path` must exist. Without one, `logward.toml` is used if present,
/// otherwise defaults. Environment overrides apply in both cases, and `log_level`
/// (from `--log-level`) overrides everything.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be parsed or a value is invalid.
pub async fn load(path: Option<&Path>, log_level: Option<&str>) -> Result<LogwardConfig, CliError> {
    let mut config = match path {
        Some(path) => LogwardConfig::load(path).await?,
        None => LogwardConfig::load_or_default(DEFAULT_CONFIG_PATH).await?,
    };
    if let Some(level) = log_level {
        config.general.log_level = level.to_owned();
        config.validate()?;
    }
    Ok(config)
}

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: Option<&Path>,
    log_level: Option<&str>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => {
            let report = validate(config_path, log_level).await;
            writer.render(&report)?;
            if !report.valid {
                return Err(CliError::Config("configuration is invalid".to_owned()));
            }
            Ok(())
        }
        ConfigAction::Show { section } => {
            let report = show(config_path, log_level, section.as_deref()).await?;
            writer.render(&report)
        }
    }
}

fn source_label(config_path: Option<&Path>) -> String {
    match config_path {
        Some(path) => path.display().to_string(),
        None => DEFAULT_CONFIG_PATH.to_owned(),
    }
}

/// Load and validate the configuration, reporting the result instead of failing.
pub async fn validate(config_path: Option<&Path>, log_level: Option<&str>) -> ConfigValidationReport {
    let source = source_label(config_path);
    info!(path = %source, "validating configuration");

    match load(config_path, log_level).await {
        Ok(_) => ConfigValidationReport {
            source,
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source,
            valid: false,
            errors: vec![e.to_string()],
        },
    }
}

/// Render the effective configuration (file + env overrides + defaults) as TOML.
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if the
/// section name is unknown.
pub async fn show(
    config_path: Option<&Path>,
    log_level: Option<&str>,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let source = source_label(config_path);
    info!(path = %source, "loading configuration");

    let config = load(config_path, log_level).await?;

    let config_toml = match section {
        None => toml::to_string_pretty(&config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("engine") => toml::to_string_pretty(&config.engine),
        Some("output") => toml::to_string_pretty(&config.output),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: general, engine, output)"
            )));
        }
    }
    .map_err(|e| CliError::Command(format!("failed to serialize config: {e}")))?;

    Ok(ConfigReport {
        source,
        section: section.map(str::to_owned),
        config_toml,
    })
}

/// Configuration display report.
///
/// Contains the source file path and serialized TOML configuration.
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
///
/// Contains validation result and any error messages encountered.
#[derive(Debug, Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
