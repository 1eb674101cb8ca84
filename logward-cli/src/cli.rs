//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Default configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "logward.toml";

/// Logward -- evaluate log files against a set of detection rules.
///
/// Use `logward <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logward", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logward.toml configuration file.
    ///
    /// When omitted, `logward.toml` in the current directory is used
    /// if it exists, otherwise built-in defaults apply.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a log directory against a rule directory and write alerts.
    Run(RunArgs),

    /// Manage detection rules.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Alert file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlertFormat {
    /// A single indented JSON array, written atomically at the end of the run.
    Json,
    /// One JSON object per line, streamed as alerts are produced.
    Ndjson,
}

impl AlertFormat {
    /// Parse the `[output] format` config value.
    pub fn from_config(value: &str) -> Option<Self> {
        match value {
            "json" => Some(Self::Json),
            "ndjson" => Some(Self::Ndjson),
            _ => None,
        }
    }
}

/// Run one evaluation. Flags override the `[engine]` and `[output]` config sections.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory containing XML / YAML rule files.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Directory containing `.log` / `.json` log files.
    #[arg(long)]
    pub logs: Option<PathBuf>,

    /// Alert output file (parent directories are created).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Alert file format.
    #[arg(long)]
    pub format: Option<AlertFormat>,

    /// Number of matching workers (0 = available parallelism).
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Disable the literal prefilter and try every pattern on every line.
    #[arg(long)]
    pub no_prefilter: bool,

    /// Cancel the run after this many seconds (0 = no limit).
    #[arg(long)]
    pub timeout: Option<u64>,
}

// ---- rules ----

/// Manage detection rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List the rules found in a rule directory.
    List {
        /// Rule directory (default: `[engine] rules_dir`).
        path: Option<PathBuf>,
    },
    /// Load and compile every rule, reporting patterns that fail to compile.
    Validate {
        /// Rule directory (default: `[engine] rules_dir`).
        path: Option<PathBuf>,
    },
}

// ---- config ----

/// Manage logward configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, engine, output).
        #[arg(long)]
        section: Option<String>,
    },
}
