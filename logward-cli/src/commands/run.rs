//! `logward run` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use logward_core::config::{EngineConfig, LogwardConfig};
use logward_engine::{
    AlertSink, EvaluationPipeline, JsonArrayFileSink, LogDirectorySource, NdjsonSink,
    PipelineConfig, RuleLoader, RuleStoreBuilder, Summary,
};

use crate::cli::{AlertFormat, RunArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
pub async fn execute(
    args: RunArgs,
    config: &LogwardConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let settings = RunSettings::resolve(args, config)?;
    let report = evaluate(&settings).await?;
    writer.render(&report)?;
    Ok(())
}

/// Effective settings for one run: config file values with command-line flags applied.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Engine section after flag overrides.
    pub engine: EngineConfig,
    /// Alert output file.
    pub out: PathBuf,
    /// Alert output format.
    pub format: AlertFormat,
}

impl RunSettings {
    /// Merge flags over the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` if the merged engine settings are out of range
    /// or `[output] format` is unknown and no `--format` flag was given.
    pub fn resolve(args: RunArgs, config: &LogwardConfig) -> Result<Self, CliError> {
        let mut engine = config.engine.clone();
        if let Some(dir) = args.rules {
            engine.rules_dir = dir.display().to_string();
        }
        if let Some(dir) = args.logs {
            engine.logs_dir = dir.display().to_string();
        }
        if let Some(workers) = args.workers {
            engine.workers = workers;
        }
        if args.no_prefilter {
            engine.prefilter = false;
        }
        if let Some(secs) = args.timeout {
            engine.run_timeout_secs = secs;
        }
        PipelineConfig::from_core(&engine).validate()?;

        let format = match args.format {
            Some(format) => format,
            None => AlertFormat::from_config(&config.output.format).ok_or_else(|| {
                CliError::Config(format!(
                    "unknown output format '{}', expected 'json' or 'ndjson'",
                    config.output.format
                ))
            })?,
        };

        Ok(Self {
            engine,
            out: args.out.unwrap_or_else(|| PathBuf::from(&config.output.path)),
            format,
        })
    }
}

/// Load rules and logs, evaluate them, and write alerts to the output file.
///
/// An interrupt (Ctrl-C) cancels the run; alerts produced so far are still written.
///
/// # Errors
///
/// - `CliError::Load` if the rule or log directory cannot be read, or either yields nothing
/// - `CliError::Io` if the output directory cannot be created
/// - `CliError::Command` if the alert output cannot be opened or written
pub async fn evaluate(settings: &RunSettings) -> Result<RunReport, CliError> {
    let engine = &settings.engine;
    info!(
        rules_dir = %engine.rules_dir,
        logs_dir = %engine.logs_dir,
        out = %settings.out.display(),
        "starting run"
    );

    let rules = RuleLoader::load_directory(&engine.rules_dir).await?;
    let store = RuleStoreBuilder::from_core(engine).build(rules);

    let source = LogDirectorySource::open(&engine.logs_dir).await?;
    let sink = open_sink(&settings.out, settings.format).await?;

    let mut pipeline = EvaluationPipeline::builder()
        .config(PipelineConfig::from_core(engine))
        .rule_store(store)
        .build()?;

    let token = pipeline.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });
    let result = pipeline.run(source, sink).await;
    interrupt.abort();

    let summary = result?;
    info!(%summary, "run finished");

    Ok(RunReport {
        output: settings.out.display().to_string(),
        format: settings.format,
        summary,
    })
}

async fn open_sink(path: &Path, format: AlertFormat) -> Result<Box<dyn AlertSink>, CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let sink: Box<dyn AlertSink> = match format {
        AlertFormat::Json => Box::new(JsonArrayFileSink::create(path).map_err(|e| {
            CliError::Command(format!("failed to open alert output: {e}"))
        })?),
        AlertFormat::Ndjson => Box::new(NdjsonSink::create(path).map_err(|e| {
            CliError::Command(format!("failed to open alert output: {e}"))
        })?),
    };
    Ok(sink)
}

/// Result of one run, as printed to the user.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Alert output file
    pub output: String,
    /// Alert output format
    #[serde(serialize_with = "serialize_format")]
    pub format: AlertFormat,
    /// Pipeline summary
    #[serde(flatten)]
    pub summary: Summary,
}

fn serialize_format<S: serde::Serializer>(format: &AlertFormat, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(match format {
        AlertFormat::Json => "json",
        AlertFormat::Ndjson => "ndjson",
    })
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let s = &self.summary;
        writeln!(w, "{s}")?;
        writeln!(w)?;
        writeln!(w, "  Output:        {}", self.output.bold())?;
        writeln!(w, "  Run ID:        {}", s.run_id)?;
        writeln!(
            w,
            "  Elapsed:       {:.3}s",
            s.elapsed().num_milliseconds() as f64 / 1000.0
        )?;
        writeln!(
            w,
            "  Patterns:      {} skipped, {} rules without usable patterns",
            s.patterns_skipped, s.inert_rules
        )?;
        if s.is_clean() {
            writeln!(w, "  Status:        {}", "OK".green().bold())?;
        } else {
            writeln!(w, "  Status:        {}", "DEGRADED".yellow().bold())?;
            writeln!(
                w,
                "  Failures:      {} records failed, {} match errors, {} alerts dropped",
                s.records_failed, s.match_errors, s.alerts_dropped
            )?;
            if s.cancelled {
                writeln!(w, "  Cancelled:     {}", "yes".yellow())?;
            }
        }
        Ok(())
    }
}
