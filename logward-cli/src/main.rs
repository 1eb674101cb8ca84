use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use logward_cli::cli::{Cli, Commands};
use logward_cli::commands;
use logward_cli::error::CliError;
use logward_cli::logging;
use logward_cli::output::OutputWriter;
use logward_core::config::GeneralConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            let code = err
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();
    let loaded = commands::config::load(config_path, log_level).await;

    // Logging comes up even on a broken config so `config validate` can report it.
    let general = match &loaded {
        Ok(config) => config.general.clone(),
        Err(_) => GeneralConfig::default(),
    };
    logging::init_tracing(&general)?;
    logward_core::metrics::describe_all();
    tracing::debug!(config = ?config_path, "logward starting");

    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Config(args) => {
            commands::config::execute(args, config_path, log_level, &writer).await?;
        }
        Commands::Run(args) => {
            let config = loaded?;
            commands::run::execute(args, &config, &writer).await?;
        }
        Commands::Rules(args) => {
            let config = loaded?;
            commands::rules::execute(args, &config, &writer).await?;
        }
    }

    Ok(())
}
