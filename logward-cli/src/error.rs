//! CLI-specific error types and exit code mapping

use logward_core::error::{LogwardError, PipelineError};
use logward_engine::EngineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Rules or log records could not be loaded.
    #[error("load error: {0}")]
    Load(String),

    /// Rule validation found problems.
    #[error("rule error: {0}")]
    Rule(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logward-core.
    #[error("{0}")]
    Core(#[from] LogwardError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command / rule error   |
    /// | 2    | Configuration error              |
    /// | 3    | Rules or logs could not be loaded |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Load(_) => 3,
            Self::Io(_) => 10,
            Self::Core(LogwardError::Config(_)) => 2,
            Self::Core(LogwardError::Pipeline(PipelineError::Load(_))) => 3,
            Self::Core(LogwardError::Io(_)) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Rule(_) | Self::Core(_) => 1,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Load(_) | EngineError::RuleLoad { .. } | EngineError::LogSource { .. } => {
                Self::Load(e.to_string())
            }
            EngineError::Config { .. } => Self::Config(e.to_string()),
            EngineError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logward_core::error::ConfigError;
    use logward_engine::{LoadError, SinkError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_load_error() {
        let err = CliError::Load("no rules".to_owned());
        assert_eq!(err.exit_code(), 3, "load error should return exit code 3");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_and_rule_errors() {
        assert_eq!(CliError::Command("failed".to_owned()).exit_code(), 1);
        assert_eq!(CliError::Rule("2 invalid patterns".to_owned()).exit_code(), 1);
    }

    #[test]
    fn test_exit_code_json_serialize_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json")
            .expect_err("should fail parsing");
        let err = CliError::JsonSerialize(json_err);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_core_errors() {
        let config: CliError = LogwardError::Config(ConfigError::FileNotFound {
            path: "logward.toml".to_owned(),
        })
        .into();
        assert_eq!(config.exit_code(), 2);

        let load: CliError = LogwardError::Pipeline(PipelineError::Load("empty".to_owned())).into();
        assert_eq!(load.exit_code(), 3);

        let sink: CliError = LogwardError::Pipeline(PipelineError::Sink("disk".to_owned())).into();
        assert_eq!(sink.exit_code(), 1);
    }

    #[test]
    fn test_from_engine_load_errors() {
        let err: CliError = EngineError::Load(LoadError::NoRecords).into();
        assert!(matches!(err, CliError::Load(_)));
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("no log records"));

        let err: CliError = EngineError::RuleLoad {
            path: "/missing".to_owned(),
            reason: "failed to read directory".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_from_engine_config_and_sink_errors() {
        let err: CliError = EngineError::Config {
            field: "workers".to_owned(),
            reason: "too many".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 2);

        let err: CliError = EngineError::Sink(SinkError::Closed("alerts.json".to_owned())).into();
        assert!(matches!(err, CliError::Command(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_error_display_config() {
        let err = CliError::Config("invalid TOML syntax".to_owned());
        let display_str = err.to_string();
        assert!(display_str.contains("configuration error"));
        assert!(display_str.contains("invalid TOML syntax"));
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(err.to_string(), "execution failed");
    }
}
