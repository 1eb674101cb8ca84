#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogwardError, PipelineError};

// 설정
pub use config::LogwardConfig;

// 도메인 타입
pub use types::{Alert, DEFAULT_DESCRIPTION, DEFAULT_RULE_LEVEL, LogRecord, Rule};
