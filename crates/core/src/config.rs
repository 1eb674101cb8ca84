//! 설정 관리 -- logward.toml 파싱 및 런타임 설정
//!
//! [`LogwardConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARD_ENGINE_WORKERS=8` 형식)
//! 3. 설정 파일 (`logward.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logward_core::error::LogwardError> {
//! use logward_core::config::LogwardConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogwardConfig::load("logward.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogwardConfig::parse("[engine]\nworkers = 2")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwardError};

/// 워커 수 상한
pub const MAX_WORKERS: usize = 256;

/// 채널 용량 상한
pub const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

/// logward 통합 설정
///
/// `logward.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwardConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 매칭 엔진 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// 알림 출력 설정
    #[serde(default)]
    pub output: OutputConfig,
}

impl LogwardConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작하여 환경변수 오버라이드를 적용합니다.
    ///
    /// 파일이 존재하지만 파싱에 실패하면 에러를 반환합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, LogwardError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(LogwardError::Config(ConfigError::FileNotFound { .. })) => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwardError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwardError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARD_{SECTION}_{FIELD}`
    /// 예: `LOGWARD_ENGINE_PREFILTER=false`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARD_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARD_GENERAL_LOG_FORMAT");

        // Engine
        override_string(&mut self.engine.rules_dir, "LOGWARD_ENGINE_RULES_DIR");
        override_string(&mut self.engine.logs_dir, "LOGWARD_ENGINE_LOGS_DIR");
        override_bool(&mut self.engine.prefilter, "LOGWARD_ENGINE_PREFILTER");
        override_usize(&mut self.engine.workers, "LOGWARD_ENGINE_WORKERS");
        override_usize(
            &mut self.engine.channel_capacity,
            "LOGWARD_ENGINE_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.engine.regex_size_limit,
            "LOGWARD_ENGINE_REGEX_SIZE_LIMIT",
        );
        override_u64(
            &mut self.engine.run_timeout_secs,
            "LOGWARD_ENGINE_RUN_TIMEOUT_SECS",
        );

        // Output
        override_string(&mut self.output.path, "LOGWARD_OUTPUT_PATH");
        override_string(&mut self.output.format, "LOGWARD_OUTPUT_FORMAT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_log_formats.join(", ")),
            }
            .into());
        }

        if self.engine.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue {
                field: "engine.workers".to_owned(),
                reason: format!("must be 0 (auto) or 1-{MAX_WORKERS}"),
            }
            .into());
        }

        if self.engine.channel_capacity == 0 || self.engine.channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(ConfigError::InvalidValue {
                field: "engine.channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            }
            .into());
        }

        if self.engine.regex_size_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.regex_size_limit".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        let valid_output_formats = ["json", "ndjson"];
        if !valid_output_formats.contains(&self.output.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "output.format".to_owned(),
                reason: format!("must be one of: {}", valid_output_formats.join(", ")),
            }
            .into());
        }

        if self.output.path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output.path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 매칭 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 규칙 파일 디렉토리
    pub rules_dir: String,
    /// 로그 파일 디렉토리
    pub logs_dir: String,
    /// 리터럴 사전 필터 사용 여부
    pub prefilter: bool,
    /// 워커 수 (0이면 사용 가능한 CPU 수)
    pub workers: usize,
    /// 워커별 레코드 채널 및 알림 채널 용량
    pub channel_capacity: usize,
    /// 패턴당 컴파일된 정규식 크기 상한 (바이트)
    pub regex_size_limit: usize,
    /// 실행 타임아웃 (초, 0이면 없음)
    pub run_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_dir: "rules".to_owned(),
            logs_dir: "logs".to_owned(),
            prefilter: true,
            workers: 0,
            channel_capacity: 1024,
            regex_size_limit: 10 * 1024 * 1024, // 10MB
            run_timeout_secs: 0,
        }
    }
}

/// 알림 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 출력 파일 경로
    pub path: String,
    /// 출력 형식 (json: 배열, ndjson: 줄 단위)
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "alerts/alerts.json".to_owned(),
            format: "json".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
