//! 에러 타입 -- 도메인별 에러 정의

/// logward 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogwardError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 평가 파이프라인 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 평가 파이프라인 에러
///
/// 엔진 크레이트의 상세 에러를 상위 레이어용으로 요약한 형태입니다.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 규칙 또는 로그를 하나도 로드하지 못함 (치명적)
    #[error("load failed: {0}")]
    Load(String),

    /// 알림 싱크 쓰기 실패
    #[error("sink failed: {0}")]
    Sink(String),

    /// 그 밖의 실행 실패
    #[error("run failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts() {
        let err: LogwardError = ConfigError::InvalidValue {
            field: "engine.workers".to_owned(),
            reason: "too many".to_owned(),
        }
        .into();
        assert!(matches!(err, LogwardError::Config(_)));
        assert!(err.to_string().contains("engine.workers"));
    }

    #[test]
    fn pipeline_error_display() {
        let err: LogwardError = PipelineError::Load("no rules".to_owned()).into();
        assert_eq!(err.to_string(), "pipeline error: load failed: no rules");
    }
}
