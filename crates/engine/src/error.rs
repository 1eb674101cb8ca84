//! 엔진 에러 타입
//!
//! [`EngineError`]는 규칙 로딩, 로그 로딩, 평가 실행 중 발생하는 에러를 표현합니다.
//! `From<EngineError> for LogwardError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 복구 가능한 에러([`CompileError`], [`MatchError`])는 실행을 중단시키지 않고
//! 집계되어 [`Summary`](crate::pipeline::Summary)에 보고됩니다.

use logward_core::error::{LogwardError, PipelineError};

/// 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 또는 디렉토리 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: {rule_id}: {reason}")]
    RuleValidation {
        /// 규칙 ID
        rule_id: String,
        /// 실패 사유
        reason: String,
    },

    /// 로그 소스 읽기 실패
    #[error("log source error: {path}: {reason}")]
    LogSource {
        /// 로그 파일, 디렉토리 또는 소스 이름
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 또는 로그를 하나도 로드하지 못함 (치명적)
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// 알림 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 워커 태스크 실패
    #[error("worker error: {0}")]
    Worker(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for LogwardError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Load(e) => LogwardError::Pipeline(PipelineError::Load(e.to_string())),
            EngineError::Sink(e) => LogwardError::Pipeline(PipelineError::Sink(e.to_string())),
            EngineError::Io(e) => LogwardError::Io(e),
            other => LogwardError::Pipeline(PipelineError::Failed(other.to_string())),
        }
    }
}

/// Loading 단계의 치명적 실패
///
/// 빈 실행은 "아무 일도 없음"과 구별되지 않으므로 조용히 넘어가지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// 규칙 저장소가 비어 있음
    #[error("no rules could be loaded")]
    NoRules,

    /// 로그 소스가 레코드를 하나도 내놓지 않음
    #[error("no log records could be loaded")]
    NoRecords,
}

/// 패턴 컴파일 실패 (복구 가능)
///
/// 해당 패턴만 제외되고 규칙 저장소 빌드는 계속됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule '{rule_id}': pattern '{pattern}' failed to compile: {reason}")]
pub struct CompileError {
    /// 패턴이 속한 규칙 ID
    pub rule_id: String,
    /// 원본 패턴 문자열
    pub pattern: String,
    /// 컴파일 실패 사유
    pub reason: String,
}

/// 단일 (규칙, 패턴) 평가 실패 (복구 가능)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule '{rule_id}': pattern '{pattern}' failed during matching: {reason}")]
pub struct MatchError {
    /// 패턴이 속한 규칙 ID
    pub rule_id: String,
    /// 원본 패턴 문자열
    pub pattern: String,
    /// 실패 사유
    pub reason: String,
}

/// 알림 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 싱크 I/O 실패
    #[error("{sink}: io error: {source}")]
    Io {
        /// 싱크 이름
        sink: String,
        /// 원인 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 알림 직렬화 실패
    #[error("{sink}: serialize error: {source}")]
    Serialize {
        /// 싱크 이름
        sink: String,
        /// 원인 직렬화 에러
        #[source]
        source: serde_json::Error,
    },

    /// 수신측이 닫혀 더 이상 전달할 수 없음
    #[error("{0}: receiver closed")]
    Closed(String),

    /// 공유 상태 잠금 실패
    #[error("{0}: lock poisoned")]
    Poisoned(String),
}
