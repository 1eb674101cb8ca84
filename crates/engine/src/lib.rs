#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`rule`]: 규칙 로딩(XML/YAML), 불변 규칙 저장소, 리터럴 사전 필터, 패턴 매처
//! - [`source`]: 로그 레코드 소스 (이터레이터, 채널, 로그 디렉토리)
//! - [`alert`]: 매칭 결과를 알림으로 변환하여 싱크에 방출
//! - [`sink`]: 알림 싱크 (JSON 배열 파일, NDJSON, 채널, 메모리)
//! - [`pipeline`]: 평가 파이프라인 오케스트레이션
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! RuleLoader -> RuleStore (Arc, immutable) ---------------+
//!                                                         v
//! LogSource -> dispatcher -> workers (PatternMatcher) -> AlertEmitter -> writer -> AlertSink
//! ```

pub mod alert;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rule;
pub mod sink;
pub mod source;

mod walk;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{
    EvaluationPipeline, EvaluationPipelineBuilder, PipelineState, RecordOutcome, Summary,
    evaluate_record,
};

// 설정
pub use config::PipelineConfig;

// 에러
pub use error::{CompileError, EngineError, LoadError, MatchError, SinkError};

// 규칙
pub use rule::{PatternHit, PatternMatcher, RuleLoader, RuleStore, RuleStoreBuilder};

// 소스
pub use source::{IterSource, LogDirectoryLoader, LogDirectorySource, LogSource};

// 알림
pub use alert::AlertEmitter;
pub use sink::{
    AlertSink, ChannelSink, FailurePolicy, JsonArrayFileSink, MemorySink, NdjsonSink,
};
