//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 엔진은 이 상수로 `metrics::counter!()`, `metrics::gauge!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않은 경우 모든 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logward_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logward_core::metrics::RECORDS_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 규칙 모듈 레이블 키
pub const LABEL_MODULE: &str = "module";

/// 싱크 이름 레이블 키
pub const LABEL_SINK: &str = "sink";

// ─── 엔진 메트릭 ────────────────────────────────────────────────────

/// 평가된 로그 레코드 수 (counter)
pub const RECORDS_PROCESSED_TOTAL: &str = "logward_records_processed_total";

/// 평가 중 패닉으로 건너뛴 레코드 수 (counter)
pub const RECORDS_FAILED_TOTAL: &str = "logward_records_failed_total";

/// 싱크에 전달된 알림 수 (counter)
pub const ALERTS_EMITTED_TOTAL: &str = "logward_alerts_emitted_total";

/// 싱크 실패로 버려진 알림 수 (counter, label: sink)
pub const ALERTS_DROPPED_TOTAL: &str = "logward_alerts_dropped_total";

/// 개별 패턴 평가 실패 수 (counter)
pub const MATCH_ERRORS_TOTAL: &str = "logward_match_errors_total";

/// 컴파일에 실패하여 제외된 패턴 수 (counter)
pub const PATTERN_COMPILE_ERRORS_TOTAL: &str = "logward_pattern_compile_errors_total";

/// 현재 규칙 저장소에 로드된 규칙 수 (gauge)
pub const RULES_LOADED: &str = "logward_rules_loaded";

/// 사전 필터를 통과한 후보 패턴 수 (counter)
pub const PREFILTER_CANDIDATES_TOTAL: &str = "logward_prefilter_candidates_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        RECORDS_PROCESSED_TOTAL,
        "Total number of log records evaluated against the rule store"
    );
    describe_counter!(
        RECORDS_FAILED_TOTAL,
        "Total number of log records skipped after a panic during evaluation"
    );
    describe_counter!(
        ALERTS_EMITTED_TOTAL,
        "Total number of alerts accepted by the alert sink"
    );
    describe_counter!(
        ALERTS_DROPPED_TOTAL,
        "Total number of alerts dropped by a streaming sink after a write failure"
    );
    describe_counter!(
        MATCH_ERRORS_TOTAL,
        "Total number of (rule, record) pairs skipped after a match failure"
    );
    describe_counter!(
        PATTERN_COMPILE_ERRORS_TOTAL,
        "Total number of rule patterns that failed to compile"
    );
    describe_gauge!(RULES_LOADED, "Number of rules in the current rule store");
    describe_counter!(
        PREFILTER_CANDIDATES_TOTAL,
        "Total number of patterns that passed the literal prefilter"
    );
}
