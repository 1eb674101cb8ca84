//! 규칙 저장소 -- 불변 규칙 집합과 컴파일된 패턴 테이블
//!
//! [`RuleStore`]는 한 번 빌드되면 변경되지 않으며, `Arc`로 감싸
//! 여러 워커 스레드에서 잠금 없이 공유합니다.
//!
//! 패턴은 규칙 순서 -> 패턴 순서로 하나의 평탄한 테이블에 저장됩니다.
//! 이 순서가 곧 매칭 결과의 열거 순서입니다.

use std::ops::Range;

use regex::{Regex, RegexBuilder};

use logward_core::config::EngineConfig;
use logward_core::metrics as m;
use logward_core::types::Rule;

use super::matcher::PatternMatcher;
use super::prefilter::LiteralIndex;
use crate::error::CompileError;

/// 정규식 컴파일 크기 제한 기본값 (10MB)
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// 사전 필터에 넣을 최소 리터럴 길이 기본값
pub const DEFAULT_MIN_LITERAL_LEN: usize = 2;

/// 컴파일된 패턴
#[derive(Debug)]
pub struct CompiledPattern {
    /// 소속 규칙의 저장소 내 인덱스
    pub(crate) rule_index: usize,
    /// 규칙 내 원본 패턴 인덱스
    pub(crate) pattern_index: usize,
    /// 대소문자 무시로 컴파일된 정규식
    pub(crate) regex: Regex,
}

/// 컴파일된 규칙 -- 원본 규칙과 패턴 테이블 내 범위
#[derive(Debug)]
pub struct CompiledRule {
    rule: Rule,
    patterns: Range<usize>,
}

impl CompiledRule {
    /// 원본 규칙을 반환합니다.
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// 사용 가능한 패턴 수를 반환합니다.
    pub fn usable_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// 사용 가능한 패턴이 하나도 없어 절대 매칭되지 않는지 여부
    pub fn is_inert(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// 규칙 저장소 빌더
#[derive(Debug, Clone)]
pub struct RuleStoreBuilder {
    prefilter: bool,
    regex_size_limit: usize,
    min_literal_len: usize,
}

impl Default for RuleStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStoreBuilder {
    /// 기본 옵션으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            prefilter: true,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
            min_literal_len: DEFAULT_MIN_LITERAL_LEN,
        }
    }

    /// core 엔진 설정에서 빌더를 생성합니다.
    pub fn from_core(engine: &EngineConfig) -> Self {
        Self::new()
            .prefilter(engine.prefilter)
            .regex_size_limit(engine.regex_size_limit)
    }

    /// 리터럴 사전 필터 사용 여부를 설정합니다.
    pub fn prefilter(mut self, enabled: bool) -> Self {
        self.prefilter = enabled;
        self
    }

    /// 패턴당 정규식 컴파일 크기 제한을 설정합니다.
    pub fn regex_size_limit(mut self, limit: usize) -> Self {
        self.regex_size_limit = limit;
        self
    }

    /// 사전 필터에 넣을 최소 리터럴 길이를 설정합니다.
    pub fn min_literal_len(mut self, len: usize) -> Self {
        self.min_literal_len = len;
        self
    }

    /// 규칙 목록으로 저장소를 빌드합니다.
    ///
    /// 컴파일에 실패한 패턴은 [`CompileError`]로 기록되고 제외됩니다.
    /// 빌드 자체는 실패하지 않습니다.
    pub fn build(self, rules: impl IntoIterator<Item = Rule>) -> RuleStore {
        let mut compiled_rules: Vec<CompiledRule> = Vec::new();
        let mut patterns: Vec<CompiledPattern> = Vec::new();
        let mut compile_errors = Vec::new();
        let mut rules_skipped = 0;
        let mut inert_rules = 0;

        for rule in rules {
            let rule_index = compiled_rules.len();
            let start = patterns.len();
            let mut failed = false;

            for (pattern_index, pattern) in rule.patterns.iter().enumerate() {
                if pattern.is_empty() {
                    continue;
                }
                match RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .size_limit(self.regex_size_limit)
                    .build()
                {
                    Ok(regex) => patterns.push(CompiledPattern {
                        rule_index,
                        pattern_index,
                        regex,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            rule_id = %rule.id,
                            pattern = %pattern,
                            error = %e,
                            "pattern failed to compile, skipping pattern"
                        );
                        metrics::counter!(m::PATTERN_COMPILE_ERRORS_TOTAL).increment(1);
                        compile_errors.push(CompileError {
                            rule_id: rule.id.clone(),
                            pattern: pattern.clone(),
                            reason: e.to_string(),
                        });
                        failed = true;
                    }
                }
            }

            if failed {
                rules_skipped += 1;
            }
            let range = start..patterns.len();
            if range.is_empty() {
                inert_rules += 1;
                tracing::debug!(rule_id = %rule.id, "rule has no usable patterns and will never match");
            }
            compiled_rules.push(CompiledRule {
                rule,
                patterns: range,
            });
        }

        let prefilter = self.prefilter.then(|| {
            LiteralIndex::build(
                patterns.iter().map(|p| {
                    compiled_rules[p.rule_index].rule.patterns[p.pattern_index].as_str()
                }),
                self.min_literal_len,
            )
        });

        tracing::info!(
            rules = compiled_rules.len(),
            patterns = patterns.len(),
            compile_errors = compile_errors.len(),
            inert_rules,
            prefilter = prefilter.is_some(),
            "rule store built"
        );
        metrics::gauge!(m::RULES_LOADED).set(compiled_rules.len() as f64);

        RuleStore {
            rules: compiled_rules,
            patterns,
            prefilter,
            compile_errors,
            rules_skipped,
            inert_rules,
        }
    }
}

/// 불변 규칙 저장소
///
/// 빌드 이후 읽기 전용이므로 `Send + Sync`이며 `Arc`로 공유할 수 있습니다.
pub struct RuleStore {
    rules: Vec<CompiledRule>,
    patterns: Vec<CompiledPattern>,
    prefilter: Option<LiteralIndex>,
    compile_errors: Vec<CompileError>,
    rules_skipped: usize,
    inert_rules: usize,
}

impl RuleStore {
    /// 기본 옵션(사전 필터 사용)으로 저장소를 빌드합니다.
    pub fn build(rules: impl IntoIterator<Item = Rule>) -> Self {
        RuleStoreBuilder::new().build(rules)
    }

    /// 저장소 빌더를 반환합니다.
    pub fn builder() -> RuleStoreBuilder {
        RuleStoreBuilder::new()
    }

    /// 이 저장소에 대한 패턴 매처를 생성합니다.
    pub fn matcher(&self) -> PatternMatcher<'_> {
        PatternMatcher::new(self)
    }

    /// 로드된 규칙을 로드 순서대로 순회합니다.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(CompiledRule::rule)
    }

    /// 컴파일된 규칙을 로드 순서대로 순회합니다.
    pub fn compiled_rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// 로드된 규칙 수
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 사용 가능한(컴파일된) 패턴 수
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 패턴 컴파일 에러 목록
    pub fn compile_errors(&self) -> &[CompileError] {
        &self.compile_errors
    }

    /// 하나 이상의 패턴이 컴파일에 실패한 규칙 수
    pub fn rules_skipped(&self) -> usize {
        self.rules_skipped
    }

    /// 컴파일에 실패해 제외된 패턴 수
    pub fn patterns_skipped(&self) -> usize {
        self.compile_errors.len()
    }

    /// 사용 가능한 패턴이 없는 규칙 수
    pub fn inert_rules(&self) -> usize {
        self.inert_rules
    }

    /// 사전 필터 사용 여부
    pub fn has_prefilter(&self) -> bool {
        self.prefilter.is_some()
    }

    pub(crate) fn prefilter_index(&self) -> Option<&LiteralIndex> {
        self.prefilter.as_ref()
    }

    pub(crate) fn pattern(&self, id: usize) -> &CompiledPattern {
        &self.patterns[id]
    }

    pub(crate) fn rule_at(&self, index: usize) -> &Rule {
        &self.rules[index].rule
    }
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore")
            .field("rules", &self.rules.len())
            .field("patterns", &self.patterns.len())
            .field("prefilter", &self.prefilter.is_some())
            .field("compile_errors", &self.compile_errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, patterns: &[&str]) -> Rule {
        patterns
            .iter()
            .fold(Rule::new(id), |rule, p| rule.with_pattern(*p))
    }

    #[test]
    fn store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleStore>();
    }

    #[test]
    fn builds_all_valid_patterns() {
        let store = RuleStore::build([
            rule("1", &["failed password", "invalid user"]),
            rule("2", &[r"\d+\.\d+\.\d+\.\d+"]),
        ]);
        assert_eq!(store.rule_count(), 2);
        assert_eq!(store.pattern_count(), 3);
        assert!(store.compile_errors().is_empty());
        assert_eq!(store.rules_skipped(), 0);
    }

    #[test]
    fn invalid_pattern_is_skipped_and_recorded() {
        let store = RuleStore::build([
            rule("100200", &["[unclosed", "valid"]),
            rule("100201", &["ok"]),
        ]);
        assert_eq!(store.rule_count(), 2);
        assert_eq!(store.pattern_count(), 2);
        assert_eq!(store.rules_skipped(), 1);
        assert_eq!(store.patterns_skipped(), 1);
        assert_eq!(store.compile_errors()[0].rule_id, "100200");
        assert_eq!(store.compile_errors()[0].pattern, "[unclosed");
        assert_eq!(store.inert_rules(), 0);
    }

    #[test]
    fn rule_without_patterns_is_inert() {
        let store = RuleStore::build([rule("1", &[]), rule("2", &["", "[bad"])]);
        assert_eq!(store.rule_count(), 2);
        assert_eq!(store.inert_rules(), 2);
        assert!(store.compiled_rules().iter().all(CompiledRule::is_inert));
    }

    #[test]
    fn rules_keep_load_order() {
        let store = RuleStore::build([rule("b", &["x"]), rule("a", &["y"])]);
        let ids: Vec<_> = store.rules().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn regex_size_limit_rejects_huge_patterns() {
        let store = RuleStore::builder()
            .regex_size_limit(64)
            .build([rule("big", &[r"\w{500}"])]);
        assert_eq!(store.patterns_skipped(), 1);
        assert_eq!(store.inert_rules(), 1);
    }

    #[test]
    fn prefilter_can_be_disabled() {
        let store = RuleStore::builder()
            .prefilter(false)
            .build([rule("1", &["abc"])]);
        assert!(!store.has_prefilter());
        assert!(RuleStore::build([rule("1", &["abc"])]).has_prefilter());
    }

    #[test]
    fn from_core_reads_engine_options() {
        let engine = EngineConfig {
            prefilter: false,
            ..EngineConfig::default()
        };
        let store = RuleStoreBuilder::from_core(&engine).build([rule("1", &["abc"])]);
        assert!(!store.has_prefilter());
    }
}
