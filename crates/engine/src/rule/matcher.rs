//! 패턴 매처 -- 한 라인을 규칙 저장소 전체에 대해 평가합니다.
//!
//! [`PatternMatcher::matches`]는 매칭된 (규칙, 패턴) 쌍을 규칙 로드 순서,
//! 규칙 내 패턴 순서대로 지연 열거합니다. 사전 필터가 켜져 있으면
//! 후보 패턴만 평가하지만 결과 집합과 순서는 동일합니다.
//!
//! 개별 패턴 평가 중 패닉이 발생하면 해당 쌍만 [`MatchError`]로 보고하고
//! 나머지 평가는 계속됩니다.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use logward_core::types::Rule;

use super::prefilter::Candidates;
use super::store::RuleStore;
use crate::error::MatchError;

/// 이 표식을 포함한 라인은 패턴 평가 중 패닉을 일으킵니다 (테스트 전용).
#[cfg(test)]
pub(crate) const PANIC_IN_PATTERN_MARKER: &str = "<<pattern-panic>>";

/// 매칭된 (규칙, 패턴) 쌍
#[derive(Debug, Clone, Copy)]
pub struct PatternHit<'s> {
    /// 매칭된 규칙
    pub rule: &'s Rule,
    /// 매칭된 원본 패턴 문자열
    pub pattern: &'s str,
    /// 규칙 내 패턴 인덱스
    pub pattern_index: usize,
}

/// 규칙 저장소에 대한 패턴 매처
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher<'s> {
    store: &'s RuleStore,
}

impl<'s> PatternMatcher<'s> {
    /// 저장소에 대한 매처를 생성합니다.
    pub fn new(store: &'s RuleStore) -> Self {
        Self { store }
    }

    /// 라인에 매칭되는 모든 (규칙, 패턴) 쌍을 지연 열거합니다.
    ///
    /// 빈 라인은 어떤 패턴에도 매칭되지 않습니다.
    pub fn matches<'l>(&self, line: &'l str) -> Matches<'s, 'l> {
        let cursor = if line.is_empty() || self.store.pattern_count() == 0 {
            Cursor::Empty
        } else {
            match self.store.prefilter_index().map(|index| index.candidates(line)) {
                Some(Candidates::Only(ids)) => Cursor::Indexed(ids.into_iter()),
                Some(Candidates::All) | None => Cursor::All {
                    next: 0,
                    end: self.store.pattern_count(),
                },
            }
        };
        Matches {
            store: self.store,
            line,
            cursor,
        }
    }

    /// 라인이 하나 이상의 패턴에 매칭되는지 확인합니다.
    ///
    /// 평가 에러는 매칭 실패로 간주합니다.
    pub fn is_match(&self, line: &str) -> bool {
        self.matches(line).any(|result| result.is_ok())
    }
}

enum Cursor {
    Empty,
    All { next: usize, end: usize },
    Indexed(std::vec::IntoIter<u32>),
}

impl Cursor {
    fn next_id(&mut self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::All { next, end } => {
                if *next >= *end {
                    return None;
                }
                let id = *next;
                *next += 1;
                Some(id)
            }
            Self::Indexed(ids) => ids.next().map(|id| id as usize),
        }
    }

    fn remaining(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::All { next, end } => end.saturating_sub(*next),
            Self::Indexed(ids) => ids.len(),
        }
    }
}

/// 매칭 결과 반복자
///
/// 각 항목은 매칭된 쌍이거나 해당 쌍의 평가 에러입니다.
pub struct Matches<'s, 'l> {
    store: &'s RuleStore,
    line: &'l str,
    cursor: Cursor,
}

impl Matches<'_, '_> {
    /// 아직 평가하지 않은 후보 패턴 수
    pub fn candidates_remaining(&self) -> usize {
        self.cursor.remaining()
    }
}

impl<'s> Iterator for Matches<'s, '_> {
    type Item = Result<PatternHit<'s>, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.cursor.next_id()?;
            let compiled = self.store.pattern(id);
            let rule = self.store.rule_at(compiled.rule_index);
            let pattern = rule.patterns[compiled.pattern_index].as_str();

            let line = self.line;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                #[cfg(test)]
                if line.contains(PANIC_IN_PATTERN_MARKER) {
                    panic!("pattern evaluation panicked");
                }
                compiled.regex.is_match(line)
            }));
            match outcome {
                Ok(true) => {
                    return Some(Ok(PatternHit {
                        rule,
                        pattern,
                        pattern_index: compiled.pattern_index,
                    }));
                }
                Ok(false) => {}
                Err(payload) => {
                    return Some(Err(MatchError {
                        rule_id: rule.id.clone(),
                        pattern: pattern.to_owned(),
                        reason: panic_message(payload.as_ref()),
                    }));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.cursor.remaining()))
    }
}

/// 패닉 페이로드에서 메시지를 추출합니다.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}
