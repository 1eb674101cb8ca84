//! 리터럴 사전 필터 -- 정규식 평가 전에 후보 패턴을 빠르게 추려냅니다.
//!
//! 각 패턴의 HIR에서 "매칭이 성립하려면 반드시 등장해야 하는" 가장 긴 리터럴을
//! 추출하고, 모든 리터럴을 하나의 Aho-Corasick 오토마톤에 넣습니다.
//! 한 라인에 대해 오토마톤을 한 번 훑으면 리터럴이 등장한 패턴과
//! 리터럴이 없는 패턴만 정규식 평가 후보로 남습니다.
//!
//! # 정확성
//! - 리터럴은 ASCII일 때만 인덱싱합니다. 대소문자 무시 정규식은 ASCII 문자와
//!   일부 비ASCII 문자(예: `k`와 U+212A KELVIN SIGN)를 동일시하므로,
//!   비ASCII 라인에서는 필터를 우회하고 모든 패턴을 평가합니다.
//! - 필터는 필요조건만 검사하므로 매칭 결과를 바꾸지 않고 속도만 바꿉니다.

use std::collections::HashMap;

use aho_corasick::AhoCorasick;
use regex_syntax::hir::{Hir, HirKind};

/// 라인별 후보 패턴 집합
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// 필터를 적용할 수 없음 -- 모든 패턴을 평가
    All,
    /// 평가할 패턴 ID 목록 (오름차순, 중복 없음)
    Only(Vec<u32>),
}

/// 리터럴 인덱스
///
/// 패턴 ID는 규칙 저장소의 평탄화된 패턴 순서(규칙 순서 -> 패턴 순서)를 따릅니다.
pub struct LiteralIndex {
    /// 고유 리터럴 오토마톤 (ASCII 대소문자 무시)
    automaton: Option<AhoCorasick>,
    /// 리터럴 번호 -> 해당 리터럴을 요구하는 패턴 ID 목록
    literal_owners: Vec<Vec<u32>>,
    /// 리터럴이 없어 항상 평가해야 하는 패턴 ID (오름차순)
    always: Vec<u32>,
    /// 인덱싱된 패턴 수
    indexed_patterns: usize,
}

impl LiteralIndex {
    /// 패턴 목록으로 인덱스를 생성합니다.
    ///
    /// `min_literal_len`보다 짧은 리터럴은 필터 효과가 낮으므로 인덱싱하지 않습니다.
    pub fn build<'a>(patterns: impl IntoIterator<Item = &'a str>, min_literal_len: usize) -> Self {
        let mut literal_ids: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut literals: Vec<Vec<u8>> = Vec::new();
        let mut literal_owners: Vec<Vec<u32>> = Vec::new();
        let mut always = Vec::new();
        let mut indexed_patterns = 0;

        for (id, pattern) in patterns.into_iter().enumerate() {
            let Ok(id) = u32::try_from(id) else {
                tracing::warn!("too many patterns for literal index, disabling prefilter");
                return Self::disabled();
            };

            match required_literal(pattern) {
                Some(literal) if literal.len() >= min_literal_len.max(1) && literal.is_ascii() => {
                    let key = literal.to_ascii_lowercase();
                    let slot = *literal_ids.entry(key).or_insert_with(|| {
                        literals.push(literal);
                        literal_owners.push(Vec::new());
                        literals.len() - 1
                    });
                    literal_owners[slot].push(id);
                    indexed_patterns += 1;
                }
                _ => always.push(id),
            }
        }

        if literals.is_empty() {
            return Self {
                automaton: None,
                literal_owners,
                always,
                indexed_patterns,
            };
        }

        match AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&literals)
        {
            Ok(automaton) => {
                tracing::debug!(
                    literals = literals.len(),
                    indexed_patterns,
                    unindexed_patterns = always.len(),
                    "built literal prefilter"
                );
                Self {
                    automaton: Some(automaton),
                    literal_owners,
                    always,
                    indexed_patterns,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to build literal automaton, disabling prefilter");
                Self::disabled()
            }
        }
    }

    /// 아무것도 거르지 않는 인덱스
    fn disabled() -> Self {
        Self {
            automaton: None,
            literal_owners: Vec::new(),
            always: Vec::new(),
            indexed_patterns: 0,
        }
    }

    /// 리터럴로 인덱싱된 패턴 수를 반환합니다.
    pub fn indexed_patterns(&self) -> usize {
        self.indexed_patterns
    }

    /// 항상 평가되는 패턴 수를 반환합니다.
    pub fn unindexed_patterns(&self) -> usize {
        self.always.len()
    }

    /// 라인에 대해 평가할 후보 패턴을 계산합니다.
    pub fn candidates(&self, line: &str) -> Candidates {
        let Some(automaton) = &self.automaton else {
            return Candidates::All;
        };
        if !line.is_ascii() {
            return Candidates::All;
        }

        let mut seen = vec![false; self.literal_owners.len()];
        let mut ids = self.always.clone();
        for m in automaton.find_overlapping_iter(line) {
            let literal = m.pattern().as_usize();
            if !seen[literal] {
                seen[literal] = true;
                ids.extend_from_slice(&self.literal_owners[literal]);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Candidates::Only(ids)
    }
}

/// 패턴의 모든 매칭에 반드시 포함되는 가장 긴 리터럴을 추출합니다.
///
/// 파싱할 수 없거나 필수 리터럴이 없으면 `None`을 반환합니다.
pub fn required_literal(pattern: &str) -> Option<Vec<u8>> {
    let hir = regex_syntax::ParserBuilder::new()
        .build()
        .parse(pattern)
        .ok()?;
    longest_required(&hir).filter(|literal| !literal.is_empty())
}

fn longest_required(hir: &Hir) -> Option<Vec<u8>> {
    match hir.kind() {
        HirKind::Literal(literal) => Some(literal.0.to_vec()),
        HirKind::Capture(capture) => longest_required(&capture.sub),
        HirKind::Repetition(repetition) if repetition.min >= 1 => {
            longest_required(&repetition.sub)
        }
        HirKind::Concat(subs) => {
            let mut best: Option<Vec<u8>> = None;
            let mut run: Vec<u8> = Vec::new();
            for sub in subs {
                if let HirKind::Literal(literal) = sub.kind() {
                    run.extend_from_slice(&literal.0);
                    continue;
                }
                keep_longer(&mut best, std::mem::take(&mut run));
                if let Some(inner) = longest_required(sub) {
                    keep_longer(&mut best, inner);
                }
            }
            keep_longer(&mut best, run);
            best
        }
        _ => None,
    }
}

fn keep_longer(best: &mut Option<Vec<u8>>, candidate: Vec<u8>) {
    let longer = best
        .as_ref()
        .is_none_or(|current| candidate.len() > current.len());
    if longer && !candidate.is_empty() {
        *best = Some(candidate);
    }
}
