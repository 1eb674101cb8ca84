//! 도메인 타입 -- 규칙, 로그 레코드, 알림
//!
//! 엔진과 수집기/싱크가 주고받는 데이터 구조를 정의합니다.
//! 규칙 파일 형식이나 로그 소스 형식과는 무관한 중립적인 표현입니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 규칙에 level이 지정되지 않았을 때 사용하는 기본 심각도
pub const DEFAULT_RULE_LEVEL: u32 = 5;

/// 규칙에 설명이 없을 때 사용하는 기본 설명
pub const DEFAULT_DESCRIPTION: &str = "No description";

fn default_level() -> u32 {
    DEFAULT_RULE_LEVEL
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_owned()
}

/// 탐지 규칙
///
/// 하나 이상의 정규식 패턴과 심각도, 설명, 출처 모듈을 가집니다.
/// 유효한 패턴이 하나도 없는 규칙은 어떤 로그에도 매칭되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 규칙 고유 ID
    pub id: String,
    /// 심각도 (알림 메타데이터로만 사용, 필터링에는 사용하지 않음)
    #[serde(default = "default_level")]
    pub level: u32,
    /// 사람이 읽을 수 있는 설명
    #[serde(default = "default_description")]
    pub description: String,
    /// 정규식 패턴 목록 (순서 유지, 비어 있을 수 있음)
    #[serde(default)]
    pub patterns: Vec<String>,
    /// 출처 태그 (예: 규칙 파일이 위치한 디렉토리명)
    #[serde(default)]
    pub module: String,
}

impl Rule {
    /// 기본 level/description으로 새 규칙을 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level: DEFAULT_RULE_LEVEL,
            description: default_description(),
            patterns: Vec::new(),
            module: String::new(),
        }
    }

    /// 심각도를 설정합니다.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// 설명을 설정합니다.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 패턴을 하나 추가합니다.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// 출처 모듈을 설정합니다.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (level {}, {} patterns): {}",
            self.id,
            self.level,
            self.patterns.len(),
            self.description,
        )
    }
}

/// 로그 레코드
///
/// 매칭 대상 텍스트 한 줄과 출처 메타데이터입니다.
/// 구조화된 소스의 경우 `line`은 레코드의 정규화된 문자열 표현입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 매칭 대상 텍스트
    pub line: String,
    /// 원본 파일명
    pub file: String,
    /// 출처 모듈 (로그 파일이 위치한 디렉토리명)
    pub module: String,
}

impl LogRecord {
    /// 새 로그 레코드를 생성합니다.
    pub fn new(line: impl Into<String>, file: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            file: file.into(),
            module: module.into(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.module, self.file, self.line)
    }
}

/// 탐지 알림
///
/// 직렬화 필드 이름과 순서(`rule_id, level, description, log_line, module, file`)는
/// 하위 소비자와의 외부 계약입니다.
///
/// `module`은 로그가 아니라 **규칙**의 출처입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// 매칭된 규칙 ID
    pub rule_id: String,
    /// 규칙 심각도
    pub level: u32,
    /// 규칙 설명
    pub description: String,
    /// 매칭된 로그 라인
    pub log_line: String,
    /// 규칙의 출처 모듈
    pub module: String,
    /// 로그 파일명
    pub file: String,
}

impl Alert {
    /// 매칭된 규칙과 로그 레코드로부터 알림을 생성합니다.
    pub fn from_match(rule: &Rule, record: &LogRecord) -> Self {
        Self {
            rule_id: rule.id.clone(),
            level: rule.level,
            description: rule.description.clone(),
            log_line: record.line.clone(),
            module: rule.module.clone(),
            file: record.file.clone(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[level {}] {} (rule: {}, file: {})",
            self.level, self.description, self.rule_id, self.file,
        )
    }
}
