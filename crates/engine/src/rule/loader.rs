//! 규칙 파일 로더 -- XML/YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 디렉토리를 재귀적으로 스캔하여 `.xml`(Wazuh 스타일)과
//! `.yml`/`.yaml` 파일을 파싱합니다. 규칙의 `module`은 파일이 위치한
//! 디렉토리 이름입니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.
//!
//! # XML 형식
//! ```xml
//! <group name="sshd,">
//!   <rule id="100001" level="10">
//!     <description>SSH authentication failure</description>
//!     <field name="msg">failed password</field>
//!   </rule>
//! </group>
//! ```
//! - `id` 속성이 없으면 `"unknown"`, `level`이 없거나 정수가 아니면 기본값을 사용합니다.
//! - `description`은 `rule`의 직속 자식만 인정합니다.
//! - `rule` 하위 어디에 있든 비어 있지 않은 `field` 텍스트가 패턴이 됩니다.

use std::collections::HashSet;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use logward_core::types::{DEFAULT_DESCRIPTION, DEFAULT_RULE_LEVEL, Rule};

use crate::error::EngineError;
use crate::walk;

/// 규칙 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 로드할 수 있는 최대 규칙 수
const MAX_RULES_COUNT: usize = 50_000;
/// 규칙 ID 최대 길이
const MAX_RULE_ID_LEN: usize = 256;
/// `id` 속성이 없는 XML 규칙의 ID
const UNKNOWN_RULE_ID: &str = "unknown";

const RULE_EXTENSIONS: &[&str] = &["xml", "yml", "yaml"];

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 디렉토리에서 모든 규칙 파일을 재귀적으로 로드합니다.
    ///
    /// 파일은 경로 순으로 처리되며, 파일 내 규칙 순서가 유지됩니다.
    /// 이미 로드된 ID와 중복되는 규칙은 경고 후 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<Rule>, EngineError> {
        let dir = dir.as_ref();

        let files = walk::collect_files(dir, RULE_EXTENSIONS)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        let mut rules = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in &files {
            let loaded = match Self::load_file(path).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                    continue;
                }
            };

            for rule in loaded {
                if let Err(e) = validate_rule(&rule) {
                    tracing::warn!(path = %path.display(), error = %e, "invalid rule, skipping");
                    continue;
                }
                // 중복 ID 검사
                if !seen_ids.insert(rule.id.clone()) {
                    tracing::warn!(
                        rule_id = %rule.id,
                        path = %path.display(),
                        "duplicate rule id, skipping"
                    );
                    continue;
                }
                rules.push(rule);
            }

            if rules.len() > MAX_RULES_COUNT {
                return Err(EngineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rules: max {MAX_RULES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            count = rules.len(),
            "loaded detection rules"
        );

        Ok(rules)
    }

    /// 단일 규칙 파일을 로드합니다. 형식은 확장자로 결정합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<Rule>, EngineError> {
        let path = path.as_ref();
        let source = path.display().to_string();

        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: source.clone(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(EngineError::RuleLoad {
                path: source,
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: source.clone(),
                reason: format!("failed to read file: {e}"),
            })?;

        let module = walk::parent_name(path);
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));

        if is_xml {
            Self::parse_xml(&content, &module, &source)
        } else {
            Self::parse_yaml(&content, &module, &source)
        }
    }

    /// Wazuh 스타일 XML 문서에서 규칙을 추출합니다.
    ///
    /// 루트 요소가 여러 개인 문서도 허용합니다.
    pub fn parse_xml(xml: &str, module: &str, source: &str) -> Result<Vec<Rule>, EngineError> {
        let mut reader = Reader::from_str(xml);
        let mut rules = Vec::new();

        // 현재 열려 있는 rule과 rule 기준 중첩 깊이
        let mut current: Option<Rule> = None;
        let mut depth = 0usize;
        let mut description: Option<String> = None;
        let mut capture: Option<Capture> = None;

        loop {
            let event = reader.read_event().map_err(|e| EngineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("XML parse error at byte {}: {e}", reader.buffer_position()),
            })?;

            match event {
                Event::Start(start) => {
                    if current.is_some() {
                        depth += 1;
                        match start.name().as_ref() {
                            b"description" if depth == 1 && description.is_none() => {
                                capture = Some(Capture::description(depth));
                            }
                            b"field" => capture = Some(Capture::field(depth)),
                            _ => {}
                        }
                    } else if start.name().as_ref() == b"rule" {
                        current = Some(start_rule(&start, module, source)?);
                        depth = 0;
                        description = None;
                    }
                }
                Event::Empty(start) => {
                    if current.is_none() && start.name().as_ref() == b"rule" {
                        rules.push(start_rule(&start, module, source)?);
                    } else if current.is_some()
                        && depth == 0
                        && description.is_none()
                        && start.name().as_ref() == b"description"
                    {
                        description = Some(String::new());
                    }
                }
                Event::Text(text) => {
                    if let Some(capture) = capture.as_mut() {
                        let text = text.unescape().map_err(|e| EngineError::RuleLoad {
                            path: source.to_owned(),
                            reason: format!("invalid XML text: {e}"),
                        })?;
                        capture.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(capture) = capture.as_mut() {
                        capture
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    if current.is_none() {
                        continue;
                    }
                    if depth == 0 {
                        // </rule>
                        if let Some(mut rule) = current.take() {
                            rule.description = description
                                .take()
                                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_owned());
                            rules.push(rule);
                        }
                        continue;
                    }
                    if let Some(done) = capture.take_if(|c| c.depth == depth) {
                        match done.kind {
                            CaptureKind::Description => description = Some(done.text),
                            CaptureKind::Field if !done.text.trim().is_empty() => {
                                if let Some(rule) = current.as_mut() {
                                    rule.patterns.push(done.text);
                                }
                            }
                            CaptureKind::Field => {}
                        }
                    }
                    depth -= 1;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if current.is_some() {
            return Err(EngineError::RuleLoad {
                path: source.to_owned(),
                reason: "unexpected end of document inside <rule>".to_owned(),
            });
        }

        Ok(rules)
    }

    /// YAML 규칙 목록을 파싱합니다.
    ///
    /// 문서는 규칙의 시퀀스여야 합니다. `module`이 비어 있는 규칙은
    /// 디렉토리 이름을 모듈로 사용합니다.
    pub fn parse_yaml(yaml: &str, module: &str, source: &str) -> Result<Vec<Rule>, EngineError> {
        let mut rules: Vec<Rule> =
            serde_yaml::from_str(yaml).map_err(|e| EngineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        for rule in &mut rules {
            if rule.module.is_empty() {
                rule.module = module.to_owned();
            }
        }
        Ok(rules)
    }
}

/// 캡처 중인 텍스트 요소
struct Capture {
    kind: CaptureKind,
    depth: usize,
    text: String,
}

enum CaptureKind {
    Description,
    Field,
}

impl Capture {
    fn description(depth: usize) -> Self {
        Self {
            kind: CaptureKind::Description,
            depth,
            text: String::new(),
        }
    }

    fn field(depth: usize) -> Self {
        Self {
            kind: CaptureKind::Field,
            depth,
            text: String::new(),
        }
    }
}

/// `<rule>` 시작 태그의 속성으로 규칙을 생성합니다.
fn start_rule(start: &BytesStart<'_>, module: &str, source: &str) -> Result<Rule, EngineError> {
    let mut id = None;
    let mut level = DEFAULT_RULE_LEVEL;

    for attr in start.attributes() {
        let attr = attr.map_err(|e| EngineError::RuleLoad {
            path: source.to_owned(),
            reason: format!("invalid rule attribute: {e}"),
        })?;
        let value = attr.unescape_value().map_err(|e| EngineError::RuleLoad {
            path: source.to_owned(),
            reason: format!("invalid rule attribute value: {e}"),
        })?;

        match attr.key.as_ref() {
            b"id" => id = Some(value.into_owned()),
            b"level" => match value.trim().parse::<u32>() {
                Ok(parsed) => level = parsed,
                Err(_) => tracing::warn!(
                    path = source,
                    level = %value,
                    default = DEFAULT_RULE_LEVEL,
                    "rule level is not an integer, using default"
                ),
            },
            _ => {}
        }
    }

    Ok(Rule::new(id.unwrap_or_else(|| UNKNOWN_RULE_ID.to_owned()))
        .with_level(level)
        .with_module(module))
}

/// 규칙 유효성을 검증합니다.
fn validate_rule(rule: &Rule) -> Result<(), EngineError> {
    if rule.id.trim().is_empty() {
        return Err(EngineError::RuleValidation {
            rule_id: rule.id.clone(),
            reason: "rule id must not be empty".to_owned(),
        });
    }
    if rule.id.len() > MAX_RULE_ID_LEN {
        return Err(EngineError::RuleValidation {
            rule_id: rule.id.chars().take(32).collect(),
            reason: format!("rule id too long: max {MAX_RULE_ID_LEN}"),
        });
    }
    Ok(())
}
