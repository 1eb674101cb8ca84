//! 로그 디렉토리 소스
//!
//! 로그 디렉토리를 재귀적으로 스캔하여 `.log`와 `.json` 파일을 레코드로 변환합니다.
//!
//! - `.log`: 한 줄에 레코드 하나 (앞뒤 공백 제거, 빈 줄 포함)
//! - `.json`: 최상위 배열의 요소마다 레코드 하나. 문자열 요소는 그대로,
//!   그 외 요소는 compact JSON 직렬화 문자열이 매칭 대상이 됩니다.
//!
//! 레코드의 `file`은 파일 이름, `module`은 파일이 위치한 디렉토리 이름입니다.
//! 읽을 수 없는 파일, 크기 제한 초과 파일, 잘못된 JSON은 경고 후 건너뜁니다.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde_json::Value;

use logward_core::types::LogRecord;

use super::LogSource;
use crate::error::EngineError;
use crate::walk;

/// 로그 파일 최대 크기
const MAX_LOG_FILE_SIZE: u64 = 256 * 1024 * 1024; // 256MB

const LOG_EXTENSIONS: &[&str] = &["log", "json"];

/// 로그 디렉토리를 파일 단위로 지연 로딩하는 소스
///
/// 한 번에 파일 하나의 레코드만 메모리에 올립니다.
pub struct LogDirectorySource {
    root: PathBuf,
    files: std::vec::IntoIter<PathBuf>,
    pending: VecDeque<LogRecord>,
    name: String,
}

impl LogDirectorySource {
    /// 디렉토리를 스캔하여 소스를 엽니다.
    ///
    /// # Errors
    /// 디렉토리를 읽을 수 없는 경우
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let root = dir.as_ref().to_path_buf();
        let files = walk::collect_files(&root, LOG_EXTENSIONS)
            .await
            .map_err(|e| EngineError::LogSource {
                path: root.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        tracing::debug!(dir = %root.display(), files = files.len(), "scanned log directory");

        Ok(Self {
            name: root.display().to_string(),
            root,
            files: files.into_iter(),
            pending: VecDeque::new(),
        })
    }

    /// 소스 루트 디렉토리
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 아직 읽지 않은 파일 수
    pub fn files_remaining(&self) -> usize {
        self.files.len()
    }
}

impl LogSource for LogDirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_record(&mut self) -> Result<Option<LogRecord>, EngineError> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }
            let Some(path) = self.files.next() else {
                return Ok(None);
            };
            match LogDirectoryLoader::load_file(&path).await {
                Ok(records) => self.pending.extend(records),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load log file, skipping");
                }
            }
        }
    }
}

/// 로그 디렉토리 로더
pub struct LogDirectoryLoader;

impl LogDirectoryLoader {
    /// 디렉토리의 모든 로그 레코드를 한 번에 로드합니다.
    ///
    /// 파일은 경로 순으로, 파일 내 레코드는 원래 순서대로 반환됩니다.
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<LogRecord>, EngineError> {
        let mut source = LogDirectorySource::open(dir).await?;
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await? {
            records.push(record);
        }

        tracing::info!(dir = %source.root().display(), count = records.len(), "loaded log records");
        Ok(records)
    }

    /// 단일 로그 파일을 로드합니다. 형식은 확장자로 결정합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<LogRecord>, EngineError> {
        let path = path.as_ref();
        let source = path.display().to_string();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| EngineError::LogSource {
                path: source.clone(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_LOG_FILE_SIZE {
            return Err(EngineError::LogSource {
                path: source,
                reason: format!(
                    "file too large: {} bytes (max: {MAX_LOG_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::LogSource {
                path: source.clone(),
                reason: format!("failed to read file: {e}"),
            })?;
        let content = String::from_utf8_lossy(&bytes);

        let file = walk::file_name(path);
        let module = walk::parent_name(path);
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::parse_json(&content, &file, &module, &source)
        } else {
            Ok(Self::parse_lines(&content, &file, &module))
        }
    }

    /// 텍스트 로그를 줄 단위 레코드로 변환합니다.
    pub fn parse_lines(content: &str, file: &str, module: &str) -> Vec<LogRecord> {
        content
            .lines()
            .map(|line| LogRecord::new(line.trim(), file, module))
            .collect()
    }

    /// JSON 배열을 요소 단위 레코드로 변환합니다.
    pub fn parse_json(
        content: &str,
        file: &str,
        module: &str,
        source: &str,
    ) -> Result<Vec<LogRecord>, EngineError> {
        let value: Value = serde_json::from_str(content).map_err(|e| EngineError::LogSource {
            path: source.to_owned(),
            reason: format!("JSON parse error: {e}"),
        })?;

        let Value::Array(entries) = value else {
            return Err(EngineError::LogSource {
                path: source.to_owned(),
                reason: "top-level JSON value must be an array".to_owned(),
            });
        };

        Ok(entries
            .into_iter()
            .map(|entry| LogRecord::new(render_entry(entry), file, module))
            .collect())
    }
}

/// JSON 요소를 매칭 대상 문자열로 변환합니다.
fn render_entry(entry: Value) -> String {
    match entry {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
