//! 알림 싱크 -- 방출된 알림의 최종 목적지
//!
//! [`AlertSink`]는 동기 인터페이스입니다. 파이프라인은 싱크를 전용 블로킹
//! 스레드에서 구동하므로 구현체는 블로킹 I/O를 자유롭게 사용할 수 있습니다.
//!
//! # 제공 싱크
//! - [`JsonArrayFileSink`]: 들여쓰기된 단일 JSON 배열 파일 (임시 파일 후 rename)
//! - [`NdjsonSink`]: 줄 단위 JSON 스트림 (파일은 임시 파일 후 rename)
//! - [`ChannelSink`]: tokio mpsc 채널로 전달
//! - [`MemorySink`]: 테스트/임베딩용 인메모리 수집

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tokio::sync::mpsc;

use logward_core::types::Alert;

use crate::error::SinkError;

/// JSON 배열 요소 들여쓰기
const INDENT: &[u8] = b"    ";

/// 싱크 쓰기 실패 시 처리 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 실행 전체를 실패시킴 (기본값)
    #[default]
    Abort,
    /// 해당 알림만 버리고 계속 진행 (버린 수는 집계됨)
    DropAndContinue,
}

/// 알림 싱크
pub trait AlertSink: Send {
    /// 로그와 메트릭에 사용할 싱크 이름
    fn name(&self) -> &str;

    /// 알림 하나를 전달합니다.
    fn send(&mut self, alert: Alert) -> Result<(), SinkError>;

    /// 버퍼링된 알림을 확정합니다. 실행 종료 시 한 번 호출됩니다.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// `send` 실패 시 처리 정책
    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Abort
    }
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&mut self, alert: Alert) -> Result<(), SinkError> {
        (**self).send(alert)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn failure_policy(&self) -> FailurePolicy {
        (**self).failure_policy()
    }
}

// --- JSON 배열 파일 ---

/// 알림을 4칸 들여쓰기된 단일 JSON 배열로 파일에 기록하는 싱크
///
/// 알림은 `<path>.tmp`에 스트리밍되고 `flush` 시점에 최종 경로로 rename됩니다.
/// 확정 전에 드롭되면 임시 파일을 지우므로 중단된 실행이
/// 불완전한 배열을 남기지 않습니다. 알림이 없으면 `[]`를 기록합니다.
pub struct JsonArrayFileSink {
    path: PathBuf,
    tmp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl JsonArrayFileSink {
    /// 임시 파일을 생성하고 배열을 엽니다.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = tmp_path_for(&path);

        let mut writer = BufWriter::new(File::create(&tmp_path).map_err(|e| SinkError::Io {
            sink: path.display().to_string(),
            source: e,
        })?);
        writer.write_all(b"[").map_err(|e| SinkError::Io {
            sink: path.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            path,
            tmp_path,
            writer: Some(writer),
            written: 0,
        })
    }

    /// 최종 출력 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 기록된 알림 수
    pub fn written(&self) -> u64 {
        self.written
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            sink: self.path.display().to_string(),
            source,
        }
    }
}

impl AlertSink for JsonArrayFileSink {
    fn name(&self) -> &str {
        "json-array"
    }

    fn send(&mut self, alert: Alert) -> Result<(), SinkError> {
        let element = render_pretty(&alert).map_err(|e| SinkError::Serialize {
            sink: self.path.display().to_string(),
            source: e,
        })?;

        let separator: &[u8] = if self.written == 0 { b"\n" } else { b",\n" };
        let Some(writer) = self.writer.as_mut() else {
            return Err(SinkError::Closed(self.path.display().to_string()));
        };

        let result = (|| -> std::io::Result<()> {
            writer.write_all(separator)?;
            writer.write_all(INDENT)?;
            for (i, line) in element.split(|b| *b == b'\n').enumerate() {
                if i > 0 {
                    writer.write_all(b"\n")?;
                    writer.write_all(INDENT)?;
                }
                writer.write_all(line)?;
            }
            Ok(())
        })();
        result.map_err(|e| self.io_error(e))?;

        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        let closing: &[u8] = if self.written == 0 { b"]" } else { b"\n]" };
        writer
            .write_all(closing)
            .and_then(|()| writer.flush())
            .map_err(|e| self.io_error(e))?;
        drop(writer);

        std::fs::rename(&self.tmp_path, &self.path).map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), alerts = self.written, "alert file written");
        Ok(())
    }
}

impl Drop for JsonArrayFileSink {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

fn render_pretty(alert: &Alert) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    alert.serialize(&mut ser)?;
    Ok(buf)
}

// --- NDJSON ---

/// 알림을 한 줄에 하나씩 JSON 객체로 기록하는 스트리밍 싱크
///
/// 쓰기 실패 시 해당 알림만 버리고 계속 진행합니다.
/// [`create`](NdjsonSink::create)로 연 싱크는 `<path>.tmp`에 기록하고
/// `flush` 시점에 최종 경로로 rename하므로, 실패한 실행이 기존 출력 파일을
/// 덮어쓰지 않습니다.
pub struct NdjsonSink<W: Write + Send> {
    name: String,
    writer: W,
    rename: Option<PendingRename>,
}

/// 확정 전에 드롭되면 임시 파일을 지웁니다.
struct PendingRename {
    tmp_path: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl PendingRename {
    fn commit(&mut self) -> std::io::Result<()> {
        if !self.committed {
            std::fs::rename(&self.tmp_path, &self.path)?;
            self.committed = true;
        }
        Ok(())
    }
}

impl Drop for PendingRename {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    PathBuf::from(tmp_name)
}

impl<W: Write + Send> NdjsonSink<W> {
    /// 임의의 writer 위에 싱크를 생성합니다.
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
            rename: None,
        }
    }

    /// 내부 writer를 반환합니다.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl NdjsonSink<BufWriter<File>> {
    /// 임시 파일을 생성하여 싱크를 엽니다. 최종 경로는 `flush`까지 건드리지 않습니다.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = tmp_path_for(&path);
        let file = File::create(&tmp_path).map_err(|e| SinkError::Io {
            sink: path.display().to_string(),
            source: e,
        })?;
        let mut sink = Self::new(path.display().to_string(), BufWriter::new(file));
        sink.rename = Some(PendingRename {
            tmp_path,
            path,
            committed: false,
        });
        Ok(sink)
    }
}

impl<W: Write + Send> AlertSink for NdjsonSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, alert: Alert) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&alert).map_err(|e| SinkError::Serialize {
            sink: self.name.clone(),
            source: e,
        })?;
        line.push(b'\n');
        self.writer.write_all(&line).map_err(|e| SinkError::Io {
            sink: self.name.clone(),
            source: e,
        })
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let result = self.writer.flush().and_then(|()| match self.rename.as_mut() {
            Some(rename) => rename.commit(),
            None => Ok(()),
        });
        result.map_err(|e| SinkError::Io {
            sink: self.name.clone(),
            source: e,
        })
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::DropAndContinue
    }
}

// --- 채널 ---

/// tokio mpsc 채널로 알림을 전달하는 싱크
///
/// 채널이 가득 차면 블로킹하여 역압을 전파합니다.
/// 비동기 런타임 스레드가 아닌 블로킹 컨텍스트에서만 사용해야 합니다.
pub struct ChannelSink {
    name: String,
    tx: mpsc::Sender<Alert>,
}

impl ChannelSink {
    /// 채널 송신측으로 싱크를 생성합니다.
    pub fn new(tx: mpsc::Sender<Alert>) -> Self {
        Self {
            name: "channel".to_owned(),
            tx,
        }
    }

    /// 싱크 이름을 지정합니다.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl AlertSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, alert: Alert) -> Result<(), SinkError> {
        self.tx
            .blocking_send(alert)
            .map_err(|_| SinkError::Closed(self.name.clone()))
    }
}

// --- 메모리 ---

/// 알림을 공유 벡터에 모으는 싱크
///
/// 복제본끼리 같은 저장소를 공유하므로, 파이프라인에 하나를 넘기고
/// 다른 하나로 결과를 읽을 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl MemorySink {
    /// 빈 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 수집된 알림의 스냅샷
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }

    /// 수집된 알림 수
    pub fn len(&self) -> usize {
        self.alerts.lock().map(|alerts| alerts.len()).unwrap_or(0)
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn send(&mut self, alert: Alert) -> Result<(), SinkError> {
        self.alerts
            .lock()
            .map_err(|_| SinkError::Poisoned("memory".to_owned()))?
            .push(alert);
        Ok(())
    }
}
