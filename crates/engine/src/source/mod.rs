//! 로그 소스 -- 평가할 [`LogRecord`]를 공급합니다.
//!
//! # 제공 소스
//! - [`IterSource`]: 유한한 레코드 배치 (임의의 `Iterator`)
//! - [`LogDirectorySource`]: 로그 디렉토리를 파일 단위로 지연 로딩
//! - `tokio::sync::mpsc::Receiver<LogRecord>`: 연속 스트림 (송신측이 모두 닫히면 종료)
//!
//! 소스는 레코드를 한 번씩만 내놓으며, 파이프라인은 레코드를 보관하지 않습니다.

pub mod file;

pub use file::{LogDirectoryLoader, LogDirectorySource};

use std::future::Future;

use tokio::sync::mpsc;

use logward_core::types::LogRecord;

use crate::error::EngineError;

/// 로그 레코드 소스
pub trait LogSource: Send {
    /// 로그에 사용할 소스 이름
    fn name(&self) -> &str;

    /// 다음 레코드를 반환합니다. 소스가 끝나면 `Ok(None)`입니다.
    fn next_record(
        &mut self,
    ) -> impl Future<Output = Result<Option<LogRecord>, EngineError>> + Send;
}

/// 이터레이터 기반 소스
pub struct IterSource<I> {
    name: String,
    records: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = LogRecord> + Send,
{
    /// 레코드 이터레이터로 소스를 생성합니다.
    pub fn new(records: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            name: "iter".to_owned(),
            records: records.into_iter(),
        }
    }

    /// 소스 이름을 지정합니다.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<I> LogSource for IterSource<I>
where
    I: Iterator<Item = LogRecord> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_record(&mut self) -> Result<Option<LogRecord>, EngineError> {
        Ok(self.records.next())
    }
}

impl LogSource for mpsc::Receiver<LogRecord> {
    fn name(&self) -> &str {
        "channel"
    }

    async fn next_record(&mut self) -> Result<Option<LogRecord>, EngineError> {
        Ok(self.recv().await)
    }
}
