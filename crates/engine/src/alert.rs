//! 알림 방출 -- 매칭 결과를 [`Alert`]로 변환하여 싱크에 전달합니다.
//!
//! [`AlertEmitter`]는 매칭 하나당 정확히 하나의 알림을 만듭니다.
//! 중복 제거나 속도 제한은 하지 않으며, 한 라인이 같은 규칙의 패턴 여러 개에
//! 매칭되면 패턴 수만큼 알림이 나갑니다.

use logward_core::types::{Alert, LogRecord};

use crate::error::SinkError;
use crate::rule::PatternHit;
use crate::sink::AlertSink;

/// 알림 방출기
pub struct AlertEmitter<S> {
    sink: S,
    emitted: u64,
}

impl<S: AlertSink> AlertEmitter<S> {
    /// 싱크 위에 방출기를 생성합니다.
    pub fn new(sink: S) -> Self {
        Self { sink, emitted: 0 }
    }

    /// 매칭 하나를 알림으로 변환하여 싱크에 전달합니다.
    ///
    /// 알림 필드는 규칙(ID, 심각도, 설명, 모듈)과 레코드(라인, 파일명)에서 복사됩니다.
    pub fn emit(&mut self, hit: &PatternHit<'_>, record: &LogRecord) -> Result<(), SinkError> {
        let alert = Alert::from_match(hit.rule, record);
        tracing::trace!(
            rule_id = %alert.rule_id,
            pattern = %hit.pattern,
            file = %alert.file,
            "rule matched"
        );
        self.sink.send(alert)?;
        self.emitted += 1;
        Ok(())
    }

    /// 지금까지 싱크가 수락한 알림 수
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// 내부 싱크를 반환합니다.
    pub fn into_inner(self) -> S {
        self.sink
    }
}
