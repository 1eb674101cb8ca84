//! 평가 파이프라인 -- 로드/분배/매칭/방출의 전체 흐름을 관리합니다.
//!
//! [`EvaluationPipeline`]은 한 번의 배치 평가 실행을 나타냅니다.
//! 상태는 `Idle -> Loading -> Evaluating -> Done | Failed`로만 전이하며,
//! 실행은 한 번만 할 수 있습니다.
//!
//! # 내부 아키텍처
//! ```text
//!                        +-> mpsc -> worker 0 (blocking) -+
//! LogSource -> dispatcher+-> mpsc -> worker 1 (blocking) -+-> mpsc -> writer (blocking) -> AlertSink
//!                        +-> mpsc -> worker N (blocking) -+
//! ```
//! - 디스패처는 호출자의 런타임에서 레코드를 라운드로빈으로 분배합니다.
//! - 워커는 `Arc<RuleStore>`를 잠금 없이 공유합니다.
//! - 싱크는 단일 writer 스레드만 접근합니다.
//! - 모든 채널은 bounded이므로 느린 싱크의 역압이 소스까지 전파됩니다.
//! - `workers = 1`이면 알림 순서가 (레코드 순서, 규칙 순서, 패턴 순서)로 결정적입니다.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use logward_core::metrics as m;
use logward_core::types::{Alert, LogRecord};

use crate::alert::AlertEmitter;
use crate::config::PipelineConfig;
use crate::error::{EngineError, LoadError, SinkError};
use crate::rule::matcher::panic_message;
use crate::rule::{PatternMatcher, RuleStore};
use crate::sink::{AlertSink, ChannelSink, FailurePolicy};
use crate::source::LogSource;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// 생성됨, 아직 실행하지 않음
    Idle,
    /// 규칙/레코드 확인 중
    Loading,
    /// 레코드 평가 중
    Evaluating,
    /// 정상 종료 (취소 포함)
    Done,
    /// 치명적 에러로 종료
    Failed,
}

impl PipelineState {
    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Evaluating => "evaluating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 실행 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// 실행 ID
    pub run_id: Uuid,
    /// 저장소에 로드된 규칙 수
    pub rules_loaded: usize,
    /// 패턴 컴파일 실패가 있었던 규칙 수
    pub rules_skipped: usize,
    /// 컴파일 실패로 제외된 패턴 수
    pub patterns_skipped: usize,
    /// 사용 가능한 패턴이 없는 규칙 수
    pub inert_rules: usize,
    /// 평가 완료된 레코드 수
    pub records_processed: u64,
    /// 평가 중 패닉으로 건너뛴 레코드 수
    pub records_failed: u64,
    /// 평가 실패로 건너뛴 (규칙, 패턴, 레코드) 쌍 수
    pub match_errors: u64,
    /// 싱크가 수락한 알림 수
    pub alerts_emitted: u64,
    /// 싱크 실패로 버려진 알림 수
    pub alerts_dropped: u64,
    /// 취소 또는 시간 초과로 조기 종료되었는지 여부
    pub cancelled: bool,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각
    pub finished_at: DateTime<Utc>,
}

impl Summary {
    /// 실행 소요 시간
    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }

    /// 복구 가능한 에러나 유실 없이 끝까지 실행되었는지 여부
    pub fn is_clean(&self) -> bool {
        !self.cancelled
            && self.records_failed == 0
            && self.match_errors == 0
            && self.alerts_dropped == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rules loaded: {}, rules skipped: {}, records processed: {}, alerts emitted: {}",
            self.rules_loaded, self.rules_skipped, self.records_processed, self.alerts_emitted,
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

/// 레코드 하나의 평가 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// 방출된 매칭 수
    pub matches: u64,
    /// 평가 실패로 건너뛴 쌍 수
    pub match_errors: u64,
}

/// 레코드 하나를 저장소 전체에 대해 평가하고 매칭마다 알림을 방출합니다.
///
/// 개별 패턴 평가 실패는 경고 후 건너뛰며, 싱크 에러만 호출자에게 전파됩니다.
pub fn evaluate_record<S: AlertSink>(
    matcher: &PatternMatcher<'_>,
    record: &LogRecord,
    emitter: &mut AlertEmitter<S>,
) -> Result<RecordOutcome, SinkError> {
    #[cfg(test)]
    if record.line.contains(tests::PANIC_IN_RECORD_MARKER) {
        panic!("record evaluation panicked");
    }

    let mut outcome = RecordOutcome::default();
    let matches = matcher.matches(&record.line);
    metrics::counter!(m::PREFILTER_CANDIDATES_TOTAL).increment(matches.candidates_remaining() as u64);

    for result in matches {
        match result {
            Ok(hit) => {
                emitter.emit(&hit, record)?;
                outcome.matches += 1;
            }
            Err(e) => {
                outcome.match_errors += 1;
                metrics::counter!(m::MATCH_ERRORS_TOTAL).increment(1);
                tracing::warn!(
                    rule_id = %e.rule_id,
                    pattern = %e.pattern,
                    file = %record.file,
                    reason = %e.reason,
                    "pattern evaluation failed, skipping pair"
                );
            }
        }
    }
    Ok(outcome)
}

/// 평가 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logward_engine::{EvaluationPipeline, IterSource, MemorySink, RuleStore};
///
/// let store = RuleStore::build(rules);
/// let mut pipeline = EvaluationPipeline::builder()
///     .config(config)
///     .rule_store(store)
///     .build()?;
///
/// let summary = pipeline.run(IterSource::new(records), MemorySink::new()).await?;
/// println!("{summary}");
/// ```
pub struct EvaluationPipeline {
    config: PipelineConfig,
    store: Arc<RuleStore>,
    cancel: CancellationToken,
    state: PipelineState,
}

impl EvaluationPipeline {
    /// 파이프라인 빌더를 반환합니다.
    pub fn builder() -> EvaluationPipelineBuilder {
        EvaluationPipelineBuilder::new()
    }

    /// 현재 상태
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 규칙 저장소
    pub fn rule_store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// 실행을 외부에서 취소할 수 있는 토큰
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 소스의 모든 레코드를 평가하고 알림을 싱크에 전달합니다.
    ///
    /// 취소되거나 시간 제한에 걸린 실행도 싱크를 flush하고
    /// `cancelled = true`인 요약을 반환합니다.
    ///
    /// # Errors
    /// - 이미 실행된 파이프라인인 경우 (`EngineError::Config`)
    /// - 규칙 저장소가 비었거나 소스가 레코드를 하나도 내놓지 않은 경우 (`EngineError::Load`)
    /// - 소스 읽기 실패, `Abort` 정책 싱크의 쓰기/flush 실패, 워커 태스크 실패
    pub async fn run<Src, Snk>(&mut self, source: Src, sink: Snk) -> Result<Summary, EngineError>
    where
        Src: LogSource,
        Snk: AlertSink + 'static,
    {
        if self.state != PipelineState::Idle {
            return Err(EngineError::Config {
                field: "pipeline".to_owned(),
                reason: format!("pipeline can only run once (state: {})", self.state),
            });
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("evaluation", %run_id);
        let result = self.execute(run_id, source, sink).instrument(span).await;

        self.state = match &result {
            Ok(_) => PipelineState::Done,
            Err(e) => {
                tracing::error!(%run_id, error = %e, "evaluation failed");
                PipelineState::Failed
            }
        };
        result
    }

    async fn execute<Src, Snk>(
        &mut self,
        run_id: Uuid,
        mut source: Src,
        sink: Snk,
    ) -> Result<Summary, EngineError>
    where
        Src: LogSource,
        Snk: AlertSink + 'static,
    {
        let started_at = Utc::now();
        self.state = PipelineState::Loading;

        if self.store.is_empty() {
            return Err(LoadError::NoRules.into());
        }
        let Some(first) = source.next_record().await? else {
            tracing::warn!(source = source.name(), "log source produced no records");
            return Err(LoadError::NoRecords.into());
        };

        let workers = self.config.effective_workers();
        let capacity = self.config.channel_capacity;
        tracing::info!(
            rules = self.store.rule_count(),
            patterns = self.store.pattern_count(),
            rules_skipped = self.store.rules_skipped(),
            prefilter = self.store.has_prefilter(),
            source = source.name(),
            workers,
            "starting evaluation"
        );
        self.state = PipelineState::Evaluating;

        let token = self.cancel.child_token();
        let timer = self
            .config
            .run_timeout()
            .map(|timeout| spawn_timeout(timeout, token.clone()));

        // 1. 알림 writer
        let (alert_tx, alert_rx) = mpsc::channel::<Alert>(capacity);
        let writer = {
            let token = token.clone();
            let span = tracing::Span::current();
            tokio::task::spawn_blocking(move || span.in_scope(|| drain_alerts(alert_rx, sink, &token)))
        };

        // 2. 평가 워커
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let (tx, rx) = mpsc::channel::<LogRecord>(capacity);
            let store = Arc::clone(&self.store);
            let token = token.clone();
            let emitter = AlertEmitter::new(
                ChannelSink::new(alert_tx.clone()).named(format!("worker-{worker_id}")),
            );
            let span = tracing::Span::current();
            handles.push(tokio::task::spawn_blocking(move || {
                span.in_scope(|| run_worker(worker_id, &store, rx, emitter, &token))
            }));
            senders.push(tx);
        }
        drop(alert_tx);

        // 3. 분배
        let dispatched = dispatch(first, &mut source, &senders, &token).await;
        drop(senders);
        if dispatched.is_err() {
            token.cancel();
        }

        let mut stats = WorkerStats::default();
        let mut worker_error = None;
        for handle in handles {
            match handle.await {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(e) => {
                    tracing::error!(error = %e, "evaluation worker failed");
                    worker_error.get_or_insert(EngineError::Worker(e.to_string()));
                }
            }
        }
        let written = writer
            .await
            .map_err(|e| EngineError::Worker(format!("alert writer failed: {e}")))?;
        let cancelled = token.is_cancelled();
        if let Some(timer) = timer {
            timer.abort();
        }

        let report = written?;
        let dispatched = dispatched?;
        if let Some(e) = worker_error {
            return Err(e);
        }

        let summary = Summary {
            run_id,
            rules_loaded: self.store.rule_count(),
            rules_skipped: self.store.rules_skipped(),
            patterns_skipped: self.store.patterns_skipped(),
            inert_rules: self.store.inert_rules(),
            records_processed: stats.records_processed,
            records_failed: stats.records_failed,
            match_errors: stats.match_errors,
            alerts_emitted: report.emitted,
            alerts_dropped: report.dropped,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            dispatched,
            records_processed = summary.records_processed,
            records_failed = summary.records_failed,
            match_errors = summary.match_errors,
            alerts_emitted = summary.alerts_emitted,
            alerts_dropped = summary.alerts_dropped,
            cancelled,
            elapsed_ms = summary.elapsed().num_milliseconds(),
            "evaluation finished"
        );
        Ok(summary)
    }
}

/// 평가 파이프라인 빌더
#[derive(Default)]
pub struct EvaluationPipelineBuilder {
    config: PipelineConfig,
    store: Option<Arc<RuleStore>>,
    cancel: Option<CancellationToken>,
}

impl EvaluationPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 규칙 저장소를 지정합니다.
    pub fn rule_store(mut self, store: impl Into<Arc<RuleStore>>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// 외부 취소 토큰을 지정합니다. 지정하지 않으면 새 토큰을 만듭니다.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 설정을 검증하고 파이프라인을 생성합니다.
    pub fn build(self) -> Result<EvaluationPipeline, EngineError> {
        self.config.validate()?;
        let store = self.store.ok_or_else(|| EngineError::Config {
            field: "rule_store".to_owned(),
            reason: "a rule store is required".to_owned(),
        })?;

        Ok(EvaluationPipeline {
            config: self.config,
            store,
            cancel: self.cancel.unwrap_or_default(),
            state: PipelineState::Idle,
        })
    }
}

// --- 내부 태스크 ---

#[derive(Debug, Default)]
struct WorkerStats {
    records_processed: u64,
    records_failed: u64,
    match_errors: u64,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.records_processed += other.records_processed;
        self.records_failed += other.records_failed;
        self.match_errors += other.match_errors;
    }
}

#[derive(Debug, Default)]
struct WriterReport {
    emitted: u64,
    dropped: u64,
}

/// 소스의 레코드를 워커 채널에 라운드로빈으로 분배합니다.
async fn dispatch<Src: LogSource>(
    first: LogRecord,
    source: &mut Src,
    senders: &[mpsc::Sender<LogRecord>],
    token: &CancellationToken,
) -> Result<u64, EngineError> {
    let mut next = Some(first);
    let mut dispatched = 0u64;
    let mut slot = 0usize;

    loop {
        let record = match next.take() {
            Some(record) => record,
            None => tokio::select! {
                biased;
                () = token.cancelled() => break,
                result = source.next_record() => match result? {
                    Some(record) => record,
                    None => break,
                },
            },
        };

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            sent = senders[slot].send(record) => {
                if sent.is_err() {
                    tracing::debug!(worker_id = slot, "worker channel closed, stopping dispatch");
                    break;
                }
            }
        }
        dispatched += 1;
        slot = (slot + 1) % senders.len();
    }

    if token.is_cancelled() {
        tracing::info!(dispatched, "dispatch stopped by cancellation");
    }
    Ok(dispatched)
}

/// 워커 루프: 레코드를 받아 평가하고 알림을 알림 채널로 보냅니다.
fn run_worker(
    worker_id: usize,
    store: &RuleStore,
    mut rx: mpsc::Receiver<LogRecord>,
    mut emitter: AlertEmitter<ChannelSink>,
    token: &CancellationToken,
) -> WorkerStats {
    let matcher = store.matcher();
    let mut stats = WorkerStats::default();

    while let Some(record) = rx.blocking_recv() {
        if token.is_cancelled() {
            tracing::debug!(worker_id, "cancellation observed, worker stopping");
            break;
        }

        match guarded(|| evaluate_record(&matcher, &record, &mut emitter)) {
            Ok(Ok(outcome)) => {
                stats.records_processed += 1;
                stats.match_errors += outcome.match_errors;
                metrics::counter!(m::RECORDS_PROCESSED_TOTAL).increment(1);
            }
            Ok(Err(e)) => {
                // 일부 매칭만 방출되었으므로 처리 완료로 세지 않습니다.
                stats.records_failed += 1;
                tracing::debug!(worker_id, error = %e, "alert channel closed, worker stopping");
                break;
            }
            Err(reason) => {
                stats.records_failed += 1;
                metrics::counter!(m::RECORDS_FAILED_TOTAL).increment(1);
                tracing::warn!(
                    worker_id,
                    file = %record.file,
                    reason = %reason,
                    "record evaluation panicked, skipping record"
                );
            }
        }
    }

    tracing::debug!(
        worker_id,
        records_processed = stats.records_processed,
        emitted = emitter.emitted(),
        "worker finished"
    );
    stats
}

/// 알림 채널을 비우며 사용자 싱크에 기록합니다.
fn drain_alerts<S: AlertSink>(
    mut rx: mpsc::Receiver<Alert>,
    mut sink: S,
    token: &CancellationToken,
) -> Result<WriterReport, SinkError> {
    let mut report = WriterReport::default();
    let policy = sink.failure_policy();

    while let Some(alert) = rx.blocking_recv() {
        let module = alert.module.clone();
        match sink.send(alert) {
            Ok(()) => {
                report.emitted += 1;
                metrics::counter!(m::ALERTS_EMITTED_TOTAL, m::LABEL_MODULE => module).increment(1);
            }
            Err(e) => match policy {
                FailurePolicy::Abort => {
                    tracing::error!(sink = sink.name(), error = %e, "alert sink failed, aborting run");
                    token.cancel();
                    return Err(e);
                }
                FailurePolicy::DropAndContinue => {
                    report.dropped += 1;
                    metrics::counter!(m::ALERTS_DROPPED_TOTAL, m::LABEL_SINK => sink.name().to_owned())
                        .increment(1);
                    tracing::warn!(sink = sink.name(), error = %e, "alert sink write failed, dropping alert");
                }
            },
        }
    }

    sink.flush()?;
    Ok(report)
}

fn spawn_timeout(timeout: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "run timeout elapsed, cancelling evaluation");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    })
}

/// 패닉을 에러 메시지로 변환하여 실행합니다.
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::source::IterSource;
    use crate::rule::matcher::PANIC_IN_PATTERN_MARKER;
    use logward_core::types::Rule;

    /// 이 표식을 포함한 레코드는 평가 도중 패닉을 일으킵니다.
    pub(super) const PANIC_IN_RECORD_MARKER: &str = "<<record-panic>>";

    fn store() -> RuleStore {
        RuleStore::build([
            Rule::new("100001")
                .with_level(10)
                .with_description("SSH authentication failure")
                .with_module("sshd")
                .with_pattern("failed password"),
            Rule::new("100002").with_pattern("disk full"),
        ])
    }

    fn records(lines: &[&str]) -> IterSource<std::vec::IntoIter<LogRecord>> {
        IterSource::new(
            lines
                .iter()
                .map(|line| LogRecord::new(*line, "auth.log", "system"))
                .collect::<Vec<_>>(),
        )
    }

    fn pipeline(workers: usize) -> EvaluationPipeline {
        EvaluationPipeline::builder()
            .config(PipelineConfig {
                workers,
                ..Default::default()
            })
            .rule_store(store())
            .build()
            .unwrap()
    }

    /// 항상 실패하는 싱크
    struct FailingSink(FailurePolicy);

    impl AlertSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn send(&mut self, _alert: Alert) -> Result<(), SinkError> {
            Err(SinkError::Closed("failing".to_owned()))
        }

        fn failure_policy(&self) -> FailurePolicy {
            self.0
        }
    }

    #[tokio::test]
    async fn run_emits_alerts_and_summarizes() {
        let sink = MemorySink::new();
        let mut pipeline = pipeline(1);
        let summary = pipeline
            .run(
                records(&["Failed password for root", "all good", "ERROR: Disk Full"]),
                sink.clone(),
            )
            .await
            .unwrap();

        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(summary.rules_loaded, 2);
        assert_eq!(summary.records_processed, 3);
        assert_eq!(summary.alerts_emitted, 2);
        assert!(summary.is_clean());
        let ids: Vec<_> = sink.alerts().into_iter().map(|a| a.rule_id).collect();
        assert_eq!(ids, ["100001", "100002"]);
    }

    #[tokio::test]
    async fn pipeline_is_single_use() {
        let mut pipeline = pipeline(1);
        pipeline
            .run(records(&["x"]), MemorySink::new())
            .await
            .unwrap();
        let second = pipeline.run(records(&["x"]), MemorySink::new()).await;
        assert!(matches!(second, Err(EngineError::Config { .. })));
    }

    #[tokio::test]
    async fn empty_source_is_load_error() {
        let mut pipeline = pipeline(2);
        let result = pipeline.run(records(&[]), MemorySink::new()).await;
        assert!(matches!(result, Err(EngineError::Load(LoadError::NoRecords))));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn empty_store_is_load_error() {
        let mut pipeline = EvaluationPipeline::builder()
            .rule_store(RuleStore::build([]))
            .build()
            .unwrap();
        let result = pipeline.run(records(&["x"]), MemorySink::new()).await;
        assert!(matches!(result, Err(EngineError::Load(LoadError::NoRules))));
    }

    #[tokio::test]
    async fn aborting_sink_fails_the_run() {
        let mut pipeline = pipeline(2);
        let result = pipeline
            .run(
                records(&["failed password", "failed password"]),
                FailingSink(FailurePolicy::Abort),
            )
            .await;
        assert!(matches!(result, Err(EngineError::Sink(_))));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn streaming_sink_counts_dropped_alerts() {
        let mut pipeline = pipeline(2);
        let summary = pipeline
            .run(
                records(&["failed password", "disk full", "nothing"]),
                FailingSink(FailurePolicy::DropAndContinue),
            )
            .await
            .unwrap();
        assert_eq!(summary.alerts_emitted, 0);
        assert_eq!(summary.alerts_dropped, 2);
        assert!(!summary.is_clean());
    }

    #[tokio::test]
    async fn pre_cancelled_run_returns_cancelled_summary() {
        let token = CancellationToken::new();
        token.cancel();
        let mut pipeline = EvaluationPipeline::builder()
            .rule_store(store())
            .cancellation_token(token)
            .build()
            .unwrap();

        let sink = MemorySink::new();
        let summary = pipeline
            .run(records(&["failed password"]), sink.clone())
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.records_processed, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn run_timeout_cancels_open_stream() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(LogRecord::new("failed password", "auth.log", "sshd"))
            .await
            .unwrap();

        let mut pipeline = EvaluationPipeline::builder()
            .config(PipelineConfig {
                workers: 1,
                run_timeout_secs: 1,
                ..Default::default()
            })
            .rule_store(store())
            .build()
            .unwrap();

        let summary = pipeline.run(rx, MemorySink::new()).await.unwrap();
        assert!(summary.cancelled);
        drop(tx);
    }

    #[test]
    fn builder_requires_rule_store() {
        let result = EvaluationPipeline::builder().build();
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }

    #[tokio::test]
    async fn panics_are_counted_and_run_continues() {
        let sink = MemorySink::new();
        let mut pipeline = pipeline(1);
        let pattern_panic = format!("Failed password {PANIC_IN_PATTERN_MARKER}");
        let record_panic = format!("disk full {PANIC_IN_RECORD_MARKER}");
        let summary = pipeline
            .run(
                records(&[
                    "Failed password for root",
                    &pattern_panic,
                    &record_panic,
                    "ERROR: Disk Full",
                ]),
                sink.clone(),
            )
            .await
            .unwrap();

        assert_eq!(summary.records_processed, 3);
        assert_eq!(summary.records_failed, 1);
        assert_eq!(summary.match_errors, 1);
        assert_eq!(summary.alerts_emitted, 2);
        assert!(!summary.is_clean());
        let ids: Vec<_> = sink.alerts().into_iter().map(|a| a.rule_id).collect();
        assert_eq!(ids, ["100001", "100002"]);
    }

    #[test]
    fn closed_alert_channel_does_not_count_record_as_processed() {
        let store = store();
        let (record_tx, record_rx) = mpsc::channel(4);
        record_tx
            .try_send(LogRecord::new("failed password", "auth.log", "sshd"))
            .unwrap();
        drop(record_tx);
        let (alert_tx, alert_rx) = mpsc::channel::<Alert>(1);
        drop(alert_rx);

        let stats = run_worker(
            0,
            &store,
            record_rx,
            AlertEmitter::new(ChannelSink::new(alert_tx)),
            &CancellationToken::new(),
        );

        assert_eq!(stats.records_processed, 0);
        assert_eq!(stats.records_failed, 1);
        assert_eq!(stats.match_errors, 0);
    }

    #[test]
    fn guarded_converts_panic_to_message() {
        assert_eq!(guarded(|| 7), Ok(7));
        let result: Result<(), String> = guarded(|| panic!("regex blew up"));
        assert_eq!(result, Err("regex blew up".to_owned()));
    }

    #[test]
    fn summary_display_lists_counts() {
        let now = Utc::now();
        let summary = Summary {
            run_id: Uuid::nil(),
            rules_loaded: 3,
            rules_skipped: 1,
            patterns_skipped: 1,
            inert_rules: 0,
            records_processed: 10,
            records_failed: 0,
            match_errors: 0,
            alerts_emitted: 4,
            alerts_dropped: 0,
            cancelled: false,
            started_at: now,
            finished_at: now,
        };
        assert_eq!(
            summary.to_string(),
            "rules loaded: 3, rules skipped: 1, records processed: 10, alerts emitted: 4"
        );
    }
}
