//! 통합 테스트 -- 로딩부터 알림 기록까지의 전체 흐름 검증

use std::path::Path;

use logward_core::types::{Alert, LogRecord, Rule};
use logward_engine::{
    EngineError, EvaluationPipeline, IterSource, JsonArrayFileSink, LoadError,
    LogDirectorySource, MemorySink, NdjsonSink, PipelineConfig, RuleLoader, RuleStore,
    RuleStoreBuilder, Summary,
};

fn config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        channel_capacity: 64,
        ..Default::default()
    }
}

async fn run_with(
    store: RuleStore,
    records: Vec<LogRecord>,
    workers: usize,
) -> (Summary, Vec<Alert>) {
    let sink = MemorySink::new();
    let mut pipeline = EvaluationPipeline::builder()
        .config(config(workers))
        .rule_store(store)
        .build()
        .expect("pipeline should build");
    let summary = pipeline
        .run(IterSource::new(records), sink.clone())
        .await
        .expect("run should succeed");
    (summary, sink.alerts())
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("should create dir");
    }
    std::fs::write(path, content).expect("should write file");
}

/// 규칙 하나, 로그 하나의 문자 그대로의 시나리오
#[tokio::test]
async fn test_literal_brute_force_scenario() {
    let store = RuleStore::build([Rule::new("100001")
        .with_level(10)
        .with_description("Brute force attempt")
        .with_pattern("failed password")
        .with_module("auth")]);
    let records = vec![LogRecord::new(
        "Failed password for root from 10.0.0.5",
        "auth.log",
        "auth",
    )];

    let (summary, alerts) = run_with(store, records, 1).await;

    assert_eq!(summary.alerts_emitted, 1);
    assert_eq!(
        alerts,
        vec![Alert {
            rule_id: "100001".to_owned(),
            level: 10,
            description: "Brute force attempt".to_owned(),
            log_line: "Failed password for root from 10.0.0.5".to_owned(),
            module: "auth".to_owned(),
            file: "auth.log".to_owned(),
        }]
    );
}

/// 대소문자 무시 매칭
#[tokio::test]
async fn test_case_insensitive_match() {
    let store = RuleStore::build([Rule::new("disk").with_pattern("error")]);
    let records = vec![LogRecord::new("ERROR: disk full", "syslog", "kernel")];

    let (_, alerts) = run_with(store, records, 2).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].log_line, "ERROR: disk full");
}

/// 잘못된 정규식 규칙은 제외되고 정상 규칙만 알림을 만듭니다.
#[tokio::test]
async fn test_partial_failure_skips_invalid_rule() {
    let store = RuleStore::build([
        Rule::new("broken").with_pattern("(unclosed"),
        Rule::new("valid").with_pattern("session opened"),
    ]);
    let records = vec![
        LogRecord::new("pam_unix: session opened for user root", "auth.log", "auth"),
        LogRecord::new("(unclosed", "auth.log", "auth"),
    ];

    let (summary, alerts) = run_with(store, records, 2).await;

    assert_eq!(summary.rules_loaded, 2);
    assert_eq!(summary.rules_skipped, 1);
    assert_eq!(summary.patterns_skipped, 1);
    assert_eq!(summary.inert_rules, 1);
    assert_eq!(alerts.len(), 1);
    assert!(alerts.iter().all(|a| a.rule_id == "valid"));
}

/// 여러 패턴이 매칭되면 패턴마다 알림이 나옵니다.
#[tokio::test]
async fn test_each_matching_pattern_emits_alert() {
    let store = RuleStore::build([Rule::new("multi")
        .with_pattern("root")
        .with_pattern(r"from \d+\.\d+")
        .with_pattern("nomatch")]);
    let records = vec![LogRecord::new("Failed password for root from 10.0.0.5", "a.log", "a")];

    let (_, alerts) = run_with(store, records, 1).await;
    assert_eq!(alerts.len(), 2);
}

/// 단일 워커 실행은 바이트 단위로 결정적입니다.
#[tokio::test]
async fn test_single_worker_output_is_deterministic() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let rules: Vec<Rule> = (0..50)
        .map(|i| Rule::new(format!("r{i}")).with_pattern(format!(r"user{}\b|port {}", i % 7, i)))
        .collect();
    let records: Vec<LogRecord> = (0..500)
        .map(|i| LogRecord::new(format!("login user{} port {}", i % 11, i % 60), "auth.log", "auth"))
        .collect();

    let mut outputs = Vec::new();
    for run in 0..2 {
        let path = dir.path().join(format!("alerts-{run}.json"));
        let mut pipeline = EvaluationPipeline::builder()
            .config(config(1))
            .rule_store(RuleStore::build(rules.clone()))
            .build()
            .expect("pipeline should build");
        pipeline
            .run(
                IterSource::new(records.clone()),
                JsonArrayFileSink::create(&path).expect("should create sink"),
            )
            .await
            .expect("run should succeed");
        outputs.push(std::fs::read(&path).expect("should read output"));
    }

    assert!(!outputs[0].is_empty());
    assert_eq!(outputs[0], outputs[1]);
}

/// 다중 워커는 순서만 다를 뿐 같은 알림 집합을 만듭니다.
#[tokio::test]
async fn test_multi_worker_matches_single_worker_set() {
    let rules: Vec<Rule> = (0..20)
        .map(|i| Rule::new(format!("r{i}")).with_pattern(format!("token{i}")))
        .collect();
    let records: Vec<LogRecord> = (0..1_000)
        .map(|i| LogRecord::new(format!("event token{} seq {i}", i % 25), "app.log", "app"))
        .collect();

    let (_, mut single) = run_with(RuleStore::build(rules.clone()), records.clone(), 1).await;
    let (summary, mut multi) = run_with(RuleStore::build(rules), records, 4).await;

    assert_eq!(summary.records_processed, 1_000);
    let key = |a: &Alert| (a.log_line.clone(), a.rule_id.clone());
    single.sort_by_key(key);
    multi.sort_by_key(key);
    assert_eq!(single, multi);
}

/// 로그가 없으면 치명적 로드 에러입니다.
#[tokio::test]
async fn test_empty_log_set_is_load_error() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let sink = MemorySink::new();
    let mut pipeline = EvaluationPipeline::builder()
        .rule_store(RuleStore::build([Rule::new("1").with_pattern("x")]))
        .build()
        .expect("pipeline should build");

    let source = LogDirectorySource::open(dir.path())
        .await
        .expect("empty directory should open");
    let result = pipeline.run(source, sink.clone()).await;

    assert!(matches!(result, Err(EngineError::Load(LoadError::NoRecords))));
    assert!(sink.is_empty());
}

/// 규칙이 없으면 치명적 로드 에러입니다.
#[tokio::test]
async fn test_empty_rule_set_is_load_error() {
    let mut pipeline = EvaluationPipeline::builder()
        .rule_store(RuleStore::build(Vec::new()))
        .build()
        .expect("pipeline should build");
    let result = pipeline
        .run(
            IterSource::new(vec![LogRecord::new("x", "a.log", "a")]),
            MemorySink::new(),
        )
        .await;
    assert!(matches!(result, Err(EngineError::Load(LoadError::NoRules))));
}

/// 10,000 라인 x 500 규칙: 사전 필터 유무와 관계없이 동일한 알림
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_prefilter_matches_naive_baseline_at_scale() {
    const WORDS: &[&str] = &["alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf"];

    let rules: Vec<Rule> = (0..500)
        .map(|i| {
            let word = WORDS[i % WORDS.len()];
            let pattern = match i % 5 {
                0 => format!("{word}-{i}"),
                1 => format!(r"{word}\s+id={i}\b"),
                2 => format!(r"(?:{word}|{})-{i}", WORDS[(i + 1) % WORDS.len()]),
                3 => format!(r"\d+\.{i}\.\d+"),
                _ => format!("{}.*{word}", i % 97),
            };
            Rule::new(format!("{}", 200_000 + i)).with_pattern(pattern)
        })
        .collect();
    let records: Vec<LogRecord> = (0..10_000)
        .map(|i| {
            let word = WORDS[(i * 3) % WORDS.len()].to_uppercase();
            LogRecord::new(
                format!("{word}-{} {word} id={} 10.{}.{} seq={i}", i % 600, i % 500, i % 500, i % 250),
                "bulk.log",
                "bulk",
            )
        })
        .collect();

    let indexed = RuleStoreBuilder::new().prefilter(true).build(rules.clone());
    let naive = RuleStoreBuilder::new().prefilter(false).build(rules);
    assert!(indexed.has_prefilter());

    let (indexed_summary, indexed_alerts) = run_with(indexed, records.clone(), 1).await;
    let (naive_summary, naive_alerts) = run_with(naive, records, 1).await;

    assert_eq!(indexed_summary.records_processed, 10_000);
    assert!(!naive_alerts.is_empty());
    assert_eq!(indexed_summary.alerts_emitted, naive_summary.alerts_emitted);
    assert_eq!(indexed_alerts, naive_alerts);
}

/// 디렉토리 로더부터 JSON 배열 파일까지의 전체 흐름
#[tokio::test]
async fn test_directory_to_json_file_flow() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let rules_dir = dir.path().join("rules");
    let logs_dir = dir.path().join("logs");

    write(
        &rules_dir.join("sshd/sshd_rules.xml"),
        r#"<group name="sshd,">
  <rule id="100001" level="10">
    <description>Brute force attempt</description>
    <field name="msg">failed password</field>
  </rule>
  <rule id="100002" level="3">
    <description>Broken rule</description>
    <field name="msg">[unclosed</field>
  </rule>
</group>"#,
    );
    write(
        &rules_dir.join("web/web_rules.yml"),
        "- id: web-001\n  level: 7\n  description: Admin probe\n  patterns: [\"GET /admin\"]\n",
    );
    write(
        &logs_dir.join("auth/auth.log"),
        "Failed password for root from 10.0.0.5\nAccepted publickey for deploy\n",
    );
    write(
        &logs_dir.join("nginx/access.json"),
        r#"["GET /admin HTTP/1.1", {"path": "/index.html"}]"#,
    );

    let rules = RuleLoader::load_directory(&rules_dir)
        .await
        .expect("rules should load");
    assert_eq!(rules.len(), 3);

    let out = dir.path().join("alerts.json");
    let mut pipeline = EvaluationPipeline::builder()
        .config(config(1))
        .rule_store(RuleStore::build(rules))
        .build()
        .expect("pipeline should build");
    let summary = pipeline
        .run(
            LogDirectorySource::open(&logs_dir).await.expect("logs should open"),
            JsonArrayFileSink::create(&out).expect("sink should open"),
        )
        .await
        .expect("run should succeed");

    assert_eq!(summary.rules_loaded, 3);
    assert_eq!(summary.rules_skipped, 1);
    assert_eq!(summary.records_processed, 4);
    assert_eq!(summary.alerts_emitted, 2);

    let content = std::fs::read_to_string(&out).expect("output should exist");
    let alerts: Vec<Alert> = serde_json::from_str(&content).expect("output should be a JSON array");
    assert_eq!(alerts[0].rule_id, "100001");
    assert_eq!(alerts[0].module, "sshd");
    assert_eq!(alerts[0].file, "auth.log");
    assert_eq!(alerts[1].rule_id, "web-001");
    assert_eq!(alerts[1].module, "web");
    assert_eq!(alerts[1].file, "access.json");
}

/// NDJSON 싱크는 알림 하나당 한 줄을 씁니다.
#[tokio::test]
async fn test_ndjson_sink_flow() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let out = dir.path().join("alerts.ndjson");

    let mut pipeline = EvaluationPipeline::builder()
        .config(config(2))
        .rule_store(RuleStore::build([Rule::new("1").with_pattern("denied")]))
        .build()
        .expect("pipeline should build");
    let summary = pipeline
        .run(
            IterSource::new(vec![
                LogRecord::new("permission denied", "a.log", "a"),
                LogRecord::new("ok", "a.log", "a"),
                LogRecord::new("access DENIED", "a.log", "a"),
            ]),
            NdjsonSink::create(&out).expect("sink should open"),
        )
        .await
        .expect("run should succeed");

    assert_eq!(summary.alerts_emitted, 2);
    let content = std::fs::read_to_string(&out).expect("output should exist");
    assert_eq!(content.lines().count(), 2);
    for line in content.lines() {
        let alert: Alert = serde_json::from_str(line).expect("each line should be an alert");
        assert_eq!(alert.rule_id, "1");
    }
}

/// 외부 취소 후에도 싱크는 확정되고 요약이 반환됩니다.
#[tokio::test]
async fn test_cancelled_run_still_flushes_sink() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let out = dir.path().join("alerts.json");
    let (tx, rx) = tokio::sync::mpsc::channel(16);

    let mut pipeline = EvaluationPipeline::builder()
        .config(config(1))
        .rule_store(RuleStore::build([Rule::new("1").with_pattern("alarm")]))
        .build()
        .expect("pipeline should build");
    let token = pipeline.cancellation_token();
    let sink = JsonArrayFileSink::create(&out).expect("sink should open");

    let feeder = tokio::spawn(async move {
        for i in 0..3 {
            tx.send(LogRecord::new(format!("alarm {i}"), "s.log", "s"))
                .await
                .expect("pipeline should be receiving");
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        token.cancel();
        // 송신측을 열어 둔 채로 취소만으로 종료되는지 확인
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        drop(tx);
    });

    let summary = pipeline.run(rx, sink).await.expect("run should succeed");
    feeder.await.expect("feeder should finish");

    assert!(summary.cancelled);
    let alerts: Vec<Alert> =
        serde_json::from_str(&std::fs::read_to_string(&out).expect("output should exist"))
            .expect("output should be a JSON array");
    assert!(alerts.len() <= 3);
}
