use crate::common::http::StubServer;
use crate::common::{detected, FixedBuffer, FnDetector};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use malslice::config::{AgentConfig, PollConfig};
use malslice::oracle::{AmsiVerdict, ScanClassification};
use malslice::task::{IncomingTask, Orchestrator, TaskClient};
use malslice::MalsliceError;
use std::sync::Arc;

fn task_json(uuid: &str, file_name: &str) -> serde_json::Value {
    serde_json::json!({
        "uuid": uuid,
        "task_status": "Pending",
        "time_sent": 1_700_000_000,
        "time_updated": 0,
        "file_sha256": "",
        "file_name": file_name,
        "enable_static_analysis": true,
        "enable_dynamic_analysis": false,
        "enable_thorough_defender": false
    })
}

fn payload_json(len: usize) -> String {
    let data = vec![0x4du8; len];
    serde_json::json!({ "payload": BASE64.encode(data) }).to_string()
}

fn orchestrator<F>(server: &StubServer, detector: Arc<FnDetector<F>>) -> Orchestrator
where
    F: Fn(usize) -> ScanClassification + Send + Sync + 'static,
{
    let poll = PollConfig {
        request_timeout_secs: 5,
        ..PollConfig::default()
    };
    let client = TaskClient::new(server.url(), &poll).expect("client");
    let config = AgentConfig {
        server_url: server.url(),
        poll,
        ..AgentConfig::default()
    };
    Orchestrator::new(
        client,
        detector,
        Arc::new(FixedBuffer(AmsiVerdict::Clean)),
        config,
    )
}

#[tokio::test]
async fn only_fetched_payloads_are_reported() {
    let tasks = serde_json::json!([
        task_json("t-good", "good.exe"),
        task_json("t-nofile", ""),
        task_json("t-err", "bad.exe"),
        task_json("t-missing", "gone.exe"),
    ])
    .to_string();

    let server = StubServer::start(move |method, path| match (method, path) {
        ("GET", "/tasks/get") => (200, tasks.clone()),
        ("GET", "/payloads/get/t-good/bytes") => (200, payload_json(40)),
        ("GET", "/payloads/get/t-err/bytes") => {
            (200, r#"{"error": "Payload not found"}"#.to_string())
        }
        ("POST", "/tasks/update/t-good") => (200, "{}".to_string()),
        _ => (404, "{}".to_string()),
    })
    .await;

    let detector = Arc::new(FnDetector::new(|_| detected("Trojan:Win32/Fixture")));
    let agent = orchestrator(&server, Arc::clone(&detector));

    assert_eq!(agent.poll_once().await.expect("poll"), 4);
    assert_eq!(
        server.hits(),
        vec![
            "GET /tasks/get",
            "GET /payloads/get/t-good/bytes",
            "POST /tasks/update/t-good",
            "GET /payloads/get/t-err/bytes",
            "GET /payloads/get/t-missing/bytes",
        ]
    );
    // one prefix of the 40-byte payload, nothing for the failed fetches
    assert_eq!(detector.lens(), vec![40]);

    let update = server
        .requests()
        .into_iter()
        .find(|r| r.method == "POST")
        .expect("update posted");
    let report: serde_json::Value = serde_json::from_str(&update.body).expect("report json");
    assert_eq!(report["uuid"], "t-good");
    assert_eq!(report["task_status"], "Completed");
    assert_eq!(report["defender_result"], "DEFENDER_RESULT_THREAT_DETECTED");
    assert_eq!(report["defender_threats"][0], "Trojan:Win32/Fixture");
    assert_eq!(report["amsi_result"], "AMSI_RESULT_CLEAN");
    assert_eq!(
        report["0_x_base64_malicious_bytes"],
        BASE64.encode(vec![0x4du8; 40])
    );
}

#[tokio::test]
async fn rejected_update_does_not_stop_the_batch() {
    let tasks = serde_json::json!([task_json("t-a", "a.exe"), task_json("t-b", "b.exe")]).to_string();

    let server = StubServer::start(move |method, path| match (method, path) {
        ("GET", "/tasks/get") => (200, tasks.clone()),
        ("GET", _) => (200, payload_json(8)),
        ("POST", _) => (500, r#"{"detail": "db down"}"#.to_string()),
        _ => (404, "{}".to_string()),
    })
    .await;

    let detector = Arc::new(FnDetector::new(|_| ScanClassification::NotDetected));
    let agent = orchestrator(&server, Arc::clone(&detector));

    assert_eq!(agent.poll_once().await.expect("poll"), 2);
    let hits = server.hits();
    assert!(hits.contains(&"POST /tasks/update/t-a".to_string()));
    assert!(hits.contains(&"POST /tasks/update/t-b".to_string()));

    let task = IncomingTask {
        uuid: "t-a".into(),
        file_name: "a.exe".into(),
        ..IncomingTask::default()
    };
    assert!(matches!(
        agent.process_task(&task).await,
        Err(MalsliceError::Http(_))
    ));
}

#[tokio::test]
async fn empty_batch_only_polls() {
    let server = StubServer::start(|_, path| match path {
        "/tasks/get" => (200, "[]".to_string()),
        _ => (404, "{}".to_string()),
    })
    .await;

    let detector = Arc::new(FnDetector::new(|_| ScanClassification::NotDetected));
    let agent = orchestrator(&server, Arc::clone(&detector));

    assert_eq!(agent.poll_once().await.expect("poll"), 0);
    assert_eq!(server.hits(), vec!["GET /tasks/get"]);
    assert!(detector.lens().is_empty());
}

#[tokio::test]
async fn server_error_on_poll_is_an_error() {
    let server = StubServer::start(|_, _| (503, "{}".to_string())).await;
    let detector = Arc::new(FnDetector::new(|_| ScanClassification::NotDetected));
    let agent = orchestrator(&server, detector);

    assert!(matches!(agent.poll_once().await, Err(MalsliceError::Http(_))));
}
