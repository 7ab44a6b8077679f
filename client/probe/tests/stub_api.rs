//! Suites run against an in-process stub of the stats API.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use channel_probe::{
    report, DeviceInfo, EventKind, Probe, ProbeConfig, SendOptions, Suite, SuiteOutcome,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct StubState {
    requests: Arc<Mutex<Vec<(&'static str, Value)>>>,
    installed: Arc<Mutex<HashSet<String>>>,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl StubState {
    async fn record(&self, endpoint: &'static str, body: &Value) {
        self.arrivals.lock().await.push(Instant::now());
        self.requests.lock().await.push((endpoint, body.clone()));
    }

    async fn bodies(&self, endpoint: &str) -> Vec<Value> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|(path, _)| *path == endpoint)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

fn unknown_channel(body: &Value) -> bool {
    body["channelCode"] == "0000"
}

fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "message": "channel not found"})),
    )
}

async fn install(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("install", &body).await;
    if unknown_channel(&body) {
        return not_found();
    }
    if let Some(device_id) = body["deviceId"].as_str() {
        let mut installed = state.installed.lock().await;
        if !installed.insert(device_id.to_string()) {
            return (
                StatusCode::CONFLICT,
                Json(json!({"success": false, "message": "duplicate install"})),
            );
        }
    }
    (StatusCode::OK, Json(json!({"success": true, "data": {"id": 1}})))
}

async fn activate(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("activate", &body).await;
    if unknown_channel(&body) {
        return not_found();
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "data": {"revenue": 1.5}})),
    )
}

async fn download(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("download", &body).await;
    if unknown_channel(&body) {
        return not_found();
    }
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    format!("http://{addr}/api")
}

async fn spawn_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/api/stats/install", post(install))
        .route("/api/stats/activate", post(activate))
        .route("/api/stats/download", post(download))
        .with_state(state.clone());
    (serve(app).await, state)
}

fn config(base_url: &str) -> ProbeConfig {
    ProbeConfig {
        base_url: base_url.to_string(),
        software_id: 1,
        channel: "3001".to_string(),
        timeout: Duration::from_secs(5),
        short_timeout: Duration::from_secs(5),
        case_delay: Duration::ZERO,
        unique_devices: false,
        device: DeviceInfo::default(),
    }
}

async fn run(base_url: &str, suite: Suite) -> (channel_probe::SuiteReport, String) {
    let probe = Probe::new(&config(base_url)).unwrap();
    let mut out = Vec::new();
    let report = probe.run_suite(suite, &mut out).await.unwrap();
    (report, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn smoke_tallies_every_case() {
    let (base_url, state) = spawn_stub().await;
    let (report, text) = run(&base_url, Suite::Smoke).await;

    // The unknown channel still shows as a failed case in the tally, but
    // being turned away is what the verdict expects.
    assert_eq!(report.checks.len(), 2);
    assert!(report.passed(), "{text}");
    assert!(text.contains("API reachable: PASS"));
    assert!(text.contains("channel 0000 rejected: PASS"));
    assert!(text.contains("success rate: 3/4 (75.0%)"), "{text}");
    assert!(text.contains("revenue: 1.5"));
    assert!(text.contains("failed: channel not found"));
    assert!(text.contains("the stats API is reachable"));

    let installs = state.bodies("install").await;
    assert_eq!(installs.len(), 2);
    assert!(installs[0].get("installTime").is_some());
    assert!(installs[0].get("deviceId").is_none());
    assert!(installs[0].get("deviceInfo").is_none());
    let activations = state.bodies("activate").await;
    assert!(activations[0].get("activateTime").is_some());
    let downloads = state.bodies("download").await;
    assert!(downloads[0].get("downloadTime").is_some());
}

#[tokio::test]
async fn install_suite_reports_duplicates_without_failing_dedup() {
    let (base_url, state) = spawn_stub().await;
    let (report, text) = run(&base_url, Suite::Install).await;

    let outcome = |name: &str| {
        report
            .checks
            .iter()
            .find(|(check, _)| check == name)
            .map(|(_, outcome)| outcome.clone())
            .unwrap()
    };
    assert_eq!(outcome("smart install"), SuiteOutcome::Check(true));
    assert_eq!(
        outcome("duplicate prevention"),
        SuiteOutcome::Dedup(vec![true, false, false])
    );
    assert!(outcome("duplicate prevention").passed());
    match outcome("different devices") {
        SuiteOutcome::Named(cases) => {
            assert_eq!(cases.len(), 4);
            assert!(cases.iter().all(|case| case.success));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(outcome("first usage flow"), SuiteOutcome::Check(true));
    assert!(report.passed(), "{text}");
    assert!(text.contains("message: duplicate install"));

    let installs = state.bodies("install").await;
    assert_eq!(installs.len(), 1 + 3 + 4 + 1);
    let flow_device = installs.last().unwrap()["deviceId"].as_str().unwrap();
    assert_eq!(flow_device, "test_device_first_usage");
    for body in &installs {
        assert_eq!(body["realInstall"], true);
        assert_eq!(body["deviceInfo"]["sdk"], 33);
    }
}

#[tokio::test]
async fn gallery_suite_tags_trigger_context() {
    let (base_url, state) = spawn_stub().await;
    let (report, text) = run(&base_url, Suite::Gallery).await;

    let precision = report
        .checks
        .iter()
        .find(|(name, _)| name == "trigger precision")
        .map(|(_, outcome)| outcome.clone())
        .unwrap();
    assert_eq!(
        precision,
        SuiteOutcome::Pair {
            primary: true,
            comparison: false
        }
    );
    assert!(text.contains("repeat open: server rejects"));
    assert!(report.passed(), "{text}");

    let installs = state.bodies("install").await;
    let contexts: Vec<&str> = installs
        .iter()
        .filter_map(|body| body["triggerContext"].as_str())
        .collect();
    assert!(contexts.contains(&"gallery_first_open"));
    assert!(contexts.contains(&"browser_first_visit"));
    assert!(contexts.contains(&"gallery_repeat_open"));
    let scenarios: Vec<&str> = installs
        .iter()
        .filter_map(|body| body["testScenario"].as_str())
        .collect();
    assert_eq!(scenarios, ["first_gallery_open", "repeat_gallery_open"]);
}

#[tokio::test]
async fn tracking_suite_covers_channels() {
    let (base_url, state) = spawn_stub().await;
    let (report, text) = run(&base_url, Suite::Tracking).await;

    assert!(report.passed(), "{text}");
    assert!(text.contains("channels: 4/4 passed"), "{text}");
    assert!(text.contains("channel 0000: PASS (HTTP 404, rejection expected)"));

    let activations = state.bodies("activate").await;
    let keys: Vec<&str> = activations
        .iter()
        .filter_map(|body| body["licenseKey"].as_str())
        .collect();
    assert!(keys.contains(&"browser_activation_5_visits"));
    assert!(keys.contains(&"test_activation_3003"));
    assert_eq!(state.bodies("download").await.len(), 2);
}

#[tokio::test]
async fn correct_server_passes_every_suite() {
    let (base_url, _state) = spawn_stub().await;
    let runner = Probe::new(&config(&base_url)).unwrap();
    let mut out = Vec::new();
    let all_passed = runner.run_suites(&Suite::ALL, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(all_passed, "{text}");
    assert_eq!(text.matches("overall: ").count(), 4);
}

#[tokio::test]
async fn rejecting_server_fails_the_run() {
    let app = Router::new().route(
        "/api/stats/:event",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "message": "bad payload"})),
            )
        }),
    );
    let base_url = serve(app).await;
    let runner = Probe::new(&config(&base_url)).unwrap();
    let mut out = Vec::new();
    let all_passed = runner.run_suites(&[Suite::Smoke], &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(!all_passed);
    assert!(text.contains("API reachable: FAIL"), "{text}");
}

#[tokio::test]
async fn smoke_pauses_between_cases_only() {
    let (base_url, state) = spawn_stub().await;
    let delay = Duration::from_millis(200);
    let mut config = config(&base_url);
    config.case_delay = delay;
    let runner = Probe::new(&config).unwrap();

    let started = Instant::now();
    let mut out = Vec::new();
    runner.run_suite(Suite::Smoke, &mut out).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= delay * 3, "{elapsed:?}");
    let arrivals = state.arrivals.lock().await.clone();
    assert_eq!(arrivals.len(), 4);
    assert!(arrivals[0] - started < delay, "first case waited");
    for pair in arrivals.windows(2) {
        assert!(pair[1] - pair[0] >= delay);
    }
}

#[tokio::test]
async fn send_event_builds_body_from_options() {
    let (base_url, state) = spawn_stub().await;
    let runner = Probe::new(&config(&base_url)).unwrap();
    let options = SendOptions {
        device_id: Some("cli_device_1".to_string()),
        real_install: true,
        trigger_context: Some("gallery_first_open".to_string()),
        license_key: Some("k1".to_string()),
        device_info: false,
        ..SendOptions::new(EventKind::Install)
    };

    let mut out = Vec::new();
    let accepted = runner.send_event(&mut out, &options).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(accepted, "{text}");
    assert!(text.starts_with("install event"));

    let installs = state.bodies("install").await;
    assert_eq!(installs.len(), 1);
    let body = &installs[0];
    assert!(body.get("deviceInfo").is_none());
    assert_eq!(body["deviceId"], "cli_device_1");
    assert_eq!(body["realInstall"], true);
    assert_eq!(body["triggerContext"], "gallery_first_open");
    assert_eq!(body["licenseKey"], "k1");
    assert_eq!(body["channelCode"], "3001");

    // Same device again: the stub answers 409, so the verdict flips.
    let mut out = Vec::new();
    let repeated = runner.send_event(&mut out, &options).await.unwrap();
    assert!(!repeated);
    assert!(String::from_utf8(out).unwrap().contains("failed: duplicate install"));
}

#[tokio::test]
async fn send_event_includes_device_info_by_default() {
    let (base_url, state) = spawn_stub().await;
    let runner = Probe::new(&config(&base_url)).unwrap();
    let mut out = Vec::new();
    let accepted = runner
        .send_event(&mut out, &SendOptions::new(EventKind::Activate))
        .await
        .unwrap();
    assert!(accepted);
    assert!(String::from_utf8(out).unwrap().contains("revenue: 1.5"));

    let activations = state.bodies("activate").await;
    assert_eq!(activations[0]["deviceInfo"]["os"], "Android 13");
    assert!(activations[0].get("realInstall").is_none());
    assert!(activations[0].get("licenseKey").is_none());
}

#[tokio::test]
async fn unreachable_host_fails_cases_and_keeps_going() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = config(&format!("http://{addr}/api"));
    config.timeout = Duration::from_secs(2);
    let probe = Probe::new(&config).unwrap();
    let mut out = Vec::new();
    let report = probe.run_suite(Suite::Smoke, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    // No response at all is neither reachable nor a rejection.
    assert_eq!(report.checks.len(), 2);
    assert_eq!(report.passed_count(), 0);
    assert_eq!(text.matches("request failed").count(), 4);
    assert!(text.contains("success rate: 0/4 (0.0%)"));
    assert!(text.contains("no case succeeded"));
}

#[tokio::test]
async fn plain_text_errors_are_printed_raw() {
    let app = Router::new().route(
        "/api/stats/download",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable") }),
    );
    let base_url = serve(app).await;
    let probe = Probe::new(&config(&base_url)).unwrap();
    let payload = probe.builder().build(EventKind::Download, "3001", None);

    let record = probe
        .invoker()
        .send(&payload, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(record.status, 503);
    assert!(!record.success);

    let mut out = Vec::new();
    report::describe_response(&mut out, &record).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("response text: upstream unavailable"));
}

#[tokio::test]
async fn slow_server_hits_request_timeout() {
    let app = Router::new().route(
        "/api/stats/install",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let base_url = serve(app).await;
    let probe = Probe::new(&config(&base_url)).unwrap();
    let payload = probe.builder().build(EventKind::Install, "3001", None);

    let err = probe
        .invoker()
        .send(&payload, Duration::from_millis(300))
        .await
        .unwrap_err();
    assert_eq!(err.transport_kind(), "timeout");
}
