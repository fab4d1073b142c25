//! End-to-end integration tests for the control client
//!
//! These tests talk real TCP, either to a scripted in-process listener or
//! to the `mock_engine` binary, and drive the `vflowctl` binary itself for
//! the CLI surface.

use std::io::{BufRead, BufReader as StdBufReader};
use std::net::TcpListener as StdTcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use vflowctl::common::parse_listen_address;
use vflowctl::control::codec::MAX_LINE_LEN;
use vflowctl::testing::{CaseStatus, Executor, FailureKind, TestPlan, Tier};
use vflowctl::{Outcome, Session, SessionOptions, SessionState};

/// A running `mock_engine` process, killed on drop
struct MockEngine {
    child: Child,
    port: u16,
}

impl MockEngine {
    fn start(extra_args: &[&str]) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_mock_engine"))
            .args(["--port", "0"])
            .args(extra_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start mock engine");

        let stdout = child.stdout.take().expect("mock engine stdout");
        let mut line = String::new();
        StdBufReader::new(stdout)
            .read_line(&mut line)
            .expect("Failed to read mock engine address");

        let addr = parse_listen_address(&line)
            .unwrap_or_else(|| panic!("Unexpected mock engine output: {}", line));
        let port = addr
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| panic!("No port in address: {}", addr));

        Self { child, port }
    }

    /// Wait for the process to exit on its own
    fn wait_exit(&mut self, limit: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < limit {
            if let Ok(Some(status)) = self.child.try_wait() {
                return status.success();
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn options() -> SessionOptions {
    SessionOptions {
        connect_timeout: Duration::from_secs(2),
        response_timeout: Some(Duration::from_secs(5)),
    }
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Port that nothing listens on
fn closed_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

/// Output from a CLI invocation
#[derive(Debug)]
struct CliOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

/// Run `vflowctl` with config and data directories isolated under `home`
fn run_cli(home: &Path, args: &[&str]) -> CliOutput {
    let output = Command::new(env!("CARGO_BIN_EXE_vflowctl"))
        .args(args)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run vflowctl");

    CliOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
    }
}

// ============== Session over real TCP ==============

#[tokio::test]
async fn test_dropped_connection_is_resent_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        // First connection answers the probe, then drops mid-request
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let probe = lines.next_line().await.unwrap().unwrap();
        write_half.write_all(b"{\"success\":true}\n").await.unwrap();
        let dropped = lines.next_line().await.unwrap().unwrap();
        drop(lines);
        drop(write_half);

        // Second connection gets the same request again
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let resent = lines.next_line().await.unwrap().unwrap();
        write_half
            .write_all(b"{\"success\":true,\"text\":\"again\"}\n")
            .await
            .unwrap();
        (probe, dropped, resent)
    });

    let session = Session::tcp(options());
    assert!(session.connect("127.0.0.1", port).await.unwrap().is_pass());

    let outcome = session
        .request("clipboard", "getClipboard", Map::new())
        .await
        .unwrap();

    let (probe, dropped, resent) = server.await.unwrap();
    assert!(probe.contains("\"ping\""));
    assert_eq!(dropped, resent);
    assert!(outcome.is_pass(), "unexpected outcome: {}", outcome);
    assert_eq!(outcome.response().unwrap().payload["text"], "again");
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_oversized_request_keeps_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut lengths = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            lengths.push(line.len());
            write_half.write_all(b"{\"success\":true}\n").await.unwrap();
        }
        lengths
    });

    let session = Session::tcp(options());
    session.connect("127.0.0.1", port).await.unwrap();

    let text = "x".repeat(MAX_LINE_LEN);
    let outcome = session
        .request("clipboard", "setClipboard", params(json!({ "text": text })))
        .await
        .unwrap();

    assert!(outcome.is_pass(), "unexpected outcome: {}", outcome);
    assert_eq!(session.state(), SessionState::Connected);

    session.disconnect().await;
    let lengths = server.await.unwrap();
    assert_eq!(lengths.len(), 2);
    assert!(lengths[1] > MAX_LINE_LEN);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let session = Session::tcp(options());
    let err = session.connect("127.0.0.1", closed_port()).await.unwrap_err();

    assert!(err.is_connect(), "unexpected error: {}", err);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.request("system", "ping", Map::new()).await,
        Err(vflowctl::Error::NotConnected)
    ));
}

// ============== Session against the mock engine ==============

#[tokio::test]
async fn test_mock_engine_clipboard_round_trip() {
    let engine = MockEngine::start(&[]);
    let session = Session::tcp(options());
    assert!(session.connect("127.0.0.1", engine.port).await.unwrap().is_pass());

    let set = session
        .request("clipboard", "setClipboard", params(json!({"text": "hello from test"})))
        .await
        .unwrap();
    assert!(set.is_pass());

    let get = session
        .request("clipboard", "getClipboard", Map::new())
        .await
        .unwrap();
    assert_eq!(get.response().unwrap().payload["text"], "hello from test");

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_mock_engine_unknown_target_is_remote_failure() {
    let engine = MockEngine::start(&[]);
    let session = Session::tcp(options());
    session.connect("127.0.0.1", engine.port).await.unwrap();

    let outcome = session
        .request("teleporter", "beamUp", Map::new())
        .await
        .unwrap();

    match &outcome {
        Outcome::Success { response, .. } => {
            assert!(!response.success);
            assert_eq!(response.error_message(), "No route");
        }
        other => panic!("Expected a remote failure, got {}", other),
    }
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_full_tier_against_mock_engine() {
    let engine = MockEngine::start(&["--deny", "power.goToSleep"]);
    let session = Session::tcp(options());
    session.connect("127.0.0.1", engine.port).await.unwrap();

    let report = Executor::new(TestPlan::builtin())
        .with_case_delay(Duration::ZERO)
        .run(Tier::Full, &session)
        .await
        .unwrap();

    assert_eq!(report.total(), 13);
    assert_eq!(report.passed(), 12);
    assert_eq!(report.failed(), 1);

    let failed: Vec<_> = report.records().iter().filter(|r| !r.passed()).collect();
    assert_eq!(failed[0].method, "goToSleep");
    assert_eq!(failed[0].tier, Tier::Regular);
    assert_eq!(
        failed[0].status,
        CaseStatus::Failed {
            kind: FailureKind::Remote,
            error: "permission denied".to_string()
        }
    );
    assert!(report.to_string().ends_with("12/13 (92.3%)"));
}

#[tokio::test]
async fn test_exit_stops_engine() {
    let mut engine = MockEngine::start(&[]);
    let session = Session::tcp(options());
    session.connect("127.0.0.1", engine.port).await.unwrap();

    let outcome = session.request("system", "exit", Map::new()).await.unwrap();
    assert!(outcome.is_pass());
    assert!(engine.wait_exit(Duration::from_secs(5)));

    // The engine is gone: one reconnect attempt, then a transport failure
    let outcome = session.request("system", "ping", Map::new()).await.unwrap();
    assert!(matches!(outcome, Outcome::TransportFailure { .. }), "got {}", outcome);
    assert_eq!(session.state(), SessionState::Disconnected);
}

// ============== CLI ==============

#[test]
fn test_cli_catalog_queries() {
    let home = tempfile::tempdir().unwrap();

    let output = run_cli(home.path(), &["targets"]);
    assert!(output.success, "stderr: {}", output.stderr);
    let targets: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(targets.len(), 13);
    assert_eq!(targets[0], "system");

    let output = run_cli(home.path(), &["methods", "wifi"]);
    assert!(output.success);
    assert_eq!(
        output.stdout.lines().collect::<Vec<_>>(),
        vec!["setWifiEnabled", "isEnabled", "toggle"]
    );

    let output = run_cli(home.path(), &["describe", "clipboard", "setClipboard"]);
    assert!(output.success);
    assert!(output.stdout.contains("Hello from vFlowCore Debugger"));

    let output = run_cli(home.path(), &["methods", "teleporter"]);
    assert!(!output.success);
}

#[test]
fn test_cli_ping_closed_port_fails() {
    let home = tempfile::tempdir().unwrap();
    let port = closed_port().to_string();

    let output = run_cli(home.path(), &["--port", &port, "ping"]);

    assert!(!output.success);
    assert!(
        output.stderr.contains("Failed to connect"),
        "stderr: {}",
        output.stderr
    );
}

#[test]
fn test_cli_send_and_test_against_mock_engine() {
    let engine = MockEngine::start(&[]);
    let home = tempfile::tempdir().unwrap();
    let port = engine.port.to_string();

    let output = run_cli(
        home.path(),
        &["--port", &port, "send", "clipboard", "setClipboard", "--params", r#"{"text":"cli"}"#],
    );
    assert!(output.success, "stdout: {}\nstderr: {}", output.stdout, output.stderr);

    let output = run_cli(home.path(), &["--port", &port, "send", "clipboard", "getClipboard"]);
    assert!(output.success);
    assert!(output.stdout.contains("\"cli\""), "stdout: {}", output.stdout);

    let output = run_cli(
        home.path(),
        &["--port", &port, "test", "--tier", "regular", "--delay-ms", "0", "--json"],
    );
    assert!(output.success, "stdout: {}\nstderr: {}", output.stdout, output.stderr);
    let report: Value = serde_json::from_str(&output.stdout).expect("JSON report");
    assert_eq!(report["tier"], "regular");
    assert_eq!(report["total"], 9);
    assert_eq!(report["passed"], 9);
    assert_eq!(report["cancelled"], false);
}

#[test]
fn test_cli_test_reports_failure_exit_code() {
    let engine = MockEngine::start(&["--deny", "clipboard.getClipboard"]);
    let home = tempfile::tempdir().unwrap();
    let port = engine.port.to_string();

    let output = run_cli(home.path(), &["--port", &port, "test", "--delay-ms", "0"]);

    assert!(!output.success);
    assert!(output.stdout.contains("remote error: permission denied"));
    assert!(output.stdout.contains("1/2 (50.0%)"));
}

#[test]
fn test_cli_uses_config_file() {
    let engine = MockEngine::start(&[]);
    let home = tempfile::tempdir().unwrap();
    let config_dir = home.path().join("config").join("vflowctl");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!("[connection]\nport = {}\n", engine.port),
    )
    .unwrap();

    let output = run_cli(home.path(), &["ping"]);

    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("pong from mock engine"));
}
