//! CLI integration tests
//!
//! Tests the `epp` binary using assert_cmd. Session commands run against an
//! in-process stub server reached with `--via`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use epp_protocol::ResultCode;
use epp_tunnel::{StubConfig, StubServer};
use predicates::prelude::*;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn epp() -> Command {
    Command::cargo_bin("epp")
        .expect("Failed to locate epp binary - ensure it's built before running tests")
}

/// `epp` with an isolated config path and a password, talking to `addr`
fn epp_via(dir: &TempDir, addr: SocketAddr) -> Command {
    let mut cmd = epp();
    cmd.arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["--via", &addr.to_string()])
        .args(["--client-id", "registrar", "--password", "secret"]);
    cmd
}

async fn spawn_stub(config: StubConfig, cancel: CancellationToken) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stub = StubServer::new(config, cancel);
    tokio::spawn(async move { stub.serve(listener).await });
    addr
}

fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_cli_help() {
    epp()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("epp"))
        .stdout(predicate::str::contains("EPP client toolkit"));
}

#[test]
fn test_cli_version() {
    epp()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("epp"));
}

#[test]
fn test_cli_tunnel_help() {
    epp()
        .args(["tunnel", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Relay"))
        .stdout(predicate::str::contains("--listen"));
}

#[test]
fn test_cli_unknown_command() {
    epp()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_info_requires_domain() {
    epp().arg("info").assert().failure();
}

#[test]
fn test_cli_config_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("epp.toml");

    epp()
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("epp.toml"));
}

#[test]
fn test_cli_config_init_and_show() {
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("conf").join("config.toml");

    epp()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No configuration file found"));

    epp()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    epp()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[server]"))
        .stdout(predicate::str::contains("DEFAULT:@SECLEVEL=0"));
}

#[test]
fn test_cli_probe_connect_refused() {
    let dir = TempDir::new().unwrap();
    let port = dead_port().to_string();

    epp()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["--server", "127.0.0.1", "--port", &port, "--timeout", "2", "probe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open secure channel"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_info_json_via_stub() {
    let cancel = CancellationToken::new();
    let addr = spawn_stub(StubConfig::default(), cancel.clone()).await;
    let dir = TempDir::new().unwrap();

    let mut cmd = epp_via(&dir, addr);
    cmd.args(["--json", "info", "example.com"]);
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("\"server_id\": \"TEST EPP Server\""))
            .stdout(predicate::str::contains("\"classification\": \"success\""))
            .stdout(predicate::str::contains("\"stopped_early\": false"));
    })
    .await
    .unwrap();

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_info_failure_exit_code() {
    let cancel = CancellationToken::new();
    let config = StubConfig {
        command_code: ResultCode(2303),
        ..Default::default()
    };
    let addr = spawn_stub(config, cancel.clone()).await;

    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[session]\nresult_policy = \"rfc5730\"\n",
    )
    .unwrap();

    let mut cmd = epp_via(&dir, addr);
    cmd.args(["info", "missing.example", "other.example"]);
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .failure()
            .stdout(predicate::str::contains("2303"))
            .stdout(predicate::str::contains("1500"))
            .stderr(predicate::str::contains("One or more commands failed"));
    })
    .await
    .unwrap();

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_hello_and_probe_via_stub() {
    let cancel = CancellationToken::new();
    let config = StubConfig {
        server_id: "Staging Registry".to_string(),
        ..Default::default()
    };
    let addr = spawn_stub(config, cancel.clone()).await;
    let dir = TempDir::new().unwrap();

    let mut hello = epp_via(&dir, addr);
    hello.arg("hello");
    let mut probe = epp_via(&dir, addr);
    probe.args(["--json", "probe"]);

    tokio::task::spawn_blocking(move || {
        hello
            .assert()
            .success()
            .stdout(predicate::str::contains("Staging Registry"));
        probe
            .assert()
            .success()
            .stdout(predicate::str::contains("\"channel\": null"))
            .stdout(predicate::str::contains("Staging Registry"));
    })
    .await
    .unwrap();

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_login_fails_when_server_hangs_up() {
    let cancel = CancellationToken::new();
    let config = StubConfig {
        close_after_greeting: true,
        ..Default::default()
    };
    let addr = spawn_stub(config, cancel.clone()).await;
    let dir = TempDir::new().unwrap();

    let mut cmd = epp_via(&dir, addr);
    cmd.args(["info", "example.com"]);
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("Failed to log in"));
    })
    .await
    .unwrap();

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_shell_script_via_stub() {
    let cancel = CancellationToken::new();
    let addr = spawn_stub(StubConfig::default(), cancel.clone()).await;
    let dir = TempDir::new().unwrap();

    let mut cmd = epp_via(&dir, addr);
    cmd.arg("shell")
        .write_stdin("info example.com\nbogus\nhello\nlogout\n");
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("1000"))
            .stdout(predicate::str::contains("TEST EPP Server"))
            .stdout(predicate::str::contains("1500"))
            .stderr(predicate::str::contains("Unknown command 'bogus'"));
    })
    .await
    .unwrap();

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_shell_quit_skips_logout() {
    let cancel = CancellationToken::new();
    let addr = spawn_stub(StubConfig::default(), cancel.clone()).await;
    let dir = TempDir::new().unwrap();

    let mut cmd = epp_via(&dir, addr);
    cmd.args(["--raw", "shell"]).write_stdin(
        "xml <epp><command><check/><clTRID>INLINE-1</clTRID></command></epp>\nquit\n",
    );
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("INLINE-1"))
            .stdout(predicate::str::contains("1500").not())
            .stdout(predicate::str::contains("Disconnected without logout"));
    })
    .await
    .unwrap();

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_info_greeting_wait_honours_timeout() {
    // Accepts connections and never says anything
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });
    let dir = TempDir::new().unwrap();

    let mut cmd = epp_via(&dir, addr);
    cmd.args(["--timeout", "1", "info", "example.com"]);
    let elapsed = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("Failed to log in"));
        started.elapsed()
    })
    .await
    .unwrap();

    assert!(elapsed < Duration::from_secs(8), "took {:?}", elapsed);
    server.abort();
}
