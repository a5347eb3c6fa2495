//! End-to-end supervision tests against a scripted fake miner

#![cfg(unix)]

use assert_matches::assert_matches;
use mining_supervisor::{
    ChannelSink, Error, HardwareUnit, InstanceFactory, InstanceState, LogLine, MinerDescriptor,
    MiningInstance, PoolEndpoint, SinkEvent,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_millis(100);
const DEADLINE: Duration = Duration::from_secs(5);

const THREE_LINES_THEN_WAIT: &str = r#"
echo "[12:00:00] hello"
echo "[12:00:01]  net      use pool rx.unmineable.com:3333"
echo " * ABOUT        XMRig/6.21.0"
exec sleep 30
"#;

fn fake_miner(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("miner.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

fn create(name: &str, executable: &Path, sink: ChannelSink) -> MiningInstance {
    let descriptor = Arc::new(MinerDescriptor::new(
        name,
        executable,
        ["rx/0", "kawpow"],
    ));
    let algorithm = if name == "xmrig" { "rx/0" } else { "kawpow" };

    InstanceFactory::new()
        .with_sink(Arc::new(sink))
        .with_watch_interval(TICK)
        .create(
            descriptor,
            vec![HardwareUnit::cuda(0)],
            algorithm,
            "XMR",
            "44AFFq5kSiGBoZ",
            PoolEndpoint::new("rx.unmineable.com", 3333),
        )
        .unwrap()
}

async fn next_event(rx: &mut UnboundedReceiver<SinkEvent>) -> SinkEvent {
    tokio::time::timeout(DEADLINE, rx.recv())
        .await
        .expect("timed out waiting for sink event")
        .expect("sink closed")
}

async fn next_line(rx: &mut UnboundedReceiver<SinkEvent>) -> LogLine {
    match next_event(rx).await {
        SinkEvent::Line { line, .. } => line,
        other => panic!("expected a line, got {:?}", other),
    }
}

async fn expect_three_lines(rx: &mut UnboundedReceiver<SinkEvent>) {
    assert_matches!(
        next_event(rx).await,
        SinkEvent::Invocation { miner, command }
            if miner == "xmrig" && command.ends_with("--cuda --cuda-devices=0")
    );
    assert_eq!(next_line(rx).await, LogLine::tagged("hello"));
    assert_eq!(
        next_line(rx).await,
        LogLine::tagged("net      use pool rx.unmineable.com:3333")
    );
    assert_eq!(
        next_line(rx).await,
        LogLine::raw(" * ABOUT        XMRig/6.21.0")
    );
}

#[tokio::test]
async fn test_request_cancel_stops_miner() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_miner(&dir, THREE_LINES_THEN_WAIT);
    let (sink, mut rx) = ChannelSink::new();
    let instance = create("xmrig", &script, sink);

    let task = instance.run(CancellationToken::new()).unwrap();
    expect_three_lines(&mut rx).await;
    assert!(!task.is_finished());
    assert_eq!(instance.state(), InstanceState::Running);

    instance.request_cancel();
    instance.request_cancel();

    let result = tokio::time::timeout(DEADLINE, task)
        .await
        .expect("supervision should end after request_cancel");
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(instance.state(), InstanceState::Finished);
}

#[tokio::test]
async fn test_external_cancel_stops_miner() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_miner(&dir, THREE_LINES_THEN_WAIT);
    let (sink, mut rx) = ChannelSink::new();
    let instance = create("xmrig", &script, sink);

    let external = CancellationToken::new();
    let task = instance.run(external.clone()).unwrap();
    expect_three_lines(&mut rx).await;

    let fired = Instant::now();
    external.cancel();

    let result = tokio::time::timeout(DEADLINE, task)
        .await
        .expect("supervision should end after external cancellation");
    assert!(result.is_ok(), "{:?}", result);
    assert!(fired.elapsed() < TICK + Duration::from_secs(1));
    assert!(instance.is_cancel_requested());
}

#[tokio::test]
async fn test_external_cancel_before_run() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_miner(&dir, THREE_LINES_THEN_WAIT);
    let (sink, _rx) = ChannelSink::new();
    let instance = create("xmrig", &script, sink);

    let external = CancellationToken::new();
    external.cancel();
    let task = instance.run(external).unwrap();

    let result = tokio::time::timeout(DEADLINE, task).await.unwrap();
    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn test_miner_exit_ends_supervision() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_miner(&dir, "echo '[00:00:01] done'\nexit 2");
    let (sink, mut rx) = ChannelSink::new();
    let instance = create("xmrig", &script, sink);

    let task = instance.run(CancellationToken::new()).unwrap();
    let result = tokio::time::timeout(DEADLINE, task).await.unwrap();
    assert!(result.is_ok(), "{:?}", result);

    assert_matches!(next_event(&mut rx).await, SinkEvent::Invocation { .. });
    assert_eq!(next_line(&mut rx).await, LogLine::tagged("done"));
    assert_eq!(instance.state(), InstanceState::Finished);
}

#[tokio::test]
async fn test_arguments_reach_the_miner() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_miner(&dir, r#"for arg in "$@"; do echo "$arg"; done"#);
    let (sink, mut rx) = ChannelSink::new();
    let instance = create("t-rex", &script, sink);

    let task = instance.run(CancellationToken::new()).unwrap();
    tokio::time::timeout(DEADLINE, task).await.unwrap().unwrap();

    let command = match next_event(&mut rx).await {
        SinkEvent::Invocation { command, .. } => command,
        other => panic!("expected the invocation, got {:?}", other),
    };
    let mut argv = Vec::new();
    while let Ok(SinkEvent::Line { line, .. }) = rx.try_recv() {
        argv.push(line.message);
    }

    assert_eq!(command.split(' ').collect::<Vec<_>>(), argv);
    assert_eq!(
        argv,
        vec![
            "-a",
            "kawpow",
            "-o",
            "stratum+tcp://rx.unmineable.com:3333",
            "-u",
            "XMR:44AFFq5kSiGBoZ",
            "-p",
            "x",
            "-d",
            "0",
        ]
    );
}

#[tokio::test]
async fn test_cancel_terminates_process() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_miner(&dir, "echo \"$$\"\nexec sleep 30");
    let (sink, mut rx) = ChannelSink::new();
    let instance = create("t-rex", &script, sink);

    let task = instance.run(CancellationToken::new()).unwrap();
    assert_matches!(next_event(&mut rx).await, SinkEvent::Invocation { .. });
    let pid = next_line(&mut rx).await.message;

    instance.request_cancel();
    tokio::time::timeout(DEADLINE, task).await.unwrap().unwrap();

    let alive = std::process::Command::new("kill")
        .args(["-0", &pid])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success();
    assert!(!alive, "miner {} still running after cancellation", pid);
}

#[tokio::test]
async fn test_cancel_stops_miner_with_closed_output() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_miner(
        &dir,
        "echo \"$$\"\nexec >/dev/null 2>&1\nexec sleep 30",
    );
    let (sink, mut rx) = ChannelSink::new();
    let instance = create("t-rex", &script, sink);

    let external = CancellationToken::new();
    let task = instance.run(external.clone()).unwrap();
    assert_matches!(next_event(&mut rx).await, SinkEvent::Invocation { .. });
    let pid = next_line(&mut rx).await.message;

    // Let the reader see both pipes close before cancelling
    tokio::time::sleep(TICK * 2).await;
    assert!(!task.is_finished());
    external.cancel();

    let result = tokio::time::timeout(DEADLINE, task)
        .await
        .expect("supervision should end after cancellation");
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(instance.state(), InstanceState::Finished);

    let alive = std::process::Command::new("kill")
        .args(["-0", &pid])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success();
    assert!(!alive, "miner {} still running after cancellation", pid);
}

#[tokio::test]
async fn test_missing_executable_is_reported() {
    let (sink, _rx) = ChannelSink::new();
    let instance = create("xmrig", Path::new("/nonexistent/xmrig"), sink);

    let task = instance.run(CancellationToken::new()).unwrap();
    let result = tokio::time::timeout(DEADLINE, task).await.unwrap();
    assert_matches!(result, Err(Error::ExternalProcess { .. }));
}
