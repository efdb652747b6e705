//! Tests for the tokio production runner.
//!
//! Each test spawns the runner on the test runtime and drives it through a
//! `PbftHandle`. View-change delays are kept short so timers fire quickly.

use quorumsim_bft::{ConfigError, PbftConfig};
use quorumsim_production::{Notification, ProductionRunner, RunnerError};
use quorumsim_types::{NodeId, Phase, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("quorumsim=debug")
        .with_test_writer()
        .try_init();
}

fn contested() -> PbftConfig {
    PbftConfig::default()
        .with_node_count(4)
        .with_fixed_byzantine([NodeId(1), NodeId(2)])
        .with_view_change_delay(Duration::from_millis(30))
}

#[tokio::test]
async fn test_honest_round_through_handle() {
    init_tracing();
    let (runner, handle) = ProductionRunner::builder()
        .config(PbftConfig::new(4, 0.0, true))
        .build()
        .unwrap();
    let task = tokio::spawn(runner.run());

    let status = handle.start_round().await.unwrap();
    assert_eq!(status.phase, Phase::Propose);
    assert_eq!(status.current_leader, NodeId(0));

    let status = handle.submit_value("A").await.unwrap();
    assert_eq!(status.phase, Phase::Idle);
    assert_eq!(status.decision_count, 1);
    assert_eq!(status.message_count, 24);
    let block = status.last_decision.clone().unwrap();
    assert_eq!(block.value, Value::from("A"));
    assert!(!block.is_subverted);
    assert_eq!(handle.status().decision_count, 1);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.messages.len(), status.message_count);
    assert_eq!(snapshot.decisions, vec![block]);

    // Dropping the last handle stops the loop.
    drop(handle);
    timeout(TEST_TIMEOUT, task)
        .await
        .expect("runner did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_view_change_resumes_after_timer() {
    init_tracing();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let (runner, handle) = ProductionRunner::builder()
        .config(contested())
        .notifications(notify_tx)
        .build()
        .unwrap();
    tokio::spawn(runner.run());

    handle.start_round().await.unwrap();
    handle.submit_value("A").await.unwrap();
    handle.submit_value("A").await.unwrap();
    // The reply is taken before the resumption timer can fire.
    let status = handle.submit_value("A").await.unwrap();
    assert_eq!(status.phase, Phase::ViewChange);
    assert_eq!(status.view, 1);

    let resumed = timeout(
        TEST_TIMEOUT,
        handle.wait_for(|s| s.phase == Phase::Propose),
    )
    .await
    .expect("view change never resumed")
    .unwrap();
    assert_eq!(resumed.view, 1);
    assert_eq!(resumed.failure_count, 0);

    let mut received = Vec::new();
    while let Ok(notification) = notify_rx.try_recv() {
        received.push(notification);
    }
    assert_eq!(
        received,
        vec![
            Notification::QuorumFailed {
                view: 0,
                failure_count: 1
            },
            Notification::QuorumFailed {
                view: 0,
                failure_count: 2
            },
            Notification::QuorumFailed {
                view: 0,
                failure_count: 3
            },
            Notification::ViewChanged { view: 1 },
        ]
    );
}

#[tokio::test]
async fn test_start_round_cancels_resumption() {
    init_tracing();
    let config = contested().with_view_change_delay(Duration::from_millis(100));
    let (runner, handle) = ProductionRunner::builder()
        .config(config)
        .build()
        .unwrap();
    tokio::spawn(runner.run());

    handle.start_round().await.unwrap();
    for _ in 0..3 {
        handle.submit_value("A").await.unwrap();
    }
    let status = handle.start_round().await.unwrap();
    assert_eq!(status.phase, Phase::Propose);
    assert_eq!(status.current_leader, NodeId(1));

    let settled = handle.submit_value("A").await.unwrap();

    // Nothing may move the phase once the cancelled delay has passed.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.status().phase, settled.phase);
    assert_eq!(handle.status().message_count, settled.message_count);
}

#[tokio::test]
async fn test_configure_through_handle() {
    let (runner, handle) = ProductionRunner::builder()
        .config(PbftConfig::new(4, 0.0, true).with_auto_advance(false))
        .build()
        .unwrap();
    tokio::spawn(runner.run());

    handle.start_round().await.unwrap();
    let status = handle.submit_value("A").await.unwrap();
    assert_eq!(status.phase, Phase::PrePrepare);
    let status = handle.advance().await.unwrap();
    assert_eq!(status.phase, Phase::Prepare);

    let status = handle
        .configure(PbftConfig::new(10, 0.0, true))
        .await
        .unwrap();
    assert_eq!(status.phase, Phase::Idle);
    assert_eq!(status.replicas.len(), 10);

    let err = handle
        .configure(PbftConfig::new(0, 0.0, true))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Config(ConfigError::NoNodes)));
    assert_eq!(handle.status().replicas.len(), 10);
}

#[tokio::test]
async fn test_shutdown_handle_stops_runner() {
    let (mut runner, handle) = ProductionRunner::builder().build().unwrap();
    let shutdown = runner.shutdown_handle().unwrap();
    assert!(runner.shutdown_handle().is_none());
    let task = tokio::spawn(runner.run());

    shutdown.shutdown();
    timeout(TEST_TIMEOUT, task)
        .await
        .expect("runner did not stop")
        .unwrap()
        .unwrap();

    let err = handle.start_round().await.unwrap_err();
    assert!(matches!(err, RunnerError::ChannelClosed));
}
