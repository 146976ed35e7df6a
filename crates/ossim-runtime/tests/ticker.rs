//! Automatic ticking against the paused tokio clock

use std::time::Duration;

use ossim_core::{ProcessSpec, SchedulerConfig, ScriptedEntropy, SimulationMode, SimulationStatus};
use ossim_runtime::{Controller, RuntimeConfig};
use tokio::time::sleep;

fn controller() -> Controller {
    Controller::with_entropy(
        RuntimeConfig {
            tick_interval: Duration::from_millis(1000),
            initial_memory: Some(256),
            ..RuntimeConfig::default()
        },
        Box::new(ScriptedEntropy::default()),
    )
    .unwrap()
}

fn spec(burst: u64) -> ProcessSpec {
    ProcessSpec {
        name: "worker".into(),
        arrival_time: 0,
        burst_time: burst,
        priority: 0,
        memory_size: None,
    }
}

async fn tick(c: &Controller) -> u64 {
    c.read(|sim| sim.tick()).await
}

#[tokio::test(start_paused = true)]
async fn test_automatic_mode_advances_each_interval() {
    let c = controller();
    c.create_process(spec(100)).await.unwrap();
    c.start(SchedulerConfig::default()).await.unwrap();

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(tick(&c).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_pause_holds_the_clock() {
    let c = controller();
    c.create_process(spec(100)).await.unwrap();
    c.start(SchedulerConfig::default()).await.unwrap();

    sleep(Duration::from_millis(2500)).await;
    c.pause().await.unwrap();
    let held = tick(&c).await;
    assert_eq!(held, 2);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(tick(&c).await, held);

    c.resume().await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(tick(&c).await, held + 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_leaves_no_tick_behind() {
    let c = controller();
    c.create_process(spec(100)).await.unwrap();
    c.start(SchedulerConfig::default()).await.unwrap();

    sleep(Duration::from_millis(1500)).await;
    c.stop().await.unwrap();
    let at_stop = tick(&c).await;
    let events = c.timeline(None).await.len();

    sleep(Duration::from_secs(10)).await;
    assert_eq!(tick(&c).await, at_stop);
    assert_eq!(c.timeline(None).await.len(), events);
    assert_eq!(c.status().await, SimulationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_manual_mode_ignores_the_timer() {
    let c = controller();
    c.create_process(spec(100)).await.unwrap();
    c.set_mode(SimulationMode::Manual).await;
    c.start(SchedulerConfig::default()).await.unwrap();

    sleep(Duration::from_secs(5)).await;
    assert_eq!(tick(&c).await, 0);

    c.step().await.unwrap();
    assert_eq!(tick(&c).await, 1);

    c.set_mode(SimulationMode::Automatic).await;
    sleep(Duration::from_secs(2)).await;
    assert!(tick(&c).await >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_completes_automatically() {
    let c = controller();
    c.create_process(spec(2)).await.unwrap();
    c.start(SchedulerConfig::default()).await.unwrap();

    sleep(Duration::from_secs(5)).await;
    assert_eq!(c.status().await, SimulationStatus::Completed);
    assert_eq!(tick(&c).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_the_ticker() {
    let c = controller();
    c.create_process(spec(100)).await.unwrap();
    c.start(SchedulerConfig::default()).await.unwrap();
    sleep(Duration::from_millis(1500)).await;
    c.stop().await.unwrap();

    c.start(SchedulerConfig::default()).await.unwrap();
    sleep(Duration::from_millis(2500)).await;
    // one ticker only: two ticks since the restart, not four
    assert_eq!(tick(&c).await, 2);
}
