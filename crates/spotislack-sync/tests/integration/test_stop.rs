//! stop() semantics

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use spotislack_core::domain::{SkipReason, SyncOutcome};

use crate::common::{playing, settings, user, FakeMusic, FakeSlack, Harness, RecordingObserver};

#[tokio::test(start_paused = true)]
async fn test_stop_mid_tick_lets_in_flight_pipelines_finish() {
    let h = Harness::new(
        vec![user("a"), user("b"), user("c")],
        FakeMusic::new(Ok(playing("Song A", "X"))).with_delay(Duration::from_secs(2)),
        FakeSlack::default(),
    );
    let observer = Arc::new(RecordingObserver::default());
    let orch = h.orchestrator(settings(5, 4)).with_observer(observer.clone());

    let runner = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.run_forever().await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    orch.stop();
    runner.await.unwrap();

    let ticks = observer.ticks.lock().unwrap();
    assert_eq!(ticks.len(), 1, "no new tick after stop");
    assert_eq!(ticks[0].1.succeeded, 3);
    assert_eq!(h.slack.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_skips_pipelines_not_yet_started() {
    let h = Harness::new(
        vec![user("a"), user("b"), user("c")],
        FakeMusic::new(Ok(playing("Song A", "X"))).with_delay(Duration::from_secs(2)),
        FakeSlack::default(),
    );
    let observer = Arc::new(RecordingObserver::default());
    let orch = h.orchestrator(settings(5, 1)).with_observer(observer.clone());

    let runner = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.run_forever().await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    orch.stop();
    runner.await.unwrap();

    let ticks = observer.ticks.lock().unwrap();
    assert_eq!(ticks.len(), 1);
    let summary = &ticks[0].1;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 2);
    assert!(summary.results.iter().any(|r| matches!(
        r.outcome,
        SyncOutcome::Skipped {
            reason: SkipReason::Stopped
        }
    )));
    assert_eq!(h.music.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_sleep_returns_promptly() {
    let h = Harness::new(
        vec![user("a")],
        FakeMusic::new(Ok(playing("Song A", "X"))),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(3600, 4));

    let runner = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.run_forever().await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    let stopped_at = tokio::time::Instant::now();
    orch.stop();
    runner.await.unwrap();

    assert!(tokio::time::Instant::now() - stopped_at < Duration::from_secs(1));
    assert_eq!(h.music.calls.load(Ordering::SeqCst), 1);
}
