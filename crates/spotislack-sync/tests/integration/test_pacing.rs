//! Tick pacing on the paused clock

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use crate::common::{playing, settings, user, FakeMusic, FakeSlack, Harness, RecordingObserver};

fn gaps(instants: &[tokio::time::Instant]) -> Vec<Duration> {
    instants.windows(2).map(|w| w[1] - w[0]).collect()
}

#[tokio::test(start_paused = true)]
async fn test_short_tick_waits_for_interval_from_tick_start() {
    let h = Harness::new(
        vec![user("a")],
        FakeMusic::new(Ok(playing("Song A", "X"))).with_delay(Duration::from_secs(1)),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(5, 4));
    let observer = Arc::new(RecordingObserver::stopping_after(3, orch.cancellation_token()));
    let orch = orch.with_observer(observer.clone());

    orch.run_forever().await;

    let instants = observer.tick_instants();
    assert_eq!(instants.len(), 3);
    for gap in gaps(&instants) {
        assert_eq!(gap, Duration::from_secs(5), "ticks must start every interval");
    }
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_tick_is_followed_immediately() {
    let h = Harness::new(
        vec![user("a")],
        FakeMusic::new(Ok(playing("Song A", "X"))).with_delay(Duration::from_secs(8)),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(5, 4));
    let observer = Arc::new(RecordingObserver::stopping_after(3, orch.cancellation_token()));
    let orch = orch.with_observer(observer.clone());

    orch.run_forever().await;

    let instants = observer.tick_instants();
    assert_eq!(instants.len(), 3);
    // No sleep after an overrun, and no catch-up burst either
    for gap in gaps(&instants) {
        assert_eq!(gap, Duration::from_secs(8));
    }
}

#[tokio::test(start_paused = true)]
async fn test_ticks_never_overlap() {
    let h = Harness::new(
        vec![user("a"), user("b")],
        FakeMusic::new(Ok(playing("Song A", "X"))).with_delay(Duration::from_secs(7)),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(5, 4));
    let observer = Arc::new(RecordingObserver::stopping_after(2, orch.cancellation_token()));
    let orch = orch.with_observer(observer.clone());

    orch.run_forever().await;

    // Both users of a tick ran side by side, never alongside the next tick
    assert_eq!(
        h.music
            .peak_in_flight
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_is_retried_after_interval() {
    let h = Harness::new(
        vec![user("a")],
        FakeMusic::new(Ok(playing("Song A", "X"))),
        FakeSlack::default(),
    );
    h.repo.fail_listing.store(true, Ordering::SeqCst);
    let orch = h.orchestrator(settings(5, 4));
    let observer = Arc::new(RecordingObserver::stopping_after(1, orch.cancellation_token()));
    let orch = orch.with_observer(observer.clone());

    let handle = tokio::spawn(async move { orch.run_forever().await });
    tokio::time::sleep(Duration::from_secs(12)).await;
    h.repo.fail_listing.store(false, Ordering::SeqCst);
    handle.await.unwrap();

    // Ticks at 0s, 5s and 10s failed; the loop kept its pace and the 15s tick ran
    assert_eq!(*observer.failed_ticks.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(observer.tick_instants().len(), 1);
    assert_eq!(h.slack.calls(), 1);
}
