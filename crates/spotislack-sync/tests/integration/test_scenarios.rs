//! Per-user pipeline scenarios across whole ticks

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use chrono::Utc;
use spotislack_core::domain::{FailureKind, PlaybackState, ServiceError, SyncOutcome};

use crate::common::{playing, settings, user, FakeMusic, FakeSlack, Harness, RecordingObserver};

#[tokio::test]
async fn test_song_published_once_then_skipped_then_cleared() {
    let alice = user("alice");
    let h = Harness::new(
        vec![alice.clone()],
        FakeMusic::new(Ok(playing("Song A", "X"))),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(5, 4));

    orch.run_once().await.unwrap();
    orch.run_once().await.unwrap();
    assert_eq!(h.slack.calls(), 1);

    // Playback stops: the music fake now answers "nothing playing"
    let h2_music = FakeMusic::new(Ok(PlaybackState::not_playing(Utc::now())));
    let stored = h.repo.get(alice.id()).unwrap();
    assert_eq!(stored.last_status().unwrap().text, "Song A by X");

    let h2 = Harness {
        repo: h.repo.clone(),
        music: Arc::new(h2_music),
        slack: h.slack.clone(),
        refresher: h.refresher.clone(),
    };
    let summary = h2.orchestrator(settings(5, 4)).run_once().await.unwrap();

    assert_eq!(summary.cleared(), 1);
    assert_eq!(h.slack.calls(), 2);
    let published = h.slack.published.lock().unwrap();
    assert!(!published[0].1.clear);
    assert!(published[1].1.clear);
}

#[tokio::test]
async fn test_failures_are_isolated_per_user() {
    let users = vec![user("flaky"), user("revoked"), user("healthy")];
    let h = Harness::new(
        users.clone(),
        FakeMusic::new(Ok(playing("Song A", "X")))
            .answer("sp-flaky", Err(ServiceError::Transient("HTTP 503".into()))),
        FakeSlack::default()
            .failing_for("xoxp-revoked", ServiceError::AuthInvalid("token_revoked".into())),
    );
    let orch = h.orchestrator(settings(5, 4));

    let summary = orch.run_once().await.unwrap();

    assert_eq!(summary.users, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.retryable_failures, 1);
    assert_eq!(summary.fatal_failures, 1);

    let outcome_of = |name: &str| {
        let id = *users.iter().find(|u| u.slack_user_id() == name).unwrap().id();
        summary
            .results
            .iter()
            .find(|r| r.user_id == id)
            .unwrap()
            .outcome
            .clone()
    };
    assert!(matches!(outcome_of("healthy"), SyncOutcome::Published { cleared: false }));
    match outcome_of("revoked") {
        SyncOutcome::Failed(f) => {
            assert_eq!(f.kind, FailureKind::AuthInvalid);
            assert!(f.reauth_required());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    match outcome_of("flaky") {
        SyncOutcome::Failed(f) => assert_eq!(f.kind, FailureKind::Transient),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_token_refreshed_once_then_auth_invalid() {
    let h = Harness::new(
        vec![user("bob")],
        FakeMusic::new(Ok(playing("Song A", "X")))
            .answer("sp-bob", Err(ServiceError::AuthExpired))
            .answer("fresh", Err(ServiceError::AuthInvalid("insufficient scope".into()))),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(5, 4));

    let summary = orch.run_once().await.unwrap();

    assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.music.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.slack.calls(), 0);
    assert_eq!(summary.fatal_failures, 1);
}

#[tokio::test]
async fn test_refreshed_token_is_persisted() {
    let bob = user("bob");
    let h = Harness::new(
        vec![bob.clone()],
        FakeMusic::new(Ok(playing("Song A", "X"))).answer("sp-bob", Err(ServiceError::AuthExpired)),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(5, 4));

    let summary = orch.run_once().await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let stored = h.repo.get(bob.id()).unwrap();
    let tokens = stored.tokens(spotislack_core::domain::Service::Spotify);
    assert_eq!(tokens.access_token, "fresh");
    assert_eq!(tokens.refresh_token.as_deref(), Some("sp-refresh-bob"));
}

#[tokio::test]
async fn test_listing_failure_aborts_only_that_tick() {
    let h = Harness::new(
        vec![user("carol")],
        FakeMusic::new(Ok(playing("Song A", "X"))),
        FakeSlack::default(),
    );
    let observer = Arc::new(RecordingObserver::default());
    let orch = h.orchestrator(settings(5, 4)).with_observer(observer.clone());

    h.repo.fail_listing.store(true, Ordering::SeqCst);
    assert!(orch.run_once().await.is_err());
    assert_eq!(*observer.failed_ticks.lock().unwrap(), vec![1]);

    h.repo.fail_listing.store(false, Ordering::SeqCst);
    let summary = orch.run_once().await.unwrap();
    assert_eq!(summary.tick, 2);
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_worker_concurrency_is_bounded() {
    let users = (0..6).map(|i| user(&format!("u{i}"))).collect();
    let h = Harness::new(
        users,
        FakeMusic::new(Ok(playing("Song A", "X"))).with_delay(Duration::from_millis(100)),
        FakeSlack::default(),
    );
    let orch = h.orchestrator(settings(5, 2));

    let summary = orch.run_once().await.unwrap();

    assert_eq!(summary.succeeded, 6);
    assert_eq!(h.music.peak_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_user_times_out_as_retryable() {
    let h = Harness::new(
        vec![user("dave")],
        FakeMusic::new(Ok(playing("Song A", "X"))).with_delay(Duration::from_secs(120)),
        FakeSlack::default(),
    );
    let mut s = settings(5, 4);
    s.user_timeout = Duration::from_secs(1);
    let orch = h.orchestrator(s);

    let summary = orch.run_once().await.unwrap();

    assert_eq!(summary.retryable_failures, 1);
    match &summary.results[0].outcome {
        SyncOutcome::Failed(f) => assert_eq!(f.kind, FailureKind::Timeout),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.slack.calls(), 0);
}

#[tokio::test]
async fn test_observer_sees_every_user_result() {
    let h = Harness::new(
        vec![user("a"), user("b")],
        FakeMusic::new(Ok(playing("Song A", "X"))),
        FakeSlack::default(),
    );
    let observer = Arc::new(RecordingObserver::default());
    let orch = h.orchestrator(settings(5, 4)).with_observer(observer.clone());

    orch.run_once().await.unwrap();

    assert_eq!(observer.user_results.lock().unwrap().len(), 2);
    assert_eq!(observer.ticks.lock().unwrap().len(), 1);
}
