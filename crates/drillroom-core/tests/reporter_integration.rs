//! Integration tests for completion reporting into the SQLite store.

use std::sync::Arc;

use async_trait::async_trait;
use drillroom_core::{
    Ack, CompletionRecord, CompletionReporter, CompletionStore, Config, Database, Feedback,
    PendingWrite, PersistenceError, Sequencer, SessionStatus, SessionSummary, StepCatalog,
};

/// Store that rejects step writes but accepts session writes.
struct FlakyStore {
    inner: Database,
}

#[async_trait]
impl CompletionStore for FlakyStore {
    async fn record_step_completion(
        &self,
        _record: &CompletionRecord,
    ) -> Result<Ack, PersistenceError> {
        Err(PersistenceError::Unavailable("network down".into()))
    }

    async fn record_session_completion(
        &self,
        summary: &SessionSummary,
    ) -> Result<Ack, PersistenceError> {
        self.inner.record_session_completion(summary).await
    }
}

#[tokio::test]
async fn test_workout_is_persisted_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_at(&dir.path().join("drillroom.db")).unwrap());
    let (reporter, mut failures) = CompletionReporter::spawn(db.clone());

    let config = Config::default();
    let steps = config.catalog().workout("starter").unwrap();
    let total: u64 = steps.iter().map(|s| s.duration_secs).sum();

    let mut seq = Sequencer::new();
    seq.subscribe(reporter.clone());
    seq.start(steps, 10).unwrap();
    reporter.queue_feedback("wall-passes", Feedback::new(Some(4), Some("left foot".into())));

    while seq.status() == SessionStatus::Running {
        seq.tick().unwrap();
    }
    reporter.flush().await;

    assert!(failures.try_recv().is_err());
    let history = db.history(5).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].total_elapsed_secs, total);
    assert_eq!(history[0].step_count, 4);
    assert_eq!(history[0].average_rating, Some(4.0));

    let stats = db.stats_today().unwrap();
    assert_eq!(stats.total_steps, 4);
    assert_eq!(stats.total_practice_secs, total);
}

#[tokio::test]
async fn test_failed_step_writes_reach_side_channel() {
    let store = Arc::new(FlakyStore {
        inner: Database::open_memory().unwrap(),
    });
    let (reporter, mut failures) = CompletionReporter::spawn(store.clone());

    let mut seq = Sequencer::new();
    seq.subscribe(reporter.clone());
    let catalog = Config::default().catalog();
    seq.start(vec![catalog.drill("shuttle-sprints").unwrap()], 60)
        .unwrap();
    seq.tick().unwrap();
    reporter.flush().await;

    // Time stays spent even though the step write failed.
    assert_eq!(seq.status(), SessionStatus::Complete);
    assert_eq!(seq.snapshot().elapsed_secs, 60);

    let failure = failures.recv().await.unwrap();
    assert_eq!(
        failure.error,
        PersistenceError::Unavailable("network down".into())
    );
    match failure.write {
        PendingWrite::Step { record } => assert_eq!(record.step_id.as_str(), "shuttle-sprints"),
        other => panic!("Expected step write, got {other:?}"),
    }
    assert!(failures.try_recv().is_err());
    assert_eq!(store.inner.history(1).unwrap().len(), 1);
}
