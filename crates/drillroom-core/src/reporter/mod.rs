//! Completion reporting.
//!
//! The [`CompletionReporter`] subscribes to a [`Sequencer`](crate::Sequencer)
//! and forwards finished steps and sessions to a [`CompletionStore`]. Writes
//! run on a background task so a slow or failing store never holds up a
//! tick. Failures come back on a side channel and are logged; they never
//! undo a transition the sequencer already made.

mod memory;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::record::{CompletionRecord, Feedback, SessionSummary};
use crate::session::{SessionObserver, Step, StepId};

pub use memory::MemoryStore;

/// Acknowledgement from a store. `reference` is whatever key the store
/// assigned (row id, run id), if any.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {
    pub reference: Option<String>,
}

/// Where completion records end up.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn record_step_completion(
        &self,
        record: &CompletionRecord,
    ) -> Result<Ack, PersistenceError>;

    async fn record_session_completion(
        &self,
        summary: &SessionSummary,
    ) -> Result<Ack, PersistenceError>;
}

/// A write the reporter handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingWrite {
    Step { record: CompletionRecord },
    Session { summary: SessionSummary },
}

/// A write that did not make it, delivered on the reporter's side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
    pub write: PendingWrite,
    pub error: PersistenceError,
}

enum Job {
    Write(PendingWrite),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Ledger {
    queued: HashMap<StepId, Feedback>,
    records: Vec<CompletionRecord>,
}

/// Bridges sequencer completion events to a [`CompletionStore`].
pub struct CompletionReporter {
    jobs: mpsc::UnboundedSender<Job>,
    failures: mpsc::UnboundedSender<PersistenceFailure>,
    ledger: Mutex<Ledger>,
}

impl CompletionReporter {
    /// Start the background writer and return the reporter together with
    /// the receiving end of its failure channel.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        store: Arc<dyn CompletionStore>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PersistenceFailure>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_writer(store, jobs_rx, failures_tx.clone()));

        let reporter = Arc::new(Self {
            jobs: jobs_tx,
            failures: failures_tx,
            ledger: Mutex::new(Ledger::default()),
        });
        (reporter, failures_rx)
    }

    /// Attach feedback to a step of the current run before it finishes.
    pub fn queue_feedback(&self, step_id: impl Into<StepId>, feedback: Feedback) {
        self.ledger().queued.insert(step_id.into(), feedback);
    }

    /// Attach feedback to a step that already finished in the current run.
    ///
    /// The updated record reaches the store as part of the session summary,
    /// so this only has an effect on the store until the session completes.
    pub fn annotate(&self, step_id: &StepId, feedback: Feedback) -> Option<CompletionRecord> {
        let mut ledger = self.ledger();
        let record = ledger.records.iter_mut().find(|r| &r.step_id == step_id)?;
        *record = record.clone().with_feedback(feedback);
        Some(record.clone())
    }

    /// Records of the current run, with any feedback attached.
    pub fn records(&self) -> Vec<CompletionRecord> {
        self.ledger().records.clone()
    }

    /// Wait until every write dispatched so far has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.jobs.send(Job::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    fn dispatch(&self, write: PendingWrite) {
        if let Err(mpsc::error::SendError(Job::Write(write))) = self.jobs.send(Job::Write(write)) {
            warn!("completion writer is gone; dropping write");
            let _ = self.failures.send(PersistenceFailure {
                write,
                error: PersistenceError::ReporterClosed,
            });
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionObserver for CompletionReporter {
    fn on_session_start(&self, _steps: &[Step]) {
        let mut ledger = self.ledger();
        ledger.records.clear();
        ledger.queued.clear();
    }

    fn on_step_complete(&self, record: &CompletionRecord) {
        let record = {
            let mut ledger = self.ledger();
            let record = match ledger.queued.remove(&record.step_id) {
                Some(feedback) => record.clone().with_feedback(feedback),
                None => record.clone(),
            };
            ledger.records.push(record.clone());
            record
        };
        self.dispatch(PendingWrite::Step { record });
    }

    fn on_session_complete(&self, records: &[CompletionRecord], total_elapsed_secs: u64) {
        let summary = {
            let ledger = self.ledger();
            let records = records
                .iter()
                .map(|r| {
                    ledger
                        .records
                        .iter()
                        .find(|l| l.position == r.position && l.step_id == r.step_id)
                        .cloned()
                        .unwrap_or_else(|| r.clone())
                })
                .collect();
            SessionSummary {
                records,
                total_elapsed_secs,
            }
        };
        self.dispatch(PendingWrite::Session { summary });
    }
}

async fn run_writer(
    store: Arc<dyn CompletionStore>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    failures: mpsc::UnboundedSender<PersistenceFailure>,
) {
    while let Some(job) = jobs.recv().await {
        let write = match job {
            Job::Write(write) => write,
            Job::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let result = match &write {
            PendingWrite::Step { record } => store.record_step_completion(record).await,
            PendingWrite::Session { summary } => store.record_session_completion(summary).await,
        };
        match result {
            Ok(ack) => debug!(reference = ?ack.reference, "completion stored"),
            Err(error) => {
                warn!(%error, "failed to store completion");
                let _ = failures.send(PersistenceFailure { write, error });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Sequencer, SessionStatus};

    fn ab() -> Vec<Step> {
        vec![Step::new("A", 3), Step::new("B", 2)]
    }

    #[tokio::test]
    async fn writes_steps_then_session() {
        let store = Arc::new(MemoryStore::new());
        let (reporter, mut failures) = CompletionReporter::spawn(store.clone());
        let mut seq = Sequencer::new();
        seq.subscribe(reporter.clone());

        seq.start(ab(), 1).unwrap();
        for _ in 0..5 {
            seq.tick().unwrap();
        }
        reporter.flush().await;

        let steps: Vec<_> = store.steps().into_iter().map(|r| r.step_id).collect();
        assert_eq!(steps, vec![StepId::from("A"), StepId::from("B")]);
        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].total_elapsed_secs, 5);
        assert!(failures.try_recv().is_err());
    }

    #[tokio::test]
    async fn failures_surface_without_touching_state() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let (reporter, mut failures) = CompletionReporter::spawn(store.clone());
        let mut seq = Sequencer::new();
        seq.subscribe(reporter.clone());

        seq.start(vec![Step::new("A", 1)], 1).unwrap();
        seq.tick().unwrap();
        reporter.flush().await;

        assert_eq!(seq.status(), SessionStatus::Complete);
        let first = failures.recv().await.unwrap();
        assert!(matches!(first.write, PendingWrite::Step { .. }));
        let second = failures.recv().await.unwrap();
        assert!(matches!(second.write, PendingWrite::Session { .. }));
        assert!(store.steps().is_empty());
    }

    #[tokio::test]
    async fn feedback_flows_into_summary() {
        let store = Arc::new(MemoryStore::new());
        let (reporter, _failures) = CompletionReporter::spawn(store.clone());
        let mut seq = Sequencer::new();
        seq.subscribe(reporter.clone());

        seq.start(ab(), 1).unwrap();
        reporter.queue_feedback("B", Feedback::new(Some(5), None));
        for _ in 0..3 {
            seq.tick().unwrap();
        }
        let annotated = reporter
            .annotate(&StepId::from("A"), Feedback::new(Some(3), Some("tired".into())))
            .unwrap();
        assert_eq!(annotated.feedback.unwrap().rating, Some(3));
        seq.tick().unwrap();
        seq.tick().unwrap();
        reporter.flush().await;

        let summary = &store.sessions()[0];
        let ratings: Vec<_> = summary
            .records
            .iter()
            .map(|r| r.feedback.as_ref().and_then(|f| f.rating))
            .collect();
        assert_eq!(ratings, vec![Some(3), Some(5)]);
        // The step write for A went out before the annotation.
        assert!(store.steps()[0].feedback.is_none());
    }

    #[tokio::test]
    async fn stop_sends_no_session_write() {
        let store = Arc::new(MemoryStore::new());
        let (reporter, _failures) = CompletionReporter::spawn(store.clone());
        let mut seq = Sequencer::new();
        seq.subscribe(reporter.clone());

        seq.start(ab(), 1).unwrap();
        for _ in 0..4 {
            seq.tick().unwrap();
        }
        seq.stop().unwrap();
        reporter.flush().await;

        assert_eq!(store.steps().len(), 1);
        assert!(store.sessions().is_empty());

        seq.start(ab(), 1).unwrap();
        assert!(reporter.records().is_empty());
    }
}
