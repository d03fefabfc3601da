//! In-memory completion store, used for dry runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Ack, CompletionStore};
use crate::error::PersistenceError;
use crate::record::{CompletionRecord, SessionSummary};

#[derive(Default)]
struct Stored {
    steps: Vec<CompletionRecord>,
    sessions: Vec<SessionSummary>,
}

/// Keeps every write in memory. Can be told to fail for testing the
/// failure path.
#[derive(Default)]
pub struct MemoryStore {
    stored: Mutex<Stored>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with a storage error.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn steps(&self) -> Vec<CompletionRecord> {
        self.stored().steps.clone()
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.stored().sessions.clone()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Storage("memory store set to fail".into()));
        }
        Ok(())
    }

    fn stored(&self) -> MutexGuard<'_, Stored> {
        self.stored.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CompletionStore for MemoryStore {
    async fn record_step_completion(
        &self,
        record: &CompletionRecord,
    ) -> Result<Ack, PersistenceError> {
        self.check()?;
        let mut stored = self.stored();
        stored.steps.push(record.clone());
        Ok(Ack {
            reference: Some(format!("step-{}", stored.steps.len())),
        })
    }

    async fn record_session_completion(
        &self,
        summary: &SessionSummary,
    ) -> Result<Ack, PersistenceError> {
        self.check()?;
        let mut stored = self.stored();
        stored.sessions.push(summary.clone());
        Ok(Ack {
            reference: Some(format!("session-{}", stored.sessions.len())),
        })
    }
}
