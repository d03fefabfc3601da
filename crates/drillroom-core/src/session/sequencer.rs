//! Practice session sequencer.
//!
//! The sequencer is a tick-driven state machine. It owns no timer and does
//! no I/O: the host calls `tick()` on whatever cadence it likes and the
//! sequencer decrements by the tick granularity given to `start()`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running -> (next step | Complete)
//! Running | Paused -> Stopped
//! Complete | Stopped -> Running   (via start)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut seq = Sequencer::new();
//! seq.subscribe(reporter.clone());
//! seq.start(steps, 1)?;
//! // Once per second:
//! seq.tick()?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::model::{Session, SessionSnapshot, SessionStatus};
use super::step::{total_duration_secs, Step};
use crate::error::EngineError;
use crate::events::SessionEvent;
use crate::record::CompletionRecord;

/// Receives completion events as they happen.
///
/// Called synchronously from inside sequencer commands, so implementations
/// must return quickly and hand any slow work elsewhere.
pub trait SessionObserver: Send + Sync {
    /// A new run began over `steps`.
    fn on_session_start(&self, _steps: &[Step]) {}

    /// A step finished, naturally or by skip.
    fn on_step_complete(&self, _record: &CompletionRecord) {}

    /// The last step finished. Never called on `stop()`.
    fn on_session_complete(&self, _records: &[CompletionRecord], _total_elapsed_secs: u64) {}
}

/// What `start()` does when a session is still running or paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Fail with [`EngineError::SessionActive`].
    #[default]
    Reject,
    /// Stop the old session (no completion events) and start the new one.
    StopPrevious,
}

/// Owns the single live [`Session`] and applies commands to it.
pub struct Sequencer {
    session: Option<Session>,
    records: Vec<CompletionRecord>,
    policy: StartPolicy,
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::with_policy(StartPolicy::default())
    }

    pub fn with_policy(policy: StartPolicy) -> Self {
        Self {
            session: None,
            records: Vec::new(),
            policy,
            observers: Vec::new(),
        }
    }

    /// Register an observer for step and session completion.
    pub fn subscribe(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map(|s| s.status())
            .unwrap_or(SessionStatus::Idle)
    }

    pub fn policy(&self) -> StartPolicy {
        self.policy
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Records emitted so far in the current run.
    pub fn records(&self) -> &[CompletionRecord] {
        &self.records
    }

    pub fn progress_fraction(&self) -> f64 {
        self.session
            .as_ref()
            .map(|s| s.progress_fraction())
            .unwrap_or(0.0)
    }

    pub fn is_last_step(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_last_step())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session
            .as_ref()
            .map(|s| s.snapshot())
            .unwrap_or_else(SessionSnapshot::idle)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new run over `steps`.
    ///
    /// Invalid input leaves the sequencer exactly as it was.
    pub fn start(
        &mut self,
        steps: Vec<Step>,
        tick_granularity_secs: u64,
    ) -> Result<Vec<SessionEvent>, EngineError> {
        let session = Session::new(steps, tick_granularity_secs)?;
        let mut events = Vec::new();

        let current = self.status();
        if current.is_active() {
            match self.policy {
                StartPolicy::Reject => {
                    return Err(EngineError::SessionActive { status: current });
                }
                StartPolicy::StopPrevious => {
                    debug!(status = %current, "stopping active session before restart");
                    events.extend(self.stop()?);
                }
            }
        }

        let started = SessionEvent::SessionStarted {
            step_count: session.steps().len(),
            total_duration_secs: total_duration_secs(session.steps()),
            tick_granularity_secs,
        };
        debug!(
            steps = session.steps().len(),
            granularity = tick_granularity_secs,
            "session started"
        );
        for observer in &self.observers {
            observer.on_session_start(session.steps());
        }
        self.session = Some(session);
        self.records.clear();
        events.push(started);
        Ok(events)
    }

    /// Advance the clock by one tick of the configured granularity.
    ///
    /// Ticks while paused (or before any start) are ignored so hosts can
    /// keep driving a clock without checking state.
    pub fn tick(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(Vec::new());
        };
        match session.status {
            SessionStatus::Running => {}
            SessionStatus::Paused | SessionStatus::Idle => return Ok(Vec::new()),
            status @ (SessionStatus::Complete | SessionStatus::Stopped) => {
                return Err(EngineError::SessionTerminated { status });
            }
        }

        // Overshoot past zero is discarded, not carried into the next step.
        let consumed = session.tick_granularity_secs().min(session.remaining_secs);
        session.remaining_secs -= consumed;
        session.elapsed_secs = session.elapsed_secs.saturating_add(consumed);

        if session.remaining_secs == 0 {
            Ok(self.finish_step(false))
        } else {
            Ok(Vec::new())
        }
    }

    pub fn pause(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let session = self.live_session()?;
        match session.status {
            SessionStatus::Running => {
                session.status = SessionStatus::Paused;
                debug!(remaining = session.remaining_secs, "session paused");
                Ok(vec![SessionEvent::SessionPaused {
                    remaining_secs: session.remaining_secs,
                    elapsed_secs: session.elapsed_secs,
                }])
            }
            _ => Ok(Vec::new()),
        }
    }

    pub fn resume(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let session = self.live_session()?;
        match session.status {
            SessionStatus::Paused => {
                session.status = SessionStatus::Running;
                debug!(remaining = session.remaining_secs, "session resumed");
                Ok(vec![SessionEvent::SessionResumed {
                    remaining_secs: session.remaining_secs,
                }])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Finish the current step now, recording only the time spent in it.
    pub fn skip(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let session = self.live_session()?;
        if session.status == SessionStatus::Paused {
            return Err(EngineError::InvalidTransition {
                command: "skip",
                status: SessionStatus::Paused,
            });
        }
        Ok(self.finish_step(true))
    }

    /// Abandon the run. Idempotent, and a no-op outside Running/Paused.
    pub fn stop(&mut self) -> Result<Vec<SessionEvent>, EngineError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(Vec::new());
        };
        if !session.status.is_active() {
            return Ok(Vec::new());
        }
        session.status = SessionStatus::Stopped;
        debug!(
            step_index = session.step_index,
            elapsed = session.elapsed_secs,
            "session stopped"
        );
        Ok(vec![SessionEvent::SessionStopped {
            step_index: session.step_index,
            elapsed_secs: session.elapsed_secs,
        }])
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// The session, if it can still take commands.
    fn live_session(&mut self) -> Result<&mut Session, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NotStarted)?;
        if session.status.is_terminal() {
            return Err(EngineError::SessionTerminated {
                status: session.status,
            });
        }
        Ok(session)
    }

    /// Record the current step and move on, or complete the session.
    fn finish_step(&mut self, skipped: bool) -> Vec<SessionEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let mut events = Vec::new();

        let step_id = session.current_step().id.clone();
        let record = CompletionRecord::new(
            step_id.clone(),
            session.step_elapsed_secs(),
            session.step_index + 1,
        );
        session.completed.insert(step_id.clone());
        info!(
            step = %step_id,
            spent = record.seconds_spent,
            position = record.position,
            skipped,
            "step complete"
        );
        for observer in &self.observers {
            observer.on_step_complete(&record);
        }
        self.records.push(record.clone());
        events.push(SessionEvent::StepCompleted { record, skipped });

        if session.is_last_step() {
            session.status = SessionStatus::Complete;
            let total_elapsed_secs = session.elapsed_secs;
            info!(
                steps = self.records.len(),
                elapsed = total_elapsed_secs,
                "session complete"
            );
            for observer in &self.observers {
                observer.on_session_complete(&self.records, total_elapsed_secs);
            }
            events.push(SessionEvent::SessionCompleted {
                records: self.records.clone(),
                total_elapsed_secs,
            });
        } else {
            session.step_index += 1;
            let next = session.current_step();
            let (next_id, next_duration) = (next.id.clone(), next.duration_secs);
            session.remaining_secs = next_duration;
            debug!(step = %next_id, duration = next_duration, "advanced to next step");
            events.push(SessionEvent::StepAdvanced {
                step_index: session.step_index,
                step_id: next_id,
                duration_secs: next_duration,
            });
        }
        events
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("session", &self.session)
            .field("records", &self.records)
            .field("policy", &self.policy)
            .field("observers", &self.observers.len())
            .finish()
    }
}
