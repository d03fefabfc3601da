//! Session model and derived progress views.
//!
//! A [`Session`] is plain data: the steps being run, where the run stands,
//! and how much time has been spent. It is mutated only by the
//! [`Sequencer`](super::Sequencer); everyone else sees a [`SessionSnapshot`].

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::step::{Step, StepId};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Complete,
    Stopped,
}

impl SessionStatus {
    /// Complete and Stopped accept nothing but a fresh `start()`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Stopped)
    }

    /// Running or Paused.
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Complete => "complete",
            SessionStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// One run through an ordered list of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    steps: Vec<Step>,
    tick_granularity_secs: u64,
    pub(crate) step_index: usize,
    pub(crate) remaining_secs: u64,
    pub(crate) elapsed_secs: u64,
    pub(crate) completed: IndexSet<StepId>,
    pub(crate) status: SessionStatus,
}

impl Session {
    /// Validate the inputs and build a running session positioned on the
    /// first step.
    pub fn new(steps: Vec<Step>, tick_granularity_secs: u64) -> Result<Self, EngineError> {
        validate(&steps, tick_granularity_secs)?;
        let remaining_secs = steps[0].duration_secs;
        Ok(Self {
            steps,
            tick_granularity_secs,
            step_index: 0,
            remaining_secs,
            elapsed_secs: 0,
            completed: IndexSet::new(),
            status: SessionStatus::Running,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn tick_granularity_secs(&self) -> u64 {
        self.tick_granularity_secs
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn current_step(&self) -> &Step {
        // `step_index` never leaves 0..len, see `Sequencer::finish_step`.
        &self.steps[self.step_index]
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// Seconds spent so far across every step of this run.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Seconds spent so far in the current step.
    pub fn step_elapsed_secs(&self) -> u64 {
        self.current_step()
            .duration_secs
            .saturating_sub(self.remaining_secs)
    }

    pub fn is_completed(&self, id: &StepId) -> bool {
        self.completed.contains(id)
    }

    /// Completed step ids, in sequence order.
    pub fn completed_ids(&self) -> Vec<StepId> {
        self.steps
            .iter()
            .filter(|s| self.completed.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn is_last_step(&self) -> bool {
        self.step_index + 1 == self.steps.len()
    }

    /// 0.0 ..= 1.0 progress across the whole run.
    ///
    /// Each step counts for an equal share; the current step contributes
    /// the fraction of its own duration already spent.
    pub fn progress_fraction(&self) -> f64 {
        if self.status == SessionStatus::Complete {
            return 1.0;
        }
        let step = self.current_step();
        let partial = self.step_elapsed_secs() as f64 / step.duration_secs as f64;
        let done = self.step_index as f64 + partial;
        (done / self.steps.len() as f64).clamp(0.0, 1.0)
    }

    /// Remaining time of the current step as `MM:SS` (or `H:MM:SS`).
    pub fn remaining_formatted(&self) -> String {
        format_clock(self.remaining_secs)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            step_index: Some(self.step_index),
            step_count: self.steps.len(),
            current_step: Some(self.current_step().id.clone()),
            remaining_secs: self.remaining_secs,
            step_elapsed_secs: self.step_elapsed_secs(),
            elapsed_secs: self.elapsed_secs,
            completed: self.completed_ids(),
            progress_fraction: self.progress_fraction(),
            is_last_step: self.is_last_step(),
        }
    }
}

fn validate(steps: &[Step], tick_granularity_secs: u64) -> Result<(), EngineError> {
    if steps.is_empty() {
        return Err(EngineError::InvalidConfiguration(
            "step list is empty".into(),
        ));
    }
    if tick_granularity_secs == 0 {
        return Err(EngineError::InvalidConfiguration(
            "tick granularity must be at least one second".into(),
        ));
    }
    let mut seen = HashSet::with_capacity(steps.len());
    for step in steps {
        if step.duration_secs == 0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "step '{}' has a zero duration",
                step.id
            )));
        }
        if !seen.insert(&step.id) {
            return Err(EngineError::InvalidConfiguration(format!(
                "step id '{}' appears more than once",
                step.id
            )));
        }
    }
    Ok(())
}

/// Immutable copy of the sequencer's state, for rendering and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// `None` until the first `start()`.
    pub step_index: Option<usize>,
    pub step_count: usize,
    pub current_step: Option<StepId>,
    pub remaining_secs: u64,
    pub step_elapsed_secs: u64,
    pub elapsed_secs: u64,
    pub completed: Vec<StepId>,
    pub progress_fraction: f64,
    pub is_last_step: bool,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            step_index: None,
            step_count: 0,
            current_step: None,
            remaining_secs: 0,
            step_elapsed_secs: 0,
            elapsed_secs: 0,
            completed: Vec::new(),
            progress_fraction: 0.0,
            is_last_step: false,
        }
    }

    pub fn remaining_formatted(&self) -> String {
        format_clock(self.remaining_secs)
    }
}

/// `MM:SS` below an hour, `H:MM:SS` from there on.
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<Step> {
        vec![Step::new("A", 3), Step::new("B", 2)]
    }

    #[test]
    fn new_session_starts_on_first_step() {
        let session = Session::new(steps(), 1).unwrap();
        assert_eq!(session.status(), SessionStatus::Running);
        assert_eq!(session.step_index(), 0);
        assert_eq!(session.remaining_secs(), 3);
        assert_eq!(session.elapsed_secs(), 0);
        assert_eq!(session.progress_fraction(), 0.0);
        assert!(!session.is_last_step());
    }

    #[test]
    fn rejects_empty_zero_and_duplicate_inputs() {
        assert!(matches!(
            Session::new(vec![], 1),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Session::new(vec![Step::new("A", 0)], 1),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Session::new(steps(), 0),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Session::new(vec![Step::new("A", 1), Step::new("A", 2)], 1),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn progress_counts_partial_current_step() {
        let mut session = Session::new(steps(), 1).unwrap();
        session.remaining_secs = 0;
        // A fully spent but not yet advanced: half of two steps.
        assert_eq!(session.progress_fraction(), 0.5);

        session.step_index = 1;
        session.remaining_secs = 1;
        session.completed.insert(StepId::from("A"));
        assert_eq!(session.progress_fraction(), 0.75);
        assert!(session.is_last_step());
    }

    #[test]
    fn progress_is_one_when_complete() {
        let mut session = Session::new(steps(), 1).unwrap();
        session.step_index = 1;
        session.remaining_secs = 0;
        session.status = SessionStatus::Complete;
        assert_eq!(session.progress_fraction(), 1.0);
    }

    #[test]
    fn completed_ids_follow_sequence_order() {
        let mut session = Session::new(
            vec![Step::new("A", 1), Step::new("B", 1), Step::new("C", 1)],
            1,
        )
        .unwrap();
        session.completed.insert(StepId::from("B"));
        session.completed.insert(StepId::from("A"));
        assert_eq!(
            session.completed_ids(),
            vec![StepId::from("A"), StepId::from("B")]
        );
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(75), "01:15");
        assert_eq!(format_clock(3600 + 5), "1:00:05");
    }

    #[test]
    fn idle_snapshot_is_empty() {
        let snap = SessionSnapshot::idle();
        assert_eq!(snap.status, SessionStatus::Idle);
        assert_eq!(snap.step_index, None);
        assert_eq!(snap.progress_fraction, 0.0);
        assert_eq!(snap.remaining_formatted(), "00:00");
    }
}
