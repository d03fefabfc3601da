use serde::{Deserialize, Serialize};

use crate::record::CompletionRecord;
use crate::session::StepId;

/// Every state change of the sequencer produces an Event.
///
/// Commands return the events they caused, in emission order. Completion
/// events are additionally pushed to subscribed observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    SessionStarted {
        step_count: usize,
        total_duration_secs: u64,
        tick_granularity_secs: u64,
    },
    SessionPaused {
        remaining_secs: u64,
        elapsed_secs: u64,
    },
    SessionResumed {
        remaining_secs: u64,
    },
    StepCompleted {
        record: CompletionRecord,
        skipped: bool,
    },
    StepAdvanced {
        step_index: usize,
        step_id: StepId,
        duration_secs: u64,
    },
    SessionCompleted {
        records: Vec<CompletionRecord>,
        total_elapsed_secs: u64,
    },
    /// User-initiated exit. The step in progress is not recorded.
    SessionStopped {
        step_index: usize,
        elapsed_secs: u64,
    },
}
