//! Completion records handed from the sequencer to observers and stores.

use serde::{Deserialize, Serialize};

use crate::session::StepId;

/// Qualitative feedback a player or coach attaches to a finished step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Feedback {
    /// 1 (rough) ..= 5 (great).
    pub rating: Option<u8>,
    pub note: Option<String>,
}

impl Feedback {
    /// Ratings outside 1..=5 are clamped into range.
    pub fn new(rating: Option<u8>, note: Option<String>) -> Self {
        Self {
            rating: rating.map(|r| r.clamp(1, 5)),
            note: note.filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.note.is_none()
    }
}

/// Snapshot produced when a step finishes, naturally or by skip.
///
/// Skipped steps produce the same shape; only `seconds_spent` tells them
/// apart from a full run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub step_id: StepId,
    pub seconds_spent: u64,
    /// 1-based position of the step in its session.
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl CompletionRecord {
    pub fn new(step_id: StepId, seconds_spent: u64, position: usize) -> Self {
        Self {
            step_id,
            seconds_spent,
            position,
            feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: Feedback) -> Self {
        self.feedback = (!feedback.is_empty()).then_some(feedback);
        self
    }
}

/// Everything a store needs to record a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub records: Vec<CompletionRecord>,
    pub total_elapsed_secs: u64,
}

impl SessionSummary {
    pub fn step_count(&self) -> usize {
        self.records.len()
    }

    pub fn average_rating(&self) -> Option<f64> {
        let ratings: Vec<u8> = self
            .records
            .iter()
            .filter_map(|r| r.feedback.as_ref().and_then(|f| f.rating))
            .collect();
        if ratings.is_empty() {
            return None;
        }
        Some(ratings.iter().map(|&r| r as f64).sum::<f64>() / ratings.len() as f64)
    }
}
