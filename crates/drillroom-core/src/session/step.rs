use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a step, stable within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StepId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One timed unit of work (a drill).
///
/// `payload` carries whatever the host wants to show for the step (name,
/// instructions, video link). The engine never looks inside it; only `id`
/// and `duration_secs` drive behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    /// Planned duration in seconds. Must be positive.
    pub duration_secs: u64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Step {
    pub fn new(id: impl Into<StepId>, duration_secs: u64) -> Self {
        Self {
            id: id.into(),
            duration_secs,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Total planned seconds across `steps`.
///
/// Saturates instead of overflowing on absurd inputs.
pub fn total_duration_secs(steps: &[Step]) -> u64 {
    steps
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.duration_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_defaults_to_null_when_missing() {
        let step: Step = serde_json::from_str(r#"{"id":"dribble","duration_secs":60}"#).unwrap();
        assert_eq!(step.id, StepId::from("dribble"));
        assert!(step.payload.is_null());
    }

    #[test]
    fn step_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&StepId::new("cones")).unwrap();
        assert_eq!(json, "\"cones\"");
    }

    #[test]
    fn total_duration_saturates() {
        let steps = vec![Step::new("a", u64::MAX), Step::new("b", 10)];
        assert_eq!(total_duration_secs(&steps), u64::MAX);
        assert_eq!(total_duration_secs(&[Step::new("a", 3), Step::new("b", 2)]), 5);
    }
}
