//! Drill and workout catalog.
//!
//! Supplies the ordered step list handed to `Sequencer::start`. The
//! sequencer never goes back to the catalog once a session is running.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::session::{Step, StepId};

/// A single drill as configured by a coach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drill {
    pub id: String,
    pub name: String,
    pub duration_secs: u64,
    #[serde(default)]
    pub instructions: String,
}

impl Drill {
    fn to_step(&self, id: StepId) -> Step {
        Step::new(id, self.duration_secs).with_payload(serde_json::json!({
            "drill": self.id,
            "name": self.name,
            "instructions": self.instructions,
        }))
    }
}

/// A named, ordered list of drill ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub name: String,
    pub drills: Vec<String>,
}

/// Source of steps for a session.
pub trait StepCatalog {
    /// A single-drill session.
    fn drill(&self, id: &str) -> Result<Step, CoreError>;

    /// A multi-drill session, in workout order.
    fn workout(&self, id: &str) -> Result<Vec<Step>, CoreError>;
}

/// Catalog backed by the `drills` and `workouts` tables of the config.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    drills: IndexMap<String, Drill>,
    workouts: IndexMap<String, Workout>,
}

impl Catalog {
    pub fn new(drills: Vec<Drill>, workouts: Vec<Workout>) -> Self {
        Self {
            drills: drills.into_iter().map(|d| (d.id.clone(), d)).collect(),
            workouts: workouts.into_iter().map(|w| (w.id.clone(), w)).collect(),
        }
    }

    pub fn drills(&self) -> impl Iterator<Item = &Drill> {
        self.drills.values()
    }

    pub fn workouts(&self) -> impl Iterator<Item = &Workout> {
        self.workouts.values()
    }

    /// Planned length of a workout, counting only drills that exist.
    pub fn workout_duration_secs(&self, workout: &Workout) -> u64 {
        workout
            .drills
            .iter()
            .filter_map(|id| self.drills.get(id))
            .map(|d| d.duration_secs)
            .sum()
    }
}

impl StepCatalog for Catalog {
    fn drill(&self, id: &str) -> Result<Step, CoreError> {
        let drill = self.drills.get(id).ok_or_else(|| CoreError::NotFound {
            kind: "drill",
            id: id.to_string(),
        })?;
        Ok(drill.to_step(StepId::new(&drill.id)))
    }

    fn workout(&self, id: &str) -> Result<Vec<Step>, CoreError> {
        let workout = self.workouts.get(id).ok_or_else(|| CoreError::NotFound {
            kind: "workout",
            id: id.to_string(),
        })?;

        // A drill repeated within a workout gets `#2`, `#3`... so every
        // step id stays unique within the session.
        let mut seen: IndexMap<&str, usize> = IndexMap::new();
        workout
            .drills
            .iter()
            .map(|drill_id| -> Result<Step, CoreError> {
                let drill = self.drills.get(drill_id).ok_or_else(|| CoreError::NotFound {
                    kind: "drill",
                    id: drill_id.clone(),
                })?;
                let count = seen.entry(drill_id.as_str()).or_insert(0);
                *count += 1;
                let step_id = if *count == 1 {
                    StepId::new(drill_id.as_str())
                } else {
                    StepId::new(format!("{drill_id}#{count}"))
                };
                Ok(drill.to_step(step_id))
            })
            .collect()
    }
}
