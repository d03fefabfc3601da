mod model;
mod sequencer;
mod step;

pub use model::{format_clock, Session, SessionSnapshot, SessionStatus};
pub use sequencer::{Sequencer, SessionObserver, StartPolicy};
pub use step::{total_duration_secs, Step, StepId};
