//! # Drillroom Core Library
//!
//! This library provides the practice session engine behind Drillroom, a
//! youth-sports practice tracker. It runs a single drill or a multi-drill
//! workout through time and reports what was completed. The CLI binary is
//! a thin host over the same library.
//!
//! ## Architecture
//!
//! - **Sequencer**: A tick-driven state machine that requires the caller
//!   to periodically invoke `tick()`; it owns no timer and does no I/O
//! - **Completion Reporter**: Forwards finished steps and sessions to a
//!   [`CompletionStore`] on a background task
//! - **Catalog**: Drills and workouts from the TOML configuration
//! - **Storage**: SQLite completion storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Sequencer`]: Core session state machine
//! - [`CompletionReporter`]: Sequencer observer that persists completions
//! - [`Database`]: Completion persistence and statistics
//! - [`Config`]: Application configuration management

pub mod catalog;
pub mod error;
pub mod events;
pub mod record;
pub mod reporter;
pub mod session;
pub mod storage;

pub use catalog::{Catalog, Drill, StepCatalog, Workout};
pub use error::{ConfigError, CoreError, DatabaseError, EngineError, PersistenceError};
pub use events::SessionEvent;
pub use record::{CompletionRecord, Feedback, SessionSummary};
pub use reporter::{
    Ack, CompletionReporter, CompletionStore, MemoryStore, PendingWrite, PersistenceFailure,
};
pub use session::{
    Sequencer, Session, SessionObserver, SessionSnapshot, SessionStatus, StartPolicy, Step,
    StepId,
};
pub use storage::{Config, Database, Stats};
