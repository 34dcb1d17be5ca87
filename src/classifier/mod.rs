//! Tag classification: job groups, day context, transition table and the
//! per-event state machine.

pub mod day_context;
pub mod job_group;
pub mod state_machine;
pub mod transitions;

pub use day_context::{DayContext, EventFlags};
pub use job_group::JobGroupClassifier;
pub use state_machine::{minutes_between, ActivityStateMachine};
pub use transitions::{Transition, TransitionTable, DEFAULT_TRANSITION};
