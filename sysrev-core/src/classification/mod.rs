//! Explicit state machine for a study review's classification.
//!
//! A study review carries two correlated statuses: the outcome of
//! title/abstract screening (selection) and the outcome of full-text data
//! extraction. The design separates:
//! - **State**: What the record currently says (`StudyClassification`)
//! - **Events**: What a researcher asked for (`ClassificationEvent`)
//! - **Transition**: Pure function `(State, Event) -> Result<State, TransitionError>`
//!
//! Persistence is the caller's job: load the record, run the transition,
//! save the result.

pub mod event;
pub mod state;
pub mod transition;

pub use event::*;
pub use state::*;
pub use transition::*;
