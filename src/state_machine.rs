//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `(session snapshot, event) -> (next snapshot or deletion, effects)`.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Notice};
pub use event::Event;
pub use state::{Keywords, Mode, Session, Step, TurnContext};
pub use transition::{transition, TransitionError};
