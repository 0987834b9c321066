//! Lifecycle transition errors
//!
//! Returned by domain state machines when an event does not apply to the
//! current state.

use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid transition: cannot apply {event} in state {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Terminal state: {0} is a terminal state and cannot transition")]
    TerminalState(String),
}

impl StateError {
    /// Whether the error came from a state that accepts no events at all
    pub fn is_terminal(&self) -> bool {
        matches!(self, StateError::TerminalState(_))
    }
}
