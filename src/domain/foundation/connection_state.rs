//! Connection lifecycle state machine.
//!
//! ```text
//! Connecting ──auth ok──▶ Authenticated ──close/error──▶ Disconnected
//!      │                                                     ▲
//!      └──────────────────auth failed────────────────────────┘
//! ```
//!
//! Inbound events are only accepted while `Authenticated`.

use serde::Serialize;

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid transitions and get a validated
/// `transition_to` for free.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "connection_state",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

/// Where a single connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport open, credential not yet verified.
    #[default]
    Connecting,
    /// Credential verified and connection admitted.
    Authenticated,
    /// Closed, rejected, or evicted. Terminal.
    Disconnected,
}

impl ConnectionState {
    pub fn accepts_events(&self) -> bool {
        matches!(self, ConnectionState::Authenticated)
    }
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Connecting, Authenticated) | (Connecting, Disconnected) | (Authenticated, Disconnected)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Connecting => vec![Authenticated, Disconnected],
            Authenticated => vec![Disconnected],
            Disconnected => vec![],
        }
    }
}
