//! Per-connection session state owned by the connection's task.

use crate::domain::foundation::{
    AuthenticatedUser, ConnectionId, ConnectionState, StateMachine, ValidationError,
};

/// One connection attempt, from handshake to close.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    id: ConnectionId,
    state: ConnectionState,
    user: Option<AuthenticatedUser>,
}

impl ConnectionSession {
    pub(crate) fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            state: ConnectionState::Connecting,
            user: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The authenticated identity, present once admitted.
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    pub(crate) fn mark_authenticated(
        &mut self,
        user: AuthenticatedUser,
    ) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(ConnectionState::Authenticated)?;
        self.user = Some(user);
        Ok(())
    }

    /// Moves to `Disconnected`. Returns false if already there.
    pub(crate) fn mark_disconnected(&mut self) -> bool {
        match self.state.transition_to(ConnectionState::Disconnected) {
            Ok(next) => {
                self.state = next;
                true
            }
            Err(_) => false,
        }
    }
}
