//! Authentication types for the domain layer.
//!
//! These types represent the identity a connection presents at handshake
//! time. They have **no external dependencies**: any token issuer can
//! populate them through the `SessionValidator` port.
//!
//! # Example
//!
//! ```ignore
//! let user = AuthenticatedUser::new(UserId::new("driver-7")?, Role::Driver);
//! let connection = hub.connect(&mut session, user)?;
//! ```

use super::{Role, SystemGroup, UserId};
use thiserror::Error;

/// Identity extracted from a validated credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the token subject.
    pub id: UserId,

    /// Whether this user connects as a passenger or a driver.
    pub role: Role,

    /// System groups granted by the issuer, e.g. `emergency_responders` for
    /// operator consoles.
    pub system_groups: Vec<SystemGroup>,
}

impl AuthenticatedUser {
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            system_groups: Vec::new(),
        }
    }

    /// Grants system-group membership. Duplicates are dropped.
    pub fn with_system_groups(mut self, groups: impl IntoIterator<Item = SystemGroup>) -> Self {
        self.system_groups.extend(groups);
        self.system_groups.sort();
        self.system_groups.dedup();
        self
    }

    pub fn in_system_group(&self, group: SystemGroup) -> bool {
        self.system_groups.contains(&group)
    }

    pub fn is_driver(&self) -> bool {
        self.role.is_driver()
    }
}

/// Errors raised while validating a connection credential.
///
/// Every variant is fatal for the connection attempt; the hub never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential was supplied with the handshake.
    #[error("Authentication token required")]
    MissingCredential,

    /// The credential is malformed, has a bad signature, or could not be
    /// verified within the handshake timeout.
    #[error("Invalid authentication token")]
    InvalidCredential,

    /// The credential was well-formed but has expired.
    #[error("Authentication token expired")]
    ExpiredCredential,
}

impl AuthError {
    /// Stable machine-readable code returned to the client.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MISSING_CREDENTIAL",
            AuthError::InvalidCredential => "INVALID_CREDENTIAL",
            AuthError::ExpiredCredential => "EXPIRED_CREDENTIAL",
        }
    }
}
