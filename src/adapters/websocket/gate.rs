//! Authentication gate run once per connection attempt.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::SessionValidator;

/// Wraps the session validator with the handshake rules: a credential must
/// be present, and verification must finish within `timeout`.
#[derive(Clone)]
pub struct AuthenticationGate {
    validator: Arc<dyn SessionValidator>,
    timeout: Duration,
}

impl AuthenticationGate {
    pub fn new(validator: Arc<dyn SessionValidator>, timeout: Duration) -> Self {
        Self { validator, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verifies the handshake credential.
    ///
    /// A missing or blank credential never reaches the validator. A
    /// validator that does not answer in time counts as an invalid
    /// credential.
    pub async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        match tokio::time::timeout(self.timeout, self.validator.validate(token)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Credential check timed out");
                Err(AuthError::InvalidCredential)
            }
        }
    }
}
