//! Mock session validator for testing.
//!
//! Implements the `SessionValidator` port without a token issuer so the hub
//! can be exercised end to end in unit and integration tests.
//!
//! # Example
//!
//! ```ignore
//! use ride_hub::adapters::auth::MockSessionValidator;
//! use ride_hub::domain::foundation::Role;
//!
//! let validator = MockSessionValidator::new()
//!     .with_test_user("driver-token", "d-1", Role::Driver);
//!
//! let user = validator.validate("driver-token").await?;
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, Role, UserId};
use crate::ports::SessionValidator;

/// Mock session validator for testing.
///
/// Stores a map of tokens to users. Tokens not in the map return
/// `InvalidCredential`.
#[derive(Debug, Default)]
pub struct MockSessionValidator {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
    /// Error returned for every validation while set.
    force_error: RwLock<Option<AuthError>>,
    /// Artificial latency, used to exercise the handshake timeout.
    delay: RwLock<Option<Duration>>,
}

impl MockSessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to a user.
    pub fn with_user(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.add_token(token, user);
        self
    }

    /// Adds a valid token for a user built from a raw id and role.
    ///
    /// # Panics
    ///
    /// Panics if `user_id` is blank. Test-only convenience.
    pub fn with_test_user(
        self,
        token: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
    ) -> Self {
        let user = AuthenticatedUser::new(
            UserId::new(user_id).unwrap_or_else(|e| panic!("invalid test user id: {e}")),
            role,
        );
        self.with_user(token, user)
    }

    /// Forces all validations to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self.force_error.write().unwrap_or_else(PoisonError::into_inner) = Some(error);
        self
    }

    /// Makes every validation sleep before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    /// Clears the forced error and returns to normal operation.
    pub fn clear_error(&self) {
        *self.force_error.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Registers a new valid token at runtime.
    pub fn add_token(&self, token: impl Into<String>, user: AuthenticatedUser) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), user);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    pub fn token_count(&self) -> usize {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl SessionValidator for MockSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let delay = *self.delay.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self
            .force_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> AuthenticatedUser {
        AuthenticatedUser::new(UserId::new("driver-1").unwrap(), Role::Driver)
    }

    #[tokio::test]
    async fn returns_user_for_registered_token() {
        let validator = MockSessionValidator::new().with_user("valid-token", driver());

        let user = validator.validate("valid-token").await.unwrap();

        assert_eq!(user.id.as_str(), "driver-1");
        assert_eq!(user.role, Role::Driver);
    }

    #[tokio::test]
    async fn returns_invalid_credential_for_unknown_token() {
        let validator = MockSessionValidator::new();

        let result = validator.validate("unknown-token").await;

        assert_eq!(result, Err(AuthError::InvalidCredential));
    }

    #[tokio::test]
    async fn with_test_user_builds_user_with_role() {
        let validator =
            MockSessionValidator::new().with_test_user("p-token", "passenger-9", Role::Passenger);

        let user = validator.validate("p-token").await.unwrap();

        assert_eq!(user.id.as_str(), "passenger-9");
        assert_eq!(user.role, Role::Passenger);
    }

    #[tokio::test]
    async fn forced_error_wins_until_cleared() {
        let validator = MockSessionValidator::new()
            .with_user("valid-token", driver())
            .with_error(AuthError::ExpiredCredential);

        assert_eq!(
            validator.validate("valid-token").await,
            Err(AuthError::ExpiredCredential)
        );

        validator.clear_error();

        assert!(validator.validate("valid-token").await.is_ok());
    }

    #[tokio::test]
    async fn tokens_can_be_added_and_removed_at_runtime() {
        let validator = MockSessionValidator::new();
        assert!(validator.validate("t").await.is_err());

        validator.add_token("t", driver());
        assert!(validator.validate("t").await.is_ok());
        assert_eq!(validator.token_count(), 1);

        validator.remove_token("t");
        assert!(validator.validate("t").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_postpones_answer() {
        let validator = MockSessionValidator::new()
            .with_user("t", driver())
            .with_delay(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        assert!(validator.validate("t").await.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
