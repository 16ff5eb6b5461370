//! Session validation port for handshake credentials.
//!
//! This port defines the contract for verifying the token a client presents
//! when it opens a connection and extracting its identity. It is
//! issuer-agnostic: the JWT adapter and the in-memory mock both implement it.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates connection credentials and extracts user identity.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidCredential` for malformed or badly signed tokens
/// - Return `AuthError::ExpiredCredential` for expired tokens
/// - Never retry internally; the hub bounds the call with a timeout
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token and return the authenticated user.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Role, UserId};
    use std::collections::HashMap;

    struct FixedValidator {
        tokens: HashMap<String, AuthenticatedUser>,
    }

    #[async_trait]
    impl SessionValidator for FixedValidator {
        async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
            self.tokens
                .get(token)
                .cloned()
                .ok_or(AuthError::InvalidCredential)
        }
    }

    #[tokio::test]
    async fn validator_returns_user_for_known_token() {
        let user = AuthenticatedUser::new(UserId::new("d-1").unwrap(), Role::Driver);
        let validator = FixedValidator {
            tokens: HashMap::from([("tok".to_string(), user.clone())]),
        };

        assert_eq!(validator.validate("tok").await, Ok(user));
        assert_eq!(
            validator.validate("nope").await,
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn session_validator_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn SessionValidator) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn SessionValidator>>();
    }
}
