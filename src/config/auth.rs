//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Shortest HS256 secret accepted in production.
const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

/// Handshake token verification settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret used by the platform auth service
    pub jwt_secret: SecretString,

    /// Expected `iss` claim, unchecked when absent
    pub issuer: Option<String>,

    /// Expected `aud` claim, unchecked when absent
    pub audience: Option<String>,

    /// Upper bound on credential verification
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,

    /// Bearer token the booking and trip services present to the ride-event
    /// ingest route; ingest is disabled when absent
    #[serde(default)]
    pub service_token: Option<SecretString>,
}

impl AuthConfig {
    /// Get handshake timeout as Duration
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Validate authentication configuration
    ///
    /// Production requires a secret, and a service token when one is set,
    /// of at least 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret_len = self.jwt_secret.expose_secret().len();
        if secret_len == 0 {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if *environment == Environment::Production && secret_len < MIN_PRODUCTION_SECRET_BYTES {
            return Err(ValidationError::JwtSecretTooShort(MIN_PRODUCTION_SECRET_BYTES));
        }
        if self.handshake_timeout_ms == 0 || self.handshake_timeout_ms > 60_000 {
            return Err(ValidationError::InvalidHandshakeTimeout);
        }
        if let Some(token) = &self.service_token {
            let token_len = token.expose_secret().trim().len();
            if token_len == 0 {
                return Err(ValidationError::MissingRequired("AUTH__SERVICE_TOKEN"));
            }
            if *environment == Environment::Production && token_len < MIN_PRODUCTION_SECRET_BYTES {
                return Err(ValidationError::ServiceTokenTooShort(MIN_PRODUCTION_SECRET_BYTES));
            }
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::new(String::new()),
            issuer: None,
            audience: None,
            handshake_timeout_ms: default_handshake_timeout(),
            service_token: None,
        }
    }
}

fn default_handshake_timeout() -> u64 {
    5000
}
