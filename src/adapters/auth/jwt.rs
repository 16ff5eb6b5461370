//! HMAC JWT adapter for handshake validation.
//!
//! Implements the `SessionValidator` port for tokens minted by the platform's
//! auth service with a shared HS256 secret. A token is accepted when:
//!
//! 1. The signature verifies against the configured secret
//! 2. `exp` is in the future
//! 3. `iss` and `aud` match, when the hub is configured with them
//! 4. `sub` is a non-blank user id and `role` is `passenger` or `driver`
//!
//! An optional `groups` claim grants system-group membership (operator
//! consoles carry `emergency_responders`). Group names the hub does not know
//! are skipped.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{AuthError, AuthenticatedUser, Role, SystemGroup, UserId};
use crate::ports::SessionValidator;

/// Settings for the JWT validator.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl JwtConfig {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// Claims the hub reads from a connection token.
#[derive(Debug, Deserialize)]
struct HubClaims {
    #[serde(alias = "userId")]
    sub: String,
    role: String,
    #[serde(default)]
    groups: Vec<String>,
    #[allow(dead_code)]
    exp: i64,
}

/// Validates HS256-signed JWTs presented at handshake.
pub struct JwtSessionValidator {
    key: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtSessionValidator {
    pub fn new(config: JwtConfig) -> Self {
        let key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key,
            validation,
            issuer: config.issuer,
            audience: config.audience,
        }
    }

    fn decode_claims(&self, token: &str) -> Result<HubClaims, AuthError> {
        decode::<HubClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::ExpiredCredential
                }
                ErrorKind::InvalidIssuer => {
                    tracing::warn!("Invalid issuer in token");
                    AuthError::InvalidCredential
                }
                ErrorKind::InvalidAudience => {
                    tracing::warn!("Invalid audience in token");
                    AuthError::InvalidCredential
                }
                _ => {
                    tracing::warn!(error = %e, "Token validation failed");
                    AuthError::InvalidCredential
                }
            })
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.decode_claims(token)?;

        let user_id = UserId::new(claims.sub).map_err(|_| {
            tracing::warn!("Token subject is blank");
            AuthError::InvalidCredential
        })?;

        let role: Role = claims.role.parse().map_err(|_| {
            tracing::warn!(role = %claims.role, "Token carries unknown role");
            AuthError::InvalidCredential
        })?;

        let groups = claims.groups.iter().filter_map(|name| match name.parse::<SystemGroup>() {
            Ok(group) => Some(group),
            Err(_) => {
                tracing::debug!(group = %name, "Skipping unknown group claim");
                None
            }
        });

        Ok(AuthenticatedUser::new(user_id, role).with_system_groups(groups))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}
