//! Ride-lifecycle ingest for the booking and trip services.
//!
//! Route: `POST /internal/ride-events`
//!
//! Callers authenticate with `Authorization: Bearer <service token>`. An
//! accepted event is published on the event bus, where the lifecycle bridge
//! turns it into active-ride changes and `ride_update` broadcasts. With no
//! service token configured the route refuses everything.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::adapters::websocket::RIDE_LIFECYCLE_EVENT_TYPES;
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope, RideId};

use super::AppState;

/// Body of an ingest request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideEventRequest {
    pub event_type: String,
    pub ride_id: String,
    #[serde(default)]
    pub payload: Value,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Ride event ingest is not enabled")]
    Disabled,

    #[error("Service token required")]
    Unauthorized,

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Internal(String),
}

impl IngestError {
    fn status(&self) -> StatusCode {
        match self {
            IngestError::Disabled => StatusCode::FORBIDDEN,
            IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
            IngestError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            IngestError::Disabled => ErrorCode::Forbidden.as_str(),
            IngestError::Unauthorized => ErrorCode::Unauthorized.as_str(),
            IngestError::Invalid(_) => ErrorCode::ValidationFailed.as_str(),
            IngestError::Internal(_) => ErrorCode::InternalError.as_str(),
        }
    }
}

impl From<DomainError> for IngestError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::InvalidPayload => {
                IngestError::Invalid(err.message)
            }
            _ => IngestError::Internal(err.message),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({
                "error": self.to_string(),
                "code": self.code()
            })),
        )
            .into_response()
    }
}

/// A caller that presented the configured service token.
pub struct ServiceCaller;

#[async_trait]
impl FromRequestParts<AppState> for ServiceCaller {
    type Rejection = IngestError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.service_token else {
            return Err(IngestError::Disabled);
        };

        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(IngestError::Unauthorized)?;

        if tokens_match(presented.trim().as_bytes(), expected.expose_secret().as_bytes()) {
            Ok(ServiceCaller)
        } else {
            tracing::warn!("Ride event ingest refused: service token mismatch");
            Err(IngestError::Unauthorized)
        }
    }
}

fn tokens_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// POST /internal/ride-events
pub async fn ingest_ride_event(
    State(state): State<AppState>,
    _caller: ServiceCaller,
    body: Result<Json<RideEventRequest>, JsonRejection>,
) -> Result<impl IntoResponse, IngestError> {
    let Json(request) = body.map_err(|e| IngestError::Invalid(e.body_text()))?;

    if !RIDE_LIFECYCLE_EVENT_TYPES.contains(&request.event_type.as_str()) {
        return Err(IngestError::Invalid(format!(
            "Unsupported event type '{}'",
            request.event_type
        )));
    }
    let ride_id = RideId::new(request.ride_id).map_err(|e| IngestError::Invalid(e.to_string()))?;

    let payload = match request.payload {
        Value::Null => json!({}),
        payload => payload,
    };
    let mut event = EventEnvelope::new(request.event_type, ride_id.as_str(), "Ride", payload);
    if let Some(correlation_id) = request.correlation_id {
        event = event.with_correlation_id(correlation_id);
    }
    let event_id = event.event_id.clone();
    let event_type = event.event_type.clone();

    state.publisher.publish(event).await?;

    tracing::info!(
        event_id = %event_id,
        event_type = %event_type,
        ride_id = %ride_id,
        "Ride event accepted"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "eventId": event_id,
        })),
    ))
}
