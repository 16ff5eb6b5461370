//! EventPublisher port - Interface for publishing ride-lifecycle events.
//!
//! The booking and trip services publish through this port; the hub's
//! lifecycle bridge is one of the subscribers.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// # Example
///
/// ```ignore
/// let event = EventEnvelope::new("ride.accepted", ride_id, "Ride", payload);
/// publisher.publish(event).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish multiple events in order.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}

    #[test]
    fn event_publisher_is_send_sync() {
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn EventPublisher>>();
    }
}
