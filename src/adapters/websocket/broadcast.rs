//! Best-effort delivery onto connection queues.
//!
//! Every send is a non-blocking `try_send` onto the connection's bounded
//! outbound queue:
//! - queue full: the event is dropped for that connection only
//! - queue closed: the writer is gone, so the connection is scheduled for
//!   removal from the registry
//!
//! Neither case is surfaced to the caller; the return value is the number of
//! connections the event was queued for.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::foundation::{ConnectionId, OutboundEvent, UserId};

use super::messages::{Delivery, ServerMessage};
use super::registry::{ConnectionRegistry, GroupKey, Recipient};

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Queues a message for one connection.
    pub fn send_to_connection(&self, recipient: &Recipient, message: &Arc<ServerMessage>) -> bool {
        match recipient
            .sender
            .try_send(Delivery::Event(Arc::clone(message)))
        {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %recipient.connection_id,
                    event = %message.event,
                    "Outbound queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %recipient.connection_id,
                    "Outbound queue closed, scheduling cleanup"
                );
                self.schedule_cleanup(recipient.connection_id);
                false
            }
        }
    }

    /// Delivers one message to each recipient independently.
    pub fn deliver(&self, recipients: &[Recipient], message: ServerMessage) -> usize {
        let message = Arc::new(message);
        recipients
            .iter()
            .filter(|recipient| self.send_to_connection(recipient, &message))
            .count()
    }

    pub fn send_to_user(&self, user_id: &UserId, event: OutboundEvent, payload: Value) -> usize {
        match self.registry.recipient_for_user(user_id) {
            Some(recipient) => self.deliver(&[recipient], ServerMessage::new(event, payload)),
            None => {
                tracing::trace!(user_id = %user_id, %event, "User not connected, dropping");
                0
            }
        }
    }

    pub fn send_to_group(&self, key: &GroupKey, event: OutboundEvent, payload: Value) -> usize {
        let recipients = self.registry.resolve_group(key);
        if recipients.is_empty() {
            return 0;
        }
        self.deliver(&recipients, ServerMessage::new(event, payload))
    }

    /// Sends once to every connection in the union of `keys`.
    pub fn send_to_groups(&self, keys: &[GroupKey], event: OutboundEvent, payload: Value) -> usize {
        let recipients = self.registry.resolve_groups(keys);
        if recipients.is_empty() {
            return 0;
        }
        self.deliver(&recipients, ServerMessage::new(event, payload))
    }

    /// Sends directly to a connection by id.
    pub fn send_to_connection_id(&self, id: ConnectionId, message: ServerMessage) -> bool {
        match self.registry.recipient(id) {
            Some(recipient) => self.send_to_connection(&recipient, &Arc::new(message)),
            None => false,
        }
    }

    fn schedule_cleanup(&self, id: ConnectionId) {
        let registry = Arc::clone(&self.registry);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.remove(id);
                });
            }
            Err(_) => {
                registry.remove(id);
            }
        }
    }
}
