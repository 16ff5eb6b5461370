//! Per-connection outbound queue.
//!
//! Events travel on a bounded mpsc channel and may be dropped when it is
//! full. The close signal travels on its own oneshot and is always read
//! first, so an evicted connection gets its close frame even when its event
//! queue is saturated.

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::oneshot;

use super::messages::{CloseReason, Delivery};

/// Sending half of a connection's event queue.
pub type OutboundSender = mpsc::Sender<Delivery>;

/// Registry-side half: event sender plus the one-time close signal.
#[derive(Debug)]
pub struct OutboundHandle {
    pub sender: OutboundSender,
    pub closer: oneshot::Sender<CloseReason>,
}

/// Writer-side half.
#[derive(Debug)]
pub struct OutboundQueue {
    events: mpsc::Receiver<Delivery>,
    close: Option<oneshot::Receiver<CloseReason>>,
}

/// Creates a queue holding up to `capacity` events.
pub fn outbound_queue(capacity: usize) -> (OutboundHandle, OutboundQueue) {
    let (sender, events) = mpsc::channel(capacity.max(1));
    let (closer, close) = oneshot::channel();
    (
        OutboundHandle { sender, closer },
        OutboundQueue {
            events,
            close: Some(close),
        },
    )
}

impl OutboundQueue {
    /// Next delivery, a pending close first. `None` once the connection is
    /// released and the queue is drained.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            let Some(close) = self.close.as_mut() else {
                return self.events.recv().await;
            };
            let closed = tokio::select! {
                biased;
                reason = close => reason,
                delivery = self.events.recv() => return delivery,
            };
            self.close = None;
            if let Ok(reason) = closed {
                return Some(Delivery::Close(reason));
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<Delivery, TryRecvError> {
        if let Some(close) = self.close.as_mut() {
            match close.try_recv() {
                Ok(reason) => {
                    self.close = None;
                    return Ok(Delivery::Close(reason));
                }
                Err(oneshot::error::TryRecvError::Closed) => self.close = None,
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        self.events.try_recv()
    }
}
