use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{event, Event, Termination};
use crate::error::SinkError;

/// Outbound half of a subscriber's connection.
///
/// The forwarding task owns the sink and is its only caller.
#[async_trait]
pub trait OutboundSink: Send + 'static {
    /// Encode an event for this subscriber. A failure skips this one
    /// delivery and keeps the subscription alive.
    fn encode(&self, event: &Event) -> Result<String, serde_json::Error> {
        event::encode(event)
    }

    /// Deliver one encoded event frame.
    async fn send(&mut self, frame: String) -> Result<(), SinkError>;

    /// Called once when the forwarding task ends, for any reason.
    async fn close(&mut self, reason: &Termination);
}

/// Sink backed by a bounded in-process channel.
///
/// `send` waits for queue space, so a receiver that stops reading stalls
/// the forwarding task until the hub's send timeout disconnects it.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl OutboundSink for ChannelSink {
    async fn send(&mut self, frame: String) -> Result<(), SinkError> {
        self.tx.send(frame).await.map_err(|_| SinkError::Closed)
    }

    async fn close(&mut self, _reason: &Termination) {}
}
