use async_nats::subject::ToSubject;
use bytes::Bytes;
use log::{debug, error, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::model::{MessageSent, Subject};

pub trait EventSink {
    fn publish(&self, event: MessageSent);
}

pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, event: MessageSent) {
        debug!(
            "dropping message sent event for thread {}",
            event.thread.id()
        );
    }
}

/// Forwards events into an in-process channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MessageSent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MessageSent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: MessageSent) {
        if let Err(e) = self.tx.send(event) {
            warn!(
                "event receiver is gone, dropping event for thread {}",
                e.0.thread.id()
            );
        }
    }
}

/// Publishes JSON encoded events to NATS on a background task.
pub struct NatsSink {
    pubsub: async_nats::Client,
    rt: Handle,
}

impl NatsSink {
    pub fn new(pubsub: async_nats::Client, rt: Handle) -> Self {
        Self { pubsub, rt }
    }
}

impl EventSink for NatsSink {
    fn publish(&self, event: MessageSent) {
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                error!("failed to serialize message sent event: {e:?}");
                return;
            }
        };

        let subject = (&Subject::Thread(event.thread.id())).to_subject();
        let pubsub = self.pubsub.clone();

        self.rt.spawn(async move {
            if let Err(e) = pubsub.publish(subject, Bytes::from(payload)).await {
                error!("failed to publish message sent event: {e:?}");
            }
        });
    }
}
