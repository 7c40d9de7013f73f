//! In-process broadcast transport.
//!
//! Every endpoint created from one [`MemoryHub`] shares a single broadcast
//! bus. A delivery carries its author and its recipient; subscribers filter
//! the bus down to the conversations they belong to:
//!
//! | Subscription | Sees |
//! |--------------|------|
//! | [`MemoryTransport::subscribe`] | every delivery the endpoint sent or received |
//! | [`MemoryChannel::subscribe`] | deliveries between the endpoint and one peer |
//!
//! Like a real messaging network, the bus echoes an endpoint's own messages
//! back to it, and a subscriber that falls behind loses messages.

use std::future::ready;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use peerpipe_core::{
    BoxedChannel, Channel, InboundMessage, MessageStream, Transport, TransportError,
    TransportResult,
};

/// Default bus capacity before slow subscribers start losing messages.
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Delivery {
    from: String,
    to: String,
    content: String,
}

/// A shared in-process message bus.
#[derive(Debug, Clone)]
pub struct MemoryHub {
    tx: broadcast::Sender<Delivery>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    /// Creates a hub with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a hub that buffers up to `capacity` deliveries per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Creates an endpoint with the given identity.
    pub fn endpoint(&self, identity: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            hub: self.clone(),
            identity: identity.into(),
            initialized: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Puts a raw payload on the bus as if `from` had sent it to `to`.
    pub fn inject(&self, from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) {
        self.publish(Delivery {
            from: from.into(),
            to: to.into(),
            content: content.into(),
        });
    }

    fn publish(&self, delivery: Delivery) {
        trace!(from = %delivery.from, to = %delivery.to, len = delivery.content.len(), "Publishing delivery");
        // Without subscribers the message is simply lost, as on a real network.
        let _ = self.tx.send(delivery);
    }

    fn stream<F>(&self, filter: F, shutdown: &CancellationToken) -> MessageStream
    where
        F: Fn(&Delivery) -> bool + Send + 'static,
    {
        let rx = self.tx.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(delivery) => return Some((delivery, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Subscriber lagged behind, messages dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |delivery| ready(filter(delivery)))
        .map(|delivery| InboundMessage::new(delivery.from, delivery.content))
        .take_until(shutdown.clone().cancelled_owned())
        .boxed()
    }
}

/// One endpoint on a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryTransport {
    hub: MemoryHub,
    identity: String,
    initialized: AtomicBool,
    shutdown: CancellationToken,
}

impl MemoryTransport {
    /// Returns this endpoint's identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn ensure_ready(&self) -> TransportResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::closed("memory transport closed"));
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(TransportError::NotInitialized);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn init(&self) -> TransportResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::closed("memory transport closed"));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn open_channel(&self, peer: &str) -> TransportResult<BoxedChannel> {
        self.ensure_ready()?;
        if peer.is_empty() {
            return Err(TransportError::ChannelUnavailable {
                peer: peer.to_string(),
                reason: "empty peer identity".to_string(),
            });
        }
        Ok(Arc::new(MemoryChannel {
            hub: self.hub.clone(),
            identity: self.identity.clone(),
            peer: peer.to_string(),
            shutdown: self.shutdown.clone(),
        }))
    }

    async fn subscribe(&self) -> TransportResult<MessageStream> {
        self.ensure_ready()?;
        let me = self.identity.clone();
        Ok(self
            .hub
            .stream(move |d| d.from == me || d.to == me, &self.shutdown))
    }

    async fn close(&self) -> TransportResult<()> {
        self.shutdown.cancel();
        Ok(())
    }
}

/// A conversation between a [`MemoryTransport`] and one peer.
#[derive(Debug)]
pub struct MemoryChannel {
    hub: MemoryHub,
    identity: String,
    peer: String,
    shutdown: CancellationToken,
}

#[async_trait]
impl Channel for MemoryChannel {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&self, payload: &str) -> TransportResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::closed("memory transport closed"));
        }
        self.hub.publish(Delivery {
            from: self.identity.clone(),
            to: self.peer.clone(),
            content: payload.to_string(),
        });
        Ok(())
    }

    async fn subscribe(&self) -> TransportResult<MessageStream> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::closed("memory transport closed"));
        }
        let me = self.identity.clone();
        let peer = self.peer.clone();
        Ok(self.hub.stream(
            move |d| (d.from == me && d.to == peer) || (d.from == peer && d.to == me),
            &self.shutdown,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn ready_endpoint(hub: &MemoryHub, id: &str) -> MemoryTransport {
        let t = hub.endpoint(id);
        t.init().await.unwrap();
        t
    }

    #[tokio::test]
    async fn test_requires_init() {
        let hub = MemoryHub::new();
        let t = hub.endpoint("alice");
        assert!(matches!(
            t.subscribe().await,
            Err(TransportError::NotInitialized)
        ));
        assert!(t.open_channel("bob").await.is_err());
    }

    #[tokio::test]
    async fn test_transport_subscription_sees_own_and_received() {
        let hub = MemoryHub::new();
        let alice = ready_endpoint(&hub, "alice").await;
        let bob = ready_endpoint(&hub, "bob").await;

        let mut inbox = alice.subscribe().await.unwrap();

        bob.open_channel("alice").await.unwrap().send("hi alice").await.unwrap();
        alice.open_channel("bob").await.unwrap().send("hi bob").await.unwrap();
        hub.inject("carol", "dave", "not for alice");
        hub.inject("carol", "alice", "from carol");

        let first = inbox.next().await.unwrap();
        assert_eq!(first, InboundMessage::new("bob", "hi alice"));
        let second = inbox.next().await.unwrap();
        assert_eq!(second, InboundMessage::new("alice", "hi bob"));
        let third = inbox.next().await.unwrap();
        assert_eq!(third, InboundMessage::new("carol", "from carol"));
    }

    #[tokio::test]
    async fn test_channel_subscription_is_scoped_to_peer() {
        let hub = MemoryHub::new();
        let alice = ready_endpoint(&hub, "alice").await;
        let to_bob = alice.open_channel("bob").await.unwrap();
        let mut conversation = to_bob.subscribe().await.unwrap();

        hub.inject("carol", "alice", "other conversation");
        hub.inject("bob", "alice", "reply");

        let msg = conversation.next().await.unwrap();
        assert_eq!(msg, InboundMessage::new("bob", "reply"));
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let hub = MemoryHub::new();
        let alice = ready_endpoint(&hub, "alice").await;
        let mut inbox = alice.subscribe().await.unwrap();

        alice.close().await.unwrap();

        let next = timeout(Duration::from_secs(1), inbox.next()).await.unwrap();
        assert!(next.is_none());
        assert!(matches!(
            alice.open_channel("bob").await,
            Err(TransportError::ConnectionClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_lost_messages() {
        let hub = MemoryHub::with_capacity(2);
        let alice = ready_endpoint(&hub, "alice").await;
        let mut inbox = alice.subscribe().await.unwrap();

        for i in 0..5 {
            hub.inject("bob", "alice", format!("m{i}"));
        }

        let msg = inbox.next().await.unwrap();
        assert_eq!(msg.content, "m3");
        let msg = inbox.next().await.unwrap();
        assert_eq!(msg.content, "m4");
    }
}
