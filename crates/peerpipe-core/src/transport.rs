//! Transport capabilities.
//!
//! Peerpipe does not speak to the network itself. A messaging backend plugs
//! in by implementing two traits:
//!
//! | Trait | Provides |
//! |-------|----------|
//! | [`Transport`] | Opening a [`Channel`] to a peer, and one process-wide subscription to every inbound message. |
//! | [`Channel`] | Sending a text payload to its peer, and a subscription scoped to that peer's conversation. |
//!
//! Subscriptions are unbounded [`MessageStream`]s. A stream must buffer
//! everything delivered after it was created, whether or not it is being
//! polled yet; the correlator relies on this to subscribe before it sends.
//! Streams may include messages this endpoint authored; consumers filter
//! them out with an [`Identity`](crate::Identity).

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TransportResult;

/// A message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Identity of the peer that authored the message.
    pub sender: String,
    /// Raw text payload.
    pub content: String,
}

impl InboundMessage {
    /// Creates an inbound message.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}

/// An unbounded sequence of inbound messages.
pub type MessageStream = BoxStream<'static, InboundMessage>;

/// A logical bidirectional link to one peer.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Returns the identity of the peer at the other end.
    fn peer(&self) -> &str;

    /// Sends a text payload to the peer.
    async fn send(&self, payload: &str) -> TransportResult<()>;

    /// Subscribes to messages exchanged on this channel.
    async fn subscribe(&self) -> TransportResult<MessageStream>;
}

/// A messaging backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Prepares the transport for use.
    ///
    /// The default implementation does nothing.
    async fn init(&self) -> TransportResult<()> {
        Ok(())
    }

    /// Opens a channel to `peer`.
    ///
    /// Must be safe to call repeatedly for the same peer.
    async fn open_channel(&self, peer: &str) -> TransportResult<BoxedChannel>;

    /// Subscribes to every inbound message, across all channels.
    async fn subscribe(&self) -> TransportResult<MessageStream>;

    /// Releases the transport.
    ///
    /// The default implementation does nothing.
    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

/// Shared channel handle.
pub type BoxedChannel = Arc<dyn Channel>;

/// Shared transport handle.
pub type BoxedTransport = Arc<dyn Transport>;
