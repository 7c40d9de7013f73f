//! Outbound request correlation.
//!
//! The transport only delivers loose messages, so a reply is matched to
//! its request by id. Every [`Correlator::send`] call owns one pending
//! exchange:
//!
//! 1. mint a fresh id
//! 2. subscribe to the conversation with the target
//! 3. wait out the grace period, then transmit
//! 4. scan the conversation until a response with that id arrives
//!
//! The subscription is taken before transmitting so a fast reply cannot
//! slip past. The timeout starts once the request is on the wire, so a
//! timeout shorter than the grace period still transmits. On expiry the
//! subscription is dropped and the call fails with [`SendError::Timeout`].

use std::time::Duration;

use futures::StreamExt;
use tracing::{Instrument, debug, debug_span, trace};
use uuid::Uuid;

use crate::error::{SendError, SendResult};
use peerpipe_core::{
    BoxedTransport, Identity, MessageStream, PipeResponse, SendRequest, TransportError,
};

/// Default wait for a reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay between subscribing and transmitting.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Sends requests and waits for their correlated responses.
#[derive(Clone)]
pub struct Correlator {
    transport: BoxedTransport,
    identity: Identity,
    default_timeout: Duration,
    grace_period: Duration,
}

impl Correlator {
    pub fn new(transport: BoxedTransport, identity: Identity) -> Self {
        Self {
            transport,
            identity,
            default_timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Sets the timeout used when a request carries none.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the delay between subscribing and transmitting.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Sends `request` to `target` and resolves with the first response
    /// carrying the same id.
    ///
    /// Any response code resolves the call, including 4xx and 5xx. Only a
    /// missing reply or a transport failure is an error.
    pub async fn send(&self, target: &str, request: SendRequest) -> SendResult<PipeResponse> {
        let id = Uuid::now_v7().to_string();
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let envelope = request.into_request(id.clone());
        let payload = envelope.encode()?;

        let span = debug_span!(
            "send",
            request_id = %id,
            peer = %target,
            method = %envelope.method,
            path = %envelope.path,
        );

        async {
            let channel = self.transport.open_channel(target).await?;
            let replies = channel.subscribe().await?;

            tokio::time::sleep(self.grace_period).await;
            channel.send(&payload).await?;
            trace!("Request transmitted");

            match tokio::time::timeout(timeout, self.await_reply(replies, &id)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(?timeout, "No reply before deadline");
                    Err(SendError::Timeout {
                        id: id.clone(),
                        timeout,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn await_reply(&self, mut replies: MessageStream, id: &str) -> SendResult<PipeResponse> {
        while let Some(message) = replies.next().await {
            if self.identity.is_self(&message.sender) {
                continue;
            }
            match PipeResponse::decode(&message.content) {
                Ok(response) if response.id == id => {
                    debug!(code = %response.code, "Reply received");
                    return Ok(response);
                }
                Ok(response) => {
                    trace!(other = %response.id, "Ignoring reply to another request");
                }
                Err(e) => {
                    trace!(error = %e, "Ignoring undecodable message");
                }
            }
        }
        Err(TransportError::closed("reply stream ended before a response arrived").into())
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("identity", &self.identity)
            .field("default_timeout", &self.default_timeout)
            .field("grace_period", &self.grace_period)
            .finish()
    }
}
