//! # Peerpipe Core
//!
//! The core types of the peerpipe request/response layer.
//!
//! Peerpipe synthesizes HTTP-like request/response exchanges on top of a
//! transport that only offers unordered, broadcast-style message delivery
//! between peers. This crate holds everything both sides of an exchange agree
//! on, and nothing that drives an exchange:
//!
//! - **Envelopes**: the JSON request and response frames ([`PipeRequest`],
//!   [`PipeResponse`], [`SendRequest`], [`HandlerResponse`])
//! - **Errors**: the structured wire error ([`PipeError`]) and the local
//!   failure types ([`TransportError`], [`MalformedMessage`])
//! - **Transport capabilities**: what the layer needs from a messaging
//!   backend ([`Transport`], [`Channel`], [`InboundMessage`])
//! - **Identity**: the injected self-identity check ([`Identity`])
//!
//! ```text
//! ┌──────────────┐  request envelope   ┌──────────────┐
//! │  Correlator  │────────────────────▶│  Dispatcher  │
//! │  (client)    │◀────────────────────│  (server)    │
//! └──────┬───────┘  response envelope  └──────┬───────┘
//!        │                                    │
//!        └─────────────┐        ┌─────────────┘
//!                   ┌──▼────────▼──┐
//!                   │  Transport   │
//!                   └──────────────┘
//! ```

pub mod envelope;
pub mod error;
pub mod identity;
pub mod request;
pub mod transport;

pub use envelope::{HandlerResponse, Method, PipeResponse, ResponseCode};
pub use error::{MalformedMessage, PipeError, TransportError, TransportResult};
pub use identity::Identity;
pub use request::{PipeRequest, SendRequest};
pub use transport::{BoxedChannel, BoxedTransport, Channel, InboundMessage, MessageStream, Transport};

/// Prelude for common imports.
pub mod prelude {
    pub use super::envelope::*;
    pub use super::error::{PipeError, TransportError, TransportResult};
    pub use super::identity::Identity;
    pub use super::request::{PipeRequest, SendRequest};
    pub use super::transport::{Channel, InboundMessage, Transport};
}
