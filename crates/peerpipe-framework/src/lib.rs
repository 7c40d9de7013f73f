//! # Peerpipe Framework
//!
//! The moving parts of the peerpipe request/response layer:
//!
//! - Path routing with `:name` captures ([`Router`])
//! - Inbound dispatch with per-message failure isolation ([`Dispatcher`])
//! - Outbound request/reply correlation with timeouts ([`Correlator`])
//! - Mapping of handler outcomes to wire responses ([`error_mapper`])
//! - Typed body and parameter extraction ([`validate`])
//! - The session that ties them to one transport endpoint ([`Pipe`])

pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod error_mapper;
pub mod handler;
pub mod pipe;
pub mod router;
pub mod validate;

pub use correlator::{Correlator, DEFAULT_GRACE_PERIOD, DEFAULT_TIMEOUT};
pub use dispatcher::Dispatcher;
pub use error::{RouteError, SendError, SendResult, SessionError, SessionResult};
pub use handler::{BoxedHandler, Handler, HandlerResult, IntoHandlerResult, into_handler, sync_handler};
pub use pipe::{Pipe, PipeConfig};
pub use router::{PathPattern, RouteMatch, Router, SharedRouter};
pub use validate::{
    Validate, ValidationIssue, parse_body, parse_params, parse_validated_body, validation_error,
};

/// Prelude for writing handlers and driving a pipe.
pub mod prelude {
    pub use crate::error::{RouteError, SendError, SessionError};
    pub use crate::handler::sync_handler;
    pub use crate::pipe::{Pipe, PipeConfig};
    pub use crate::validate::{Validate, ValidationIssue, parse_body, parse_params, parse_validated_body};
    pub use peerpipe_core::prelude::*;
}
