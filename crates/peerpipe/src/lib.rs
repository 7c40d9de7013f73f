//! # Peerpipe
//!
//! HTTP-like request/response exchanges between peers over a transport that
//! only delivers loose, unordered messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  send()    ┌────────────┐  {id, method, path, ...}  ┌────────────┐
//! │    caller    │───────────▶│ Correlator │──────────────────────────▶│ Dispatcher │
//! │              │◀───────────│            │◀──────────────────────────│  + Router  │
//! └──────────────┘  response  └────────────┘  {id, code, body}         └─────┬──────┘
//!                                                                            │
//!                                                                       handlers
//! ```
//!
//! - **Core**: envelopes, wire errors, and the transport capability traits
//! - **Framework**: routing, dispatch, correlation and the [`Pipe`](prelude::Pipe) session
//! - **Transport**: transport implementations (`MemoryHub` for in-process use)
//! - **Runtime**: configuration, logging and process lifecycle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use peerpipe::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let hub = MemoryHub::new();
//!
//!     let provider = Pipe::new(Arc::new(hub.endpoint("provider")), PipeConfig::new(Identity::new("provider")));
//!     provider.init().await?;
//!     provider.get("/offers/:id", |req: PipeRequest| async move {
//!         HandlerResponse::ok(json!({ "id": req.path_param("id") }))
//!     })?;
//!     provider.start().await?;
//!
//!     let client = Pipe::new(Arc::new(hub.endpoint("client")), PipeConfig::new(Identity::new("client")));
//!     client.init().await?;
//!     let res = client.send("provider", SendRequest::get("/offers/42")).await?;
//!     assert_eq!(res.code, ResponseCode::OK);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `memory`: in-process `MemoryHub` transport (default)
//! - `toml-config`: `peerpipe.toml` configuration files (default)
//! - `json-log`: JSON log output

pub use peerpipe_core as core;
pub use peerpipe_framework as framework;
pub use peerpipe_runtime as runtime;
pub use peerpipe_transport as transport;

/// Commonly used types for serving and calling routes.
///
/// ```rust,ignore
/// use peerpipe::prelude::*;
/// ```
pub mod prelude {
    pub use peerpipe_framework::prelude::*;
    pub use peerpipe_framework::{Correlator, Dispatcher, Router};
    pub use peerpipe_runtime::{PeerpipeConfig, PipeRuntime};

    #[cfg(feature = "memory")]
    pub use peerpipe_transport::{MemoryHub, MemoryTransport};

    pub use serde_json::json;
    pub use std::sync::Arc;
}
