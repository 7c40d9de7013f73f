//! Peerpipe Runtime - process-level glue for peerpipe services.
//!
//! This crate provides:
//! - Layered configuration (`peerpipe.toml`, `PEERPIPE_*` variables, code)
//! - Logging setup driven by that configuration
//! - A runtime that owns one pipe session and closes it on shutdown
//!
//! ```ignore
//! use peerpipe_runtime::PipeRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = PipeRuntime::builder().transport(transport).build()?;
//!     runtime.pipe().get("/ping", |_req| async {})?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PeerpipeConfig, PipeSettings};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{init_from_config, try_init_from_config};
pub use runtime::{PipeRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
