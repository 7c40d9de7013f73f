//! # Peerpipe Transport
//!
//! Transport implementations for the peerpipe request/response layer.
//!
//! This crate provides concrete implementations of the capability traits
//! defined in `peerpipe-core`, selected through feature flags.
//!
//! ## Features
//!
//! - `memory` (default): in-process broadcast hub
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  peerpipe-framework │  (dispatcher, correlator)
//! ├─────────────────────┤
//! │  peerpipe-core      │  (Transport / Channel traits)
//! ├─────────────────────┤
//! │  peerpipe-transport │  <- This crate (implementations)
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use peerpipe_transport::MemoryHub;
//!
//! let hub = MemoryHub::new();
//! let alice = hub.endpoint("alice");
//! let bob = hub.endpoint("bob");
//! ```

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryChannel, MemoryHub, MemoryTransport};
