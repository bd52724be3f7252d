//! # pt-dispatcher
//!
//! A pluggable transport dispatcher: it sits between a circumvention-aware
//! client or server and the network and carries traffic through a
//! configurable obfuscation transport.
//!
//! The crate provides:
//!
//! - **Decoding**: JSON transport options into a closed [`TransportConfig`] sum type
//! - **Construction**: a [`Registry`] that builds dial and listen capabilities
//! - **Selection**: an [`Optimizer`] choosing among candidates with a strategy
//! - **Relaying**: a full-duplex copy loop and a UDP-over-stream session relay
//!
//! ## Feature Flags
//!
//! - `udp` (default): UDP session tracker and framing relays
//! - `cli` (default): the `pt-dispatcher` binary and log subscriber setup
//!
//! ## Modules
//!
//! - [`core`]: error types, constants and capability traits
//! - [`config`]: option decoding and runtime settings
//! - [`dialer`]: direct and upstream-proxy dialers
//! - [`registry`]: transport construction
//! - [`optimizer`]: strategy engine
//! - [`relay`]: copy loop and datagram framing
//! - [`udp`]: UDP session tracking (requires `udp`)
//! - [`client`], [`server`]: TCP front-ends
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pt_dispatcher::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::with_config(DispatcherConfig::default())?;
//! let transport = registry.construct_json(
//!     r#"{ "name": "obfs4", "address": "192.0.2.1:443",
//!          "config": { "cert": "AAAA", "iatMode": "0" } }"#,
//! )?;
//! let client = TransparentClient::bind("127.0.0.1:1080", transport).await?;
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod config;
pub mod dialer;
pub mod optimizer;
pub mod registry;
pub mod relay;

// UDP relays (feature-gated)
#[cfg(feature = "udp")]
#[cfg_attr(docsrs, doc(cfg(feature = "udp")))]
pub mod udp;

pub mod client;
pub mod server;

// Log subscriber (feature-gated)
#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod logging;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::client::TransparentClient;
    pub use crate::config::{
        decode_descriptor, decode_descriptor_str, DispatcherConfig, DispatcherConfigBuilder,
        StrategyKind, TransportConfig, TransportDescriptor, TransportKind, UdpFraming,
    };
    pub use crate::dialer::{DirectDialer, ProxyDialer, ProxySpec};
    pub use crate::optimizer::{Optimizer, Strategy};
    pub use crate::registry::{PassThrough, Registry, Shaper};
    pub use crate::relay::{relay, relay_with_stats, RelayError, RelayStats};
    pub use crate::server::TransportServer;

    #[cfg(feature = "udp")]
    pub use crate::udp::{ConnTracker, UdpClientRelay, UdpServerRelay};
}

// Re-export commonly used items at crate root
pub use config::{TransportConfig, TransportDescriptor};
pub use core::{ConfigError, DispatcherError, Transport, TransportError};
pub use optimizer::Optimizer;
pub use registry::Registry;
