//! Per-transport obfuscation layer.
//!
//! A [`Shaper`] takes a freshly connected byte stream and returns the stream
//! the application should use. The registry installs one per constructed
//! transport; without an embedder-supplied shaper every kind uses
//! [`PassThrough`].

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{DispatcherConfig, TransportConfig};
use crate::core::{IoStream, TransportError};

/// Opaque obfuscation layer applied to raw connections.
#[async_trait]
pub trait Shaper: Send + Sync + fmt::Debug {
    /// Wrap an outbound connection (client side of the handshake).
    async fn wrap_client(&self, stream: IoStream) -> io::Result<IoStream>;

    /// Wrap an accepted connection (server side of the handshake).
    async fn wrap_server(&self, stream: IoStream) -> io::Result<IoStream>;
}

/// Builds the shaper for one transport from its typed options.
///
/// The dispatcher config is passed along so shapers can keep persistent
/// state under [`DispatcherConfig::state_dir_for`].
pub type ShaperFactory = Arc<
    dyn Fn(&TransportConfig, &DispatcherConfig) -> Result<Arc<dyn Shaper>, TransportError>
        + Send
        + Sync,
>;

/// Shaper that leaves the stream untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl Shaper for PassThrough {
    async fn wrap_client(&self, stream: IoStream) -> io::Result<IoStream> {
        Ok(stream)
    }

    async fn wrap_server(&self, stream: IoStream) -> io::Result<IoStream> {
        Ok(stream)
    }
}
