//! Capability traits shared by transports, dialers and listeners.
//!
//! A [`Transport`] is a constructed, ready-to-use handle: client code calls
//! [`Transport::dial`], server code calls [`Transport::listen`] and then
//! [`Listener::accept`] in a loop, finishing each [`Incoming`] handshake in
//! that connection's own task. Outbound connections are always made
//! through a [`Dialer`], so an upstream proxy setting applies uniformly.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::error::TransportError;

/// Anything that can be read from and written to asynchronously.
pub trait AsyncReadWrite: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncReadWrite for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased full-duplex byte stream.
///
/// Transports hand these out regardless of what sits underneath (plain TCP,
/// a proxied TCP stream, an obfuscation wrapper, an in-memory pipe).
pub type IoStream = Box<dyn AsyncReadWrite + 'static>;

/// A pluggable transport.
///
/// Construction never touches the network; only `dial` and `listen` do.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Transport name as used in options (e.g. `obfs4`).
    fn name(&self) -> &str;

    /// Open an outbound connection to the transport's configured address.
    async fn dial(&self) -> Result<IoStream, TransportError>;

    /// Bind a listener that yields transport-unwrapped connections.
    async fn listen(&self, address: &str) -> Result<Box<dyn Listener>, TransportError>;
}

type PendingHandshake = Pin<Box<dyn Future<Output = Result<IoStream, TransportError>> + Send>>;

/// Accepted connection whose server-side transport handshake has not run.
///
/// Nothing is read from the peer until [`Incoming::handshake`] is awaited,
/// so accept loops hand this to the per-connection task.
pub struct Incoming {
    peer: SocketAddr,
    handshake: PendingHandshake,
}

impl Incoming {
    /// Connection from `peer` that becomes usable once `handshake` resolves.
    pub fn new<F>(peer: SocketAddr, handshake: F) -> Self
    where
        F: Future<Output = Result<IoStream, TransportError>> + Send + 'static,
    {
        Self {
            peer,
            handshake: Box::pin(handshake),
        }
    }

    /// Remote address of the connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Run the server side of the transport handshake.
    pub async fn handshake(self) -> Result<IoStream, TransportError> {
        self.handshake.await
    }
}

impl fmt::Debug for Incoming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incoming").field("peer", &self.peer).finish_non_exhaustive()
    }
}

/// Server-side accept capability returned by [`Transport::listen`].
#[async_trait]
pub trait Listener: Send + Sync {
    /// Wait for the next inbound connection.
    ///
    /// Returns as soon as the peer is connected; the transport handshake is
    /// deferred to [`Incoming::handshake`].
    async fn accept(&self) -> Result<Incoming, TransportError>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Outbound connection capability, direct or through an upstream proxy.
#[async_trait]
pub trait Dialer: Send + Sync + fmt::Debug {
    /// Connect to `address` (`host:port`).
    async fn dial(&self, address: &str) -> Result<IoStream, TransportError>;
}
