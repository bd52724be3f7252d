//! Transport server front-end.
//!
//! Accepts connections on a transport listener and relays each one to a
//! fixed target reached through the dispatcher's dialer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::core::{Dialer, DispatcherError, Incoming, Listener, Transport, TransportError};
use crate::relay::relay_with_stats;

/// Server side of a transport.
pub struct TransportServer {
    listener: Box<dyn Listener>,
    target: String,
    dialer: Arc<dyn Dialer>,
}

impl TransportServer {
    /// Listen with `transport` on `bind_addr`, relaying to `target`.
    pub async fn bind(
        transport: &dyn Transport,
        bind_addr: &str,
        target: impl Into<String>,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self, DispatcherError> {
        let listener = transport.listen(bind_addr).await.map_err(|err| match err {
            TransportError::Io(source) => DispatcherError::Bind {
                address: bind_addr.to_string(),
                source,
            },
            other => other.into(),
        })?;
        Ok(Self::new(listener, target, dialer))
    }

    /// Use an existing transport listener.
    pub fn new(listener: Box<dyn Listener>, target: impl Into<String>, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            listener,
            target: target.into(),
            dialer,
        }
    }

    /// Address the transport listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Fixed relay target.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Accept and relay connections until the listener fails.
    ///
    /// Each connection runs its transport handshake in its own task. A failed
    /// handshake is logged and drops that connection only.
    pub async fn run(&self) -> Result<(), DispatcherError> {
        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            target = %self.target,
            "server listening"
        );
        loop {
            let incoming = self.listener.accept().await?;
            let target = self.target.clone();
            let dialer = Arc::clone(&self.dialer);
            tokio::spawn(handle_connection(incoming, target, dialer));
        }
    }
}

async fn handle_connection(incoming: Incoming, target: String, dialer: Arc<dyn Dialer>) {
    let peer = incoming.peer_addr();
    let conn = match incoming.handshake().await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!(%peer, error = %err, "rejected inbound connection");
            return;
        }
    };
    let upstream = match dialer.dial(&target).await {
        Ok(upstream) => upstream,
        Err(err) => {
            tracing::warn!(%peer, %target, error = %err, "target dial failed");
            return;
        }
    };
    tracing::debug!(%peer, %target, "relaying connection");

    match relay_with_stats(conn, upstream).await {
        Ok(stats) => tracing::debug!(
            %peer,
            received = stats.a_to_b,
            sent = stats.b_to_a,
            "connection closed"
        ),
        Err(err) => tracing::info!(%peer, error = %err, "connection ended with error"),
    }
}
