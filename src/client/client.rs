//! Transparent TCP client front-end.
//!
//! Every connection accepted on the local port gets its own transport dial,
//! and the two streams are relayed until either side closes.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::core::{DispatcherError, Transport};
use crate::relay::relay_with_stats;

/// Local TCP listener feeding a client transport.
#[derive(Debug)]
pub struct TransparentClient {
    listener: TcpListener,
    transport: Arc<dyn Transport>,
}

impl TransparentClient {
    /// Bind the local listener.
    pub async fn bind(address: &str, transport: Arc<dyn Transport>) -> Result<Self, DispatcherError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| DispatcherError::Bind {
                address: address.to_string(),
                source,
            })?;
        Ok(Self::new(listener, transport))
    }

    /// Use an already bound listener.
    pub fn new(listener: TcpListener, transport: Arc<dyn Transport>) -> Self {
        Self {
            listener,
            transport,
        }
    }

    /// Local listening address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and relay connections until the listener fails.
    pub async fn run(&self) -> Result<(), DispatcherError> {
        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            transport = self.transport.name(),
            "client listening"
        );
        loop {
            let (local, peer) = self.listener.accept().await?;
            let transport = Arc::clone(&self.transport);
            tokio::spawn(handle_connection(local, peer, transport));
        }
    }
}

async fn handle_connection(local: TcpStream, peer: SocketAddr, transport: Arc<dyn Transport>) {
    let _ = local.set_nodelay(true);
    let remote = match transport.dial().await {
        Ok(remote) => remote,
        Err(err) => {
            tracing::warn!(%peer, transport = transport.name(), error = %err, "transport dial failed");
            return;
        }
    };
    tracing::debug!(%peer, transport = transport.name(), "relaying connection");

    match relay_with_stats(local, remote).await {
        Ok(stats) => tracing::debug!(
            %peer,
            sent = stats.a_to_b,
            received = stats.b_to_a,
            "connection closed"
        ),
        Err(err) => tracing::info!(%peer, error = %err, "connection ended with error"),
    }
}
