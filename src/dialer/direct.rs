//! Direct TCP dialer.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::core::{Dialer, IoStream, TransportError};

/// Connects straight to the target over TCP.
#[derive(Debug, Clone, Default)]
pub struct DirectDialer {
    connect_timeout: Option<Duration>,
}

impl DirectDialer {
    /// Dialer without a connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dialer that gives up on a TCP connect after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
        }
    }

    /// Connect and return the concrete TCP stream.
    pub async fn connect(&self, address: &str) -> Result<TcpStream, TransportError> {
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(address))
                .await
                .map_err(|_| TransportError::DialTimeout(limit))??,
            None => TcpStream::connect(address).await?,
        };
        stream.set_nodelay(true)?;
        tracing::trace!(%address, "tcp connected");
        Ok(stream)
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, address: &str) -> Result<IoStream, TransportError> {
        Ok(Box::new(self.connect(address).await?))
    }
}
