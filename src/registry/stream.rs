//! Stream transports: a dialer plus a shaper.
//!
//! Every built-in kind except the optimizer is a [`StreamTransport`]. Dialing
//! connects through the shared dialer and runs the client side of the
//! shaper. Listening binds TCP; each accepted connection carries the server
//! side of the shaper as its pending handshake.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;

use super::shaper::Shaper;
use crate::config::TransportKind;
use crate::core::{Dialer, Incoming, IoStream, Listener, Transport, TransportError};

/// Built-in transport over TCP.
#[derive(Debug, Clone)]
pub struct StreamTransport {
    kind: TransportKind,
    address: String,
    dialer: Arc<dyn Dialer>,
    shaper: Arc<dyn Shaper>,
}

impl StreamTransport {
    /// Assemble a transport. Does not touch the network.
    pub fn new(
        kind: TransportKind,
        address: impl Into<String>,
        dialer: Arc<dyn Dialer>,
        shaper: Arc<dyn Shaper>,
    ) -> Self {
        Self {
            kind,
            address: address.into(),
            dialer,
            shaper,
        }
    }

    /// Transport kind.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Configured dial target.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Transport for StreamTransport {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn dial(&self) -> Result<IoStream, TransportError> {
        let raw = self.dialer.dial(&self.address).await?;
        let stream = self
            .shaper
            .wrap_client(raw)
            .await
            .map_err(|source| TransportError::Shaper {
                transport: self.kind.name().to_string(),
                source,
            })?;
        tracing::debug!(transport = %self.kind, address = %self.address, "transport dialed");
        Ok(stream)
    }

    async fn listen(&self, address: &str) -> Result<Box<dyn Listener>, TransportError> {
        let listener = TcpListener::bind(address).await?;
        tracing::debug!(
            transport = %self.kind,
            address = ?listener.local_addr().ok(),
            "transport listening"
        );
        Ok(Box::new(StreamListener {
            kind: self.kind,
            listener,
            shaper: Arc::clone(&self.shaper),
        }))
    }
}

/// Listener returned by [`StreamTransport::listen`].
#[derive(Debug)]
pub struct StreamListener {
    kind: TransportKind,
    listener: TcpListener,
    shaper: Arc<dyn Shaper>,
}

#[async_trait]
impl Listener for StreamListener {
    async fn accept(&self) -> Result<Incoming, TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        let shaper = Arc::clone(&self.shaper);
        let kind = self.kind;
        Ok(Incoming::new(peer, async move {
            shaper
                .wrap_server(Box::new(stream))
                .await
                .map_err(|source| TransportError::Shaper {
                    transport: kind.name().to_string(),
                    source,
                })
        }))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::DirectDialer;
    use crate::registry::PassThrough;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Debug)]
    struct Refuse;

    #[async_trait]
    impl Shaper for Refuse {
        async fn wrap_client(&self, _stream: IoStream) -> io::Result<IoStream> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad handshake"))
        }

        async fn wrap_server(&self, _stream: IoStream) -> io::Result<IoStream> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad handshake"))
        }
    }

    #[tokio::test]
    async fn test_listen_then_dial() {
        let server = StreamTransport::new(
            TransportKind::Obfs4,
            "",
            Arc::new(DirectDialer::new()),
            Arc::new(PassThrough),
        );
        let listener = server.listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = StreamTransport::new(
            TransportKind::Obfs4,
            addr.to_string(),
            Arc::new(DirectDialer::new()),
            Arc::new(PassThrough),
        );
        let (dialed, accepted) = tokio::join!(client.dial(), listener.accept());
        let mut dialed = dialed.unwrap();
        let incoming = accepted.unwrap();
        assert_eq!(incoming.peer_addr().ip(), addr.ip());
        let mut accepted = incoming.handshake().await.unwrap();

        dialed.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(client.name(), "obfs4");
    }

    #[tokio::test]
    async fn test_shaper_failure_names_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let client = StreamTransport::new(
            TransportKind::Shadow,
            addr.to_string(),
            Arc::new(DirectDialer::new()),
            Arc::new(Refuse),
        );
        match client.dial().await.err() {
            Some(TransportError::Shaper { transport, .. }) => assert_eq!(transport, "shadow"),
            other => panic!("expected shaper error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_accept_defers_server_handshake() {
        let server = StreamTransport::new(
            TransportKind::Meeklite,
            "",
            Arc::new(DirectDialer::new()),
            Arc::new(Refuse),
        );
        let listener = server.listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = tokio::net::TcpStream::connect(addr).await.unwrap();

        // Accept succeeds; the shaper only runs when the handshake is awaited.
        let incoming = listener.accept().await.unwrap();
        match incoming.handshake().await.err() {
            Some(TransportError::Shaper { transport, .. }) => assert_eq!(transport, "meeklite"),
            other => panic!("expected shaper error, got {other:?}"),
        }
    }
}
