//! Client-side UDP relay.
//!
//! Listens on a local UDP socket and carries each peer's datagrams over its
//! own transport connection. The reverse direction sends whatever comes
//! back on that connection to the peer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::tracker::{Admission, ConnTracker};
use crate::config::{DispatcherConfig, UdpFraming};
use crate::core::{DispatcherError, IoStream, Transport, SESSION_QUEUE_DEPTH};
use crate::relay::{read_frame, write_frame};

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketFate {
    /// First datagram from the peer; a dial was started and the datagram
    /// discarded.
    Dialing,
    /// Discarded because a dial is in flight or the session is backed up.
    Dropped,
    /// Queued on the peer's session.
    Forwarded,
}

/// UDP front-end for the client role.
#[derive(Debug)]
pub struct UdpClientRelay {
    socket: Arc<UdpSocket>,
    transport: Arc<dyn Transport>,
    tracker: ConnTracker,
    framing: UdpFraming,
    buffer_size: usize,
}

impl UdpClientRelay {
    /// Relay over an already bound socket.
    pub fn new(socket: UdpSocket, transport: Arc<dyn Transport>, config: &DispatcherConfig) -> Self {
        Self {
            socket: Arc::new(socket),
            transport,
            tracker: ConnTracker::new(),
            framing: config.udp_framing,
            buffer_size: config.udp_buffer_size,
        }
    }

    /// Bind `address` and build a relay on it.
    pub async fn bind(
        address: &str,
        transport: Arc<dyn Transport>,
        config: &DispatcherConfig,
    ) -> Result<Self, DispatcherError> {
        let socket = UdpSocket::bind(address)
            .await
            .map_err(|source| DispatcherError::Bind {
                address: address.to_string(),
                source,
            })?;
        Ok(Self::new(socket, transport, config))
    }

    /// Local socket address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Session state shared with the per-peer tasks.
    pub fn tracker(&self) -> &ConnTracker {
        &self.tracker
    }

    /// Receive datagrams until the socket fails.
    pub async fn run(&self) -> Result<(), DispatcherError> {
        tracing::info!(
            address = ?self.socket.local_addr().ok(),
            transport = self.transport.name(),
            framing = ?self.framing,
            "udp client relay started"
        );
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let (n, peer) = self.socket.recv_from(&mut buf).await?;
            self.handle_packet(peer, buf[..n].to_vec());
        }
    }

    /// Route one datagram from `peer`.
    pub fn handle_packet(&self, peer: SocketAddr, payload: Vec<u8>) -> PacketFate {
        let key = peer.to_string();
        match self.tracker.admit(&key) {
            Admission::Dial { session } => {
                tracing::debug!(%peer, session, "new udp peer, dialing");
                self.spawn_session(peer, key, session);
                PacketFate::Dialing
            }
            Admission::Drop => {
                tracing::trace!(%peer, "dial in flight, datagram dropped");
                PacketFate::Dropped
            }
            Admission::Forward(sender) => match sender.try_send(payload) {
                Ok(()) => PacketFate::Forwarded,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(%peer, "session queue full, datagram dropped");
                    PacketFate::Dropped
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%peer, "session closed, datagram dropped");
                    PacketFate::Dropped
                }
            },
        }
    }

    fn spawn_session(&self, peer: SocketAddr, key: String, session: u64) {
        let transport = Arc::clone(&self.transport);
        let tracker = self.tracker.clone();
        let socket = Arc::clone(&self.socket);
        let framing = self.framing;
        let buffer_size = self.buffer_size;

        tokio::spawn(async move {
            let stream = match transport.dial().await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(%peer, error = %err, "udp session dial failed");
                    tracker.remove_session(&key, session);
                    return;
                }
            };

            let (tx, rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
            if !tracker.establish(&key, session, tx) {
                return;
            }
            tracing::info!(%peer, session, transport = transport.name(), "udp session established");

            let result = pump_session(stream, rx, &socket, peer, framing, buffer_size).await;
            tracker.remove_session(&key, session);
            match result {
                Ok(()) => tracing::info!(%peer, session, "udp session closed"),
                Err(err) => tracing::warn!(%peer, session, error = %err, "udp session failed"),
            }
        });
    }
}

async fn pump_session(
    stream: IoStream,
    datagrams: mpsc::Receiver<Vec<u8>>,
    socket: &UdpSocket,
    peer: SocketAddr,
    framing: UdpFraming,
    buffer_size: usize,
) -> io::Result<()> {
    let (reader, writer) = tokio::io::split(stream);
    tokio::select! {
        result = upstream(datagrams, writer, framing) => result,
        result = downstream(reader, socket, peer, framing, buffer_size) => result,
    }
}

/// Peer datagrams into the transport stream.
async fn upstream(
    mut datagrams: mpsc::Receiver<Vec<u8>>,
    mut writer: WriteHalf<IoStream>,
    framing: UdpFraming,
) -> io::Result<()> {
    while let Some(datagram) = datagrams.recv().await {
        match framing {
            UdpFraming::Raw => {
                writer.write_all(&datagram).await?;
                writer.flush().await?;
            }
            UdpFraming::LengthPrefixed => write_frame(&mut writer, &datagram).await?,
        }
    }
    Ok(())
}

/// Transport stream back to the peer.
async fn downstream(
    mut reader: ReadHalf<IoStream>,
    socket: &UdpSocket,
    peer: SocketAddr,
    framing: UdpFraming,
    buffer_size: usize,
) -> io::Result<()> {
    match framing {
        UdpFraming::Raw => {
            let mut buf = vec![0u8; buffer_size];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    return Ok(());
                }
                socket.send_to(&buf[..n], peer).await?;
            }
        }
        UdpFraming::LengthPrefixed => {
            while let Some(datagram) = read_frame(&mut reader).await? {
                socket.send_to(&datagram, peer).await?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Listener, TransportError};
    use crate::udp::SessionPhase;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct GatedTransport {
        gate: Notify,
        dials: AtomicUsize,
        far_end: parking_lot::Mutex<Option<DuplexStream>>,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        fn name(&self) -> &str {
            "gated"
        }

        async fn dial(&self) -> Result<IoStream, TransportError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            let (near, far) = tokio::io::duplex(1024);
            *self.far_end.lock() = Some(far);
            Ok(Box::new(near))
        }

        async fn listen(&self, _address: &str) -> Result<Box<dyn Listener>, TransportError> {
            unreachable!()
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_single_dial_and_framed_forwarding() {
        let transport = Arc::new(GatedTransport::default());
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = UdpClientRelay::new(socket, transport.clone(), &DispatcherConfig::default());
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let key = peer.to_string();

        assert_eq!(relay.handle_packet(peer, b"one".to_vec()), PacketFate::Dialing);
        wait_for(|| transport.dials.load(Ordering::SeqCst) == 1).await;
        assert_eq!(relay.handle_packet(peer, b"two".to_vec()), PacketFate::Dropped);

        transport.gate.notify_one();
        wait_for(|| relay.tracker().phase(&key) == Some(SessionPhase::Established)).await;

        assert_eq!(relay.handle_packet(peer, b"three".to_vec()), PacketFate::Forwarded);
        let mut far = transport.far_end.lock().take().unwrap();
        let mut buf = [0u8; 7];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x05\x00three");
        assert_eq!(transport.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_raw_mode_round_trip() {
        let transport = Arc::new(GatedTransport::default());
        transport.gate.notify_one();
        let config = crate::config::DispatcherConfigBuilder::new()
            .udp_framing(UdpFraming::Raw)
            .build();
        let relay = UdpClientRelay::new(
            UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            transport.clone(),
            &config,
        );
        let peer_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = peer_socket.local_addr().unwrap();

        relay.handle_packet(peer, b"first".to_vec());
        let key = peer.to_string();
        wait_for(|| relay.tracker().phase(&key) == Some(SessionPhase::Established)).await;
        relay.handle_packet(peer, b"raw".to_vec());

        let mut far = transport.far_end.lock().take().unwrap();
        let mut buf = [0u8; 3];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"raw");

        far.write_all(b"reply").await.unwrap();
        let mut back = [0u8; 16];
        let (n, from) = peer_socket.recv_from(&mut back).await.unwrap();
        assert_eq!(&back[..n], b"reply");
        assert_eq!(from, relay.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_failed_dial_clears_entry() {
        #[derive(Debug)]
        struct Refused;

        #[async_trait]
        impl Transport for Refused {
            fn name(&self) -> &str {
                "refused"
            }

            async fn dial(&self) -> Result<IoStream, TransportError> {
                Err(io::Error::from(io::ErrorKind::ConnectionRefused).into())
            }

            async fn listen(&self, _address: &str) -> Result<Box<dyn Listener>, TransportError> {
                unreachable!()
            }
        }

        let relay = UdpClientRelay::new(
            UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            Arc::new(Refused),
            &DispatcherConfig::default(),
        );
        let peer: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        relay.handle_packet(peer, b"x".to_vec());
        wait_for(|| relay.tracker().is_empty()).await;
        assert_eq!(relay.handle_packet(peer, b"y".to_vec()), PacketFate::Dialing);
    }
}
