//! Server-side UDP relay.
//!
//! Each accepted transport connection carries length-prefixed datagrams for
//! one client peer. They are unframed and sent from a dedicated UDP socket
//! to the fixed destination; replies from the destination are framed back
//! into the connection.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::UdpSocket;

use crate::core::{DispatcherError, IoStream, Listener};
use crate::relay::{read_frame, write_frame};

/// Relay one transport connection to `destination` until either side ends.
///
/// A short or malformed frame on the connection ends this session only.
pub async fn serve_udp_session(
    conn: IoStream,
    destination: SocketAddr,
    buffer_size: usize,
) -> io::Result<()> {
    let local: SocketAddr = if destination.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(destination).await?;
    let (reader, writer) = tokio::io::split(conn);

    tokio::select! {
        result = inbound(reader, &socket) => result,
        result = outbound(writer, &socket, buffer_size) => result,
    }
}

/// ICMP unreachable surfaces as `ConnectionRefused` on a connected socket.
/// The destination may come back, so the session outlives it.
fn destination_unreachable(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::ConnectionRefused
}

/// Framed datagrams from the transport out to the destination.
async fn inbound(mut reader: ReadHalf<IoStream>, socket: &UdpSocket) -> io::Result<()> {
    while let Some(datagram) = read_frame(&mut reader).await? {
        match socket.send(&datagram).await {
            Ok(_) => {}
            Err(err) if destination_unreachable(&err) => {
                tracing::debug!(error = %err, "destination unreachable, datagram dropped");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Destination replies framed back into the transport.
async fn outbound(
    mut writer: WriteHalf<IoStream>,
    socket: &UdpSocket,
    buffer_size: usize,
) -> io::Result<()> {
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = match socket.recv(&mut buf).await {
            Ok(n) => n,
            Err(err) if destination_unreachable(&err) => {
                tracing::debug!(error = %err, "destination unreachable");
                continue;
            }
            Err(err) => return Err(err),
        };
        write_frame(&mut writer, &buf[..n]).await?;
    }
}

/// UDP front-end for the server role.
pub struct UdpServerRelay {
    listener: Box<dyn Listener>,
    destination: SocketAddr,
    buffer_size: usize,
}

impl UdpServerRelay {
    /// Relay connections from `listener` to `destination`.
    pub fn new(listener: Box<dyn Listener>, destination: SocketAddr, buffer_size: usize) -> Self {
        Self {
            listener,
            destination,
            buffer_size,
        }
    }

    /// Address the transport listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails.
    ///
    /// Each connection runs its transport handshake in its own task. A failed
    /// handshake is logged and drops that connection only.
    pub async fn run(&self) -> Result<(), DispatcherError> {
        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            destination = %self.destination,
            "udp server relay started"
        );
        loop {
            let incoming = self.listener.accept().await?;
            let destination = self.destination;
            let buffer_size = self.buffer_size;
            tokio::spawn(async move {
                let peer = incoming.peer_addr();
                let conn = match incoming.handshake().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::warn!(%peer, error = %err, "rejected inbound connection");
                        return;
                    }
                };
                tracing::debug!(%peer, %destination, "udp session accepted");
                match serve_udp_session(conn, destination, buffer_size).await {
                    Ok(()) => tracing::debug!(%peer, "udp session closed"),
                    Err(err) => tracing::warn!(%peer, error = %err, "udp session ended"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DEFAULT_UDP_BUFFER_SIZE;

    #[tokio::test]
    async fn test_reassembles_frames_to_destination() {
        let destination = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dest_addr = destination.local_addr().unwrap();
        let (near, mut far) = tokio::io::duplex(4096);
        let session = tokio::spawn(serve_udp_session(
            Box::new(near),
            dest_addr,
            DEFAULT_UDP_BUFFER_SIZE,
        ));

        write_frame(&mut far, b"hello").await.unwrap();
        write_frame(&mut far, b"").await.unwrap();
        let mut buf = [0u8; 64];
        let (n, from) = destination.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        let (n, _) = destination.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        destination.send_to(b"world", from).await.unwrap();
        assert_eq!(read_frame(&mut far).await.unwrap().unwrap(), b"world");

        drop(far);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_session_survives_unreachable_destination() {
        // Free a port so the first datagram draws an ICMP unreachable.
        let dest_addr = {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            socket.local_addr().unwrap()
        };
        let (near, mut far) = tokio::io::duplex(4096);
        let session = tokio::spawn(serve_udp_session(
            Box::new(near),
            dest_addr,
            DEFAULT_UDP_BUFFER_SIZE,
        ));

        write_frame(&mut far, b"lost").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        write_frame(&mut far, b"lost again").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!session.is_finished());

        // The destination comes back on the same port.
        let destination = UdpSocket::bind(dest_addr).await.unwrap();
        let mut buf = [0u8; 64];
        let (n, from) = loop {
            write_frame(&mut far, b"found").await.unwrap();
            let wait = std::time::Duration::from_millis(200);
            if let Ok(received) = tokio::time::timeout(wait, destination.recv_from(&mut buf)).await {
                break received.unwrap();
            }
        };
        assert_eq!(&buf[..n], b"found");
        destination.send_to(b"back", from).await.unwrap();
        assert_eq!(read_frame(&mut far).await.unwrap().unwrap(), b"back");

        drop(far);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_short_frame_ends_session() {
        use tokio::io::AsyncWriteExt;

        let destination = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (near, mut far) = tokio::io::duplex(64);
        far.write_all(&[10, 0, b'a', b'b']).await.unwrap();
        drop(far);

        let err = serve_udp_session(
            Box::new(near),
            destination.local_addr().unwrap(),
            DEFAULT_UDP_BUFFER_SIZE,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
