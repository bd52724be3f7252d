//! Bidirectional copy loop.
//!
//! Two pumps run concurrently, `a -> b` and `b -> a`. Whichever ends first
//! (end of stream or error) shuts down its destination and cancels the
//! other, which then shuts down its own destination and ends quietly. The
//! relay waits for both and reports the first error; end of stream is not
//! an error.

use std::fmt;
use std::io;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::core::RELAY_BUFFER_SIZE;

/// Direction of one pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the first stream to the second.
    AToB,
    /// From the second stream to the first.
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => f.write_str("a->b"),
            Direction::BToA => f.write_str("b->a"),
        }
    }
}

/// First failure observed by a relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A read or write failed.
    #[error("relay {direction} failed: {source}")]
    Io {
        /// Pump that failed.
        direction: Direction,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

impl RelayError {
    /// Pump that failed.
    pub fn direction(&self) -> Direction {
        match self {
            RelayError::Io { direction, .. } => *direction,
        }
    }

    /// Kind of the underlying I/O error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            RelayError::Io { source, .. } => source.kind(),
        }
    }
}

/// Bytes moved by a relay that ended cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the first stream to the second.
    pub a_to_b: u64,
    /// Bytes copied from the second stream to the first.
    pub b_to_a: u64,
}

/// Relay between two established streams until both directions are done.
pub async fn relay<A, B>(a: A, b: B) -> Result<(), RelayError>
where
    A: AsyncRead + AsyncWrite + Unpin + Send,
    B: AsyncRead + AsyncWrite + Unpin + Send,
{
    relay_with_stats(a, b).await.map(|_| ())
}

/// [`relay`], also reporting how many bytes went each way.
pub async fn relay_with_stats<A, B>(a: A, b: B) -> Result<RelayStats, RelayError>
where
    A: AsyncRead + AsyncWrite + Unpin + Send,
    B: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);
    let cancel = CancellationToken::new();
    let first_error = Mutex::new(None);

    let (a_to_b, b_to_a) = tokio::join!(
        pump(a_read, b_write, Direction::AToB, &cancel, &first_error),
        pump(b_read, a_write, Direction::BToA, &cancel, &first_error),
    );

    match first_error.into_inner() {
        Some(err) => Err(err),
        None => Ok(RelayStats { a_to_b, b_to_a }),
    }
}

async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    cancel: &CancellationToken,
    first_error: &Mutex<Option<RelayError>>,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut copied = 0u64;

    let outcome = tokio::select! {
        _ = cancel.cancelled() => Ok(()),
        result = copy(&mut reader, &mut writer, &mut buf, &mut copied) => result,
    };
    let _ = writer.shutdown().await;

    match outcome {
        Ok(()) => tracing::trace!(%direction, bytes = copied, "relay direction finished"),
        Err(source) => {
            tracing::debug!(%direction, bytes = copied, error = %source, "relay direction failed");
            let mut slot = first_error.lock();
            if slot.is_none() {
                *slot = Some(RelayError::Io { direction, source });
            }
        }
    }
    cancel.cancel();
    copied
}

async fn copy<R, W>(
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    copied: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let n = reader.read(buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, ReadBuf};

    struct FailingStream;

    impl AsyncRead for FailingStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::ConnectionReset)))
        }
    }

    impl AsyncWrite for FailingStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_bytes_flow_both_ways() {
        let (mut a_outer, a_inner) = duplex(64);
        let (mut b_outer, b_inner) = duplex(64);
        let relay = tokio::spawn(relay_with_stats(a_inner, b_inner));

        a_outer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        b_outer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        b_outer.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        a_outer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(a_outer);
        let stats = relay.await.unwrap().unwrap();
        assert_eq!(stats, RelayStats { a_to_b: 4, b_to_a: 5 });
    }

    #[tokio::test]
    async fn test_close_ends_both_directions_cleanly() {
        let (a_outer, a_inner) = duplex(64);
        let (mut b_outer, b_inner) = duplex(64);
        let relay = tokio::spawn(relay(a_inner, b_inner));

        drop(a_outer);
        relay.await.unwrap().unwrap();

        // The far side sees end of stream once the relay has shut it down.
        let mut rest = Vec::new();
        b_outer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_first_error_is_reported() {
        let (_b_outer, b_inner) = duplex(64);
        let err = relay(FailingStream, b_inner).await.unwrap_err();
        assert_eq!(err.direction(), Direction::AToB);
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
