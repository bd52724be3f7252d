//! Length-prefixed datagram framing.
//!
//! ```text
//! +----------------+----------------------+
//! | length (u16le) | payload (length B)   |
//! +----------------+----------------------+
//! ```
//!
//! Used to carry UDP datagrams over a transport byte stream without losing
//! their boundaries.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::{FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD};

/// Framing failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Payload does not fit a 16-bit length.
    #[error("payload of {0} bytes exceeds the frame limit")]
    TooLarge(usize),

    /// Buffer ended before the frame did.
    #[error("truncated frame: need {expected} bytes, have {available}")]
    Truncated {
        /// Bytes the frame needs.
        expected: usize,
        /// Bytes actually present.
        available: usize,
    },
}

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> Self {
        let kind = match err {
            FrameError::TooLarge(_) => io::ErrorKind::InvalidInput,
            FrameError::Truncated { .. } => io::ErrorKind::UnexpectedEof,
        };
        io::Error::new(kind, err)
    }
}

fn header(len: usize) -> Result<[u8; FRAME_HEADER_SIZE], FrameError> {
    if len > MAX_FRAME_PAYLOAD {
        return Err(FrameError::TooLarge(len));
    }
    Ok((len as u16).to_le_bytes())
}

/// Frame one payload.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header(payload.len())?);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode the frame at the start of `buf`.
///
/// Returns the payload and the number of bytes the frame occupied.
pub fn decode_frame(buf: &[u8]) -> Result<(&[u8], usize), FrameError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::Truncated {
            expected: FRAME_HEADER_SIZE,
            available: buf.len(),
        });
    }
    let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    let end = FRAME_HEADER_SIZE + len;
    if buf.len() < end {
        return Err(FrameError::Truncated {
            expected: end,
            available: buf.len(),
        });
    }
    Ok((&buf[FRAME_HEADER_SIZE..end], end))
}

/// Write one framed payload.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Read one framed payload.
///
/// Returns `None` on end of stream at a frame boundary. End of stream
/// inside a header or payload is an `UnexpectedEof` error.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    if reader.read(&mut header[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..]).await?;

    let len = u16::from_le_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
