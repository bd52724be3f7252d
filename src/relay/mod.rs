//! Byte relays.
//!
//! - [`copy`]: full-duplex copy loop between two established streams
//! - [`framing`]: length-prefixed framing for datagrams over a stream

pub mod copy;
pub mod framing;

pub use copy::{relay, relay_with_stats, Direction, RelayError, RelayStats};
pub use framing::{decode_frame, encode_frame, read_frame, write_frame, FrameError};
