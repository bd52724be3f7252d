//! Client front-end.
//!
//! Accepts local TCP connections and carries each over a freshly dialed
//! transport. The UDP counterpart is [`crate::udp::UdpClientRelay`].

#[allow(clippy::module_inception)]
mod client;

pub use client::*;
