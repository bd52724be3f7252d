//! Server front-end.
//!
//! Accepts transport connections and relays each to a fixed TCP target.
//! The UDP counterpart is [`crate::udp::UdpServerRelay`].

#[allow(clippy::module_inception)]
mod server;

pub use server::*;
