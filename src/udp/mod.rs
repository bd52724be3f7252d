//! UDP session tracker and framing relays.
//!
//! The client relay demultiplexes datagrams by peer address onto lazily
//! dialed transport connections; the server relay turns framed datagrams
//! from a transport connection back into UDP to a fixed destination.

mod client;
mod server;
mod tracker;

pub use client::{PacketFate, UdpClientRelay};
pub use server::{serve_udp_session, UdpServerRelay};
pub use tracker::{Admission, ConnTracker, SessionPhase, SessionSender};
