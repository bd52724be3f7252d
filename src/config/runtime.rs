//! Process-level dispatcher settings.
//!
//! State directory, upstream proxy and timing knobs live here and are handed
//! to whoever needs them instead of being read from globals.

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use super::descriptor::TransportKind;
use crate::core::{ProxyError, DEFAULT_DIAL_TIMEOUT, DEFAULT_UDP_BUFFER_SIZE};

/// How datagrams are carried over a transport byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UdpFraming {
    /// Write payloads as they are; boundaries are not preserved.
    Raw,
    /// Prefix each payload with its length as a little-endian u16.
    #[default]
    LengthPrefixed,
}

impl FromStr for UdpFraming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(UdpFraming::Raw),
            "length-prefixed" | "lengthPrefixed" => Ok(UdpFraming::LengthPrefixed),
            other => Err(format!("unknown UDP framing: {other}")),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Root directory for per-transport persistent state.
    pub state_dir: PathBuf,

    /// Upstream proxy every outbound connection goes through.
    pub outbound_proxy: Option<Url>,

    /// Upper bound on a single optimizer dial.
    pub dial_timeout: Duration,

    /// Framing used by the UDP relays.
    pub udp_framing: UdpFraming,

    /// Receive buffer for UDP sockets.
    pub udp_buffer_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("state"),
            outbound_proxy: None,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            udp_framing: UdpFraming::default(),
            udp_buffer_size: DEFAULT_UDP_BUFFER_SIZE,
        }
    }
}

impl DispatcherConfig {
    /// State directory reserved for one transport.
    pub fn state_dir_for(&self, kind: TransportKind) -> PathBuf {
        self.state_dir.join(kind.name())
    }

    /// Create the state directory if it does not exist yet.
    pub fn ensure_state_dir(&self) -> io::Result<&Path> {
        std::fs::create_dir_all(&self.state_dir)?;
        Ok(&self.state_dir)
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Default)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state directory.
    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.state_dir = dir.into();
        self
    }

    /// Route outbound connections through a proxy URL.
    pub fn outbound_proxy(mut self, url: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(url).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
        self.config.outbound_proxy = Some(url);
        Ok(self)
    }

    /// Set the optimizer dial timeout.
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.config.dial_timeout = timeout;
        self
    }

    /// Set the UDP framing mode.
    pub fn udp_framing(mut self, framing: UdpFraming) -> Self {
        self.config.udp_framing = framing;
        self
    }

    /// Set the UDP receive buffer size.
    pub fn udp_buffer_size(mut self, size: usize) -> Self {
        self.config.udp_buffer_size = size;
        self
    }

    /// Finish.
    pub fn build(self) -> DispatcherConfig {
        self.config
    }
}
