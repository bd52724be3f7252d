//! Outbound dialers.
//!
//! Every transport connects out through one [`Dialer`](crate::core::Dialer):
//! either [`DirectDialer`] or a [`ProxyDialer`] tunnelling through an HTTP,
//! SOCKS4a or SOCKS5 upstream proxy.

mod direct;
mod proxy;

use std::sync::Arc;

pub use direct::DirectDialer;
pub use proxy::{ProxyCredentials, ProxyDialer, ProxyKind, ProxySpec, split_host_port};

use crate::config::DispatcherConfig;
use crate::core::{Dialer, ProxyError};

/// Build the dialer selected by `config.outbound_proxy`.
///
/// Every outbound connection, proxy handshake included, is bounded by
/// `config.dial_timeout`.
pub fn dialer_from_config(config: &DispatcherConfig) -> Result<Arc<dyn Dialer>, ProxyError> {
    match &config.outbound_proxy {
        None => Ok(Arc::new(DirectDialer::with_timeout(config.dial_timeout))),
        Some(url) => {
            let spec = ProxySpec::from_url(url)?;
            tracing::info!(proxy = %spec, "routing outbound connections through upstream proxy");
            Ok(Arc::new(ProxyDialer::with_timeout(spec, config.dial_timeout)))
        }
    }
}
