//! Transport factory registry.
//!
//! Turns a decoded [`TransportDescriptor`] into a ready [`Transport`]. The
//! registry owns the outbound [`Dialer`] and the [`DispatcherConfig`] and
//! threads both into every transport it builds, recursing through optimizer
//! candidates. Construction never performs network I/O.

mod shaper;
mod stream;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use shaper::{PassThrough, Shaper, ShaperFactory};
pub use stream::{StreamListener, StreamTransport};

use crate::config::{
    decode_descriptor_str, DispatcherConfig, TransportConfig, TransportDescriptor, TransportKind,
};
use crate::core::{ConfigError, Dialer, Transport, TransportError, MAX_NESTING_DEPTH};
use crate::dialer::dialer_from_config;
use crate::optimizer::Optimizer;

/// Builds transports from descriptors.
#[derive(Clone)]
pub struct Registry {
    dialer: Arc<dyn Dialer>,
    config: DispatcherConfig,
    shapers: HashMap<TransportKind, ShaperFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shaped: Vec<_> = self.shapers.keys().map(|kind| kind.name()).collect();
        shaped.sort_unstable();
        f.debug_struct("Registry")
            .field("dialer", &self.dialer)
            .field("config", &self.config)
            .field("shapers", &shaped)
            .finish()
    }
}

impl Registry {
    /// Registry using an explicit dialer.
    pub fn new(dialer: Arc<dyn Dialer>, config: DispatcherConfig) -> Self {
        Self {
            dialer,
            config,
            shapers: HashMap::new(),
        }
    }

    /// Registry whose dialer follows `config.outbound_proxy`.
    pub fn with_config(config: DispatcherConfig) -> Result<Self, TransportError> {
        let dialer = dialer_from_config(&config)?;
        Ok(Self::new(dialer, config))
    }

    /// Install the obfuscation layer for `kind`, replacing any earlier one.
    ///
    /// The optimizer has no stream of its own, so a shaper registered for
    /// [`TransportKind::Optimizer`] is never used.
    pub fn register_shaper<F>(&mut self, kind: TransportKind, factory: F)
    where
        F: Fn(&TransportConfig, &DispatcherConfig) -> Result<Arc<dyn Shaper>, TransportError>
            + Send
            + Sync
            + 'static,
    {
        self.shapers.insert(kind, Arc::new(factory));
    }

    /// Outbound dialer shared by every constructed transport.
    pub fn dialer(&self) -> &Arc<dyn Dialer> {
        &self.dialer
    }

    /// Dispatcher settings.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Build the transport a descriptor describes.
    pub fn construct(
        &self,
        descriptor: &TransportDescriptor,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self.construct_at(descriptor, 0)
    }

    /// Decode JSON options and build the transport in one step.
    pub fn construct_json(&self, options: &str) -> Result<Arc<dyn Transport>, TransportError> {
        let descriptor = decode_descriptor_str(options)?;
        self.construct(&descriptor)
    }

    fn construct_at(
        &self,
        descriptor: &TransportDescriptor,
        depth: usize,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let kind = descriptor
            .name
            .parse::<TransportKind>()
            .map_err(|_| TransportError::UnknownTransport(descriptor.name.clone()))?;
        if kind != descriptor.config.kind() {
            return Err(ConfigError::KindMismatch {
                name: descriptor.name.clone(),
                kind: descriptor.config.kind().name(),
            }
            .into());
        }

        match &descriptor.config {
            TransportConfig::Optimizer(options) => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(ConfigError::NestingTooDeep {
                        max: MAX_NESTING_DEPTH,
                    }
                    .into());
                }
                if options.transports.is_empty() {
                    return Err(ConfigError::EmptyOptimizer.into());
                }
                let candidates = options
                    .transports
                    .iter()
                    .map(|nested| self.construct_at(nested, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::debug!(
                    strategy = %options.strategy,
                    candidates = candidates.len(),
                    "optimizer constructed"
                );
                Ok(Arc::new(Optimizer::new(
                    candidates,
                    options.strategy,
                    self.config.dial_timeout,
                )))
            }
            TransportConfig::Obfs2
            | TransportConfig::Obfs4(_)
            | TransportConfig::Shadow(_)
            | TransportConfig::Meeklite(_)
            | TransportConfig::Dust(_)
            | TransportConfig::Replicant(_) => {
                let shaper = match self.shapers.get(&kind) {
                    Some(factory) => factory(&descriptor.config, &self.config)?,
                    None => Arc::new(PassThrough),
                };
                tracing::debug!(transport = %kind, address = %descriptor.address, "transport constructed");
                Ok(Arc::new(StreamTransport::new(
                    kind,
                    descriptor.address.clone(),
                    Arc::clone(&self.dialer),
                    shaper,
                )))
            }
        }
    }
}
