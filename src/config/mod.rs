//! Configuration for the dispatcher.
//!
//! - [`descriptor`]: typed transport options decoded from JSON
//! - [`runtime`]: process-level settings passed explicitly to the registry
//!   and the front-ends

pub mod descriptor;
pub mod runtime;
mod value;

pub use descriptor::{
    decode_descriptor, decode_descriptor_str, decode_transport_config, DustConfig, MeekliteConfig,
    Obfs4Config, OptimizerConfig, ReplicantClientConfig, ReplicantConfig, ReplicantServerConfig,
    ShadowConfig, StrategyKind, TransportConfig, TransportDescriptor, TransportKind,
};
pub use runtime::{DispatcherConfig, DispatcherConfigBuilder, UdpFraming};
