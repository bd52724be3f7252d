//! Error types for the dispatcher.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while decoding transport options.
///
/// These are always detected before any network activity and are never
/// worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field is absent.
    #[error("missing field `{field}` in {transport} options")]
    MissingField {
        /// Field name as it appears in JSON.
        field: String,
        /// Transport being decoded.
        transport: String,
    },

    /// A field has a JSON type the transport does not accept.
    #[error("unsupported type for field `{field}` in {transport} options")]
    UnsupportedType {
        /// Field name as it appears in JSON.
        field: String,
        /// Transport being decoded.
        transport: String,
    },

    /// A hex field failed strict decoding.
    #[error("invalid encoding for field `{field}` in {transport} options")]
    InvalidEncoding {
        /// Field name as it appears in JSON.
        field: String,
        /// Transport being decoded.
        transport: String,
    },

    /// A field has the right type but an unacceptable value.
    #[error("invalid value for field `{field}` in {transport} options: {reason}")]
    InvalidValue {
        /// Field name as it appears in JSON.
        field: String,
        /// Transport being decoded.
        transport: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No transport is registered under this name.
    #[error("unknown transport: {0}")]
    UnknownTransport(String),

    /// The optimizer strategy name is not recognized.
    #[error("unknown optimizer strategy: {0}")]
    UnknownStrategy(String),

    /// An optimizer listed no transports.
    #[error("optimizer lists no transports")]
    EmptyOptimizer,

    /// Optimizers are nested deeper than the decoder allows.
    #[error("optimizer nesting exceeds {max} levels")]
    NestingTooDeep {
        /// Maximum accepted depth.
        max: usize,
    },

    /// A descriptor's name disagrees with the kind of its decoded options.
    #[error("descriptor named {name} carries {kind} options")]
    KindMismatch {
        /// Name carried by the descriptor.
        name: String,
        /// Kind of the options it carries.
        kind: &'static str,
    },

    /// The options blob is not valid JSON.
    #[error("invalid JSON options: {0}")]
    Json(String),
}

impl ConfigError {
    pub(crate) fn missing(field: &str, transport: &str) -> Self {
        ConfigError::MissingField {
            field: field.to_string(),
            transport: transport.to_string(),
        }
    }

    pub(crate) fn unsupported(field: &str, transport: &str) -> Self {
        ConfigError::UnsupportedType {
            field: field.to_string(),
            transport: transport.to_string(),
        }
    }

    pub(crate) fn encoding(field: &str, transport: &str) -> Self {
        ConfigError::InvalidEncoding {
            field: field.to_string(),
            transport: transport.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, transport: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            transport: transport.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors in upstream proxy configuration or negotiation.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The proxy URL does not parse.
    #[error("invalid proxy URL: {0}")]
    InvalidUrl(String),

    /// Only `http`, `socks4a` and `socks5` are supported.
    #[error("unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),

    /// The URL has no host.
    #[error("proxy URL has no host")]
    MissingHost,

    /// The URL has no port and the scheme has no default.
    #[error("proxy URL has no port")]
    MissingPort,

    /// SOCKS4a carries a user id only.
    #[error("socks4a proxy URL has a password but no username")]
    PasswordWithoutUsername,

    /// SOCKS5 username/password authentication constraints violated.
    #[error("socks5 proxy credentials invalid: {0}")]
    InvalidCredentials(&'static str),

    /// The dial target is not `host:port`.
    #[error("invalid target address: {0}")]
    InvalidTarget(String),

    /// The proxy refused or garbled the handshake.
    #[error("proxy handshake failed: {0}")]
    Handshake(String),
}

/// Errors from constructing or using a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Options were rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Upstream proxy failure.
    #[error("proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// Socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The registry has no constructor for this name.
    #[error("unknown transport: {0}")]
    UnknownTransport(String),

    /// The transport does not support this operation in this role.
    #[error("{transport} does not support {operation}")]
    Unsupported {
        /// Operation attempted (`dial` or `listen`).
        operation: &'static str,
        /// Transport name.
        transport: String,
    },

    /// The transport's obfuscation layer failed on a fresh connection.
    #[error("{transport} handshake failed: {source}")]
    Shaper {
        /// Transport name.
        transport: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// An optimizer had nothing to try.
    #[error("no candidate transports to dial")]
    NoCandidates,

    /// Every candidate an optimizer attempted failed.
    #[error("all {attempts} attempted transports failed, last error: {last}")]
    AllCandidatesFailed {
        /// Number of dial attempts made.
        attempts: usize,
        /// Error of the final attempt.
        #[source]
        last: Box<TransportError>,
    },

    /// The whole dial took longer than allowed.
    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),
}

impl TransportError {
    /// Check if this error came from configuration rather than the network.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TransportError::Config(_)
                | TransportError::UnknownTransport(_)
                | TransportError::Unsupported { .. }
        ) || matches!(
            self,
            TransportError::Proxy(
                ProxyError::InvalidUrl(_)
                    | ProxyError::UnsupportedScheme(_)
                    | ProxyError::MissingHost
                    | ProxyError::MissingPort
                    | ProxyError::PasswordWithoutUsername
                    | ProxyError::InvalidCredentials(_)
            )
        )
    }

    /// Check if another dial attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_)
                | TransportError::Shaper { .. }
                | TransportError::DialTimeout(_)
                | TransportError::AllCandidatesFailed { .. }
                | TransportError::Proxy(ProxyError::Handshake(_))
        )
    }
}

/// Top-level errors from the client and server front-ends.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Options were rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport construction or listen failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Could not bind a local socket.
    #[error("bind to {address} failed: {source}")]
    Bind {
        /// Requested bind address.
        address: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
