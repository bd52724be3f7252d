//! Typed transport descriptors and the JSON decoder that produces them.
//!
//! Options arrive as untyped JSON. The decoder dispatches on the transport
//! name to a per-transport schema and yields a [`TransportConfig`] variant,
//! so everything downstream matches exhaustively on a closed set.
//!
//! Two top-level shapes are accepted:
//!
//! ```text
//! { "name": "obfs4", "address": "192.0.2.1:443", "config": { "cert": "...", "iatMode": 0 } }
//! { "strategy": "first", "transports": [ { "name": ..., "address": ..., "config": ... }, ... ] }
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::value::Fields;
use crate::core::{
    ConfigError, KEY_SIZE, MAX_NESTING_DEPTH, STRATEGY_FIRST, STRATEGY_MINIMIZE_DIAL_DURATION,
    STRATEGY_RANDOM, STRATEGY_ROTATE, STRATEGY_TRACK, TRANSPORT_DUST, TRANSPORT_MEEKLITE,
    TRANSPORT_OBFS2, TRANSPORT_OBFS4, TRANSPORT_OPTIMIZER, TRANSPORT_REPLICANT, TRANSPORT_SHADOW,
};

/// The closed set of transports the registry can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// obfs2.
    Obfs2,
    /// obfs4.
    Obfs4,
    /// Shadow (stream cipher).
    Shadow,
    /// meek over a domain front.
    Meeklite,
    /// Dust.
    Dust,
    /// Replicant.
    Replicant,
    /// Composite transport choosing among candidates.
    Optimizer,
}

impl TransportKind {
    /// Every kind, in registry order.
    pub const ALL: [TransportKind; 7] = [
        TransportKind::Obfs2,
        TransportKind::Obfs4,
        TransportKind::Shadow,
        TransportKind::Meeklite,
        TransportKind::Dust,
        TransportKind::Replicant,
        TransportKind::Optimizer,
    ];

    /// Name used in options.
    pub fn name(self) -> &'static str {
        match self {
            TransportKind::Obfs2 => TRANSPORT_OBFS2,
            TransportKind::Obfs4 => TRANSPORT_OBFS4,
            TransportKind::Shadow => TRANSPORT_SHADOW,
            TransportKind::Meeklite => TRANSPORT_MEEKLITE,
            TransportKind::Dust => TRANSPORT_DUST,
            TransportKind::Replicant => TRANSPORT_REPLICANT,
            TransportKind::Optimizer => TRANSPORT_OPTIMIZER,
        }
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        TransportKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownTransport(name.to_string()))
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optimizer selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Declaration order, first success wins.
    First,
    /// One random candidate per dial.
    Random,
    /// Round-robin cursor across dials.
    Rotate,
    /// Prefer the best success history.
    Track,
    /// Prefer the lowest dial latency.
    MinimizeDialDuration,
}

impl StrategyKind {
    /// Name used in options.
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::First => STRATEGY_FIRST,
            StrategyKind::Random => STRATEGY_RANDOM,
            StrategyKind::Rotate => STRATEGY_ROTATE,
            StrategyKind::Track => STRATEGY_TRACK,
            StrategyKind::MinimizeDialDuration => STRATEGY_MINIMIZE_DIAL_DURATION,
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            STRATEGY_FIRST => Ok(StrategyKind::First),
            STRATEGY_RANDOM => Ok(StrategyKind::Random),
            STRATEGY_ROTATE => Ok(StrategyKind::Rotate),
            STRATEGY_TRACK => Ok(StrategyKind::Track),
            STRATEGY_MINIMIZE_DIAL_DURATION => Ok(StrategyKind::MinimizeDialDuration),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// obfs4 options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obfs4Config {
    /// Bridge certificate.
    pub cert: String,
    /// Inter-arrival-time mode, normalized to 0 or 1.
    pub iat_mode: u8,
}

/// Shadow options.
#[derive(Clone, PartialEq, Eq)]
pub struct ShadowConfig {
    /// Shared password.
    pub password: String,
    /// Cipher name.
    pub cipher_name: String,
}

impl fmt::Debug for ShadowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowConfig")
            .field("password", &"<redacted>")
            .field("cipher_name", &self.cipher_name)
            .finish()
    }
}

/// meeklite options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeekliteConfig {
    /// URL of the meek reflector.
    pub url: String,
    /// Front domain presented on the wire.
    pub front: String,
}

/// Dust options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DustConfig {
    /// Server public key.
    pub server_public: [u8; KEY_SIZE],
    /// Chunk size used when shaping the stream.
    pub chunk_size: u16,
}

/// Replicant client-side record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicantClientConfig {
    /// Server public key.
    pub server_public_key: [u8; KEY_SIZE],
    /// Chunk size.
    pub chunk_size: u16,
}

/// Replicant server-side record.
#[derive(Clone, PartialEq, Eq)]
pub struct ReplicantServerConfig {
    /// Server private key.
    pub server_private_key: [u8; KEY_SIZE],
    /// Chunk size.
    pub chunk_size: u16,
}

impl fmt::Debug for ReplicantServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicantServerConfig")
            .field("server_private_key", &"<redacted>")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Replicant options: at least one of the two records is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicantConfig {
    /// Used when dialing.
    pub client: Option<ReplicantClientConfig>,
    /// Used when listening.
    pub server: Option<ReplicantServerConfig>,
}

/// Optimizer options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerConfig {
    /// Candidate transports in declaration order. Never empty.
    pub transports: Vec<TransportDescriptor>,
    /// Selection policy.
    pub strategy: StrategyKind,
}

/// Decoded options, one variant per transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// obfs2 takes no options.
    Obfs2,
    /// obfs4.
    Obfs4(Obfs4Config),
    /// Shadow.
    Shadow(ShadowConfig),
    /// meeklite.
    Meeklite(MeekliteConfig),
    /// Dust.
    Dust(DustConfig),
    /// Replicant.
    Replicant(ReplicantConfig),
    /// Optimizer over nested descriptors.
    Optimizer(OptimizerConfig),
}

impl TransportConfig {
    /// Kind of transport these options belong to.
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Obfs2 => TransportKind::Obfs2,
            TransportConfig::Obfs4(_) => TransportKind::Obfs4,
            TransportConfig::Shadow(_) => TransportKind::Shadow,
            TransportConfig::Meeklite(_) => TransportKind::Meeklite,
            TransportConfig::Dust(_) => TransportKind::Dust,
            TransportConfig::Replicant(_) => TransportKind::Replicant,
            TransportConfig::Optimizer(_) => TransportKind::Optimizer,
        }
    }
}

/// A named, addressed, configured transport.
///
/// `address` is the dial target on the client side and the bind address on
/// the server side. Optimizers have no address of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDescriptor {
    /// Selects the registry constructor.
    pub name: String,
    /// Dial target or bind address.
    pub address: String,
    /// Typed options.
    pub config: TransportConfig,
}

impl TransportDescriptor {
    /// Descriptor whose name is derived from its options.
    pub fn new(address: impl Into<String>, config: TransportConfig) -> Self {
        Self {
            name: config.kind().name().to_string(),
            address: address.into(),
            config,
        }
    }
}

/// Decode a descriptor from JSON text.
pub fn decode_descriptor_str(text: &str) -> Result<TransportDescriptor, ConfigError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
    decode_descriptor(&value)
}

/// Decode a descriptor from a JSON value.
pub fn decode_descriptor(value: &Value) -> Result<TransportDescriptor, ConfigError> {
    decode_descriptor_at(value, 0)
}

/// Decode the options object of transport `name`.
pub fn decode_transport_config(name: &str, config: &Value) -> Result<TransportConfig, ConfigError> {
    let kind = name.parse::<TransportKind>()?;
    let fields = Fields::new(config, "config", kind.name())?;
    decode_config_at(kind, fields, 0)
}

fn decode_descriptor_at(value: &Value, depth: usize) -> Result<TransportDescriptor, ConfigError> {
    let fields = Fields::new(value, "transport", "descriptor")?;

    // A bare optimizer object has no name of its own.
    if !fields.has("name") && fields.has("transports") {
        let config = decode_optimizer(fields, depth)?;
        return Ok(TransportDescriptor {
            name: TRANSPORT_OPTIMIZER.to_string(),
            address: fields.optional_string("address")?.unwrap_or_default(),
            config: TransportConfig::Optimizer(config),
        });
    }

    let name = fields.string("name")?;
    let kind = name.parse::<TransportKind>()?;
    let address = match kind {
        TransportKind::Optimizer => fields.optional_string("address")?.unwrap_or_default(),
        _ => fields.string("address")?,
    };
    let empty = Value::Object(Default::default());
    let options = Fields::new(fields.optional("config").unwrap_or(&empty), "config", kind.name())?;
    let config = decode_config_at(kind, options, depth)?;

    Ok(TransportDescriptor {
        name,
        address,
        config,
    })
}

fn decode_config_at(
    kind: TransportKind,
    fields: Fields<'_>,
    depth: usize,
) -> Result<TransportConfig, ConfigError> {
    let config = match kind {
        TransportKind::Obfs2 => TransportConfig::Obfs2,
        TransportKind::Obfs4 => {
            // Bridge lines spell it `iat-mode`.
            let iat_field = if fields.has("iat-mode") { "iat-mode" } else { "iatMode" };
            TransportConfig::Obfs4(Obfs4Config {
                cert: fields.string("cert")?,
                iat_mode: fields.iat_mode(iat_field)?,
            })
        }
        TransportKind::Shadow => TransportConfig::Shadow(ShadowConfig {
            password: fields.string("password")?,
            cipher_name: fields.string("cipherName")?,
        }),
        TransportKind::Meeklite => {
            let url = fields.string("url")?;
            url::Url::parse(&url)
                .map_err(|e| ConfigError::invalid("url", fields.transport(), e.to_string()))?;
            TransportConfig::Meeklite(MeekliteConfig {
                url,
                front: fields.string("front")?,
            })
        }
        TransportKind::Dust => TransportConfig::Dust(DustConfig {
            server_public: fields.hex_key("serverPublic")?,
            chunk_size: fields.integer("chunkSize")?,
        }),
        TransportKind::Replicant => decode_replicant(fields)?,
        TransportKind::Optimizer => TransportConfig::Optimizer(decode_optimizer(fields, depth)?),
    };
    Ok(config)
}

fn decode_replicant(fields: Fields<'_>) -> Result<TransportConfig, ConfigError> {
    let client = fields
        .optional_object("client")?
        .map(|client| {
            Ok::<_, ConfigError>(ReplicantClientConfig {
                server_public_key: client.hex_key("serverPublicKey")?,
                chunk_size: client.integer("chunkSize")?,
            })
        })
        .transpose()?;
    let server = fields
        .optional_object("server")?
        .map(|server| {
            Ok::<_, ConfigError>(ReplicantServerConfig {
                server_private_key: server.hex_key("serverPrivateKey")?,
                chunk_size: server.integer("chunkSize")?,
            })
        })
        .transpose()?;

    if client.is_none() && server.is_none() {
        return Err(ConfigError::missing("client", fields.transport()));
    }
    Ok(TransportConfig::Replicant(ReplicantConfig { client, server }))
}

fn decode_optimizer(fields: Fields<'_>, depth: usize) -> Result<OptimizerConfig, ConfigError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(ConfigError::NestingTooDeep {
            max: MAX_NESTING_DEPTH,
        });
    }

    let strategy = fields.string("strategy")?.parse::<StrategyKind>()?;
    let transports = fields
        .array("transports")?
        .iter()
        .map(|nested| decode_descriptor_at(nested, depth + 1))
        .collect::<Result<Vec<_>, _>>()?;
    if transports.is_empty() {
        return Err(ConfigError::EmptyOptimizer);
    }

    Ok(OptimizerConfig {
        transports,
        strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key_hex(byte: u8) -> String {
        hex::encode([byte; KEY_SIZE])
    }

    #[test]
    fn test_decode_obfs4() {
        let value = json!({
            "name": "obfs4",
            "address": "192.0.2.1:443",
            "config": { "cert": "AAAA", "iatMode": "1" }
        });
        let descriptor = decode_descriptor(&value).unwrap();
        assert_eq!(descriptor.name, "obfs4");
        assert_eq!(descriptor.address, "192.0.2.1:443");
        assert_eq!(
            descriptor.config,
            TransportConfig::Obfs4(Obfs4Config {
                cert: "AAAA".into(),
                iat_mode: 1,
            })
        );
    }

    #[test]
    fn test_decode_obfs4_bridge_line_spelling() {
        let config = decode_transport_config("obfs4", &json!({ "cert": "c", "iat-mode": false })).unwrap();
        assert_eq!(
            config,
            TransportConfig::Obfs4(Obfs4Config {
                cert: "c".into(),
                iat_mode: 0,
            })
        );
    }

    #[test]
    fn test_decode_each_builtin() {
        assert_eq!(
            decode_transport_config("obfs2", &json!({})).unwrap(),
            TransportConfig::Obfs2
        );
        assert_eq!(
            decode_transport_config(
                "shadow",
                &json!({ "password": "hunter2", "cipherName": "CHACHA20-IETF-POLY1305" })
            )
            .unwrap(),
            TransportConfig::Shadow(ShadowConfig {
                password: "hunter2".into(),
                cipher_name: "CHACHA20-IETF-POLY1305".into(),
            })
        );
        assert_eq!(
            decode_transport_config(
                "meeklite",
                &json!({ "url": "https://reflector.example/", "front": "cdn.example" })
            )
            .unwrap(),
            TransportConfig::Meeklite(MeekliteConfig {
                url: "https://reflector.example/".into(),
                front: "cdn.example".into(),
            })
        );
        assert_eq!(
            decode_transport_config("Dust", &json!({ "serverPublic": key_hex(7), "chunkSize": "1400" }))
                .unwrap(),
            TransportConfig::Dust(DustConfig {
                server_public: [7; KEY_SIZE],
                chunk_size: 1400,
            })
        );
    }

    #[test]
    fn test_decode_replicant_records() {
        let config = decode_transport_config(
            "Replicant",
            &json!({
                "client": { "serverPublicKey": key_hex(1), "chunkSize": 512 },
                "server": { "serverPrivateKey": key_hex(2), "chunkSize": 512 }
            }),
        )
        .unwrap();
        let TransportConfig::Replicant(replicant) = config else {
            panic!("expected Replicant options");
        };
        assert_eq!(replicant.client.unwrap().server_public_key, [1; KEY_SIZE]);
        assert_eq!(replicant.server.unwrap().server_private_key, [2; KEY_SIZE]);

        let err = decode_transport_config("Replicant", &json!({})).unwrap_err();
        assert_eq!(err, ConfigError::missing("client", "Replicant"));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = decode_transport_config("obfs4", &json!({ "iatMode": 0 })).unwrap_err();
        assert_eq!(err, ConfigError::missing("cert", "obfs4"));

        let err = decode_transport_config("shadow", &json!({ "password": "p" })).unwrap_err();
        assert_eq!(err, ConfigError::missing("cipherName", "shadow"));

        let err = decode_descriptor(&json!({ "name": "obfs2" })).unwrap_err();
        assert_eq!(err, ConfigError::missing("address", "descriptor"));
    }

    #[test]
    fn test_wrong_types_and_encodings() {
        let err = decode_transport_config("obfs4", &json!({ "cert": 5, "iatMode": 0 })).unwrap_err();
        assert_eq!(err, ConfigError::unsupported("cert", "obfs4"));

        let err = decode_transport_config("Dust", &json!({ "serverPublic": "not hex", "chunkSize": 1 }))
            .unwrap_err();
        assert_eq!(err, ConfigError::encoding("serverPublic", "Dust"));

        let err = decode_transport_config("obfs4", &json!("cert=AAAA")).unwrap_err();
        assert_eq!(err, ConfigError::unsupported("config", "obfs4"));
    }

    #[test]
    fn test_unknown_names() {
        let err = decode_descriptor(&json!({ "name": "obfs9", "address": "x:1" })).unwrap_err();
        assert_eq!(err, ConfigError::UnknownTransport("obfs9".into()));

        let err = decode_descriptor(&json!({
            "strategy": "fastest",
            "transports": [{ "name": "obfs2", "address": "x:1" }]
        }))
        .unwrap_err();
        assert_eq!(err, ConfigError::UnknownStrategy("fastest".into()));
    }

    #[test]
    fn test_decode_bare_optimizer_with_nested_optimizer() {
        let value = json!({
            "client": true,
            "strategy": "rotate",
            "transports": [
                { "name": "obfs2", "address": "198.51.100.1:80" },
                {
                    "name": "Optimizer",
                    "config": {
                        "strategy": "first",
                        "transports": [{ "name": "obfs2", "address": "198.51.100.2:80" }]
                    }
                }
            ]
        });
        let descriptor = decode_descriptor(&value).unwrap();
        assert_eq!(descriptor.name, "Optimizer");
        let TransportConfig::Optimizer(outer) = descriptor.config else {
            panic!("expected optimizer");
        };
        assert_eq!(outer.strategy, StrategyKind::Rotate);
        assert_eq!(outer.transports.len(), 2);
        let TransportConfig::Optimizer(inner) = &outer.transports[1].config else {
            panic!("expected nested optimizer");
        };
        assert_eq!(inner.strategy, StrategyKind::First);
        assert_eq!(inner.transports[0].address, "198.51.100.2:80");
    }

    #[test]
    fn test_optimizer_rejects_empty_and_bad_nested() {
        let err = decode_descriptor(&json!({ "strategy": "first", "transports": [] })).unwrap_err();
        assert_eq!(err, ConfigError::EmptyOptimizer);

        let err = decode_descriptor(&json!({
            "strategy": "first",
            "transports": [
                { "name": "obfs2", "address": "x:1" },
                { "name": "obfs4", "address": "x:2", "config": { "cert": "c" } }
            ]
        }))
        .unwrap_err();
        assert_eq!(err, ConfigError::missing("iatMode", "obfs4"));
    }

    #[test]
    fn test_nesting_depth_bounded() {
        let mut value = json!({ "name": "obfs2", "address": "x:1" });
        for _ in 0..=MAX_NESTING_DEPTH {
            value = json!({ "strategy": "first", "transports": [value] });
        }
        let err = decode_descriptor(&value).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NestingTooDeep {
                max: MAX_NESTING_DEPTH
            }
        );
    }

    #[test]
    fn test_decode_from_text() {
        let descriptor =
            decode_descriptor_str(r#"{"name":"obfs2","address":"127.0.0.1:9000"}"#).unwrap();
        assert_eq!(descriptor, TransportDescriptor::new("127.0.0.1:9000", TransportConfig::Obfs2));

        assert!(matches!(
            decode_descriptor_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let shadow = ShadowConfig {
            password: "hunter2".into(),
            cipher_name: "AES-256-GCM".into(),
        };
        assert!(!format!("{shadow:?}").contains("hunter2"));
    }
}
