//! Typed field access over loosely typed JSON option maps.
//!
//! Every accessor fails closed: an absent field is `MissingField`, a field
//! of the wrong JSON type is `UnsupportedType`. `null` counts as absent.

use serde_json::{Map, Value};

use crate::core::{ConfigError, KEY_SIZE};

/// Option map for one transport, remembering which transport it belongs to
/// so errors can name it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
    transport: &'a str,
}

impl<'a> Fields<'a> {
    /// Interpret `value` as the option object `field` of `transport`.
    pub(crate) fn new(value: &'a Value, field: &str, transport: &'a str) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(Self { map, transport }),
            _ => Err(ConfigError::unsupported(field, transport)),
        }
    }

    /// Transport these fields belong to.
    pub(crate) fn transport(&self) -> &'a str {
        self.transport
    }

    /// Look up a field that may be absent.
    pub(crate) fn optional(&self, field: &str) -> Option<&'a Value> {
        match self.map.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Check whether a field is present.
    pub(crate) fn has(&self, field: &str) -> bool {
        self.optional(field).is_some()
    }

    fn required(&self, field: &str) -> Result<&'a Value, ConfigError> {
        self.optional(field)
            .ok_or_else(|| ConfigError::missing(field, self.transport))
    }

    /// Required string field.
    pub(crate) fn string(&self, field: &str) -> Result<String, ConfigError> {
        match self.required(field)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(ConfigError::unsupported(field, self.transport)),
        }
    }

    /// Optional string field.
    pub(crate) fn optional_string(&self, field: &str) -> Result<Option<String>, ConfigError> {
        match self.optional(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ConfigError::unsupported(field, self.transport)),
        }
    }

    /// Required integer field, accepting a JSON number or a numeric string,
    /// range-checked against the target type.
    pub(crate) fn integer<T>(&self, field: &str) -> Result<T, ConfigError>
    where
        T: TryFrom<i64>,
    {
        let raw = match self.required(field)? {
            Value::Number(n) => number_to_i64(n)
                .ok_or_else(|| ConfigError::invalid(field, self.transport, "not an integer"))?,
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::invalid(field, self.transport, "not an integer"))?,
            _ => return Err(ConfigError::unsupported(field, self.transport)),
        };
        T::try_from(raw)
            .map_err(|_| ConfigError::invalid(field, self.transport, format!("{raw} out of range")))
    }

    /// The obfs4 inter-arrival-time mode: `"0"`, `0` and `false` mean 0;
    /// `"1"`, `1` and `true` mean 1.
    pub(crate) fn iat_mode(&self, field: &str) -> Result<u8, ConfigError> {
        let mode = match self.required(field)? {
            Value::Bool(b) => return Ok(u8::from(*b)),
            Value::Number(n) => number_to_i64(n),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => return Err(ConfigError::unsupported(field, self.transport)),
        };
        match mode {
            Some(0) => Ok(0),
            Some(1) => Ok(1),
            _ => Err(ConfigError::invalid(field, self.transport, "expected 0 or 1")),
        }
    }

    /// Required hex string decoded into a fixed-size key.
    pub(crate) fn hex_key(&self, field: &str) -> Result<[u8; KEY_SIZE], ConfigError> {
        let text = self.string(field)?;
        let bytes = hex::decode(text.trim()).map_err(|_| ConfigError::encoding(field, self.transport))?;
        <[u8; KEY_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
            ConfigError::invalid(
                field,
                self.transport,
                format!("expected {KEY_SIZE} bytes, got {}", bytes.len()),
            )
        })
    }

    /// Optional nested option object.
    pub(crate) fn optional_object(&self, field: &str) -> Result<Option<Fields<'a>>, ConfigError> {
        self.optional(field)
            .map(|value| Fields::new(value, field, self.transport))
            .transpose()
    }

    /// Required JSON array.
    pub(crate) fn array(&self, field: &str) -> Result<&'a [Value], ConfigError> {
        match self.required(field)? {
            Value::Array(items) => Ok(items.as_slice()),
            _ => Err(ConfigError::unsupported(field, self.transport)),
        }
    }
}

/// JSON numbers may arrive as floats (`1.0`); accept them when integral.
fn number_to_i64(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
