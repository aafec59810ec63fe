use crate::address::{Address, AddressRange};
use crate::trace::{KeyPath, TraceValue};
use crate::{BridgeError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value as it crosses the method-call boundary, in JSON form.
///
/// Untagged: the shape of the JSON decides the variant, so `Range` must be
/// tried before `Address` and `Object` before both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Object {
        path: String,
    },
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        space: Option<String>,
        min: u64,
        max: u64,
    },
    Address {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        space: Option<String>,
        offset: u64,
    },
    Bytes {
        base64: String,
    },
}

/// Call arguments by parameter name.
pub type WireArgs = BTreeMap<String, WireValue>;

impl WireValue {
    pub fn object(path: &KeyPath) -> Self {
        Self::Object {
            path: path.to_string(),
        }
    }

    pub fn address(address: &Address) -> Self {
        Self::Address {
            space: address.space.clone(),
            offset: address.offset,
        }
    }

    pub fn range(range: &AddressRange) -> Self {
        Self::Range {
            space: range.space.clone(),
            min: range.min,
            max: range.max,
        }
    }

    pub fn bytes(data: &[u8]) -> Self {
        Self::Bytes {
            base64: BASE64.encode(data),
        }
    }

    /// Short type name used in error messages and schemas.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::Object { .. } => "object",
            Self::Range { .. } => "range",
            Self::Address { .. } => "address",
            Self::Bytes { .. } => "bytes",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes { base64 } => BASE64
                .decode(base64.as_bytes())
                .map_err(|e| BridgeError::InvalidResponse(format!("invalid base64: {e}"))),
            other => Err(BridgeError::InvalidResponse(format!(
                "expected bytes, got {}",
                other.type_name()
            ))),
        }
    }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<WireValue>> From<Option<T>> for WireValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<&TraceValue> for WireValue {
    fn from(value: &TraceValue) -> Self {
        match value {
            TraceValue::Bool(b) => Self::Bool(*b),
            TraceValue::Int(i) => Self::Int(*i),
            TraceValue::String(s) => Self::String(s.clone()),
            TraceValue::Address(a) => Self::address(a),
            TraceValue::Range(r) => Self::range(r),
            TraceValue::Bytes(b) => Self::bytes(b),
            TraceValue::Kinds(k) => Self::String(k.to_string()),
            TraceValue::Object(p) => Self::object(p),
        }
    }
}
