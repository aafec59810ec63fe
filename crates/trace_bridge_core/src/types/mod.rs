pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;

/// Serde helpers for offsets the agent may send as numbers or `0x` strings.
pub(crate) mod offset {
    use crate::address::parse_offset;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_offset(&value).ok_or_else(|| D::Error::custom(format!("invalid offset: {value}")))
    }

    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            value => parse_offset(&value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid offset: {value}"))),
        }
    }
}
