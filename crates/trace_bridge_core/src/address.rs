use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in some address space of the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    pub offset: u64,
}

impl Address {
    pub fn new(offset: u64) -> Self {
        Self {
            space: None,
            offset,
        }
    }

    pub fn in_space(space: impl Into<String>, offset: u64) -> Self {
        Self {
            space: Some(space.into()),
            offset,
        }
    }

    pub fn add(&self, delta: u64) -> Self {
        Self {
            space: self.space.clone(),
            offset: self.offset.wrapping_add(delta),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.space {
            Some(space) => write!(f, "{space}:{:#x}", self.offset),
            None => write!(f, "{:#x}", self.offset),
        }
    }
}

/// Inclusive `[min, max]` range of addresses in one space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    pub min: u64,
    pub max: u64,
}

impl AddressRange {
    pub fn new(space: Option<String>, min: u64, max: u64) -> Result<Self> {
        if min > max {
            return Err(BridgeError::InvalidRange { min, max });
        }
        Ok(Self { space, min, max })
    }

    /// Range of `len` bytes starting at `start`. A zero length is widened to one byte.
    pub fn from_len(start: &Address, len: u64) -> Self {
        let len = len.max(1);
        Self {
            space: start.space.clone(),
            min: start.offset,
            max: start.offset.saturating_add(len - 1),
        }
    }

    /// Number of addresses covered; a full 64-bit range holds 2^64 of them.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u128 {
        u128::from(self.max - self.min) + 1
    }

    /// Length as the byte count sent to the agent, which must fit in a `u64`.
    pub fn byte_len(&self) -> Result<u64> {
        (self.max - self.min)
            .checked_add(1)
            .ok_or_else(|| BridgeError::RangeTooLarge(self.to_string()))
    }

    pub fn min_address(&self) -> Address {
        Address {
            space: self.space.clone(),
            offset: self.min,
        }
    }

    pub fn max_address(&self) -> Address {
        Address {
            space: self.space.clone(),
            offset: self.max,
        }
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.min <= offset && offset <= self.max
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(space) = &self.space {
            write!(f, "{space}:")?;
        }
        write!(f, "[{:#x}-{:#x}]", self.min, self.max)
    }
}

/// Parses an offset reported either as a decimal number or a `0x` hex string.
pub fn parse_offset(value: &serde_json::Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let s = value.as_str()?.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse::<u64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_length_is_inclusive() {
        let range = AddressRange::new(None, 0x1000, 0x1003).unwrap();
        assert_eq!(range.len(), 4);
        assert!(range.contains(0x1003));
        assert!(!range.contains(0x1004));
        assert_eq!(range.min_address(), Address::new(0x1000));
    }

    #[test]
    fn test_full_width_range_length() {
        let range = AddressRange::new(None, 0, u64::MAX).unwrap();
        assert_eq!(range.len(), 1u128 << 64);
        assert!(matches!(range.byte_len(), Err(BridgeError::RangeTooLarge(_))));

        let almost = AddressRange::new(None, 1, u64::MAX).unwrap();
        assert_eq!(almost.byte_len().unwrap(), u64::MAX);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = AddressRange::new(None, 0x20, 0x10).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRange { min: 0x20, max: 0x10 }));
    }

    #[test]
    fn test_from_len_widens_empty() {
        let range = AddressRange::from_len(&Address::in_space("ram", 0x40), 0);
        assert_eq!(range.len(), 1);
        assert_eq!(range.to_string(), "ram:[0x40-0x40]");
    }

    #[test]
    fn test_parse_offset_formats() {
        assert_eq!(parse_offset(&json!(4096)), Some(4096));
        assert_eq!(parse_offset(&json!("0x1000")), Some(0x1000));
        assert_eq!(parse_offset(&json!("0X1f")), Some(0x1f));
        assert_eq!(parse_offset(&json!("77")), Some(77));
        assert_eq!(parse_offset(&json!("0xzz")), None);
        assert_eq!(parse_offset(&json!(null)), None);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(Address::new(0x401000).to_string(), "0x401000");
        assert_eq!(Address::in_space("ram", 16).to_string(), "ram:0x10");
    }
}
