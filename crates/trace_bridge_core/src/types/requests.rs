use crate::trace::{BreakpointKind, BreakpointKindSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Into,
    Over,
    Out,
}

/// Breakpoint class as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakpointType {
    #[serde(rename = "sw")]
    Software,
    #[serde(rename = "hw")]
    Hardware,
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "w")]
    Write,
    #[serde(rename = "rw")]
    Access,
}

impl BreakpointType {
    pub fn kinds(self) -> BreakpointKindSet {
        match self {
            Self::Software => BreakpointKindSet::of(&[BreakpointKind::SwExecute]),
            Self::Hardware => BreakpointKindSet::of(&[BreakpointKind::HwExecute]),
            Self::Read => BreakpointKindSet::of(&[BreakpointKind::Read]),
            Self::Write => BreakpointKindSet::of(&[BreakpointKind::Write]),
            Self::Access => BreakpointKindSet::of(&[BreakpointKind::Read, BreakpointKind::Write]),
        }
    }

    /// Short access-class code; both execute flavours are `x`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Software | Self::Hardware => "x",
            Self::Read => "r",
            Self::Write => "w",
            Self::Access => "rw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: BreakpointType,
}

impl BreakpointRequest {
    pub fn at_address(pid: u32, address: u64, size: u64, kind: BreakpointType) -> Self {
        Self {
            pid: Some(pid),
            address: Some(address),
            expression: None,
            size,
            kind,
        }
    }

    pub fn at_expression(expression: impl Into<String>, size: u64, kind: BreakpointType) -> Self {
        Self {
            pid: None,
            address: None,
            expression: Some(expression.into()),
            size,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub file: String,
    #[serde(default)]
    pub args: String,
    pub initial_break: bool,
    /// Stop in the loader rather than at the program entry.
    #[serde(default)]
    pub loader: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_breakpoint_request_serialization() {
        let request = BreakpointRequest::at_address(4, 0x401000, 1, BreakpointType::Hardware);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"pid": 4, "address": 0x401000, "size": 1, "type": "hw"})
        );

        let request = BreakpointRequest::at_expression("ntdll!LdrLoadDll", 1, BreakpointType::Access);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"expression": "ntdll!LdrLoadDll", "size": 1, "type": "rw"})
        );
    }

    #[test]
    fn test_access_type_carries_read_and_write() {
        let kinds = BreakpointType::Access.kinds();
        assert!(kinds.contains(BreakpointKind::Read));
        assert!(kinds.contains(BreakpointKind::Write));
        assert_eq!(BreakpointType::Hardware.code(), "x");
    }

    #[test]
    fn test_step_kind_wire_names() {
        assert_eq!(serde_json::to_value(StepKind::Over).unwrap(), json!("over"));
    }
}
