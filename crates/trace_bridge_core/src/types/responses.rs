use super::offset;
use super::requests::BreakpointType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableInfo {
    pub pid: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub pid: u32,
    pub state: String,
}

impl ProcessState {
    pub fn is_stopped(&self) -> bool {
        self.state.eq_ignore_ascii_case("stopped")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub tid: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "offset::option")]
    pub pc: Option<u64>,
    #[serde(default, deserialize_with = "offset::option")]
    pub sp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub level: u32,
    #[serde(deserialize_with = "offset::deserialize")]
    pub pc: u64,
    #[serde(default, deserialize_with = "offset::option")]
    pub sp: Option<u64>,
    #[serde(default)]
    pub function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterInfo {
    pub name: String,
    #[serde(deserialize_with = "offset::deserialize")]
    pub value: u64,
    /// Width in bytes.
    #[serde(default = "default_register_size")]
    pub size: usize,
}

fn default_register_size() -> usize {
    8
}

impl RegisterInfo {
    /// Big-endian bytes of the value at the register's width.
    pub fn to_bytes(&self) -> Vec<u8> {
        let full = self.value.to_be_bytes();
        let width = self.size.clamp(1, full.len());
        full[full.len() - width..].to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    #[serde(deserialize_with = "offset::deserialize")]
    pub base: u64,
    pub size: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub readable: bool,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    #[serde(deserialize_with = "offset::deserialize")]
    pub base: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointInfo {
    pub id: u32,
    #[serde(default, deserialize_with = "offset::option")]
    pub address: Option<u64>,
    #[serde(default = "default_breakpoint_size")]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: BreakpointType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub expression: Option<String>,
}

fn default_breakpoint_size() -> u64 {
    1
}

fn default_enabled() -> bool {
    true
}

// [<id>] <addr> sz=<n> type=<x|r|w|rw> <enabled|disabled> <expression>
impl fmt::Display for BreakpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.id)?;
        match self.address {
            Some(address) => write!(f, "{address:#x}")?,
            None => f.write_str("<pending>")?,
        }
        write!(
            f,
            " sz={} type={} {}",
            self.size,
            self.kind.code(),
            if self.enabled { "enabled" } else { "disabled" }
        )?;
        if let Some(expression) = self.expression.as_deref().filter(|e| !e.is_empty()) {
            write!(f, " {expression}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(default)]
    pub debugger: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub endian: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryContents {
    #[serde(deserialize_with = "offset::deserialize")]
    pub address: u64,
    /// Base64-encoded bytes.
    pub data: String,
}
