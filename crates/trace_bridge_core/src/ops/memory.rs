use crate::types::{MemoryContents, ModuleInfo, RegionInfo};
use crate::{BridgeError, DebuggerClient, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;

pub fn regions(client: &DebuggerClient, pid: u32) -> Result<Vec<RegionInfo>> {
    client.call("memory.regions", json!({ "pid": pid }))
}

pub fn modules(client: &DebuggerClient, pid: u32) -> Result<Vec<ModuleInfo>> {
    client.call("module.list", json!({ "pid": pid }))
}

/// Reads exactly `length` bytes at `address`.
pub fn read(client: &DebuggerClient, pid: u32, address: u64, length: u64) -> Result<Vec<u8>> {
    let contents: MemoryContents = client.call(
        "memory.read",
        json!({ "pid": pid, "address": address, "length": length }),
    )?;

    let bytes = BASE64.decode(contents.data.as_bytes()).map_err(|e| {
        BridgeError::InvalidResponse(format!("Failed to decode memory.read base64 data: {e}"))
    })?;

    if (bytes.len() as u64) < length {
        return Err(BridgeError::InvalidResponse(format!(
            "Decoded memory payload is too short: expected {length} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes[..length as usize].to_vec())
}
