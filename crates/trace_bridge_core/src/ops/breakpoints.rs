use crate::types::{BreakpointInfo, BreakpointRequest};
use crate::{DebuggerClient, Result};
use serde_json::json;

pub fn list(client: &DebuggerClient, pid: u32) -> Result<Vec<BreakpointInfo>> {
    client.call("breakpoint.list", json!({ "pid": pid }))
}

pub fn set(client: &DebuggerClient, request: &BreakpointRequest) -> Result<BreakpointInfo> {
    client.call("breakpoint.set", serde_json::to_value(request)?)
}

pub fn toggle(client: &DebuggerClient, pid: u32, id: u32, enabled: bool) -> Result<()> {
    client.send_rpc(
        "breakpoint.toggle",
        Some(json!({ "pid": pid, "id": id, "enabled": enabled })),
    )?;
    Ok(())
}

pub fn delete(client: &DebuggerClient, pid: u32, id: u32) -> Result<()> {
    client.send_rpc("breakpoint.delete", Some(json!({ "pid": pid, "id": id })))?;
    Ok(())
}
