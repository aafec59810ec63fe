use crate::address::parse_offset;
use crate::types::{FrameInfo, RegisterInfo, StepKind, ThreadInfo};
use crate::{BridgeError, DebuggerClient, Result};
use serde_json::{json, Value};

pub fn list(client: &DebuggerClient, pid: u32) -> Result<Vec<ThreadInfo>> {
    client.call("thread.list", json!({ "pid": pid }))
}

pub fn select(client: &DebuggerClient, pid: u32, tid: u32) -> Result<()> {
    client.send_rpc("thread.select", Some(json!({ "pid": pid, "tid": tid })))?;
    Ok(())
}

/// Call stack of a thread, innermost frame first.
pub fn frames(client: &DebuggerClient, pid: u32, tid: u32) -> Result<Vec<FrameInfo>> {
    client.call("thread.frames", json!({ "pid": pid, "tid": tid }))
}

pub fn select_frame(client: &DebuggerClient, pid: u32, tid: u32, level: u32) -> Result<()> {
    client.send_rpc(
        "frame.select",
        Some(json!({ "pid": pid, "tid": tid, "level": level })),
    )?;
    Ok(())
}

/// Registers of a thread, or of one of its frames when `level` is given.
pub fn registers(
    client: &DebuggerClient,
    pid: u32,
    tid: u32,
    level: Option<u32>,
) -> Result<Vec<RegisterInfo>> {
    let mut params = json!({ "pid": pid, "tid": tid });
    if let Some(level) = level {
        params["level"] = json!(level);
    }
    client.call("thread.registers", params)
}

pub fn write_register(
    client: &DebuggerClient,
    pid: u32,
    tid: u32,
    name: &str,
    value: u64,
) -> Result<()> {
    client.send_rpc(
        "thread.write_register",
        Some(json!({ "pid": pid, "tid": tid, "name": name, "value": value })),
    )?;
    Ok(())
}

/// Single-steps a thread. The agent answers whether the thread stopped again.
pub fn step(client: &DebuggerClient, pid: u32, tid: u32, kind: StepKind) -> Result<bool> {
    let result = client.send_rpc(
        "thread.step",
        Some(json!({ "pid": pid, "tid": tid, "kind": kind })),
    )?;
    Ok(match result {
        Value::Bool(stopped) => stopped,
        Value::Object(map) => map.get("stopped").and_then(Value::as_bool).unwrap_or(true),
        _ => true,
    })
}

/// Current program counter of a thread.
pub fn pc(client: &DebuggerClient, pid: u32, tid: u32) -> Result<u64> {
    let result = client.send_rpc("thread.pc", Some(json!({ "pid": pid, "tid": tid })))?;
    let pc = result.get("pc").unwrap_or(&result);
    parse_offset(pc)
        .ok_or_else(|| BridgeError::InvalidResponse(format!("Expected a pc, got {result}")))
}
