use crate::types::{AvailableInfo, LaunchRequest, ProcessInfo, ProcessState};
use crate::{DebuggerClient, Result};
use serde_json::json;

/// Processes the debugger could attach to.
pub fn available(client: &DebuggerClient) -> Result<Vec<AvailableInfo>> {
    client.call("process.available", json!({}))
}

/// Processes currently under the debugger's control.
pub fn list(client: &DebuggerClient) -> Result<Vec<ProcessInfo>> {
    client.call("process.list", json!({}))
}

pub fn attach(client: &DebuggerClient, pid: u32) -> Result<()> {
    client.send_rpc("process.attach", Some(json!({ "pid": pid })))?;
    Ok(())
}

pub fn detach(client: &DebuggerClient, pid: u32) -> Result<()> {
    client.send_rpc("process.detach", Some(json!({ "pid": pid })))?;
    Ok(())
}

pub fn kill(client: &DebuggerClient, pid: u32) -> Result<()> {
    client.send_rpc("process.kill", Some(json!({ "pid": pid })))?;
    Ok(())
}

/// Starts a program and reports the new process.
pub fn launch(client: &DebuggerClient, request: &LaunchRequest) -> Result<ProcessInfo> {
    client.call("process.launch", serde_json::to_value(request)?)
}

pub fn state(client: &DebuggerClient, pid: u32) -> Result<ProcessState> {
    client.call("process.state", json!({ "pid": pid }))
}

pub fn resume(client: &DebuggerClient, pid: u32) -> Result<()> {
    client.send_rpc("process.resume", Some(json!({ "pid": pid })))?;
    Ok(())
}

pub fn interrupt(client: &DebuggerClient, pid: u32) -> Result<()> {
    client.send_rpc("process.interrupt", Some(json!({ "pid": pid })))?;
    Ok(())
}

/// Makes `pid` the debugger's current process.
pub fn select(client: &DebuggerClient, pid: u32) -> Result<()> {
    client.send_rpc("process.select", Some(json!({ "pid": pid })))?;
    Ok(())
}
