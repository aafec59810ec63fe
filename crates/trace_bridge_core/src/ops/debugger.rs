use crate::types::EnvironmentInfo;
use crate::{BridgeError, DebuggerClient, Result};
use serde_json::{json, Value};

/// Evaluates an expression in the debugger and returns its textual result.
pub fn evaluate(client: &DebuggerClient, expression: &str) -> Result<String> {
    let result = client.send_rpc("debugger.evaluate", Some(json!({ "expression": expression })))?;
    render(result)
}

/// Runs a native debugger command; captures its output when `to_string` is set.
pub fn execute(client: &DebuggerClient, command: &str, to_string: bool) -> Result<Option<String>> {
    let result = client.send_rpc(
        "debugger.execute",
        Some(json!({ "command": command, "to_string": to_string })),
    )?;
    if !to_string {
        return Ok(None);
    }
    match result {
        Value::Null => Ok(Some(String::new())),
        other => render(other).map(Some),
    }
}

pub fn environment(client: &DebuggerClient, pid: u32) -> Result<EnvironmentInfo> {
    client.call("debugger.environment", json!({ "pid": pid }))
}

fn render(result: Value) -> Result<String> {
    match result {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Ok(other.to_string()),
            None => Err(BridgeError::InvalidResponse(
                "Expected 'result' in evaluation response".into(),
            )),
        },
        other => Err(BridgeError::InvalidResponse(format!(
            "Unexpected evaluation result: {other}"
        ))),
    }
}
