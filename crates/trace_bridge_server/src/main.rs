use std::sync::Arc;

use anyhow::Context;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::*,
    tool, tool_handler, tool_router, transport, ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use trace_bridge_core::rmi::RemoteMethod;
use trace_bridge_core::trace::{Lifespan, PathPredicates, Snap};
use trace_bridge_core::{Bridge, BridgeConfig, BridgeError, WireArgs, WireValue};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ListMethodsParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct InvokeMethodParams {
    /// Name of a registered method, e.g. `refresh_threads`.
    method: String,
    /// Arguments by parameter name. Objects are passed as `{"path": ...}`,
    /// addresses as `{"offset": ...}` and ranges as `{"min": ..., "max": ...}`.
    #[serde(default)]
    arguments: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct QueryValuesParams {
    /// Path pattern such as `Processes[].Threads[]._pc`; `|` separates alternatives.
    pattern: String,
    /// Snapshot to read; the latest committed one when omitted.
    #[serde(default)]
    snap: Option<Snap>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct TraceStatusParams {}

#[derive(Clone)]
struct TraceBridgeServer {
    tool_router: ToolRouter<Self>,
    bridge: Arc<Bridge>,
}

fn to_mcp_error(err: BridgeError) -> McpError {
    if err.is_validation() {
        McpError::invalid_params(err.to_string(), None)
    } else {
        McpError::internal_error(err.to_string(), None)
    }
}

fn wire_args(arguments: Map<String, Value>) -> Result<WireArgs, McpError> {
    arguments
        .into_iter()
        .map(|(name, value)| {
            serde_json::from_value::<WireValue>(value)
                .map(|decoded| (name.clone(), decoded))
                .map_err(|e| {
                    McpError::invalid_params(format!("Argument '{name}' is not a wire value: {e}"), None)
                })
        })
        .collect()
}

fn wire_json(value: &WireValue) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Runs blocking bridge work off the async executor.
async fn run_blocking<T, F>(work: F) -> Result<T, McpError>
where
    T: Send + 'static,
    F: FnOnce() -> trace_bridge_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| McpError::internal_error(format!("Bridge task failed: {e}"), None))?
        .map_err(to_mcp_error)
}

impl TraceBridgeServer {
    fn method_listing(&self) -> Value {
        let methods: Vec<Value> = self
            .bridge
            .registry()
            .iter()
            .map(|method| {
                json!({
                    "name": method.name(),
                    "description": method.description(),
                    "parameters": method.schema(),
                })
            })
            .collect();
        json!({ "methods": methods })
    }

    async fn invoke(&self, method: String, arguments: Map<String, Value>) -> Result<Value, McpError> {
        let args = wire_args(arguments)?;
        let bridge = Arc::clone(&self.bridge);
        let name = method.clone();
        let result = run_blocking(move || bridge.invoke(&name, &args)).await?;
        Ok(json!({
            "method": method,
            "result": wire_json(&result),
            "snap": self.bridge.trace().snapshot(),
        }))
    }

    fn query(&self, pattern: &str, snap: Option<Snap>) -> Result<Value, McpError> {
        let predicates = PathPredicates::parse(pattern).map_err(to_mcp_error)?;
        let view = self.bridge.trace().view();
        let snap = snap.unwrap_or_else(|| view.snapshot());

        let paths = view.value_paths(Lifespan::at(snap), predicates);
        let values: Vec<Value> = paths
            .iter()
            .map(|found| match found.value() {
                Some(value) => json!({
                    "path": found.path.to_string(),
                    "value": wire_json(&WireValue::from(value)),
                }),
                None => json!({ "path": found.path.to_string(), "object": true }),
            })
            .collect();
        Ok(json!({ "snap": snap, "values": values }))
    }

    fn status(&self) -> Value {
        let trace = self.bridge.trace();
        let view = trace.view();
        json!({
            "trace": trace.name(),
            "snap": view.snapshot(),
            "objects": view.len(),
            "open_transaction": trace.open_transaction(),
            "endpoint": self.bridge.config().endpoint,
        })
    }
}

#[tool_router]
impl TraceBridgeServer {
    fn new(bridge: Bridge) -> Self {
        Self {
            tool_router: Self::tool_router(),
            bridge: Arc::new(bridge),
        }
    }

    #[tool(description = "List the registered bridge methods with their parameter schemas")]
    async fn list_methods(
        &self,
        _params: Parameters<ListMethodsParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::structured(self.method_listing()))
    }

    #[tool(description = "Invoke a bridge method by name")]
    async fn invoke_method(
        &self,
        params: Parameters<InvokeMethodParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let result = self.invoke(params.method, params.arguments).await?;
        Ok(CallToolResult::structured(result))
    }

    #[tool(description = "List the trace values whose paths match a pattern")]
    async fn query_values(
        &self,
        params: Parameters<QueryValuesParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        Ok(CallToolResult::structured(self.query(&params.pattern, params.snap)?))
    }

    #[tool(description = "Report the trace name, snapshot and open transaction")]
    async fn trace_status(
        &self,
        _params: Parameters<TraceStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::structured(self.status()))
    }
}

#[tool_handler]
impl ServerHandler for TraceBridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Trace bridge: invoke debugger methods and query the recorded trace".into(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = BridgeConfig::from_env();
    let bridge = Bridge::new(config).context("Failed to create bridge")?;
    let server = TraceBridgeServer::new(bridge);

    tracing::info!("Starting Trace Bridge MCP Server on stdio...");

    server.serve(transport::stdio()).await?.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_bridge_core::Transport;

    /// Agent with one stopped process and one thread.
    struct Agent;

    impl Transport for Agent {
        fn send_rpc(&self, method: &str, _params: Option<Value>) -> trace_bridge_core::Result<Value> {
            match method {
                "process.list" => Ok(json!([{ "pid": 7, "name": "demo", "state": "stopped" }])),
                "thread.list" => Ok(json!([{ "tid": 1, "pc": "0x1000" }])),
                "debugger.evaluate" => Ok(json!("0x2a")),
                other => Err(BridgeError::json_rpc(-32601, format!("Method not found: {other}"))),
            }
        }
    }

    fn server() -> TraceBridgeServer {
        let bridge = Bridge::with_transport(BridgeConfig::default(), Arc::new(Agent)).unwrap();
        TraceBridgeServer::new(bridge)
    }

    fn arguments(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn wire_args_decode_json_shapes() {
        let args = wire_args(arguments(json!({
            "thread": { "path": "Processes[7].Threads[1]" },
            "address": { "offset": 4096 },
            "max": 3,
        })))
        .unwrap();
        assert_eq!(
            args["thread"],
            WireValue::Object {
                path: "Processes[7].Threads[1]".into()
            }
        );
        assert_eq!(
            args["address"],
            WireValue::Address {
                space: None,
                offset: 4096
            }
        );
        assert_eq!(args["max"], WireValue::Int(3));
    }

    #[test]
    fn wire_args_reject_unknown_shapes() {
        let err = wire_args(arguments(json!({ "values": [1, 2] }))).unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("values"));
    }

    #[test]
    fn validation_errors_map_to_invalid_params() {
        let err = to_mcp_error(BridgeError::MissingArgument("expr".into()));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        let err = to_mcp_error(BridgeError::Execution("boom".into()));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn method_listing_includes_schemas() {
        let listing = server().method_listing();
        let methods = listing["methods"].as_array().unwrap();
        let step_to = methods.iter().find(|m| m["name"] == "step_to").unwrap();
        assert_eq!(step_to["parameters"]["required"], json!(["thread", "address"]));
    }

    #[tokio::test]
    async fn invoke_runs_method_and_reports_snapshot() {
        let server = server();
        let result = server
            .invoke(
                "refresh_processes".into(),
                arguments(json!({ "node": { "path": "Processes" } })),
            )
            .await
            .unwrap();
        assert_eq!(result["result"], Value::Null);
        assert_eq!(result["snap"], json!(2));

        let values = server.query("Processes[]._state", None).unwrap();
        assert_eq!(
            values["values"],
            json!([{ "path": "Processes[7]._state", "value": "STOPPED" }])
        );
    }

    #[tokio::test]
    async fn invoke_reports_missing_argument_as_invalid_params() {
        let err = server().invoke("evaluate".into(), Map::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("expr"));
    }

    #[tokio::test]
    async fn invoke_reports_agent_failure_as_internal_error() {
        let err = server()
            .invoke(
                "execute".into(),
                arguments(json!({ "cmd": "info registers" })),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn status_reports_skeleton() {
        let status = server().status();
        assert_eq!(status["snap"], json!(1));
        assert_eq!(status["open_transaction"], Value::Null);
        assert_eq!(status["trace"], json!("noname"));
    }

    #[test]
    fn query_rejects_bad_pattern() {
        let err = server().query("Processes[", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }
}
