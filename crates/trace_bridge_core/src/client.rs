use crate::{BridgeConfig, BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Something that can carry one JSON-RPC call to the debugger agent.
pub trait Transport: Send + Sync {
    fn send_rpc(&self, method: &str, params: Option<Value>) -> Result<Value>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    id: u64,
    #[serde(flatten)]
    result_or_error: ResultOrError,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultOrError {
    Result { result: Value },
    Error { error: JsonRpcError },
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// JSON-RPC 2.0 over HTTP POST.
pub struct HttpTransport {
    endpoint: String,
    agent: ureq::Agent,
    timeout: Duration,
    request_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(config: &BridgeConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            endpoint: config.endpoint.clone(),
            agent,
            timeout: config.timeout,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    fn send_rpc(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            id,
            params,
        };

        tracing::debug!("Sending JSON-RPC request: method={}, id={}", method, id);

        let response = match self.agent.post(&self.endpoint).send_json(&request) {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(BridgeError::InvalidResponse(format!(
                    "HTTP error: {status}"
                )))
            }
            Err(e) if is_timeout(&e) => {
                tracing::warn!("JSON-RPC request timed out: method={}, id={}", method, id);
                return Err(BridgeError::Timeout(self.timeout));
            }
            Err(e) => return Err(BridgeError::Connection(Box::new(e))),
        };

        let json_response: JsonRpcResponse = response.into_json()?;
        decode_response(method, id, json_response)
    }
}

/// ureq reports an expired deadline as an I/O error of kind `TimedOut`
/// (or `WouldBlock` on some platforms).
fn is_timeout(err: &ureq::Error) -> bool {
    let ureq::Error::Transport(transport) = err else {
        return false;
    };
    if !matches!(transport.kind(), ureq::ErrorKind::Io) {
        return false;
    }
    std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .is_some_and(|io| {
            matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        })
}

fn decode_response(method: &str, id: u64, response: JsonRpcResponse) -> Result<Value> {
    if response.id != id {
        return Err(BridgeError::InvalidResponse(format!(
            "Response ID mismatch: expected {}, got {}",
            id, response.id
        )));
    }

    match response.result_or_error {
        ResultOrError::Result { result } => {
            tracing::debug!("JSON-RPC request successful: method={}, id={}", method, id);
            Ok(result)
        }
        ResultOrError::Error { error } => {
            tracing::warn!(
                "JSON-RPC error: method={}, code={}, message={}",
                method,
                error.code,
                error.message
            );
            Err(BridgeError::JsonRpc {
                code: error.code,
                message: error.message,
                data: error.data,
            })
        }
    }
}

/// Handle on the debugger agent shared by every operation.
#[derive(Clone)]
pub struct DebuggerClient {
    transport: Arc<dyn Transport>,
}

impl DebuggerClient {
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(config)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn send_rpc(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.transport.send_rpc(method, params)
    }

    /// Sends a call and deserializes its result.
    pub fn call<T: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.send_rpc(method, Some(params))?;
        Ok(serde_json::from_value(result)?)
    }
}

impl fmt::Debug for DebuggerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebuggerClient").finish_non_exhaustive()
    }
}
