use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument '{param}': {reason}")]
    InvalidArgument { param: String, reason: String },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Transaction '{0}' is already open")]
    ConflictingTransaction(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("Invalid range: min {min:#x} exceeds max {max:#x}")]
    InvalidRange { min: u64, max: u64 },

    #[error("Range {0} is too large to transfer")]
    RangeTooLarge(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection error: {0}")]
    Connection(#[from] Box<ureq::Error>),

    #[error("JSON-RPC error: {code} - {message}")]
    JsonRpc {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BridgeError {
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_argument(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Validation errors are the caller's fault; everything else is not.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MethodNotFound(_)
                | Self::MissingArgument(_)
                | Self::InvalidArgument { .. }
                | Self::InvalidPath(_)
                | Self::InvalidAttribute(_)
                | Self::InvalidRange { .. }
                | Self::RangeTooLarge(_)
        )
    }

    /// Rewrites a failure reported by the debugger agent into an execution
    /// error carrying the agent's message verbatim.
    pub fn into_execution(self) -> Self {
        match self {
            Self::JsonRpc { message, .. } => Self::Execution(message),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_error_construction() {
        let err = BridgeError::json_rpc(-32000, "no such process");
        match err {
            BridgeError::JsonRpc {
                code,
                message,
                data,
            } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "no such process");
                assert!(data.is_none());
            }
            _ => panic!("Expected JsonRpc variant"),
        }
    }

    #[test]
    fn test_into_execution_keeps_agent_message() {
        let err = BridgeError::json_rpc(-32000, "Could not attach: access denied").into_execution();
        match err {
            BridgeError::Execution(message) => {
                assert_eq!(message, "Could not attach: access denied")
            }
            other => panic!("Expected Execution variant, got {other:?}"),
        }

        let err = BridgeError::MissingArgument("pid".into()).into_execution();
        assert!(matches!(err, BridgeError::MissingArgument(_)));
    }

    #[test]
    fn test_error_display_messages() {
        let timeout_err = BridgeError::Timeout(Duration::from_secs(5));
        assert_eq!(timeout_err.to_string(), "Request timeout after 5s");

        let arg_err = BridgeError::invalid_argument("thread", "expected an object reference");
        assert_eq!(
            arg_err.to_string(),
            "Invalid argument 'thread': expected an object reference"
        );

        let range_err = BridgeError::InvalidRange { min: 0x20, max: 0x10 };
        assert_eq!(
            range_err.to_string(),
            "Invalid range: min 0x20 exceeds max 0x10"
        );

        let tx_err = BridgeError::ConflictingTransaction("Refresh threads".into());
        assert_eq!(
            tx_err.to_string(),
            "Transaction 'Refresh threads' is already open"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(BridgeError::MissingArgument("expr".into()).is_validation());
        assert!(BridgeError::MethodNotFound("nope".into()).is_validation());
        assert!(!BridgeError::Execution("boom".into()).is_validation());
        assert!(!BridgeError::ConflictingTransaction("tx".into()).is_validation());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BridgeError = io_err.into();
        match err {
            BridgeError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io variant"),
        }
    }
}
