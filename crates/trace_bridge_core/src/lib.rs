//! Trace Bridge Core
//!
//! A synchronous library that bridges a live debugger agent to a
//! snapshot-versioned trace of the debuggee. Provides a path-addressed object
//! store with transactions, a registry of remotely invocable methods with
//! typed and defaulted parameters, and the refresh, control and breakpoint
//! methods that keep the trace in step with the target.

pub mod address;
pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod methods;
pub mod ops;
pub mod rmi;
pub mod trace;
pub mod types;

// Re-export commonly used types
pub use address::{Address, AddressRange};
pub use bridge::{Bridge, BoundMethod};
pub use client::{DebuggerClient, HttpTransport, Transport};
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use rmi::{WireArgs, WireValue};
pub use trace::Trace;

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
