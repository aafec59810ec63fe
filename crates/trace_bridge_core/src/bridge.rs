use crate::client::{DebuggerClient, Transport};
use crate::rmi::{MethodRegistry, Parameter, RemoteMethod, TraceDecoder, WireArgs, WireValue};
use crate::trace::{KeyPath, ModelAttribute, Trace};
use crate::{methods, BridgeConfig, Result};
use std::fmt;
use std::sync::Arc;

/// Ties a debugger agent to a trace and exposes the method registry.
pub struct Bridge {
    config: BridgeConfig,
    trace: Arc<Trace>,
    client: DebuggerClient,
    registry: MethodRegistry,
}

impl Bridge {
    /// Connects to the agent at `config.endpoint` over HTTP.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let client = DebuggerClient::new(&config);
        Self::with_client(config, client)
    }

    pub fn with_transport(config: BridgeConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_client(config, DebuggerClient::with_transport(transport))
    }

    fn with_client(config: BridgeConfig, client: DebuggerClient) -> Result<Self> {
        let trace = Arc::new(Trace::new(config.trace_name.clone()));
        init_skeleton(&trace)?;
        let registry = methods::registry(&config);
        tracing::info!(
            "Bridge ready: trace={}, endpoint={}, {} methods",
            trace.name(),
            config.endpoint,
            registry.len()
        );
        Ok(Self {
            config,
            trace,
            client,
            registry,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn trace(&self) -> &Arc<Trace> {
        &self.trace
    }

    pub fn client(&self) -> &DebuggerClient {
        &self.client
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn method(&self, name: &str) -> Result<BoundMethod<'_>> {
        Ok(BoundMethod {
            bridge: self,
            method: self.registry.get(name)?,
        })
    }

    /// Shorthand for `self.method(name)?.invoke(args)`.
    pub fn invoke(&self, name: &str, args: &WireArgs) -> Result<WireValue> {
        self.method(name)?.invoke(args)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("trace", &self.trace.name())
            .field("methods", &self.registry.len())
            .finish()
    }
}

// The top-level containers exist from the first snapshot so refreshes have
// a node to target.
fn init_skeleton(trace: &Trace) -> Result<()> {
    let mut tx = trace.begin("Create skeleton")?;
    tx.create_object(&KeyPath::root().key("Available"));
    tx.create_object(&KeyPath::root().key("Processes"));
    tx.put(&KeyPath::root(), ModelAttribute::Display, trace.name());
    tx.commit()?;
    Ok(())
}

/// A registered method bound to the bridge it runs against.
#[derive(Clone, Copy)]
pub struct BoundMethod<'a> {
    bridge: &'a Bridge,
    method: &'a dyn RemoteMethod,
}

impl<'a> BoundMethod<'a> {
    pub fn name(&self) -> &'a str {
        self.method.name()
    }

    pub fn description(&self) -> &'a str {
        self.method.description()
    }

    pub fn parameters(&self) -> &'a [Parameter] {
        self.method.parameters()
    }

    /// Validates and decodes `args` against the current trace state, then runs.
    pub fn invoke(&self, args: &WireArgs) -> Result<WireValue> {
        let decoder = TraceDecoder::new(&self.bridge.trace);
        self.method.invoke(self.bridge, &decoder, args)
    }
}
