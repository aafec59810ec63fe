use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:15740";
const DEFAULT_TRACE_NAME: &str = "noname";
const DEFAULT_STEP_BUDGET: u32 = 1000;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// JSON-RPC endpoint of the debugger agent.
    pub endpoint: String,
    /// Per-request timeout towards the agent.
    pub timeout: Duration,
    pub trace_name: String,
    /// Default `timeout` of `launch` and `launch_loader`.
    pub launch_timeout: Duration,
    /// Default `max` of `step_to`.
    pub step_budget: u32,
    pub poll_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            trace_name: DEFAULT_TRACE_NAME.to_string(),
            launch_timeout: Duration::from_secs(10),
            step_budget: DEFAULT_STEP_BUDGET,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl BridgeConfig {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        let endpoint =
            std::env::var("TRACE_BRIDGE_ENDPOINT").unwrap_or_else(|_| defaults.endpoint.clone());

        let trace_name =
            std::env::var("TRACE_BRIDGE_TRACE_NAME").unwrap_or_else(|_| defaults.trace_name.clone());

        let timeout = env_millis("TRACE_BRIDGE_TIMEOUT_MS").unwrap_or(defaults.timeout);
        let launch_timeout =
            env_millis("TRACE_BRIDGE_LAUNCH_TIMEOUT_MS").unwrap_or(defaults.launch_timeout);
        let poll_interval = env_millis("TRACE_BRIDGE_POLL_MS").unwrap_or(defaults.poll_interval);

        let step_budget = std::env::var("TRACE_BRIDGE_STEP_BUDGET")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.step_budget);

        Self {
            endpoint,
            timeout,
            trace_name,
            launch_timeout,
            step_budget,
            poll_interval,
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
