//! The domain methods registered on every bridge.

pub mod breakpoints;
pub mod control;
pub mod memory;
pub mod refresh;
pub mod session;

use crate::rmi::{MethodRegistry, ParamType, Parameter};
use crate::trace::{KeyPath, PathPredicates};
use crate::{BridgeConfig, BridgeError, Result};

pub const AVAILABLE: &str = "Available[]";
pub const PROCESS: &str = "Processes[]";
pub const THREAD: &str = "Processes[].Threads[]";
pub const FRAME: &str = "Processes[].Threads[].Stack[]";
pub const BREAKPOINT: &str = "Processes[].Breakpoints[]";
pub const REGISTERS: &str =
    "Processes[].Threads[].Registers|Processes[].Threads[].Stack[].Registers";

/// Builds the registry; defaults that depend on configuration are fixed here.
pub fn registry(config: &BridgeConfig) -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    session::register(&mut registry, config);
    refresh::register(&mut registry);
    control::register(&mut registry, config);
    breakpoints::register(&mut registry);
    memory::register(&mut registry);
    registry
}

pub(crate) fn object_param(
    name: &'static str,
    pattern: &'static str,
    description: &'static str,
) -> Parameter {
    Parameter::required(name, ParamType::Object(pattern), description)
}

/// Numeric keys captured by the wildcards of the single pattern `pattern`.
pub(crate) fn ids_of(pattern: &str, path: &KeyPath) -> Result<Vec<u32>> {
    let predicates = PathPredicates::parse(pattern)?;
    let keys = predicates
        .get_singleton_pattern()?
        .match_keys(path)
        .ok_or_else(|| BridgeError::InvalidPath(format!("{path} does not match {pattern}")))?;
    keys.iter().map(|key| parse_id(key)).collect()
}

pub(crate) fn parse_id(key: &str) -> Result<u32> {
    let parsed = match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => key.parse().ok(),
    };
    parsed.ok_or_else(|| BridgeError::InvalidPath(format!("[{key}] is not a numeric id")))
}

pub(crate) fn pid_of(process: &KeyPath) -> Result<u32> {
    Ok(ids_of(PROCESS, process)?[0])
}

pub(crate) fn process_path(pid: u32) -> KeyPath {
    KeyPath::root().key("Processes").index(pid)
}

/// `(pid, tid)` of a thread path.
pub(crate) fn thread_ids(thread: &KeyPath) -> Result<(u32, u32)> {
    match ids_of(THREAD, thread)?.as_slice() {
        [pid, tid] => Ok((*pid, *tid)),
        _ => Err(BridgeError::InvalidPath(format!("{thread} is not a thread"))),
    }
}

/// Converts a non-negative integer argument to the width the agent expects.
pub(crate) fn non_negative<T: TryFrom<i64>>(param: &str, value: i64) -> Result<T> {
    T::try_from(value)
        .map_err(|_| BridgeError::invalid_argument(param, format!("{value} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_from_singleton_pattern() {
        let thread = KeyPath::parse("Processes[1234].Threads[0x10]").unwrap();
        assert_eq!(thread_ids(&thread).unwrap(), (1234, 16));
        assert_eq!(pid_of(&KeyPath::parse("Processes[7]").unwrap()).unwrap(), 7);
        assert!(thread_ids(&KeyPath::parse("Processes[1]").unwrap()).is_err());
    }

    #[test]
    fn test_union_pattern_has_no_ids() {
        let regs = KeyPath::parse("Processes[1].Threads[2].Registers").unwrap();
        assert!(matches!(
            ids_of(REGISTERS, &regs),
            Err(BridgeError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_non_numeric_key_rejected() {
        assert!(parse_id("notepad.exe").is_err());
        assert_eq!(parse_id("42").unwrap(), 42);
    }

    #[test]
    fn test_registry_has_every_method() {
        let registry = registry(&BridgeConfig::default());
        for name in [
            "evaluate",
            "execute",
            "refresh_available",
            "refresh_processes",
            "refresh_environment",
            "refresh_threads",
            "refresh_stack",
            "refresh_registers",
            "refresh_mappings",
            "refresh_modules",
            "refresh_breakpoints",
            "activate_process",
            "activate_thread",
            "activate_frame",
            "remove_process",
            "attach_obj",
            "attach_pid",
            "detach",
            "launch",
            "launch_loader",
            "kill",
            "resume",
            "interrupt",
            "step_into",
            "step_over",
            "step_out",
            "step_to",
            "break_address",
            "break_expression",
            "break_hw_address",
            "break_hw_expression",
            "break_read_range",
            "break_read_expression",
            "break_write_range",
            "break_write_expression",
            "break_access_range",
            "break_access_expression",
            "toggle_breakpoint",
            "delete_breakpoint",
            "read_mem",
            "write_reg",
        ] {
            assert!(registry.get(name).is_ok(), "{name} is not registered");
        }
    }
}
