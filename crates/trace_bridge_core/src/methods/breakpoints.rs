use super::{ids_of, object_param, pid_of, BREAKPOINT, PROCESS};
use crate::ops::breakpoints;
use crate::rmi::{Arguments, FnMethod, MethodRegistry, ParamType, Parameter, WireValue};
use crate::types::{BreakpointRequest, BreakpointType};
use crate::{Bridge, BridgeError, Result};

pub(crate) fn register(registry: &mut MethodRegistry) {
    let at_address: [(&'static str, &'static str, BreakpointType); 2] = [
        ("break_address", "Set a software breakpoint", BreakpointType::Software),
        ("break_hw_address", "Set a hardware breakpoint", BreakpointType::Hardware),
    ];
    for (name, description, kind) in at_address {
        registry.register(FnMethod::new(
            name,
            description,
            vec![
                object_param("process", PROCESS, "Process to break in"),
                Parameter::required("address", ParamType::Address, "Address to break at"),
            ],
            move |bridge: &Bridge, args: &Arguments| {
                let pid = pid_of(args.object("process")?)?;
                let address = args.address("address")?.offset;
                set(bridge, BreakpointRequest::at_address(pid, address, 1, kind))
            },
        ));
    }

    let on_range: [(&'static str, &'static str, BreakpointType); 3] = [
        ("break_read_range", "Set a read watchpoint", BreakpointType::Read),
        ("break_write_range", "Set a write watchpoint", BreakpointType::Write),
        ("break_access_range", "Set an access watchpoint", BreakpointType::Access),
    ];
    for (name, description, kind) in on_range {
        registry.register(FnMethod::new(
            name,
            description,
            vec![
                object_param("process", PROCESS, "Process to watch"),
                Parameter::required("range", ParamType::Range, "Range to watch"),
            ],
            move |bridge: &Bridge, args: &Arguments| {
                let pid = pid_of(args.object("process")?)?;
                let range = args.range("range")?;
                set(
                    bridge,
                    BreakpointRequest::at_address(pid, range.min, range.byte_len()?, kind),
                )
            },
        ));
    }

    let on_expression: [(&'static str, &'static str, BreakpointType); 5] = [
        ("break_expression", "Set a software breakpoint at an expression", BreakpointType::Software),
        ("break_hw_expression", "Set a hardware breakpoint at an expression", BreakpointType::Hardware),
        ("break_read_expression", "Set a read watchpoint at an expression", BreakpointType::Read),
        ("break_write_expression", "Set a write watchpoint at an expression", BreakpointType::Write),
        ("break_access_expression", "Set an access watchpoint at an expression", BreakpointType::Access),
    ];
    for (name, description, kind) in on_expression {
        registry.register(FnMethod::new(
            name,
            description,
            vec![Parameter::required(
                "expression",
                ParamType::String,
                "Expression to break at",
            )],
            move |bridge: &Bridge, args: &Arguments| {
                let expression = args.str("expression")?;
                set(bridge, BreakpointRequest::at_expression(expression, 1, kind))
            },
        ));
    }

    registry.register(FnMethod::new(
        "toggle_breakpoint",
        "Enable or disable a breakpoint",
        vec![
            object_param("breakpoint", BREAKPOINT, "Breakpoint to toggle"),
            Parameter::required("enabled", ParamType::Bool, "New state"),
        ],
        toggle_breakpoint,
    ));
    registry.register(FnMethod::new(
        "delete_breakpoint",
        "Delete a breakpoint",
        vec![object_param("breakpoint", BREAKPOINT, "Breakpoint to delete")],
        delete_breakpoint,
    ));
}

fn set(bridge: &Bridge, request: BreakpointRequest) -> Result<WireValue> {
    let info = breakpoints::set(bridge.client(), &request)?;
    tracing::debug!("Set breakpoint {}", info);
    Ok(WireValue::Null)
}

/// `(pid, breakpoint id)` of a breakpoint path.
fn breakpoint_ids(args: &Arguments) -> Result<(u32, u32)> {
    let breakpoint = args.object("breakpoint")?;
    match ids_of(BREAKPOINT, breakpoint)?.as_slice() {
        [pid, id] => Ok((*pid, *id)),
        _ => Err(BridgeError::InvalidPath(format!("{breakpoint} is not a breakpoint"))),
    }
}

fn toggle_breakpoint(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let (pid, id) = breakpoint_ids(args)?;
    breakpoints::toggle(bridge.client(), pid, id, args.bool("enabled")?)?;
    Ok(WireValue::Null)
}

fn delete_breakpoint(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let (pid, id) = breakpoint_ids(args)?;
    breakpoints::delete(bridge.client(), pid, id)?;
    Ok(WireValue::Null)
}
