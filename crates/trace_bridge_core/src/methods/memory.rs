use super::{object_param, pid_of, refresh, PROCESS, REGISTERS};
use crate::ops::{memory, threads};
use crate::rmi::{Arguments, FnMethod, MethodRegistry, ParamType, Parameter, WireValue};
use crate::{Bridge, Result};

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register(FnMethod::new(
        "read_mem",
        "Read memory and record it in the trace",
        vec![
            object_param("process", PROCESS, "Process to read"),
            Parameter::required("range", ParamType::Range, "Range to read"),
        ],
        read_mem,
    ));
    registry.register(FnMethod::new(
        "write_reg",
        "Write a register and record the new value",
        vec![
            object_param("node", REGISTERS, "Registers to write"),
            Parameter::required("name", ParamType::String, "Register name"),
            Parameter::required("value", ParamType::Int, "New value"),
        ],
        write_reg,
    ));
}

fn read_mem(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let process = args.object("process")?;
    let range = args.range("range")?;
    let length = range.byte_len()?;
    let bytes = memory::read(bridge.client(), pid_of(process)?, range.min, length)?;

    let mut tx = bridge.trace().begin("Read memory")?;
    tx.put_memory(process, range.min, bytes.clone());
    tx.commit()?;
    Ok(WireValue::bytes(&bytes))
}

fn write_reg(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let node = args.object("node")?;
    let (pid, tid, level) = refresh::registers_owner(node)?;
    if let Some(level) = level {
        threads::select_frame(bridge.client(), pid, tid, level)?;
    }
    // Negative values are written as their two's-complement bit pattern.
    let value = args.int("value")? as u64;
    threads::write_register(bridge.client(), pid, tid, args.str("name")?, value)?;
    refresh::registers(bridge, node)?;
    Ok(WireValue::Null)
}
