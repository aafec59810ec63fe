//! Refresh methods: each one reads live state from the agent and reconciles
//! one subtree of the trace in a single transaction.
//!
//! | domain      | stale entries                       |
//! |-------------|-------------------------------------|
//! | available   | removed                             |
//! | processes   | kept, `_state` set to `TERMINATED`  |
//! | threads     | removed                             |
//! | stack       | replaced wholesale                  |
//! | registers   | overwritten                         |
//! | mappings    | removed                             |
//! | modules     | removed                             |
//! | breakpoints | removed                             |
//! | environment | overwritten                         |

use super::{ids_of, object_param, process_path, REGISTERS};
use crate::address::{Address, AddressRange};
use crate::ops::{breakpoints, debugger, memory, processes, threads};
use crate::rmi::{Arguments, FnMethod, MethodRegistry, WireValue};
use crate::trace::{Attribute, KeyPath, ModelAttribute, PathPredicates, Transaction, TraceValue};
use crate::{Bridge, BridgeError, Result};
use std::collections::BTreeSet;

const TERMINATED: &str = "TERMINATED";

type Refresh = fn(&Bridge, &KeyPath) -> Result<()>;

pub(crate) fn register(registry: &mut MethodRegistry) {
    let refreshes: [(&'static str, &'static str, &'static str, Refresh); 9] = [
        ("refresh_available", "Refresh the list of attachable processes", "Available", available),
        ("refresh_processes", "Refresh the list of processes", "Processes", processes),
        (
            "refresh_environment",
            "Refresh the debugger and target environment",
            "Processes[].Environment",
            environment,
        ),
        ("refresh_threads", "Refresh the threads of a process", "Processes[].Threads", threads),
        ("refresh_stack", "Refresh the call stack of a thread", "Processes[].Threads[].Stack", stack),
        ("refresh_registers", "Refresh register values", REGISTERS, registers),
        ("refresh_mappings", "Refresh memory regions", "Processes[].Memory", mappings),
        ("refresh_modules", "Refresh loaded modules", "Processes[].Modules", modules),
        ("refresh_breakpoints", "Refresh breakpoints", "Processes[].Breakpoints", breakpoints),
    ];

    for (name, description, pattern, refresh) in refreshes {
        registry.register(FnMethod::new(
            name,
            description,
            vec![object_param("node", pattern, "Node to refresh")],
            move |bridge: &Bridge, args: &Arguments| {
                refresh(bridge, args.object("node")?)?;
                Ok(WireValue::Null)
            },
        ));
    }
}

/// Live children of `node` as of the transaction's snapshot.
fn live_children(tx: &Transaction<'_>, node: &KeyPath) -> Vec<KeyPath> {
    let view = tx.view();
    view.object_at(tx.snap(), node)
        .map(|object| {
            object
                .children(tx.snap())
                .into_iter()
                .map(|child| child.path().clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Removes every live child of `node` that is not in `keep`.
fn remove_stale(tx: &mut Transaction<'_>, node: &KeyPath, keep: &BTreeSet<KeyPath>) -> Result<()> {
    for child in live_children(tx, node) {
        if !keep.contains(&child) {
            tx.remove_object(&child)?;
        }
    }
    Ok(())
}

fn process_of(node: &KeyPath, pattern: &str) -> Result<u32> {
    Ok(ids_of(pattern, node)?[0])
}

pub(crate) fn available(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let available = processes::available(bridge.client())?;

    let mut tx = bridge.trace().begin("Refresh available")?;
    let mut keep = BTreeSet::new();
    for info in &available {
        let path = node.index(info.pid);
        tx.create_object(&path);
        tx.put(&path, ModelAttribute::Pid, i64::from(info.pid));
        tx.put(&path, ModelAttribute::Display, format!("{} {}", info.pid, info.name));
        tx.put_or_clear(&path, Attribute::parse("command_line")?, info.command_line.as_deref());
        let process = process_path(info.pid);
        if tx.view().object_at(tx.snap(), &process).is_some() {
            tx.put(&path, ModelAttribute::Process, TraceValue::Object(process));
        }
        keep.insert(path);
    }
    remove_stale(&mut tx, node, &keep)?;
    tx.commit()?;
    Ok(())
}

pub(crate) fn processes(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let live = processes::list(bridge.client())?;

    let mut tx = bridge.trace().begin("Refresh processes")?;
    let mut seen = BTreeSet::new();
    for info in &live {
        let path = node.index(info.pid);
        tx.create_object(&path);
        for container in ["Threads", "Memory", "Modules", "Breakpoints", "Environment"] {
            tx.create_object(&path.key(container));
        }
        tx.put(&path, ModelAttribute::Pid, i64::from(info.pid));
        let display = match &info.name {
            Some(name) => format!("{} {}", info.pid, name),
            None => info.pid.to_string(),
        };
        tx.put(&path, ModelAttribute::Display, display);
        tx.put_or_clear(&path, ModelAttribute::State, info.state.as_deref().map(str::to_uppercase));
        tx.put_or_clear(&path, ModelAttribute::ExitCode, info.exit_code);
        seen.insert(path);
    }
    for stale in live_children(&tx, node) {
        if !seen.contains(&stale) {
            tx.put(&stale, ModelAttribute::State, TERMINATED);
        }
    }
    tx.commit()?;
    Ok(())
}

pub(crate) fn environment(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let pid = process_of(node, "Processes[].Environment")?;
    let env = debugger::environment(bridge.client(), pid)?;

    let mut tx = bridge.trace().begin("Refresh environment")?;
    tx.create_object(node);
    let fields = [
        (ModelAttribute::Debugger, &env.debugger),
        (ModelAttribute::Arch, &env.arch),
        (ModelAttribute::Os, &env.os),
        (ModelAttribute::Endian, &env.endian),
    ];
    for (attribute, value) in fields {
        tx.put_or_clear(node, attribute, value.as_deref());
    }
    tx.commit()?;
    Ok(())
}

pub(crate) fn threads(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let pid = process_of(node, "Processes[].Threads")?;
    let live = threads::list(bridge.client(), pid)?;

    let mut tx = bridge.trace().begin("Refresh threads")?;
    let mut keep = BTreeSet::new();
    for info in &live {
        let path = node.index(info.tid);
        tx.create_object(&path);
        tx.create_object(&path.key("Stack"));
        tx.create_object(&path.key("Registers"));
        tx.put(&path, ModelAttribute::Tid, i64::from(info.tid));
        let display = match &info.name {
            Some(name) => format!("{} {}", info.tid, name),
            None => info.tid.to_string(),
        };
        tx.put(&path, ModelAttribute::Display, display);
        tx.put_or_clear(&path, ModelAttribute::State, info.state.as_deref().map(str::to_uppercase));
        tx.put_or_clear(&path, ModelAttribute::Pc, info.pc.map(Address::new));
        tx.put_or_clear(&path, ModelAttribute::Sp, info.sp.map(Address::new));
        keep.insert(path);
    }
    remove_stale(&mut tx, node, &keep)?;
    tx.commit()?;
    Ok(())
}

pub(crate) fn stack(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let ids = ids_of("Processes[].Threads[].Stack", node)?;
    let frames = threads::frames(bridge.client(), ids[0], ids[1])?;

    let mut tx = bridge.trace().begin("Refresh stack")?;
    for old in live_children(&tx, node) {
        tx.remove_object(&old)?;
    }
    for frame in &frames {
        let path = node.index(frame.level);
        tx.create_object(&path);
        tx.create_object(&path.key("Registers"));
        tx.put(&path, ModelAttribute::Level, i64::from(frame.level));
        tx.put(&path, ModelAttribute::Pc, Address::new(frame.pc));
        if let Some(sp) = frame.sp {
            tx.put(&path, ModelAttribute::Sp, Address::new(sp));
        }
        let display = match &frame.function {
            Some(function) => {
                tx.put(&path, ModelAttribute::Function, function.as_str());
                format!("#{} {:#x} in {}", frame.level, frame.pc, function)
            }
            None => format!("#{} {:#x}", frame.level, frame.pc),
        };
        tx.put(&path, ModelAttribute::Display, display);
    }
    tx.commit()?;
    Ok(())
}

/// `(pid, tid, frame level)` of a registers node.
pub(crate) fn registers_owner(node: &KeyPath) -> Result<(u32, u32, Option<u32>)> {
    let predicates = PathPredicates::parse(REGISTERS)?;
    for pattern in predicates.patterns() {
        if let Some(keys) = pattern.match_keys(node) {
            let ids = keys
                .iter()
                .map(|key| super::parse_id(key))
                .collect::<Result<Vec<_>>>()?;
            return match ids.as_slice() {
                [pid, tid] => Ok((*pid, *tid, None)),
                [pid, tid, level] => Ok((*pid, *tid, Some(*level))),
                _ => Err(BridgeError::InvalidPath(format!("{node} is not a registers node"))),
            };
        }
    }
    Err(BridgeError::InvalidPath(format!("{node} does not match {REGISTERS}")))
}

pub(crate) fn registers(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let (pid, tid, level) = registers_owner(node)?;
    let values = threads::registers(bridge.client(), pid, tid, level)?;

    let mut tx = bridge.trace().begin("Refresh registers")?;
    tx.create_object(node);
    for register in &values {
        let bytes = register.to_bytes();
        tx.put_register(node, &register.name, bytes.clone());
        match Attribute::parse(&register.name) {
            Ok(attribute @ Attribute::Custom(_)) => tx.put(node, attribute, TraceValue::Bytes(bytes)),
            _ => tracing::warn!(
                "Register {:?} of {} has no attribute form; kept in the register space only",
                register.name,
                node
            ),
        }
    }
    tx.commit()?;
    Ok(())
}

pub(crate) fn mappings(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let pid = process_of(node, "Processes[].Memory")?;
    let regions = memory::regions(bridge.client(), pid)?;

    let mut tx = bridge.trace().begin("Refresh mappings")?;
    let mut keep = BTreeSet::new();
    for region in &regions {
        let key = format!("{:#x}", region.base);
        let path = node.index(&key);
        let range = AddressRange::from_len(&Address::new(region.base), region.size);
        tx.create_object(&path);
        tx.put(&path, ModelAttribute::Range, range);
        tx.put(&path, ModelAttribute::Readable, region.readable);
        tx.put(&path, ModelAttribute::Writable, region.writable);
        tx.put(&path, ModelAttribute::Executable, region.executable);
        tx.put(&path, ModelAttribute::Display, region.name.clone().unwrap_or(key));
        keep.insert(path);
    }
    remove_stale(&mut tx, node, &keep)?;
    tx.commit()?;
    Ok(())
}

pub(crate) fn modules(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let pid = process_of(node, "Processes[].Modules")?;
    let loaded = memory::modules(bridge.client(), pid)?;

    let mut tx = bridge.trace().begin("Refresh modules")?;
    let mut keep = BTreeSet::new();
    for module in &loaded {
        let path = node.index(&module.name);
        let range = AddressRange::from_len(&Address::new(module.base), module.size);
        tx.create_object(&path);
        tx.put(&path, ModelAttribute::ModuleName, module.name.as_str());
        tx.put(&path, ModelAttribute::Range, range);
        tx.put(&path, ModelAttribute::Display, module.name.as_str());
        keep.insert(path);
    }
    remove_stale(&mut tx, node, &keep)?;
    tx.commit()?;
    Ok(())
}

pub(crate) fn breakpoints(bridge: &Bridge, node: &KeyPath) -> Result<()> {
    let pid = process_of(node, "Processes[].Breakpoints")?;
    let listed = breakpoints::list(bridge.client(), pid)?;

    let mut tx = bridge.trace().begin("Refresh breakpoints")?;
    let mut keep = BTreeSet::new();
    for bp in &listed {
        let path = node.index(bp.id);
        tx.create_object(&path);
        let range = bp
            .address
            .map(|address| AddressRange::from_len(&Address::new(address), bp.size));
        tx.put_or_clear(&path, ModelAttribute::Range, range);
        tx.put(&path, ModelAttribute::Kinds, bp.kind.kinds());
        tx.put(&path, ModelAttribute::Enabled, bp.enabled);
        tx.put_or_clear(&path, ModelAttribute::Expression, bp.expression.as_deref());
        tx.put(&path, ModelAttribute::Display, bp.to_string());
        keep.insert(path);
    }
    remove_stale(&mut tx, node, &keep)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_owner_for_thread_and_frame() {
        let thread_regs = KeyPath::parse("Processes[1].Threads[2].Registers").unwrap();
        assert_eq!(registers_owner(&thread_regs).unwrap(), (1, 2, None));

        let frame_regs = KeyPath::parse("Processes[1].Threads[2].Stack[3].Registers").unwrap();
        assert_eq!(registers_owner(&frame_regs).unwrap(), (1, 2, Some(3)));

        let not_regs = KeyPath::parse("Processes[1].Threads[2]").unwrap();
        assert!(registers_owner(&not_regs).is_err());
    }
}
