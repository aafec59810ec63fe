#![allow(dead_code)]

//! An in-memory debugger agent speaking the bridge's JSON-RPC methods.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trace_bridge_core::{
    Bridge, BridgeConfig, BridgeError, Result, Transport, WireArgs, WireValue,
};

pub const INSN_SIZE: u64 = 4;
pub const ENTRY: u64 = 0x401000;
pub const CALLEE: u64 = 0x402000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insn {
    Plain,
    Call(u64),
    Ret,
}

#[derive(Debug, Clone)]
pub struct SimThread {
    pub pc: u64,
    pub sp: u64,
    pub rax: u64,
    /// Return addresses, innermost last.
    pub call_stack: Vec<u64>,
    /// A running thread reports no pc or sp and does not stop after a step.
    pub running: bool,
}

impl SimThread {
    fn at(pc: u64) -> Self {
        Self {
            pc,
            sp: 0x7ff0_0000,
            rax: 0,
            call_stack: Vec::new(),
            running: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimBreakpoint {
    pub id: u32,
    pub address: Option<u64>,
    pub size: u64,
    pub kind: String,
    pub enabled: bool,
    pub expression: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SimProcess {
    pub name: String,
    pub state: String,
    pub threads: BTreeMap<u32, SimThread>,
    pub breakpoints: BTreeMap<u32, SimBreakpoint>,
    pub modules: Vec<(String, u64, u64)>,
}

impl SimProcess {
    fn new(name: &str) -> Self {
        let mut threads = BTreeMap::new();
        threads.insert(1, SimThread::at(ENTRY));
        Self {
            name: name.to_string(),
            state: "STOPPED".to_string(),
            threads,
            breakpoints: BTreeMap::new(),
            modules: vec![
                (name.to_string(), 0x400000, 0x10000),
                ("libc.so.6".to_string(), 0x7f00_0000, 0x20_0000),
            ],
        }
    }
}

#[derive(Debug, Default)]
pub struct SimState {
    pub available: BTreeMap<u32, String>,
    pub processes: BTreeMap<u32, SimProcess>,
    /// Instruction at each address; anything else is a plain instruction.
    pub program: BTreeMap<u64, Insn>,
    pub next_breakpoint: u32,
    pub next_pid: u32,
    pub selected: Option<(u32, Option<u32>, Option<u32>)>,
    pub executed: Vec<String>,
    pub calls: Vec<String>,
    /// When set, launched processes keep running.
    pub launch_runs_away: bool,
    /// Reported after the built-in registers.
    pub extra_registers: Vec<(String, u64)>,
}

/// The simulated agent. Clone the `Arc` to inspect state from a test.
#[derive(Debug, Default)]
pub struct SimDebugger {
    pub state: Mutex<SimState>,
}

fn rpc_error(message: impl Into<String>) -> BridgeError {
    BridgeError::json_rpc(-32000, message)
}

fn param<'a>(params: &'a Value, name: &str) -> Result<&'a Value> {
    params
        .get(name)
        .ok_or_else(|| BridgeError::json_rpc(-32602, format!("missing param {name}")))
}

fn u32_param(params: &Value, name: &str) -> Result<u32> {
    param(params, name)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| BridgeError::json_rpc(-32602, format!("bad param {name}")))
}

fn u64_param(params: &Value, name: &str) -> Result<u64> {
    param(params, name)?
        .as_u64()
        .ok_or_else(|| BridgeError::json_rpc(-32602, format!("bad param {name}")))
}

fn hex(v: u64) -> String {
    format!("{v:#x}")
}

impl SimDebugger {
    pub fn new() -> Arc<Self> {
        let sim = Self::default();
        {
            let mut state = sim.state.lock().unwrap();
            state.available.insert(100, "init".into());
            state.available.insert(4321, "notepad.exe".into());
            state.available.insert(5555, "calc.exe".into());
            state.next_pid = 1000;
            state.program.insert(ENTRY + INSN_SIZE, Insn::Call(CALLEE));
            state.program.insert(CALLEE + 2 * INSN_SIZE, Insn::Ret);
        }
        Arc::new(sim)
    }

    /// A simulator with `pid` already attached.
    pub fn with_process(pid: u32) -> Arc<Self> {
        let sim = Self::new();
        sim.attach(pid);
        sim
    }

    pub fn attach(&self, pid: u32) {
        let mut state = self.state.lock().unwrap();
        let name = state
            .available
            .get(&pid)
            .cloned()
            .unwrap_or_else(|| format!("proc{pid}"));
        state.processes.insert(pid, SimProcess::new(&name));
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn pc(&self, pid: u32, tid: u32) -> u64 {
        self.with_state(|s| s.processes[&pid].threads[&tid].pc)
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    fn thread<'a>(state: &'a mut SimState, params: &Value) -> Result<&'a mut SimThread> {
        let pid = u32_param(params, "pid")?;
        let tid = u32_param(params, "tid")?;
        state
            .processes
            .get_mut(&pid)
            .and_then(|p| p.threads.get_mut(&tid))
            .ok_or_else(|| rpc_error(format!("No thread {tid} in process {pid}")))
    }

    fn process<'a>(state: &'a mut SimState, params: &Value) -> Result<&'a mut SimProcess> {
        let pid = u32_param(params, "pid")?;
        state
            .processes
            .get_mut(&pid)
            .ok_or_else(|| rpc_error(format!("No such process: {pid}")))
    }

    fn step(program: &BTreeMap<u64, Insn>, thread: &mut SimThread, kind: &str) {
        let insn = program.get(&thread.pc).copied().unwrap_or(Insn::Plain);
        match (kind, insn) {
            ("out", _) => match thread.call_stack.pop() {
                Some(ret) => thread.pc = ret,
                None => thread.pc += INSN_SIZE,
            },
            ("into", Insn::Call(target)) => {
                thread.call_stack.push(thread.pc + INSN_SIZE);
                thread.pc = target;
            }
            (_, Insn::Ret) => match thread.call_stack.pop() {
                Some(ret) => thread.pc = ret,
                None => thread.pc += INSN_SIZE,
            },
            _ => thread.pc += INSN_SIZE,
        }
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.calls.push(method.to_string());

        match method {
            "debugger.evaluate" => {
                let expression = param(params, "expression")?.as_str().unwrap_or_default();
                let mut total = 0u64;
                for term in expression.split('+') {
                    let term = term.trim();
                    let value = match term.strip_prefix("0x") {
                        Some(h) => u64::from_str_radix(h, 16).ok(),
                        None => term.parse().ok(),
                    };
                    total += value.ok_or_else(|| rpc_error(format!("Cannot evaluate '{expression}'")))?;
                }
                Ok(json!(hex(total)))
            }
            "debugger.execute" => {
                let command = param(params, "command")?.as_str().unwrap_or_default().to_string();
                state.executed.push(command.clone());
                Ok(json!(format!("executed {command}\n")))
            }
            "debugger.environment" => {
                Self::process(state, params)?;
                Ok(json!({"debugger": "sim", "arch": "x86_64", "os": "linux", "endian": "little"}))
            }
            "process.available" => Ok(Value::Array(
                state
                    .available
                    .iter()
                    .map(|(pid, name)| json!({"pid": pid, "name": name}))
                    .collect(),
            )),
            "process.list" => Ok(Value::Array(
                state
                    .processes
                    .iter()
                    .map(|(pid, p)| json!({"pid": pid, "name": p.name, "state": p.state}))
                    .collect(),
            )),
            "process.attach" => {
                let pid = u32_param(params, "pid")?;
                if !state.available.contains_key(&pid) {
                    return Err(rpc_error(format!("Could not attach to {pid}: no such process")));
                }
                let name = state.available[&pid].clone();
                state.processes.insert(pid, SimProcess::new(&name));
                Ok(Value::Null)
            }
            "process.detach" | "process.kill" => {
                let pid = u32_param(params, "pid")?;
                state
                    .processes
                    .remove(&pid)
                    .ok_or_else(|| rpc_error(format!("No such process: {pid}")))?;
                Ok(Value::Null)
            }
            "process.launch" => {
                let file = param(params, "file")?.as_str().unwrap_or_default().to_string();
                let initial_break = params
                    .get("initial_break")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let pid = state.next_pid;
                state.next_pid += 1;
                let mut process = SimProcess::new(&file);
                if !initial_break || state.launch_runs_away {
                    process.state = "RUNNING".into();
                }
                state.processes.insert(pid, process);
                Ok(json!({"pid": pid, "name": file}))
            }
            "process.state" => {
                let pid = u32_param(params, "pid")?;
                let process = Self::process(state, params)?;
                Ok(json!({"pid": pid, "state": process.state}))
            }
            "process.resume" => {
                Self::process(state, params)?.state = "RUNNING".into();
                Ok(Value::Null)
            }
            "process.interrupt" => {
                Self::process(state, params)?.state = "STOPPED".into();
                Ok(Value::Null)
            }
            "process.select" => {
                let pid = u32_param(params, "pid")?;
                Self::process(state, params)?;
                state.selected = Some((pid, None, None));
                Ok(Value::Null)
            }
            "thread.list" => {
                let process = Self::process(state, params)?;
                Ok(Value::Array(
                    process
                        .threads
                        .iter()
                        .map(|(tid, t)| {
                            if t.running {
                                json!({"tid": tid, "name": format!("worker{tid}"), "state": "running"})
                            } else {
                                json!({"tid": tid, "name": format!("worker{tid}"), "pc": hex(t.pc), "sp": t.sp})
                            }
                        })
                        .collect(),
                ))
            }
            "thread.select" => {
                let pid = u32_param(params, "pid")?;
                let tid = u32_param(params, "tid")?;
                Self::thread(state, params)?;
                state.selected = Some((pid, Some(tid), None));
                Ok(Value::Null)
            }
            "frame.select" => {
                let pid = u32_param(params, "pid")?;
                let tid = u32_param(params, "tid")?;
                let level = u32_param(params, "level")?;
                Self::thread(state, params)?;
                state.selected = Some((pid, Some(tid), Some(level)));
                Ok(Value::Null)
            }
            "thread.frames" => {
                let thread = Self::thread(state, params)?;
                let mut frames = vec![json!({"level": 0, "pc": hex(thread.pc), "function": "current"})];
                for (depth, ret) in thread.call_stack.iter().rev().enumerate() {
                    frames.push(json!({"level": depth + 1, "pc": hex(*ret)}));
                }
                Ok(Value::Array(frames))
            }
            "thread.registers" => {
                let level = params.get("level").and_then(Value::as_u64).unwrap_or(0) as usize;
                let thread = Self::thread(state, params)?;
                let pc = if level == 0 {
                    thread.pc
                } else {
                    thread
                        .call_stack
                        .iter()
                        .rev()
                        .nth(level - 1)
                        .copied()
                        .ok_or_else(|| rpc_error(format!("No frame {level}")))?
                };
                let mut registers = vec![
                    json!({"name": "rip", "value": hex(pc), "size": 8}),
                    json!({"name": "rsp", "value": thread.sp, "size": 8}),
                    json!({"name": "eax", "value": thread.rax & 0xffff_ffff, "size": 4}),
                ];
                for (name, value) in &state.extra_registers {
                    registers.push(json!({"name": name, "value": value, "size": 8}));
                }
                Ok(Value::Array(registers))
            }
            "thread.write_register" => {
                let name = param(params, "name")?.as_str().unwrap_or_default().to_string();
                let value = u64_param(params, "value")?;
                let thread = Self::thread(state, params)?;
                match name.as_str() {
                    "rip" => thread.pc = value,
                    "rsp" => thread.sp = value,
                    "eax" => thread.rax = value,
                    other => return Err(rpc_error(format!("Unknown register {other}"))),
                }
                Ok(Value::Null)
            }
            "thread.step" => {
                let kind = param(params, "kind")?.as_str().unwrap_or("into").to_string();
                let program = state.program.clone();
                let thread = Self::thread(state, params)?;
                if thread.running {
                    return Ok(json!({"stopped": false}));
                }
                Self::step(&program, thread, &kind);
                Ok(json!(true))
            }
            "thread.pc" => {
                let thread = Self::thread(state, params)?;
                Ok(json!({"pc": hex(thread.pc)}))
            }
            "memory.regions" => {
                Self::process(state, params)?;
                Ok(json!([
                    {"base": "0x400000", "size": 0x1000, "name": "text", "readable": true, "executable": true},
                    {"base": 0x600000, "size": 0x2000, "name": "data", "readable": true, "writable": true},
                ]))
            }
            "memory.read" => {
                Self::process(state, params)?;
                let address = u64_param(params, "address")?;
                let length = u64_param(params, "length")?;
                let bytes: Vec<u8> = (address..address + length).map(|a| (a & 0xff) as u8).collect();
                Ok(json!({"address": hex(address), "data": BASE64.encode(bytes)}))
            }
            "module.list" => {
                let process = Self::process(state, params)?;
                Ok(Value::Array(
                    process
                        .modules
                        .iter()
                        .map(|(name, base, size)| json!({"name": name, "base": hex(*base), "size": size}))
                        .collect(),
                ))
            }
            "breakpoint.list" => {
                let process = Self::process(state, params)?;
                Ok(Value::Array(process.breakpoints.values().map(bp_json).collect()))
            }
            "breakpoint.set" => {
                let pid = match params.get("pid").and_then(Value::as_u64) {
                    Some(pid) => pid as u32,
                    None => state
                        .selected
                        .map(|(pid, _, _)| pid)
                        .or_else(|| state.processes.keys().next().copied())
                        .ok_or_else(|| rpc_error("No current process"))?,
                };
                let id = state.next_breakpoint;
                state.next_breakpoint += 1;
                let bp = SimBreakpoint {
                    id,
                    address: params.get("address").and_then(Value::as_u64),
                    size: u64_param(params, "size")?,
                    kind: param(params, "type")?.as_str().unwrap_or("sw").to_string(),
                    enabled: true,
                    expression: params
                        .get("expression")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                };
                let process = state
                    .processes
                    .get_mut(&pid)
                    .ok_or_else(|| rpc_error(format!("No such process: {pid}")))?;
                let reply = bp_json(&bp);
                process.breakpoints.insert(id, bp);
                Ok(reply)
            }
            "breakpoint.toggle" => {
                let id = u32_param(params, "id")?;
                let enabled = param(params, "enabled")?.as_bool().unwrap_or(true);
                let process = Self::process(state, params)?;
                process
                    .breakpoints
                    .get_mut(&id)
                    .ok_or_else(|| rpc_error(format!("No breakpoint {id}")))?
                    .enabled = enabled;
                Ok(Value::Null)
            }
            "breakpoint.delete" => {
                let id = u32_param(params, "id")?;
                let process = Self::process(state, params)?;
                process
                    .breakpoints
                    .remove(&id)
                    .ok_or_else(|| rpc_error(format!("No breakpoint {id}")))?;
                Ok(Value::Null)
            }
            other => Err(BridgeError::json_rpc(-32601, format!("Method not found: {other}"))),
        }
    }
}

fn bp_json(bp: &SimBreakpoint) -> Value {
    json!({
        "id": bp.id,
        "address": bp.address.map(hex),
        "size": bp.size,
        "type": bp.kind,
        "enabled": bp.enabled,
        "expression": bp.expression,
    })
}

impl Transport for SimDebugger {
    fn send_rpc(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.handle(method, &params.unwrap_or(Value::Null))
    }
}

pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        trace_name: "sim".into(),
        launch_timeout: Duration::from_millis(40),
        step_budget: 16,
        poll_interval: Duration::from_millis(1),
        ..BridgeConfig::default()
    }
}

pub fn bridge(sim: &Arc<SimDebugger>) -> Bridge {
    Bridge::with_transport(test_config(), sim.clone()).unwrap()
}

pub fn args(pairs: &[(&str, WireValue)]) -> WireArgs {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub fn obj(path: &str) -> WireValue {
    WireValue::Object {
        path: path.to_string(),
    }
}

pub fn addr(offset: u64) -> WireValue {
    WireValue::Address {
        space: None,
        offset,
    }
}

pub fn range(min: u64, max: u64) -> WireValue {
    WireValue::Range {
        space: None,
        min,
        max,
    }
}

/// Invokes `method` with `pairs`, panicking on failure.
pub fn call(bridge: &Bridge, method: &str, pairs: &[(&str, WireValue)]) -> WireValue {
    bridge
        .invoke(method, &args(pairs))
        .unwrap_or_else(|e| panic!("{method} failed: {e}"))
}

/// Refreshes processes and then the threads of `pid`.
pub fn sync_process(bridge: &Bridge, pid: u32) {
    call(bridge, "refresh_processes", &[("node", obj("Processes"))]);
    call(
        bridge,
        "refresh_threads",
        &[("node", obj(&format!("Processes[{pid}].Threads")))],
    );
}
