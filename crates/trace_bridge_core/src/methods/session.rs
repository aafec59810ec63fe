//! Evaluation, process lifecycle and focus methods. None of these touch the
//! trace except `remove_process`.

use super::{ids_of, non_negative, object_param, pid_of, thread_ids, AVAILABLE, FRAME, PROCESS, THREAD};
use crate::ops::{debugger, processes, threads};
use crate::rmi::{Arguments, FnMethod, MethodRegistry, ParamType, Parameter, WireValue};
use crate::types::LaunchRequest;
use crate::{Bridge, BridgeConfig, BridgeError, Result};
use std::time::{Duration, Instant};

pub(crate) fn register(registry: &mut MethodRegistry, config: &BridgeConfig) {
    let launch_timeout = i64::try_from(config.launch_timeout.as_millis()).unwrap_or(i64::MAX);

    registry.register(FnMethod::new(
        "evaluate",
        "Evaluate an expression",
        vec![Parameter::required("expr", ParamType::String, "The expression to evaluate")],
        evaluate,
    ));
    registry.register(FnMethod::new(
        "execute",
        "Execute a native debugger command",
        vec![
            Parameter::required("cmd", ParamType::String, "The command to execute"),
            Parameter::optional(
                "to_string",
                ParamType::Bool,
                false,
                "Capture the command's output and return it",
            ),
        ],
        execute,
    ));
    registry.register(FnMethod::new(
        "activate_process",
        "Switch to the process",
        vec![object_param("process", PROCESS, "Process to activate")],
        activate_process,
    ));
    registry.register(FnMethod::new(
        "activate_thread",
        "Switch to the thread",
        vec![object_param("thread", THREAD, "Thread to activate")],
        activate_thread,
    ));
    registry.register(FnMethod::new(
        "activate_frame",
        "Select the frame",
        vec![object_param("frame", FRAME, "Frame to activate")],
        activate_frame,
    ));
    registry.register(FnMethod::new(
        "remove_process",
        "Detach from the process and remove it from the trace",
        vec![object_param("process", PROCESS, "Process to remove")],
        remove_process,
    ));
    registry.register(FnMethod::new(
        "attach_obj",
        "Attach to an available process",
        vec![object_param("target", AVAILABLE, "Target process to attach to")],
        attach_obj,
    ));
    registry.register(FnMethod::new(
        "attach_pid",
        "Attach to a process by id",
        vec![Parameter::required("pid", ParamType::Int, "Process id to attach to")],
        attach_pid,
    ));
    registry.register(FnMethod::new(
        "detach",
        "Detach from the process",
        vec![object_param("process", PROCESS, "Process to detach from")],
        detach,
    ));
    registry.register(FnMethod::new(
        "kill",
        "Kill the process",
        vec![object_param("process", PROCESS, "Process to kill")],
        kill,
    ));
    registry.register(FnMethod::new(
        "resume",
        "Continue the process",
        vec![object_param("process", PROCESS, "Process to resume")],
        resume,
    ));
    registry.register(FnMethod::new(
        "interrupt",
        "Break into the process",
        vec![object_param("process", PROCESS, "Process to interrupt")],
        interrupt,
    ));
    registry.register(FnMethod::new(
        "launch",
        "Start a program, optionally stopping at its entry",
        vec![
            Parameter::required("file", ParamType::String, "Path of the program"),
            Parameter::optional("args", ParamType::String, "", "Command-line arguments"),
            Parameter::optional(
                "initial_break",
                ParamType::Bool,
                true,
                "Wait for the new process to stop",
            ),
            Parameter::optional(
                "timeout",
                ParamType::Int,
                launch_timeout,
                "Milliseconds to wait for the stop",
            ),
        ],
        launch,
    ));
    registry.register(FnMethod::new(
        "launch_loader",
        "Start a program and stop in its loader",
        vec![
            Parameter::required("file", ParamType::String, "Path of the program"),
            Parameter::optional("args", ParamType::String, "", "Command-line arguments"),
            Parameter::optional(
                "timeout",
                ParamType::Int,
                launch_timeout,
                "Milliseconds to wait for the stop",
            ),
        ],
        launch_loader,
    ));
}

fn evaluate(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    debugger::evaluate(bridge.client(), args.str("expr")?).map(WireValue::String)
}

fn execute(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let output = debugger::execute(bridge.client(), args.str("cmd")?, args.bool("to_string")?)?;
    Ok(output.into())
}

fn activate_process(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let pid = pid_of(args.object("process")?)?;
    processes::select(bridge.client(), pid)?;
    Ok(WireValue::Null)
}

fn activate_thread(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let (pid, tid) = thread_ids(args.object("thread")?)?;
    threads::select(bridge.client(), pid, tid)?;
    Ok(WireValue::Null)
}

fn activate_frame(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let frame = args.object("frame")?;
    let &[pid, tid, level] = ids_of(FRAME, frame)?.as_slice() else {
        return Err(BridgeError::InvalidPath(format!("{frame} is not a frame")));
    };
    threads::select_frame(bridge.client(), pid, tid, level)?;
    Ok(WireValue::Null)
}

fn remove_process(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let process = args.object("process")?;
    processes::detach(bridge.client(), pid_of(process)?)?;

    let mut tx = bridge.trace().begin("Remove process")?;
    tx.remove_object(process)?;
    tx.commit()?;
    Ok(WireValue::Null)
}

fn attach_obj(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let pid = ids_of(AVAILABLE, args.object("target")?)?[0];
    processes::attach(bridge.client(), pid)?;
    Ok(WireValue::Null)
}

fn attach_pid(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let pid = non_negative("pid", args.int("pid")?)?;
    processes::attach(bridge.client(), pid)?;
    Ok(WireValue::Null)
}

fn detach(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    processes::detach(bridge.client(), pid_of(args.object("process")?)?)?;
    Ok(WireValue::Null)
}

fn kill(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    processes::kill(bridge.client(), pid_of(args.object("process")?)?)?;
    Ok(WireValue::Null)
}

fn resume(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    processes::resume(bridge.client(), pid_of(args.object("process")?)?)?;
    Ok(WireValue::Null)
}

fn interrupt(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    processes::interrupt(bridge.client(), pid_of(args.object("process")?)?)?;
    Ok(WireValue::Null)
}

fn launch(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let request = LaunchRequest {
        file: args.str("file")?.to_string(),
        args: args.str("args")?.to_string(),
        initial_break: args.bool("initial_break")?,
        loader: false,
    };
    let timeout = Duration::from_millis(non_negative("timeout", args.int("timeout")?)?);
    start(bridge, &request, timeout).map(WireValue::Bool)
}

fn launch_loader(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let request = LaunchRequest {
        file: args.str("file")?.to_string(),
        args: args.str("args")?.to_string(),
        initial_break: true,
        loader: true,
    };
    let timeout = Duration::from_millis(non_negative("timeout", args.int("timeout")?)?);
    start(bridge, &request, timeout).map(WireValue::Bool)
}

fn start(bridge: &Bridge, request: &LaunchRequest, timeout: Duration) -> Result<bool> {
    let process = processes::launch(bridge.client(), request)?;
    tracing::info!("Launched {} as pid {}", request.file, process.pid);
    if !request.initial_break {
        return Ok(true);
    }
    wait_for_stop(bridge, process.pid, timeout)
}

/// Polls the process state until it reports stopped or `timeout` elapses.
fn wait_for_stop(bridge: &Bridge, pid: u32, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if processes::state(bridge.client(), pid)?.is_stopped() {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            tracing::warn!("Process {} did not stop within {:?}", pid, timeout);
            return Ok(false);
        }
        std::thread::sleep(bridge.config().poll_interval);
    }
}
