use super::{non_negative, object_param, thread_ids, THREAD};
use crate::ops::threads;
use crate::rmi::{Arguments, FnMethod, MethodRegistry, ParamType, Parameter, WireValue};
use crate::types::StepKind;
use crate::{Bridge, BridgeConfig, Result};

pub(crate) fn register(registry: &mut MethodRegistry, config: &BridgeConfig) {
    let steps: [(&'static str, &'static str, StepKind); 3] = [
        ("step_into", "Step one instruction, descending into calls", StepKind::Into),
        ("step_over", "Step one instruction, passing over calls", StepKind::Over),
        ("step_out", "Run until the current function returns", StepKind::Out),
    ];
    for (name, description, kind) in steps {
        registry.register(FnMethod::new(
            name,
            description,
            vec![object_param("thread", THREAD, "Thread to step")],
            move |bridge: &Bridge, args: &Arguments| {
                let (pid, tid) = thread_ids(args.object("thread")?)?;
                threads::step(bridge.client(), pid, tid, kind).map(WireValue::Bool)
            },
        ));
    }

    registry.register(FnMethod::new(
        "step_to",
        "Step into until the thread reaches an address",
        vec![
            object_param("thread", THREAD, "Thread to step"),
            Parameter::required("address", ParamType::Address, "Address to stop at"),
            Parameter::optional(
                "max",
                ParamType::Int,
                i64::from(config.step_budget),
                "Maximum number of steps",
            ),
        ],
        step_to,
    ));
}

fn step_to(bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
    let (pid, tid) = thread_ids(args.object("thread")?)?;
    let target = args.address("address")?.offset;
    let max: u64 = non_negative("max", args.int("max")?)?;

    let mut taken = 0;
    loop {
        if threads::pc(bridge.client(), pid, tid)? == target {
            tracing::debug!("Thread {} reached {:#x} after {} steps", tid, target, taken);
            return Ok(WireValue::Bool(true));
        }
        if taken >= max {
            tracing::debug!("Thread {} did not reach {:#x} within {} steps", tid, target, max);
            return Ok(WireValue::Bool(false));
        }
        if !threads::step(bridge.client(), pid, tid, StepKind::Into)? {
            tracing::debug!("Thread {} kept running after step {}", tid, taken + 1);
            return Ok(WireValue::Bool(false));
        }
        taken += 1;
    }
}
