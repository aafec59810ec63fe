use super::method::{ArgValue, ParamType, Parameter};
use super::wire::WireValue;
use crate::address::{Address, AddressRange};
use crate::trace::{KeyPath, ObjectStore, PathPredicates, Trace};
use crate::{BridgeError, Result};
use std::sync::Arc;

/// Turns wire values into call arguments for a parameter.
pub trait ValueDecoder {
    fn decode(&self, param: &Parameter, value: &WireValue) -> Result<ArgValue>;
}

/// Decodes scalar values only; object references need a trace to resolve
/// against and are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoder;

impl ValueDecoder for DefaultDecoder {
    fn decode(&self, param: &Parameter, value: &WireValue) -> Result<ArgValue> {
        let invalid = |reason: String| BridgeError::invalid_argument(param.name, reason);
        let expected = || invalid(format!("expected {}, got {}", param.ty, value.type_name()));

        match (param.ty, value) {
            (ParamType::Bool, WireValue::Bool(b)) => Ok(ArgValue::Bool(*b)),
            (ParamType::Int, WireValue::Int(i)) => Ok(ArgValue::Int(*i)),
            (ParamType::String, WireValue::String(s)) => Ok(ArgValue::String(s.clone())),
            (ParamType::Address, WireValue::Address { space, offset }) => {
                Ok(ArgValue::Address(Address {
                    space: space.clone(),
                    offset: *offset,
                }))
            }
            (ParamType::Address, WireValue::Int(i)) => u64::try_from(*i)
                .map(|offset| ArgValue::Address(Address::new(offset)))
                .map_err(|_| invalid(format!("negative address {i}"))),
            (ParamType::Range, WireValue::Range { space, min, max }) => {
                AddressRange::new(space.clone(), *min, *max)
                    .map(ArgValue::Range)
                    .map_err(|e| invalid(e.to_string()))
            }
            (ParamType::Object(_), WireValue::Object { .. }) => Err(invalid(
                "object references cannot be resolved without a trace".into(),
            )),
            _ => Err(expected()),
        }
    }
}

/// Resolves object references against the committed state of a trace at its
/// current snapshot, then falls back to [`DefaultDecoder`].
#[derive(Debug, Clone)]
pub struct TraceDecoder {
    store: Arc<ObjectStore>,
}

impl TraceDecoder {
    pub fn new(trace: &Trace) -> Self {
        Self {
            store: trace.view(),
        }
    }

    fn resolve(&self, param: &Parameter, pattern: &str, text: &str) -> Result<KeyPath> {
        let invalid = |reason: String| BridgeError::invalid_argument(param.name, reason);

        let path = KeyPath::parse(text).map_err(|e| invalid(e.to_string()))?;
        let predicates = PathPredicates::parse(pattern).map_err(|e| invalid(e.to_string()))?;
        if !predicates.matches(&path) {
            return Err(invalid(format!("{path} does not match {pattern}")));
        }
        let snap = self.store.snapshot();
        if self.store.object_at(snap, &path).is_none() {
            return Err(invalid(format!("no live object at {path}")));
        }
        Ok(path)
    }
}

impl ValueDecoder for TraceDecoder {
    fn decode(&self, param: &Parameter, value: &WireValue) -> Result<ArgValue> {
        match (param.ty, value) {
            (ParamType::Object(pattern), WireValue::Object { path })
            | (ParamType::Object(pattern), WireValue::String(path)) => {
                self.resolve(param, pattern, path).map(ArgValue::Object)
            }
            _ => DefaultDecoder.decode(param, value),
        }
    }
}
