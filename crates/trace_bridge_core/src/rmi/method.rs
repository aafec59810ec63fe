use super::decoder::ValueDecoder;
use super::wire::{WireArgs, WireValue};
use crate::address::{Address, AddressRange};
use crate::trace::KeyPath;
use crate::{Bridge, BridgeError, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    String,
    Address,
    Range,
    /// A live trace object whose path matches the given predicate.
    Object(&'static str),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::String => f.write_str("string"),
            Self::Address => f.write_str("address"),
            Self::Range => f.write_str("range"),
            Self::Object(pattern) => write!(f, "object<{pattern}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub ty: ParamType,
    pub default: Option<WireValue>,
    pub description: &'static str,
}

impl Parameter {
    pub fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            default: None,
            description,
        }
    }

    pub fn optional(
        name: &'static str,
        ty: ParamType,
        default: impl Into<WireValue>,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            ty,
            default: Some(default.into()),
            description,
        }
    }

    /// The default decoded as a call argument would be, if there is one.
    pub fn default_value(&self, decoder: &dyn ValueDecoder) -> Result<Option<ArgValue>> {
        self.default
            .as_ref()
            .map(|default| decoder.decode(self, default))
            .transpose()
    }

    fn schema(&self) -> Value {
        let mut schema = match self.ty {
            ParamType::Bool => json!({ "type": "boolean" }),
            ParamType::Int => json!({ "type": "integer" }),
            ParamType::String => json!({ "type": "string" }),
            ParamType::Address => json!({
                "type": "object",
                "properties": { "space": { "type": "string" }, "offset": { "type": "integer" } },
                "required": ["offset"]
            }),
            ParamType::Range => json!({
                "type": "object",
                "properties": {
                    "space": { "type": "string" },
                    "min": { "type": "integer" },
                    "max": { "type": "integer" }
                },
                "required": ["min", "max"]
            }),
            ParamType::Object(pattern) => json!({
                "type": "object",
                "properties": { "path": { "type": "string", "description": pattern } },
                "required": ["path"]
            }),
        };
        schema["description"] = json!(self.description);
        if let Some(default) = &self.default {
            schema["default"] = serde_json::to_value(default).unwrap_or(Value::Null);
        }
        schema
    }
}

/// A decoded argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    String(String),
    Address(Address),
    Range(AddressRange),
    /// Path of a live object that matched the parameter's pattern.
    Object(KeyPath),
}

impl ArgValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::Address(_) => "address",
            Self::Range(_) => "range",
            Self::Object(_) => "object",
        }
    }
}

/// Decoded arguments of one call, one per declared parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, ArgValue>,
}

impl Arguments {
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&ArgValue> {
        self.values
            .get(name)
            .ok_or_else(|| BridgeError::MissingArgument(name.to_string()))
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            ArgValue::Bool(b) => Ok(*b),
            other => Err(mismatch(name, "bool", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            ArgValue::Int(i) => Ok(*i),
            other => Err(mismatch(name, "int", other)),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        match self.get(name)? {
            ArgValue::String(s) => Ok(s),
            other => Err(mismatch(name, "string", other)),
        }
    }

    pub fn address(&self, name: &str) -> Result<&Address> {
        match self.get(name)? {
            ArgValue::Address(a) => Ok(a),
            other => Err(mismatch(name, "address", other)),
        }
    }

    pub fn range(&self, name: &str) -> Result<&AddressRange> {
        match self.get(name)? {
            ArgValue::Range(r) => Ok(r),
            other => Err(mismatch(name, "range", other)),
        }
    }

    pub fn object(&self, name: &str) -> Result<&KeyPath> {
        match self.get(name)? {
            ArgValue::Object(p) => Ok(p),
            other => Err(mismatch(name, "object", other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, got: &ArgValue) -> BridgeError {
    BridgeError::invalid_argument(name, format!("expected {expected}, got {}", got.type_name()))
}

/// Validates `args` against `parameters` and decodes them.
///
/// Undeclared names are rejected; missing ones take their default or fail
/// with [`BridgeError::MissingArgument`].
pub fn decode_arguments(
    parameters: &[Parameter],
    decoder: &dyn ValueDecoder,
    args: &WireArgs,
) -> Result<Arguments> {
    if let Some(unknown) = args
        .keys()
        .find(|name| !parameters.iter().any(|p| p.name == name.as_str()))
    {
        return Err(BridgeError::invalid_argument(
            unknown.as_str(),
            "unexpected parameter",
        ));
    }

    let mut decoded = Arguments::default();
    for param in parameters {
        let value = match args.get(param.name) {
            Some(value) => decoder.decode(param, value)?,
            None => param
                .default_value(decoder)?
                .ok_or_else(|| BridgeError::MissingArgument(param.name.to_string()))?,
        };
        decoded.insert(param.name, value);
    }
    Ok(decoded)
}

/// A named operation callable across the bridge.
pub trait RemoteMethod: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &[Parameter];

    fn execute(&self, bridge: &Bridge, args: &Arguments) -> Result<WireValue>;

    fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters().iter().find(|p| p.name == name)
    }

    /// JSON schema of the parameters.
    fn schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters()
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters()
            .iter()
            .filter(|p| p.default.is_none())
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Decodes `args`, runs the method and maps agent failures to
    /// [`BridgeError::Execution`].
    fn invoke(&self, bridge: &Bridge, decoder: &dyn ValueDecoder, args: &WireArgs) -> Result<WireValue> {
        tracing::debug!("Invoking method: {}", self.name());
        let result = decode_arguments(self.parameters(), decoder, args)
            .and_then(|decoded| self.execute(bridge, &decoded).map_err(BridgeError::into_execution));
        if let Err(e) = &result {
            tracing::warn!("Method {} failed: {}", self.name(), e);
        }
        result
    }
}

type MethodFn = dyn Fn(&Bridge, &Arguments) -> Result<WireValue> + Send + Sync;

/// A remote method backed by a closure.
pub struct FnMethod {
    name: &'static str,
    description: &'static str,
    parameters: Vec<Parameter>,
    func: Box<MethodFn>,
}

impl FnMethod {
    pub fn new<F>(
        name: &'static str,
        description: &'static str,
        parameters: Vec<Parameter>,
        func: F,
    ) -> Self
    where
        F: Fn(&Bridge, &Arguments) -> Result<WireValue> + Send + Sync + 'static,
    {
        Self {
            name,
            description,
            parameters,
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for FnMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMethod")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl RemoteMethod for FnMethod {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn execute(&self, bridge: &Bridge, args: &Arguments) -> Result<WireValue> {
        (self.func)(bridge, args)
    }
}
