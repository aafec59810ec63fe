use super::path::KeyPath;
use crate::address::{Address, AddressRange};
use crate::{BridgeError, Result};
use std::fmt;
use std::str::FromStr;

macro_rules! model_attributes {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Attributes whose meaning is defined by the trace model.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ModelAttribute {
            $($variant),+
        }

        impl ModelAttribute {
            pub const ALL: &'static [ModelAttribute] = &[$(ModelAttribute::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $(ModelAttribute::$variant => $name),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(ModelAttribute::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

model_attributes! {
    Display => "_display",
    Range => "_range",
    Debugger => "_debugger",
    Arch => "_arch",
    Os => "_os",
    Endian => "_endian",
    Pid => "_pid",
    Tid => "_tid",
    State => "_state",
    ExitCode => "_exit_code",
    Pc => "_pc",
    Sp => "_sp",
    Function => "_function",
    Level => "_level",
    ModuleName => "_module_name",
    Kinds => "_kinds",
    Enabled => "_enabled",
    Expression => "_expression",
    Readable => "_readable",
    Writable => "_writable",
    Executable => "_executable",
    Process => "_process",
    Count => "_count",
}

/// Name of an object value: model-defined or debugger-reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Model(ModelAttribute),
    Custom(String),
}

impl Attribute {
    pub fn parse(name: &str) -> Result<Self> {
        if name.starts_with('_') {
            return ModelAttribute::from_name(name)
                .map(Self::Model)
                .ok_or_else(|| {
                    BridgeError::InvalidAttribute(format!("{name} is not a model attribute"))
                });
        }
        if name.is_empty() || name.contains(['.', '[', ']']) {
            return Err(BridgeError::InvalidAttribute(format!(
                "{name:?} is not a valid attribute name"
            )));
        }
        Ok(Self::Custom(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Model(model) => model.name(),
            Self::Custom(name) => name,
        }
    }
}

impl From<ModelAttribute> for Attribute {
    fn from(model: ModelAttribute) -> Self {
        Self::Model(model)
    }
}

impl FromStr for Attribute {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BreakpointKind {
    SwExecute,
    HwExecute,
    Read,
    Write,
}

impl BreakpointKind {
    const ALL: [BreakpointKind; 4] = [
        BreakpointKind::SwExecute,
        BreakpointKind::HwExecute,
        BreakpointKind::Read,
        BreakpointKind::Write,
    ];

    fn bit(self) -> u8 {
        match self {
            Self::SwExecute => 1,
            Self::HwExecute => 1 << 1,
            Self::Read => 1 << 2,
            Self::Write => 1 << 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SwExecute => "SW_EXECUTE",
            Self::HwExecute => "HW_EXECUTE",
            Self::Read => "READ",
            Self::Write => "WRITE",
        }
    }
}

/// Set of breakpoint kinds, e.g. `READ,WRITE` for an access breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BreakpointKindSet(u8);

impl BreakpointKindSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn of(kinds: &[BreakpointKind]) -> Self {
        Self(kinds.iter().fold(0, |bits, kind| bits | kind.bit()))
    }

    pub fn with(self, kind: BreakpointKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn contains(&self, kind: BreakpointKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = BreakpointKind> + '_ {
        BreakpointKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl fmt::Display for BreakpointKindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(BreakpointKind::name).collect();
        f.write_str(&names.join(","))
    }
}

/// A typed value held by a trace object.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceValue {
    Bool(bool),
    Int(i64),
    String(String),
    Address(Address),
    Range(AddressRange),
    Bytes(Vec<u8>),
    Kinds(BreakpointKindSet),
    /// Reference to another object by canonical path.
    Object(KeyPath),
}

impl TraceValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Self::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&AddressRange> {
        match self {
            Self::Range(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_kinds(&self) -> Option<BreakpointKindSet> {
        match self {
            Self::Kinds(k) => Some(*k),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&KeyPath> {
        match self {
            Self::Object(p) => Some(p),
            _ => None,
        }
    }
}

impl From<bool> for TraceValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TraceValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for TraceValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for TraceValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Address> for TraceValue {
    fn from(v: Address) -> Self {
        Self::Address(v)
    }
}

impl From<AddressRange> for TraceValue {
    fn from(v: AddressRange) -> Self {
        Self::Range(v)
    }
}

impl From<BreakpointKindSet> for TraceValue {
    fn from(v: BreakpointKindSet) -> Self {
        Self::Kinds(v)
    }
}
