//! Remote method invocation: typed, defaulted parameters and a name-keyed
//! registry of callable methods.

pub mod decoder;
pub mod method;
pub mod registry;
pub mod wire;

pub use decoder::{DefaultDecoder, TraceDecoder, ValueDecoder};
pub use method::{decode_arguments, ArgValue, Arguments, FnMethod, ParamType, Parameter, RemoteMethod};
pub use registry::MethodRegistry;
pub use wire::{WireArgs, WireValue};
