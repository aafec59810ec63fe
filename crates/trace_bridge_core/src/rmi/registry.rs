use super::method::RemoteMethod;
use crate::{BridgeError, Result};
use std::collections::BTreeMap;

/// Remote methods by name.
#[derive(Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, Box<dyn RemoteMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `method`, replacing any method of the same name.
    pub fn register(&mut self, method: impl RemoteMethod + 'static) {
        let name = method.name().to_string();
        if self.methods.insert(name.clone(), Box::new(method)).is_some() {
            tracing::warn!("Method {} registered twice; keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Result<&dyn RemoteMethod> {
        self.methods
            .get(name)
            .map(|method| method.as_ref())
            .ok_or_else(|| BridgeError::MethodNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.methods.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RemoteMethod> + '_ {
        self.methods.values().map(|method| method.as_ref())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
