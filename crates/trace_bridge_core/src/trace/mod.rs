//! The trace: a snapshot-versioned object model of the debuggee.

pub mod lifespan;
pub mod path;
pub mod predicate;
pub mod space;
pub mod store;
pub mod transaction;
pub mod value;

pub use lifespan::{IntervalMap, Lifespan, Snap};
pub use path::{KeyPath, PathKey};
pub use predicate::{PathPattern, PathPredicates, PatternSegment};
pub use space::{MemorySpace, RegisterSpace};
pub use store::{
    BreakpointRecord, ModuleRecord, ObjectId, ObjectStore, PathEntry, RegionRecord, ThreadRecord,
    TraceObject, ValuePath, ValuePaths,
};
pub use transaction::Transaction;
pub use value::{Attribute, BreakpointKind, BreakpointKindSet, ModelAttribute, TraceValue};

use crate::{BridgeError, Result};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A named trace with one committed store state and at most one open
/// transaction.
#[derive(Debug)]
pub struct Trace {
    name: String,
    committed: RwLock<Arc<ObjectStore>>,
    open: Mutex<Option<String>>,
}

impl Trace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            committed: RwLock::new(Arc::new(ObjectStore::new())),
            open: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The committed state. Later commits do not affect the returned store.
    pub fn view(&self) -> Arc<ObjectStore> {
        Arc::clone(&self.committed.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> Snap {
        self.view().snapshot()
    }

    /// Whether a transaction is open, and its label.
    pub fn open_transaction(&self) -> Option<String> {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn begin(&self, label: impl Into<String>) -> Result<Transaction<'_>> {
        let label = label.into();
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = open.as_ref() {
            tracing::warn!("Cannot begin '{}': '{}' is open", label, current);
            return Err(BridgeError::ConflictingTransaction(current.clone()));
        }
        *open = Some(label.clone());
        drop(open);

        let store = (*self.view()).clone();
        tracing::debug!("Begin '{}' on trace {}", label, self.name);
        Ok(Transaction::new(self, label, store))
    }

    fn publish(&self, store: ObjectStore) {
        *self
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(store);
    }

    fn release(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
