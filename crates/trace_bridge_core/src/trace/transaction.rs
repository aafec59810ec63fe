use super::lifespan::{Lifespan, Snap};
use super::path::KeyPath;
use super::store::{ObjectId, ObjectStore};
use super::value::{Attribute, TraceValue};
use super::Trace;
use crate::Result;

/// A labelled batch of store mutations at one new snapshot.
///
/// Work happens on a private copy of the committed store. [`commit`] makes
/// it visible; dropping the transaction discards it.
///
/// [`commit`]: Transaction::commit
pub struct Transaction<'a> {
    trace: &'a Trace,
    label: String,
    snap: Snap,
    store: ObjectStore,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(trace: &'a Trace, label: String, store: ObjectStore) -> Self {
        let snap = store.snapshot() + 1;
        Self {
            trace,
            label,
            snap,
            store,
            committed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The snapshot this transaction writes at.
    pub fn snap(&self) -> Snap {
        self.snap
    }

    /// The store as modified so far by this transaction.
    pub fn view(&self) -> &ObjectStore {
        &self.store
    }

    pub fn create_object(&mut self, path: &KeyPath) -> ObjectId {
        self.store.create_object(path, self.snap)
    }

    pub fn set_value(
        &mut self,
        path: &KeyPath,
        attribute: impl Into<Attribute>,
        value: impl Into<TraceValue>,
        span: Lifespan,
    ) {
        self.store
            .set_value(path, attribute.into(), value.into(), span);
    }

    /// Sets a value from this transaction's snapshot on.
    pub fn put(&mut self, path: &KeyPath, attribute: impl Into<Attribute>, value: impl Into<TraceValue>) {
        let span = Lifespan::now_on(self.snap);
        self.set_value(path, attribute, value, span);
    }

    /// Ends the current value of `attribute` at this transaction's snapshot.
    pub fn clear(&mut self, path: &KeyPath, attribute: impl Into<Attribute>) {
        self.store.clear_value(path, &attribute.into(), self.snap);
    }

    /// Sets `value` when the agent reported one, otherwise clears the attribute.
    pub fn put_or_clear<V: Into<TraceValue>>(
        &mut self,
        path: &KeyPath,
        attribute: impl Into<Attribute>,
        value: Option<V>,
    ) {
        match value {
            Some(value) => self.put(path, attribute, value),
            None => self.clear(path, attribute),
        }
    }

    pub fn remove_object(&mut self, path: &KeyPath) -> Result<()> {
        self.store.remove_object(path, self.snap)
    }

    pub fn put_register(&mut self, registers: &KeyPath, name: &str, bytes: Vec<u8>) {
        let span = Lifespan::now_on(self.snap);
        self.store
            .register_space_mut(registers)
            .set(name, span, bytes);
    }

    pub fn put_memory(&mut self, process: &KeyPath, offset: u64, bytes: Vec<u8>) {
        let span = Lifespan::now_on(self.snap);
        self.store
            .memory_space_mut(process)
            .write(span, offset, bytes);
    }

    /// Publishes the changes and returns the new snapshot.
    pub fn commit(mut self) -> Result<Snap> {
        let mut store = std::mem::take(&mut self.store);
        store.set_snapshot(self.snap);
        self.trace.publish(store);
        self.committed = true;
        tracing::info!("Committed '{}' at snap {}", self.label, self.snap);
        Ok(self.snap)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!("Aborted '{}'", self.label);
        }
        self.trace.release();
    }
}
