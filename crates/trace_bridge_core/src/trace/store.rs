//! Path-addressed, snapshot-versioned object store.
//!
//! Objects live in an arena indexed by [`ObjectId`]; each entry knows its
//! canonical path, its parent and its children sorted by key. Nothing is
//! ever dropped from the arena: removal ends an object's life at a snapshot
//! and re-creating the path later revives the same entry.

use super::lifespan::{IntervalMap, Lifespan, Snap};
use super::path::{KeyPath, PathKey};
use super::predicate::{PathPattern, PathPredicates, PatternSegment};
use super::space::{MemorySpace, RegisterSpace};
use super::value::{Attribute, BreakpointKindSet, ModelAttribute, TraceValue};
use crate::address::AddressRange;
use crate::{BridgeError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type ObjectId = usize;

const ROOT: ObjectId = 0;

#[derive(Debug, Clone)]
struct ObjectEntry {
    path: KeyPath,
    parent: Option<ObjectId>,
    children: BTreeMap<PathKey, ObjectId>,
    life: IntervalMap<()>,
    attributes: BTreeMap<Attribute, IntervalMap<TraceValue>>,
}

impl ObjectEntry {
    fn new(path: KeyPath, parent: Option<ObjectId>) -> Self {
        Self {
            path,
            parent,
            children: BTreeMap::new(),
            life: IntervalMap::new(),
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    objects: Vec<ObjectEntry>,
    index: HashMap<KeyPath, ObjectId>,
    registers: BTreeMap<KeyPath, RegisterSpace>,
    memory: BTreeMap<KeyPath, MemorySpace>,
    snapshot: Snap,
}

impl Default for ObjectStore {
    fn default() -> Self {
        let mut root = ObjectEntry::new(KeyPath::root(), None);
        root.life.set(Lifespan::all(), ());
        let mut index = HashMap::new();
        index.insert(KeyPath::root(), ROOT);
        Self {
            objects: vec![root],
            index,
            registers: BTreeMap::new(),
            memory: BTreeMap::new(),
            snapshot: 0,
        }
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Snap {
        self.snapshot
    }

    pub(crate) fn set_snapshot(&mut self, snap: Snap) {
        self.snapshot = snap;
    }

    /// Number of objects ever created, not counting the root.
    pub fn len(&self) -> usize {
        self.objects.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> TraceObject<'_> {
        TraceObject {
            store: self,
            id: ROOT,
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<TraceObject<'_>> {
        (id < self.objects.len()).then_some(TraceObject { store: self, id })
    }

    /// The object at `path`, whether alive or not.
    pub fn find(&self, path: &KeyPath) -> Option<TraceObject<'_>> {
        self.index
            .get(path)
            .map(|&id| TraceObject { store: self, id })
    }

    /// The object at `path` if it is alive at `snap`.
    pub fn object_at(&self, snap: Snap, path: &KeyPath) -> Option<TraceObject<'_>> {
        self.find(path).filter(|object| object.is_alive(snap))
    }

    pub fn get_value(&self, snap: Snap, path: &KeyPath, attribute: &Attribute) -> Option<&TraceValue> {
        let id = *self.index.get(path)?;
        self.objects[id].attributes.get(attribute)?.get(snap)
    }

    /// Creates `path` and any missing ancestors, alive from `snap` on.
    /// Existing objects are returned unchanged; removed ones are revived.
    pub fn create_object(&mut self, path: &KeyPath, snap: Snap) -> ObjectId {
        let mut id = ROOT;
        for key in path.keys() {
            id = match self.objects[id].children.get(key) {
                Some(&child) => child,
                None => {
                    let child_path = self.objects[id].path.extend(key.clone());
                    let child = self.objects.len();
                    self.objects
                        .push(ObjectEntry::new(child_path.clone(), Some(id)));
                    self.objects[id].children.insert(key.clone(), child);
                    self.index.insert(child_path, child);
                    child
                }
            };
            let life = &mut self.objects[id].life;
            if life.get(snap).is_none() {
                life.set(Lifespan::now_on(snap), ());
            }
        }
        id
    }

    /// Sets `attribute` of the object at `path` over `span`, creating the
    /// object if needed.
    pub fn set_value(&mut self, path: &KeyPath, attribute: Attribute, value: TraceValue, span: Lifespan) {
        if span.is_empty() {
            return;
        }
        let id = self.create_object(path, span.min());
        self.objects[id]
            .attributes
            .entry(attribute)
            .or_default()
            .set(span, value);
    }

    /// Ends the current value of `attribute` at `path` from `snap` on.
    pub fn clear_value(&mut self, path: &KeyPath, attribute: &Attribute, snap: Snap) {
        let Some(&id) = self.index.get(path) else {
            return;
        };
        if let Some(history) = self.objects[id].attributes.get_mut(attribute) {
            history.end_at(snap);
        }
    }

    /// Ends the life of the object at `path` and its whole subtree from
    /// `snap` on, together with their values and every value elsewhere that
    /// refers into the subtree.
    pub fn remove_object(&mut self, path: &KeyPath, snap: Snap) -> Result<()> {
        if path.is_root() {
            return Err(BridgeError::InvalidPath(
                "the root object cannot be removed".into(),
            ));
        }
        let id = *self
            .index
            .get(path)
            .ok_or_else(|| BridgeError::ObjectNotFound(path.to_string()))?;

        let mut doomed = vec![id];
        let mut next = 0;
        while next < doomed.len() {
            doomed.extend(self.objects[doomed[next]].children.values().copied());
            next += 1;
        }
        for &id in &doomed {
            let entry = &mut self.objects[id];
            entry.life.end_at(snap);
            for history in entry.attributes.values_mut() {
                history.end_at(snap);
            }
        }

        for (owner, space) in self.registers.iter_mut() {
            if owner.starts_with(path) {
                space.end_at(snap);
            }
        }
        for (owner, space) in self.memory.iter_mut() {
            if owner.starts_with(path) {
                space.end_at(snap);
            }
        }

        for entry in &mut self.objects {
            for history in entry.attributes.values_mut() {
                let refers_into = matches!(
                    history.get(snap),
                    Some(TraceValue::Object(target)) if target.starts_with(path)
                );
                if refers_into {
                    history.end_at(snap);
                }
            }
        }

        tracing::debug!("Removed {} ({} objects) at snap {}", path, doomed.len(), snap);
        Ok(())
    }

    pub fn register_space(&self, owner: &KeyPath) -> Option<&RegisterSpace> {
        self.registers.get(owner)
    }

    pub(crate) fn register_space_mut(&mut self, owner: &KeyPath) -> &mut RegisterSpace {
        self.registers.entry(owner.clone()).or_default()
    }

    pub fn memory_space(&self, process: &KeyPath) -> Option<&MemorySpace> {
        self.memory.get(process)
    }

    pub(crate) fn memory_space_mut(&mut self, process: &KeyPath) -> &mut MemorySpace {
        self.memory.entry(process.clone()).or_default()
    }

    /// Lazily walks the value paths matching `predicates` over `span`.
    pub fn value_paths(self: &Arc<Self>, span: Lifespan, predicates: PathPredicates) -> ValuePaths {
        ValuePaths {
            store: Arc::clone(self),
            span,
            predicates,
        }
    }

    /// Objects alive at `snap` whose paths match `predicates`, in key order.
    pub fn objects_matching(&self, snap: Snap, predicates: &PathPredicates) -> Vec<TraceObject<'_>> {
        let mut found = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let entry = &self.objects[id];
            if predicates.matches(&entry.path) {
                found.push(TraceObject { store: self, id });
            }
            for &child in entry.children.values().rev() {
                let child_entry = &self.objects[child];
                if child_entry.life.get(snap).is_some()
                    && predicates.matches_prefix(&child_entry.path)
                {
                    stack.push(child);
                }
            }
        }
        found
    }

    pub fn threads(&self, snap: Snap) -> Vec<ThreadRecord> {
        self.objects_matching(snap, &model_pattern("Threads"))
            .into_iter()
            .map(|thread| ThreadRecord {
                path: thread.path().clone(),
                tid: thread
                    .value(snap, ModelAttribute::Tid)
                    .and_then(TraceValue::as_int),
                display: thread
                    .value(snap, ModelAttribute::Display)
                    .and_then(TraceValue::as_str)
                    .map(str::to_string),
            })
            .collect()
    }

    pub fn regions(&self, snap: Snap) -> Vec<RegionRecord> {
        self.objects_matching(snap, &model_pattern("Memory"))
            .into_iter()
            .filter_map(|region| {
                let flag = |attr: ModelAttribute| {
                    region
                        .value(snap, attr)
                        .and_then(TraceValue::as_bool)
                        .unwrap_or(false)
                };
                Some(RegionRecord {
                    path: region.path().clone(),
                    range: region
                        .value(snap, ModelAttribute::Range)?
                        .as_range()?
                        .clone(),
                    name: region
                        .value(snap, ModelAttribute::Display)
                        .and_then(TraceValue::as_str)
                        .map(str::to_string),
                    readable: flag(ModelAttribute::Readable),
                    writable: flag(ModelAttribute::Writable),
                    executable: flag(ModelAttribute::Executable),
                })
            })
            .collect()
    }

    pub fn modules(&self, snap: Snap) -> Vec<ModuleRecord> {
        self.objects_matching(snap, &model_pattern("Modules"))
            .into_iter()
            .map(|module| ModuleRecord {
                path: module.path().clone(),
                name: module
                    .value(snap, ModelAttribute::ModuleName)
                    .and_then(TraceValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        module
                            .path()
                            .last()
                            .map(|key| key.as_str().to_string())
                            .unwrap_or_default()
                    }),
                range: module
                    .value(snap, ModelAttribute::Range)
                    .and_then(TraceValue::as_range)
                    .cloned(),
            })
            .collect()
    }

    pub fn breakpoints(&self, snap: Snap) -> Vec<BreakpointRecord> {
        self.objects_matching(snap, &model_pattern("Breakpoints"))
            .into_iter()
            .map(|bp| BreakpointRecord {
                path: bp.path().clone(),
                range: bp
                    .value(snap, ModelAttribute::Range)
                    .and_then(TraceValue::as_range)
                    .cloned(),
                kinds: bp
                    .value(snap, ModelAttribute::Kinds)
                    .and_then(TraceValue::as_kinds)
                    .unwrap_or_default(),
                enabled: bp
                    .value(snap, ModelAttribute::Enabled)
                    .and_then(TraceValue::as_bool)
                    .unwrap_or(false),
                expression: bp
                    .value(snap, ModelAttribute::Expression)
                    .and_then(TraceValue::as_str)
                    .map(str::to_string),
            })
            .collect()
    }
}

// `Processes[].<container>[]`
fn model_pattern(container: &str) -> PathPredicates {
    PathPattern::from(vec![
        PatternSegment::Name("Processes".into()),
        PatternSegment::AnyIndex,
        PatternSegment::Name(container.into()),
        PatternSegment::AnyIndex,
    ])
    .into()
}

/// Borrowed view of one object in a store.
#[derive(Debug, Clone, Copy)]
pub struct TraceObject<'a> {
    store: &'a ObjectStore,
    id: ObjectId,
}

impl<'a> TraceObject<'a> {
    fn entry(&self) -> &'a ObjectEntry {
        &self.store.objects[self.id]
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn path(&self) -> &'a KeyPath {
        &self.entry().path
    }

    pub fn is_alive(&self, snap: Snap) -> bool {
        self.entry().life.get(snap).is_some()
    }

    pub fn life(&self) -> Vec<Lifespan> {
        self.entry().life.iter().map(|(span, _)| span).collect()
    }

    pub fn parent(&self) -> Option<TraceObject<'a>> {
        self.entry().parent.map(|id| TraceObject {
            store: self.store,
            id,
        })
    }

    pub fn value(&self, snap: Snap, attribute: impl Into<Attribute>) -> Option<&'a TraceValue> {
        self.entry().attributes.get(&attribute.into())?.get(snap)
    }

    /// Every value current at `snap`, by attribute.
    pub fn values(&self, snap: Snap) -> Vec<(&'a Attribute, &'a TraceValue)> {
        self.entry()
            .attributes
            .iter()
            .filter_map(|(attr, history)| history.get(snap).map(|value| (attr, value)))
            .collect()
    }

    pub fn child(&self, snap: Snap, key: &PathKey) -> Option<TraceObject<'a>> {
        let id = *self.entry().children.get(key)?;
        let child = TraceObject {
            store: self.store,
            id,
        };
        child.is_alive(snap).then_some(child)
    }

    /// Children alive at `snap`, in key order.
    pub fn children(&self, snap: Snap) -> Vec<TraceObject<'a>> {
        self.entry()
            .children
            .values()
            .map(|&id| TraceObject {
                store: self.store,
                id,
            })
            .filter(|child| child.is_alive(snap))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathEntry {
    /// The path ends on an object.
    Object(ObjectId),
    /// The path ends on an attribute; `lifespan` is the span of the entry
    /// first overlapping the query.
    Value { value: TraceValue, lifespan: Lifespan },
}

/// A path found by [`ObjectStore::value_paths`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePath {
    pub path: KeyPath,
    pub entry: PathEntry,
    destination: Option<ObjectId>,
}

impl ValuePath {
    /// The object this path leads to: the object itself for an object edge,
    /// the referenced object for a reference value, nothing for plain values.
    pub fn destination(&self) -> Option<ObjectId> {
        self.destination
    }

    pub fn value(&self) -> Option<&TraceValue> {
        match &self.entry {
            PathEntry::Value { value, .. } => Some(value),
            PathEntry::Object(_) => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.entry, PathEntry::Object(_))
    }
}

/// Re-iterable query over a fixed store state.
#[derive(Debug, Clone)]
pub struct ValuePaths {
    store: Arc<ObjectStore>,
    span: Lifespan,
    predicates: PathPredicates,
}

impl ValuePaths {
    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    pub fn iter(&self) -> ValuePathIter<'_> {
        ValuePathIter {
            query: self,
            stack: vec![ROOT],
            pending: Vec::new(),
        }
    }
}

impl<'a> IntoIterator for &'a ValuePaths {
    type Item = ValuePath;
    type IntoIter = ValuePathIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Depth-first walk: an object, then its attributes, then its children.
pub struct ValuePathIter<'a> {
    query: &'a ValuePaths,
    stack: Vec<ObjectId>,
    pending: Vec<ValuePath>,
}

impl ValuePathIter<'_> {
    fn visit(&mut self, id: ObjectId) {
        let query = self.query;
        let store = &*query.store;
        let span = &query.span;
        let predicates = &query.predicates;
        let entry = &store.objects[id];

        // Emitted in reverse so `pending.pop()` yields them in order.
        let mut found = Vec::new();
        if predicates.matches(&entry.path) {
            found.push(ValuePath {
                path: entry.path.clone(),
                entry: PathEntry::Object(id),
                destination: Some(id),
            });
        }
        for (attribute, history) in &entry.attributes {
            let path = entry.path.key(attribute.name());
            if !predicates.matches(&path) {
                continue;
            }
            let Some((lifespan, value)) = history.first_in(span) else {
                continue;
            };
            let destination = value.as_object().and_then(|target| {
                let at = lifespan.first_common(span)?;
                store.object_at(at, target).map(|object| object.id())
            });
            found.push(ValuePath {
                path,
                entry: PathEntry::Value {
                    value: value.clone(),
                    lifespan,
                },
                destination,
            });
        }
        found.reverse();
        self.pending = found;

        for &child in entry.children.values().rev() {
            let child_entry = &store.objects[child];
            if child_entry.life.intersects(span) && predicates.matches_prefix(&child_entry.path) {
                self.stack.push(child);
            }
        }
    }
}

impl Iterator for ValuePathIter<'_> {
    type Item = ValuePath;

    fn next(&mut self) -> Option<ValuePath> {
        loop {
            if let Some(found) = self.pending.pop() {
                return Some(found);
            }
            let id = self.stack.pop()?;
            self.visit(id);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    pub path: KeyPath,
    pub tid: Option<i64>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    pub path: KeyPath,
    pub range: AddressRange,
    pub name: Option<String>,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRecord {
    pub path: KeyPath,
    pub name: String,
    pub range: Option<AddressRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointRecord {
    pub path: KeyPath,
    pub range: Option<AddressRange>,
    pub kinds: BreakpointKindSet,
    pub enabled: bool,
    pub expression: Option<String>,
}
