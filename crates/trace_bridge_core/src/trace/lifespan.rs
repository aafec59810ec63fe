use std::collections::BTreeMap;
use std::fmt;

/// A point on the trace's logical time line.
pub type Snap = i64;

/// Closed-open snapshot interval `[min, max)`; `max == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lifespan {
    min: Snap,
    max: Option<Snap>,
}

impl Lifespan {
    /// Exactly snapshot `snap`.
    pub fn at(snap: Snap) -> Self {
        Self {
            min: snap,
            max: Some(snap.saturating_add(1)),
        }
    }

    /// From `snap` onwards.
    pub fn now_on(snap: Snap) -> Self {
        Self {
            min: snap,
            max: None,
        }
    }

    /// `[min, max)`. An inverted pair yields an empty span.
    pub fn span(min: Snap, max: Snap) -> Self {
        Self {
            min,
            max: Some(max.max(min)),
        }
    }

    pub fn all() -> Self {
        Self::now_on(Snap::MIN)
    }

    pub fn min(&self) -> Snap {
        self.min
    }

    pub fn max(&self) -> Option<Snap> {
        self.max
    }

    pub fn is_empty(&self) -> bool {
        self.max.is_some_and(|max| max <= self.min)
    }

    pub fn contains(&self, snap: Snap) -> bool {
        snap >= self.min && self.max.map_or(true, |max| snap < max)
    }

    pub fn intersects(&self, other: &Lifespan) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let starts_before_other_ends = other.max.map_or(true, |max| self.min < max);
        let other_starts_before_end = self.max.map_or(true, |max| other.min < max);
        starts_before_other_ends && other_starts_before_end
    }

    /// The first snapshot of the intersection, if any.
    pub fn first_common(&self, other: &Lifespan) -> Option<Snap> {
        self.intersects(other).then(|| self.min.max(other.min))
    }
}

impl fmt::Display for Lifespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}, {})", self.min, max),
            None => write!(f, "[{}, +inf)", self.min),
        }
    }
}

/// Non-overlapping history of values keyed by lifespan start.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalMap<V> {
    entries: BTreeMap<Snap, (Option<Snap>, V)>,
}

impl<V> Default for IntervalMap<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V: Clone + PartialEq> IntervalMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The value current at `snap`.
    pub fn get(&self, snap: Snap) -> Option<&V> {
        self.entry_at(snap).map(|(_, v)| v)
    }

    pub fn entry_at(&self, snap: Snap) -> Option<(Lifespan, &V)> {
        let (start, (end, value)) = self.entries.range(..=snap).next_back()?;
        let span = Lifespan {
            min: *start,
            max: *end,
        };
        span.contains(snap).then_some((span, value))
    }

    /// The earliest entry overlapping `span`.
    pub fn first_in(&self, span: &Lifespan) -> Option<(Lifespan, &V)> {
        self.iter().find(|(life, _)| life.intersects(span))
    }

    pub fn intersects(&self, span: &Lifespan) -> bool {
        self.first_in(span).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lifespan, &V)> + '_ {
        self.entries.iter().map(|(start, (end, value))| {
            (
                Lifespan {
                    min: *start,
                    max: *end,
                },
                value,
            )
        })
    }

    /// Writes `value` over `span`; older entries are cut back where they
    /// overlap, and equal neighbours are merged.
    pub fn set(&mut self, span: Lifespan, value: V) {
        if span.is_empty() {
            return;
        }
        self.clear(span);

        let mut min = span.min;
        let mut max = span.max;

        if let Some((&left_start, (left_end, left_value))) = self.entries.range(..min).next_back() {
            if *left_end == Some(min) && *left_value == value {
                min = left_start;
            }
        }
        if let Some(end) = max {
            if let Some((end_of_right, right_value)) = self.entries.get(&end) {
                if *right_value == value {
                    max = *end_of_right;
                    self.entries.remove(&end);
                }
            }
        }
        self.entries.insert(min, (max, value));
    }

    /// Removes every value within `span`, splitting entries that straddle it.
    pub fn clear(&mut self, span: Lifespan) {
        if span.is_empty() {
            return;
        }
        let overlapping: Vec<Snap> = self
            .iter()
            .filter(|(life, _)| life.intersects(&span))
            .map(|(life, _)| life.min)
            .collect();

        for start in overlapping {
            let Some((end, value)) = self.entries.remove(&start) else {
                continue;
            };
            if start < span.min {
                self.entries.insert(start, (Some(span.min), value.clone()));
            }
            if let Some(cut) = span.max {
                if end.map_or(true, |end| end > cut) {
                    self.entries.insert(cut, (end, value));
                }
            }
        }
    }

    /// Ends whatever is current at `snap` so that it stops being current from
    /// `snap` onwards.
    pub fn end_at(&mut self, snap: Snap) {
        self.clear(Lifespan::now_on(snap));
    }
}
