//! Glob-like path patterns such as `Processes[].Threads[]`.
//!
//! A pattern is a sequence of segments separated by `.`; `Name[]` matches any
//! index under `Name`, `[]` any anonymous index and `[k]` a literal index.
//! Predicates are unions of patterns separated by `|`.

use super::path::{tokenize, KeyPath, PathKey, Token};
use crate::{BridgeError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    Name(String),
    Index(String),
    AnyIndex,
}

impl PatternSegment {
    pub fn matches(&self, key: &PathKey) -> bool {
        match (self, key) {
            (Self::Name(a), PathKey::Name(b)) => a == b,
            (Self::Index(a), PathKey::Index(b)) => a == b,
            (Self::AnyIndex, PathKey::Index(_)) => true,
            _ => false,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::AnyIndex)
    }
}

impl fmt::Display for PatternSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::AnyIndex => f.write_str("[]"),
        }
    }
}

/// A single pattern; it denotes at most one object per concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    pub fn parse(text: &str) -> Result<Self> {
        let segments = tokenize(text.trim())?
            .into_iter()
            .map(|token| match token {
                Token::Name(name) => PatternSegment::Name(name),
                Token::Index(Some(index)) => PatternSegment::Index(index),
                Token::Index(None) => PatternSegment::AnyIndex,
            })
            .collect();
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn matches(&self, path: &KeyPath) -> bool {
        path.len() == self.segments.len() && self.matches_prefix(path)
    }

    /// Whether `path` could be an ancestor of (or equal to) a match.
    pub fn matches_prefix(&self, path: &KeyPath) -> bool {
        path.len() <= self.segments.len()
            && self
                .segments
                .iter()
                .zip(path.keys())
                .all(|(segment, key)| segment.matches(key))
    }

    /// Keys captured by the wildcard segments, left to right, or `None` when
    /// the path does not match.
    pub fn match_keys(&self, path: &KeyPath) -> Option<Vec<String>> {
        if !self.matches(path) {
            return None;
        }
        Some(
            self.segments
                .iter()
                .zip(path.keys())
                .filter(|(segment, _)| segment.is_wildcard())
                .map(|(_, key)| key.as_str().to_string())
                .collect(),
        )
    }

    /// Replaces the wildcards with `keys`, left to right.
    pub fn apply_keys(&self, keys: &[&str]) -> Result<KeyPath> {
        let mut remaining = keys.iter();
        let mut path = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            path.push(match segment {
                PatternSegment::Name(name) => PathKey::Name(name.clone()),
                PatternSegment::Index(index) => PathKey::Index(index.clone()),
                PatternSegment::AnyIndex => {
                    let key = remaining.next().ok_or_else(|| {
                        BridgeError::InvalidPath(format!("not enough keys for {self}"))
                    })?;
                    PathKey::index(key)
                }
            });
        }
        if remaining.next().is_some() {
            return Err(BridgeError::InvalidPath(format!("too many keys for {self}")));
        }
        Ok(KeyPath::from(path))
    }
}

impl From<Vec<PatternSegment>> for PathPattern {
    fn from(segments: Vec<PatternSegment>) -> Self {
        Self { segments }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && matches!(segment, PatternSegment::Name(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// A union of path patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPredicates {
    patterns: Vec<PathPattern>,
}

impl PathPredicates {
    pub fn parse(text: &str) -> Result<Self> {
        let patterns = split_union(text)
            .into_iter()
            .map(PathPattern::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    pub fn matches(&self, path: &KeyPath) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn matches_prefix(&self, path: &KeyPath) -> bool {
        self.patterns.iter().any(|p| p.matches_prefix(path))
    }

    /// The sole pattern of this predicate. A union could denote several
    /// objects for one concrete path, so it has no singleton pattern.
    pub fn get_singleton_pattern(&self) -> Result<&PathPattern> {
        match self.patterns.as_slice() {
            [single] => Ok(single),
            _ => Err(BridgeError::InvalidPath(format!(
                "{self} is not a singleton pattern"
            ))),
        }
    }
}

impl From<PathPattern> for PathPredicates {
    fn from(pattern: PathPattern) -> Self {
        Self {
            patterns: vec![pattern],
        }
    }
}

impl fmt::Display for PathPredicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pattern) in self.patterns.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{pattern}")?;
        }
        Ok(())
    }
}

fn split_union(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
