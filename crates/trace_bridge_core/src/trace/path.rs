use crate::{BridgeError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One key of a canonical path: a named child or an indexed element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    Name(String),
    Index(String),
}

impl PathKey {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn index(index: impl ToString) -> Self {
        Self::Index(index.to_string())
    }

    /// The key text without brackets.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Name(s) | Self::Index(s) => s,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    fn numeric(&self) -> Option<u128> {
        let s = self.as_str();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) if !hex.is_empty() => u128::from_str_radix(hex, 16).ok(),
            Some(_) => None,
            None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
            None => None,
        }
    }
}

// Names sort before indices. Numeric indices sort numerically and before
// non-numeric ones; ties fall back to the text so the order agrees with Eq.
impl Ord for PathKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Name(a), Self::Name(b)) => a.cmp(b),
            (Self::Name(_), Self::Index(_)) => Ordering::Less,
            (Self::Index(_), Self::Name(_)) => Ordering::Greater,
            (Self::Index(a), Self::Index(b)) => match (self.numeric(), other.numeric()) {
                (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            },
        }
    }
}

impl PartialOrd for PathKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Canonical path of a trace object. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeyPath(Vec<PathKey>);

impl KeyPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self(parse_keys(text)?))
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn key(&self, name: impl Into<String>) -> Self {
        self.extend(PathKey::Name(name.into()))
    }

    pub fn index(&self, index: impl ToString) -> Self {
        self.extend(PathKey::index(index))
    }

    pub fn extend(&self, key: PathKey) -> Self {
        let mut keys = self.0.clone();
        keys.push(key);
        Self(keys)
    }

    pub fn parent(&self) -> Option<Self> {
        match self.0.split_last() {
            Some((_, rest)) => Some(Self(rest.to_vec())),
            None => None,
        }
    }

    pub fn last(&self) -> Option<&PathKey> {
        self.0.last()
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Every proper ancestor from the root down, excluding `self`.
    pub fn ancestors(&self) -> impl Iterator<Item = KeyPath> + '_ {
        (0..self.0.len()).map(|n| Self(self.0[..n].to_vec()))
    }
}

impl FromStr for KeyPath {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Vec<PathKey>> for KeyPath {
    fn from(keys: Vec<PathKey>) -> Self {
        Self(keys)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 && !key.is_index() {
                f.write_str(".")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Token produced by the shared path/pattern lexer. `Index(None)` is `[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Name(String),
    Index(Option<String>),
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>> {
    let invalid = |why: &str| BridgeError::InvalidPath(format!("{text:?}: {why}"));
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut expect_name = true;

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            '[' => {
                chars.next();
                let start = pos + 1;
                let mut end = None;
                for (i, c) in chars.by_ref() {
                    if c == ']' {
                        end = Some(i);
                        break;
                    }
                    if c == '[' {
                        return Err(invalid("nested '['"));
                    }
                }
                let end = end.ok_or_else(|| invalid("unterminated '['"))?;
                let inner = &text[start..end];
                tokens.push(Token::Index((!inner.is_empty()).then(|| inner.to_string())));
                expect_name = false;
            }
            '.' => {
                if expect_name {
                    return Err(invalid("empty name segment"));
                }
                chars.next();
                expect_name = true;
            }
            ']' => return Err(invalid("unbalanced ']'")),
            _ => {
                if !expect_name {
                    return Err(invalid("missing '.' before name"));
                }
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if matches!(c, '.' | '[' | ']') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                tokens.push(Token::Name(name));
                expect_name = false;
            }
        }
    }
    if expect_name && !tokens.is_empty() {
        return Err(invalid("trailing '.'"));
    }
    Ok(tokens)
}

fn parse_keys(text: &str) -> Result<Vec<PathKey>> {
    tokenize(text)?
        .into_iter()
        .map(|token| match token {
            Token::Name(name) => Ok(PathKey::Name(name)),
            Token::Index(Some(index)) => Ok(PathKey::Index(index)),
            Token::Index(None) => Err(BridgeError::InvalidPath(format!(
                "{text:?}: '[]' is a pattern, not a key"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let path = KeyPath::parse("Processes[1].Threads[2].Stack[0]").unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path.keys()[1], PathKey::index(1));
        assert_eq!(path.to_string(), "Processes[1].Threads[2].Stack[0]");
    }

    #[test]
    fn test_index_may_contain_dots() {
        let path = KeyPath::parse("Processes[4].Modules[notepad.exe]").unwrap();
        assert_eq!(path.last(), Some(&PathKey::index("notepad.exe")));
    }

    #[test]
    fn test_root_and_ancestors() {
        assert!(KeyPath::parse("").unwrap().is_root());
        let path = KeyPath::parse("Processes[1].Threads").unwrap();
        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["", "Processes", "Processes[1]"]);
        assert_eq!(path.parent().unwrap().to_string(), "Processes[1]");
        assert!(KeyPath::root().parent().is_none());
    }

    #[test]
    fn test_malformed_paths_rejected() {
        for bad in ["Processes[", "Processes]", "a..b", ".a", "a.", "a[1]b", "Processes[]"] {
            assert!(
                matches!(KeyPath::parse(bad), Err(BridgeError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_key_ordering_numeric_then_lexical() {
        let mut keys = vec![
            PathKey::index(10),
            PathKey::index("0x2"),
            PathKey::index(9),
            PathKey::index("abc"),
            PathKey::name("Threads"),
            PathKey::name("Memory"),
        ];
        keys.sort();
        let shown: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            shown,
            vec!["Memory", "Threads", "[0x2]", "[9]", "[10]", "[abc]"]
        );
    }
}
