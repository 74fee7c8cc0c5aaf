//! Hierarchical entity keys
//!
//! A key is a flat path of alternating kind names and identifiers, e.g.
//! `["Author", "tolkien", "Book", 42]`. A key whose final identifier is
//! missing is *incomplete*: the store allocates an id when it is committed.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConversionError, ConversionResult};

/// One element of a flat key path
///
/// Kinds are always names; identifiers are either names or integer ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Id(i64),
    Name(String),
}

impl PathSegment {
    /// Convert to the JSON form used on the wire
    pub fn to_json(&self) -> Value {
        match self {
            Self::Id(id) => Value::from(*id),
            Self::Name(name) => Value::from(name.as_str()),
        }
    }

    /// Read a segment from JSON; only strings and integers qualify
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Some(Self::Name(name.clone())),
            Value::Number(n) => n.as_i64().map(Self::Id),
            _ => None,
        }
    }

    fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Id(_) => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for PathSegment {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// Hierarchical key identifying an entity
///
/// Immutable once built. Two keys are equal iff their flat paths are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    path: Vec<PathSegment>,
}

impl Key {
    /// Build a complete key from a flat `[kind, id, kind, id, ...]` path
    pub fn from_flat_path(flat_path: &[PathSegment]) -> ConversionResult<Self> {
        if flat_path.len() % 2 != 0 {
            return Err(ConversionError::key_construction(format!(
                "path must alternate kind and identifier, got {} elements",
                flat_path.len()
            )));
        }
        validate_path(flat_path)?;
        Ok(Self {
            path: flat_path.to_vec(),
        })
    }

    /// Build an incomplete key of `kind`, optionally under a complete parent
    pub fn incomplete(kind: &str, parent: Option<&Key>) -> ConversionResult<Self> {
        let mut path = match parent {
            Some(parent) if !parent.is_complete() => {
                return Err(ConversionError::key_construction(format!(
                    "parent key {} is incomplete",
                    parent
                )));
            }
            Some(parent) => parent.path.clone(),
            None => Vec::new(),
        };
        path.push(PathSegment::from(kind));
        validate_path(&path)?;
        Ok(Self { path })
    }

    /// The flat path, alternating kind names and identifiers
    pub fn flat_path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Kind of the entity this key identifies
    pub fn kind(&self) -> &str {
        let index = if self.is_complete() {
            self.path.len() - 2
        } else {
            self.path.len() - 1
        };
        self.path[index].as_name().unwrap_or_default()
    }

    /// Identifier of the entity, `None` for incomplete keys
    pub fn id(&self) -> Option<&PathSegment> {
        if self.is_complete() {
            self.path.last()
        } else {
            None
        }
    }

    /// Whether the final identifier is present
    pub fn is_complete(&self) -> bool {
        self.path.len() % 2 == 0
    }

    /// Key of the enclosing entity, if any
    pub fn parent(&self) -> Option<Key> {
        let own = if self.is_complete() { 2 } else { 1 };
        if self.path.len() <= own {
            return None;
        }
        Some(Self {
            path: self.path[..self.path.len() - own].to_vec(),
        })
    }

    /// Whether `ancestor` is a proper prefix of this key
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        ancestor.is_complete()
            && ancestor.path.len() < self.path.len()
            && self.path.starts_with(&ancestor.path)
    }

    /// Complete an incomplete key with a store-allocated id
    pub fn completed_with(&self, id: i64) -> ConversionResult<Self> {
        if self.is_complete() {
            return Err(ConversionError::key_construction(format!(
                "key {} is already complete",
                self
            )));
        }
        let mut path = self.path.clone();
        path.push(PathSegment::Id(id));
        validate_path(&path)?;
        Ok(Self { path })
    }

    /// Flat path as a JSON array
    pub fn path_to_json(&self) -> Value {
        Value::Array(self.path.iter().map(PathSegment::to_json).collect())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(")?;
        for (i, segment) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, ")")
    }
}

/// Read a flat path out of a JSON array
pub fn flat_path_from_json(value: &Value) -> ConversionResult<Vec<PathSegment>> {
    let elements = value.as_array().ok_or_else(|| {
        ConversionError::key_construction(format!("key path must be an array, got {}", value))
    })?;

    elements
        .iter()
        .map(|element| {
            PathSegment::from_json(element).ok_or_else(|| {
                ConversionError::key_construction(format!(
                    "key path elements must be strings or integers, got {}",
                    element
                ))
            })
        })
        .collect()
}

fn validate_path(path: &[PathSegment]) -> ConversionResult<()> {
    if path.is_empty() {
        return Err(ConversionError::key_construction("path is empty"));
    }

    for (index, segment) in path.iter().enumerate() {
        let is_kind = index % 2 == 0;
        match segment {
            PathSegment::Name(name) if name.is_empty() => {
                let what = if is_kind { "kind" } else { "name" };
                return Err(ConversionError::key_construction(format!(
                    "empty {} at position {}",
                    what, index
                )));
            }
            PathSegment::Id(id) if is_kind => {
                return Err(ConversionError::key_construction(format!(
                    "kind at position {} must be a string, got {}",
                    index, id
                )));
            }
            PathSegment::Id(id) if *id <= 0 => {
                return Err(ConversionError::key_construction(format!(
                    "id at position {} must be positive, got {}",
                    index, id
                )));
            }
            _ => {}
        }
    }

    Ok(())
}
