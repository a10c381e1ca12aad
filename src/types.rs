//! Value types shared by the diff, reconciler and lifecycle modules.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Identifier of a remote entity.
///
/// Remote APIs hand out numeric and string identifiers; both are carried as
/// text so they can be placed into paths unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extract an identifier from a JSON string or number. Empty strings,
    /// `null` and other shapes yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// The identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty, which never names a remote entity.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for Identity {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("identifier must be a non-empty string or a number"))
    }
}

/// A change to a single top-level attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute name.
    pub path: String,
    /// The value before the change (None if it was absent).
    pub before: Option<Value>,
    /// The value after the change (None if it is removed).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// A change that sets a previously absent attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// A change that clears an attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// A change between two present values.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// What the reconciler would do to bring the remote in line with a desired
/// record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing exists remotely yet.
    Create,
    /// Desired and last-known state agree.
    NoOp,
    /// The listed attributes change in place.
    Update {
        /// Changed attributes.
        changes: Vec<AttributeChange>,
    },
    /// A force-new attribute changed; the entity is deleted and recreated.
    Replace {
        /// Changed attributes.
        changes: Vec<AttributeChange>,
    },
}

impl Plan {
    /// Attribute changes carried by the plan.
    pub fn changes(&self) -> &[AttributeChange] {
        match self {
            Self::Update { changes } | Self::Replace { changes } => changes,
            Self::Create | Self::NoOp => &[],
        }
    }

    /// Whether applying the plan issues no requests.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    /// Whether the plan deletes and recreates the entity.
    pub fn requires_replace(&self) -> bool {
        matches!(self, Self::Replace { .. })
    }
}
