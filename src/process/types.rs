/*!
 * Process Types
 * Logical names, persisted records, and the snapshot shape
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::SnapshotError;
use crate::core::id::Pid;
use crate::core::types::KernelResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Short fixed-width code naming a process type
///
/// Tags are drawn from the decoder registry's table and land in every
/// persisted record, so they are kept to a few characters to respect the
/// host's snapshot size quota.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(InlineString);

impl TypeTag {
    /// Create a tag from a short code
    #[inline]
    pub fn new(tag: impl Into<InlineString>) -> Self {
        Self(tag.into())
    }

    /// Get the tag as a string slice
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TypeTag {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Stable logical name of a process slot: (type, identifier)
///
/// The identifier is unique only within its type. Dependencies are declared
/// against specifiers, never against ids, so a logical role keeps resolving
/// correctly even after the process behind it was destroyed and recreated
/// under a new id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Specifier {
    pub type_tag: TypeTag,
    pub identifier: InlineString,
}

impl Specifier {
    /// Create a specifier for a logical process slot
    pub fn new(type_tag: impl Into<TypeTag>, identifier: impl Into<InlineString>) -> Self {
        Self {
            type_tag: type_tag.into(),
            identifier: identifier.into(),
        }
    }

    /// Synthetic string key used by the dependency graph
    pub fn key(&self) -> SpecKey {
        let mut key = InlineString::from(self.type_tag.as_str());
        key.push_str(":");
        key.push_str(self.identifier.as_str());
        SpecKey(key)
    }
}

impl From<TypeTag> for Specifier {
    /// Specifier for a singleton slot: the identifier repeats the tag
    fn from(tag: TypeTag) -> Self {
        let identifier = InlineString::from(tag.as_str());
        Self {
            type_tag: tag,
            identifier,
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_tag, self.identifier)
    }
}

/// Synthetic graph key combining type tag and identifier
///
/// The graph is keyed by this string, never by process id, because the
/// dependency relation names the logical slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpecKey(InlineString);

impl SpecKey {
    /// Get the key as a string slice
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SpecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted process: `{type_tag, id, payload}`
///
/// The payload is opaque to the kernel. Composite processes may nest further
/// records of the same shape inside their payload for child sub-processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessRecord {
    pub type_tag: TypeTag,
    pub id: Pid,
    pub payload: Value,
}

/// The serialized store persisted by the host between cycles
///
/// Record order equals execution order and is semantically significant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Snapshot {
    pub next_id: u64,
    pub suspended: Vec<Pid>,
    pub processes: Vec<ProcessRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subsystems: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Snapshot of a never-persisted system
    pub fn empty() -> Self {
        Self {
            next_id: 1,
            suspended: Vec::new(),
            processes: Vec::new(),
            subsystems: BTreeMap::new(),
        }
    }

    /// Serialize for the host to persist
    pub fn to_json(&self) -> KernelResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SnapshotError::Serialize(e.to_string().into()).into())
    }

    /// Parse a snapshot the host handed back
    pub fn from_json(raw: &str) -> KernelResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SnapshotError::Deserialize(e.to_string().into()).into())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
