/*!
 * ID Generation System
 * Type-safe opaque identifiers and the persisted monotonic allocator
 */

use super::data_structures::InlineString;
use super::report;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Opaque identifier token: the allocator counter rendered in base-36
///
/// The namespace parameter `M` is compile-time only; it prevents an id minted
/// for one kind of entity from being passed where another kind is expected.
/// Tokens carry no meaning beyond identity and compare by numeric magnitude
/// (shorter base-36 strings sort first).
pub struct Id<M> {
    value: InlineString,
    _ns: PhantomData<fn() -> M>,
}

/// Namespace marker for process identifiers
pub enum ProcessNs {}

/// Process ID
pub type Pid = Id<ProcessNs>;

impl<M> Id<M> {
    /// Render a counter value as an id token
    pub fn from_index(index: u64) -> Self {
        Self {
            value: to_base36(index),
            _ns: PhantomData,
        }
    }

    /// Reconstruct an id from its persisted token
    #[inline]
    pub fn from_token(token: impl Into<InlineString>) -> Self {
        Self {
            value: token.into(),
            _ns: PhantomData,
        }
    }

    /// Get the token as a string slice
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.value.as_str()
    }
}

impl<M> Clone for Id<M> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _ns: PhantomData,
        }
    }
}

impl<M> PartialEq for Id<M> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<M> Eq for Id<M> {}

impl<M> Hash for Id<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<M> PartialOrd for Id<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for Id<M> {
    /// Numeric order: shorter base-36 tokens are smaller values
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .len()
            .cmp(&other.value.len())
            .then_with(|| self.value.as_str().cmp(other.value.as_str()))
    }
}

impl<M> fmt::Debug for Id<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<M> fmt::Display for Id<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<M> Serialize for Id<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de, M> Deserialize<'de> for Id<M> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor<M>(PhantomData<fn() -> M>);

        impl<M> Visitor<'_> for IdVisitor<M> {
            type Value = Id<M>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an id token string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Id::from_token(v))
            }
        }

        deserializer.deserialize_str(IdVisitor(PhantomData))
    }
}

fn to_base36(mut n: u64) -> InlineString {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return InlineString::from("0");
    }
    // 64-bit values need at most 13 base-36 digits
    let mut buf = [0u8; 13];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = DIGITS[(n % 36) as usize];
        n /= 36;
    }
    // Digits are ASCII, so the slice is always valid UTF-8
    InlineString::from(std::str::from_utf8(&buf[i..]).unwrap_or("0"))
}

// ============================================================================
// Identifier Allocator
// ============================================================================

/// Sole writer of the persisted id counter
///
/// The counter value survives cycles inside the snapshot; restarts therefore
/// never reissue an id that any live process or graph edge still references.
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Create an allocator for a fresh (never-persisted) kernel
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue the next process id and advance the counter
    pub fn generate(&mut self) -> Pid {
        let pid = Pid::from_index(self.next);
        self.next += 1;
        pid
    }

    /// Restore the counter from the snapshot
    ///
    /// Identifier values only increase: a persisted value below ids already
    /// issued this cycle is an inconsistency and is ignored.
    pub fn load(&mut self, next: u64) {
        if next < self.next {
            report::programming_error(
                "id_allocator",
                format!(
                    "persisted counter {} is behind issued counter {}, keeping the larger",
                    next, self.next
                ),
            );
            return;
        }
        self.next = next;
    }

    /// Counter value to persist into the outgoing snapshot
    #[inline]
    pub fn next_value(&self) -> u64 {
        self.next
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
