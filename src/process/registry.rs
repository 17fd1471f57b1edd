/*!
 * Decoder Registry
 * Maps type tags to reconstruction functions and static priorities
 */

use super::traits::Process;
use super::types::TypeTag;
use crate::core::errors::DecodeError;
use crate::core::id::Pid;
use crate::core::report;
use crate::core::types::{KernelResult, Priority, DEFAULT_PRIORITY};
use ahash::RandomState;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

/// Function reconstructing a live process from its persisted record
pub type DecodeFn = Box<dyn Fn(Pid, Value) -> KernelResult<Box<dyn Process>>>;

struct Registration {
    decode: DecodeFn,
    priority: Priority,
}

/// One-time table binding each process type to its decoder
///
/// The table also carries the static per-type execution priority used to
/// tie-break the execution order.
pub struct DecoderRegistry {
    table: HashMap<TypeTag, Registration, RandomState>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self {
            table: HashMap::default(),
        }
    }

    /// Bind a type tag to a decoder and its static priority
    ///
    /// Registering a tag twice is a programming error: it is reported, the
    /// original binding is kept, and startup continues.
    pub fn register<F>(&mut self, tag: TypeTag, priority: Priority, decode: F)
    where
        F: Fn(Pid, Value) -> KernelResult<Box<dyn Process>> + 'static,
    {
        if self.table.contains_key(&tag) {
            report::programming_error(
                "decoder_registry",
                format!("duplicate decoder registration for type {tag}, keeping the original"),
            );
            return;
        }
        debug!("registered decoder for type {} at priority {}", tag, priority);
        self.table.insert(
            tag,
            Registration {
                decode: Box::new(decode),
                priority,
            },
        );
    }

    /// Reconstruct a process from a persisted record
    ///
    /// An unregistered tag or a failing decoder yields `None` and a reported
    /// programming error; the caller drops the record and keeps loading.
    pub fn decode(&self, tag: &TypeTag, id: Pid, payload: Value) -> Option<Box<dyn Process>> {
        let Some(registration) = self.table.get(tag) else {
            report::programming_error(
                "decoder_registry",
                DecodeError::UnknownTypeTag(tag.clone()),
            );
            return None;
        };
        let expected = id.clone();
        match (registration.decode)(id, payload) {
            Ok(process) => {
                if process.id() != &expected {
                    report::programming_error(
                        "decoder_registry",
                        format!(
                            "decoder for {} rebuilt id {} from a record for {}",
                            tag,
                            process.id(),
                            expected
                        ),
                    );
                }
                Some(process)
            }
            Err(e) => {
                report::programming_error(
                    "decoder_registry",
                    DecodeError::DecoderFailed {
                        tag: tag.clone(),
                        reason: e.to_string().into(),
                    },
                );
                None
            }
        }
    }

    /// Static execution priority of a type
    ///
    /// A tag with no registration gets the default priority and a reported
    /// programming error, since every live type is expected in the table.
    pub fn priority(&self, tag: &TypeTag) -> Priority {
        match self.table.get(tag) {
            Some(registration) => registration.priority,
            None => {
                report::programming_error(
                    "decoder_registry",
                    format!("no priority entry for type {tag}, using default"),
                );
                DEFAULT_PRIORITY
            }
        }
    }

    pub fn is_registered(&self, tag: &TypeTag) -> bool {
        self.table.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
