/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::data_structures::InlineString;
use super::id::Pid;
use crate::process::types::{Specifier, TypeTag};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process-related errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Process {0} not found")]
    #[diagnostic(
        code(process::not_found),
        help("The process may have been killed or never existed. Check the id against listProcesses.")
    )]
    NotFound(Pid),

    #[error("Process {id} declares unresolved dependencies")]
    #[diagnostic(
        code(process::missing_dependencies),
        help("Every declared specifier must resolve to a live process at creation time. Create the dependencies first.")
    )]
    MissingDependencies { id: Pid, missing: Vec<Specifier> },

    #[error("Failed to create process: {0}")]
    #[diagnostic(
        code(process::creation_failed),
        help("The constructor rejected the allocated id or its configuration. View logs for details.")
    )]
    CreationFailed(InlineString),

    #[error("Process {id} run failed: {reason}")]
    #[diagnostic(
        code(process::run_failed),
        help("Run faults are isolated per process; the rest of the cycle proceeds.")
    )]
    RunFailed { id: Pid, reason: InlineString },
}

/// Decode-time errors: a failing record is dropped, never fatal
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DecodeError {
    #[error("No decoder registered for type {0}")]
    #[diagnostic(
        code(decode::unknown_type_tag),
        help("Register the type with the decoder registry before loading snapshots that contain it.")
    )]
    UnknownTypeTag(TypeTag),

    #[error("Decoder for type {tag} failed: {reason}")]
    #[diagnostic(
        code(decode::decoder_failed),
        help("The persisted payload does not match what the decoder expects. The record is dropped.")
    )]
    DecoderFailed { tag: TypeTag, reason: InlineString },

    #[error("Malformed process record: {0}")]
    #[diagnostic(
        code(decode::malformed_record),
        help("The record shape must be {{type_tag, id, payload}}.")
    )]
    MalformedRecord(InlineString),
}

/// Snapshot serialization errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SnapshotError {
    #[error("Failed to serialize snapshot: {0}")]
    #[diagnostic(
        code(snapshot::serialize),
        help("A process payload produced non-serializable JSON. The snapshot write is abandoned.")
    )]
    Serialize(InlineString),

    #[error("Failed to deserialize snapshot: {0}")]
    #[diagnostic(
        code(snapshot::deserialize),
        help("The persisted snapshot is corrupt or from an incompatible layout.")
    )]
    Deserialize(InlineString),
}

/// Umbrella error for kernel operations
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum KernelError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),
}
