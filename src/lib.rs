/*!
 * Cycle-OS Kernel Library
 * Supervisory kernel for cold-start-per-cycle process scheduling
 */

pub mod core;
pub mod kernel;
pub mod process;

// Re-exports
pub use crate::core::errors::{DecodeError, KernelError, ProcessError, SnapshotError};
pub use crate::core::{
    report, Id, IdAllocator, InlineString, KernelResult, Pid, Priority, ProcessNs, CycleId,
    DEFAULT_PRIORITY,
};
pub use kernel::{Kernel, KernelBuilder, KernelStats, Subsystem};
pub use process::{
    capability, Capabilities, Capability, CycleContext, DecoderRegistry, DependencyGraph, HostEnv,
    Process, ProcessRecord, ProcessStore, Snapshot, SpecKey, Specifier, SystemHost, TypeTag,
};
