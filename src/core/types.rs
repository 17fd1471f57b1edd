/*!
 * Core Types
 * Common types used across the kernel
 */

/// Static per-type execution priority (0-255, higher runs earlier)
pub type Priority = u8;

/// Priority assigned to process types with no registry entry
pub const DEFAULT_PRIORITY: Priority = 0;

/// Host-supplied discrete cycle counter
pub type CycleId = u64;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;
