/*!
 * Core Module
 * Fundamental kernel types, identifiers, and error handling
 */

pub mod data_structures;
pub mod errors;
pub mod id;
pub mod report;
pub mod types;

// Re-export for convenience
pub use data_structures::InlineString;
pub use errors::*;
pub use id::{Id, IdAllocator, Pid, ProcessNs};
pub use types::*;
