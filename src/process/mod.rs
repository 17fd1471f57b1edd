/*!
 * Process Module
 * Process contracts, decoding, dependency tracking, and the store
 */

pub mod graph;
pub mod registry;
pub mod store;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use graph::DependencyGraph;
pub use registry::{DecodeFn, DecoderRegistry};
pub use store::ProcessStore;
pub use traits::{
    capability, Capabilities, Capability, CycleContext, HostEnv, Process, SystemHost,
};
pub use types::{ProcessRecord, Snapshot, SpecKey, Specifier, TypeTag};
