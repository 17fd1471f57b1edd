/*!
 * Kernel Subsystems
 * Hook contract for stateful subsystems driven through the cycle phases
 */

use crate::core::types::KernelResult;
use serde_json::Value;

/// A stateful subsystem the kernel carries through every cycle
///
/// Hooks run in declaration order for `load` and `start_of_cycle` and in
/// reverse declaration order for `end_of_cycle`: teardown order is the dual
/// of init order. Each subsystem owns one named slice of the snapshot.
pub trait Subsystem {
    /// Stable name keying this subsystem's snapshot slice
    fn name(&self) -> &'static str;

    /// Restore state from the subsystem's snapshot slice, if present
    fn load(&mut self, slice: Option<&Value>) -> KernelResult<()> {
        let _ = slice;
        Ok(())
    }

    /// Clear per-cycle transient caches
    fn start_of_cycle(&mut self) {}

    /// Produce this cycle's snapshot slice, if any state needs persisting
    fn end_of_cycle(&mut self) -> Option<Value> {
        None
    }
}
