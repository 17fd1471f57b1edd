/*!
 * Kernel Statistics
 * Per-invocation counters for monitoring and tests
 */

use serde::{Deserialize, Serialize};

/// Counters accumulated across the cycles of one kernel instance
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KernelStats {
    pub cycles_completed: u64,
    pub processes_run: u64,
    pub faults_isolated: u64,
    pub records_dropped: u64,
    pub processes_spawned: u64,
    pub processes_killed: u64,
}
