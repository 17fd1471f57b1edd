/*!
 * Programming-Error Report Path
 * Non-throwing reporting for invariant violations
 */

use log::error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide count of reported programming errors
///
/// The kernel runs one instance per host invocation, so a single counter is
/// the documented singleton for this concern. Reports never abort the cycle:
/// a degraded-but-running system beats a dead one.
static REPORTED: AtomicU64 = AtomicU64::new(0);

/// Report an invariant violation
///
/// Logs through the error channel and increments the report counter.
/// Callers continue executing; nothing is thrown.
pub fn programming_error(component: &str, message: impl fmt::Display) {
    REPORTED.fetch_add(1, Ordering::Relaxed);
    error!(target: "kernel::report", "[{}] {}", component, message);
}

/// Number of programming errors reported so far in this invocation
#[inline]
pub fn reported_errors() -> u64 {
    REPORTED.load(Ordering::Relaxed)
}
