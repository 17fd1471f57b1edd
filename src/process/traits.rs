/*!
 * Process Traits
 * The scheduled-unit contract, capability objects, and the host environment
 */

use super::types::{SpecKey, Specifier, TypeTag};
use crate::core::id::Pid;
use crate::core::types::{CycleId, KernelResult};
use ahash::RandomState;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

/// Capability object: the operations a process exposes for the current cycle
///
/// Dependents receive this, never a reference to the producing process, and
/// downcast it to the capability interface they program against. Capabilities
/// are not stored beyond the cycle that produced them.
pub type Capability = Rc<dyn Any>;

/// Wrap a value as a capability object
#[inline]
pub fn capability<T: Any>(value: T) -> Capability {
    Rc::new(value)
}

/// Environment queries supplied by the host
///
/// The cycle counter increases monotonically across invocations; the CPU
/// queries expose the single shared budget every process draws from.
pub trait HostEnv {
    /// Current discrete cycle
    fn cycle(&self) -> CycleId;

    /// CPU consumed so far this cycle, in milliseconds
    fn cpu_used(&self) -> f64;

    /// Host-imposed CPU quota for the whole cycle, in milliseconds
    fn cpu_limit(&self) -> f64;

    /// Budget still available this cycle
    fn cpu_remaining(&self) -> f64 {
        self.cpu_limit() - self.cpu_used()
    }
}

/// Wall-clock host environment backing the binary and tests
pub struct SystemHost {
    cycle: CycleId,
    started: Instant,
    limit_ms: f64,
}

impl SystemHost {
    /// Host view for one invocation with the given CPU quota
    pub fn new(cycle: CycleId, limit_ms: f64) -> Self {
        Self {
            cycle,
            started: Instant::now(),
            limit_ms,
        }
    }

    /// Host view with no effective CPU quota
    pub fn unbudgeted(cycle: CycleId) -> Self {
        Self::new(cycle, f64::INFINITY)
    }
}

impl HostEnv for SystemHost {
    fn cycle(&self) -> CycleId {
        self.cycle
    }

    fn cpu_used(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn cpu_limit(&self) -> f64 {
        self.limit_ms
    }
}

/// Per-run view handed to a process: the current cycle plus budget queries
///
/// Processes are expected to check `cpu_remaining` and skip optional work
/// rather than overrun; the kernel never preempts.
pub struct CycleContext<'a> {
    pub cycle: CycleId,
    host: &'a dyn HostEnv,
}

impl<'a> CycleContext<'a> {
    pub fn new(host: &'a dyn HostEnv) -> Self {
        Self {
            cycle: host.cycle(),
            host,
        }
    }

    #[inline]
    pub fn cpu_used(&self) -> f64 {
        self.host.cpu_used()
    }

    #[inline]
    pub fn cpu_limit(&self) -> f64 {
        self.host.cpu_limit()
    }

    #[inline]
    pub fn cpu_remaining(&self) -> f64 {
        self.host.cpu_remaining()
    }
}

/// Resolved dependency bundle for one run
///
/// Holds the capability objects produced earlier this cycle by the processes
/// the dependent declared. A declared specifier whose process is suspended,
/// dead, or not yet run simply resolves to nothing.
pub struct Capabilities {
    entries: HashMap<SpecKey, Capability, RandomState>,
}

impl Capabilities {
    /// Empty bundle
    pub fn empty() -> Self {
        Self {
            entries: HashMap::default(),
        }
    }

    pub(crate) fn insert(&mut self, key: SpecKey, cap: Capability) {
        self.entries.insert(key, cap);
    }

    /// Capability produced by the given specifier's process, if any
    pub fn get(&self, spec: &Specifier) -> Option<Capability> {
        self.entries.get(&spec.key()).cloned()
    }

    /// Typed view of a capability
    pub fn get_as<T: Any>(&self, spec: &Specifier) -> Option<Rc<T>> {
        self.get(spec).and_then(|cap| cap.downcast::<T>().ok())
    }

    /// Whether the specifier resolved this cycle
    pub fn contains(&self, spec: &Specifier) -> bool {
        self.entries.contains_key(&spec.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::empty()
    }
}

/// The scheduled unit of long-lived behavior
///
/// A process lives across cycles only through its encode/decode round-trip.
/// It declares the specifiers it depends on once, at the type level; the
/// kernel resolves them to capability objects every run.
pub trait Process {
    /// Allocated process id
    fn id(&self) -> &Pid;

    /// Type tag matching this process's decoder registration
    fn type_tag(&self) -> TypeTag;

    /// Identifier unique within the type
    fn identifier(&self) -> &str;

    /// Specifiers this process depends on
    fn dependencies(&self) -> Vec<Specifier> {
        Vec::new()
    }

    /// One cooperative slice of work; returns this cycle's capability object
    fn run(
        &mut self,
        ctx: &CycleContext<'_>,
        deps: &Capabilities,
    ) -> KernelResult<Option<Capability>>;

    /// Pure read of this process's state into a persistable payload
    fn encode(&self) -> KernelResult<Value>;

    /// Pre-removal hook for releasing external resources
    fn on_remove(&mut self) {}

    /// The logical slot this process occupies
    fn specifier(&self) -> Specifier {
        Specifier::new(self.type_tag(), self.identifier())
    }
}
