/*!
 * Lifecycle Coordinator
 * Drives the fixed four-phase cycle across the store and registered subsystems
 */

mod stats;
mod subsystem;

pub use stats::KernelStats;
pub use subsystem::Subsystem;

use crate::core::errors::ProcessError;
use crate::core::id::{IdAllocator, Pid};
use crate::core::report;
use crate::core::types::{KernelResult, Priority};
use crate::process::registry::DecoderRegistry;
use crate::process::store::ProcessStore;
use crate::process::traits::{
    Capabilities, Capability, CycleContext, HostEnv, Process, SystemHost,
};
use crate::process::types::{Snapshot, SpecKey, Specifier, TypeTag};
use ahash::RandomState;
use log::{debug, error, info};
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Position in the four-phase cycle contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Loaded,
    Started,
    Ran,
}

/// Builder for the kernel
pub struct KernelBuilder {
    registry: DecoderRegistry,
    subsystems: Vec<Box<dyn Subsystem>>,
    host: Option<Box<dyn HostEnv>>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            registry: DecoderRegistry::new(),
            subsystems: Vec::new(),
            host: None,
        }
    }

    /// Use the given host environment for cycle and CPU-budget queries
    pub fn with_host(mut self, host: impl HostEnv + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    /// Register a stateful subsystem; declaration order is hook order
    pub fn with_subsystem(mut self, subsystem: impl Subsystem + 'static) -> Self {
        if self
            .subsystems
            .iter()
            .any(|existing| existing.name() == subsystem.name())
        {
            report::programming_error(
                "kernel",
                format!(
                    "duplicate subsystem registration for {}, keeping the original",
                    subsystem.name()
                ),
            );
            return self;
        }
        self.subsystems.push(Box::new(subsystem));
        self
    }

    /// Bind a process type to its decoder and static priority
    pub fn register_decoder<F>(mut self, tag: TypeTag, priority: Priority, decode: F) -> Self
    where
        F: Fn(Pid, serde_json::Value) -> KernelResult<Box<dyn Process>> + 'static,
    {
        self.registry.register(tag, priority, decode);
        self
    }

    /// Build the kernel
    pub fn build(self) -> Kernel {
        info!(
            "kernel initialized: {} registered types, {} subsystems",
            self.registry.len(),
            self.subsystems.len()
        );
        Kernel {
            registry: self.registry,
            allocator: IdAllocator::new(),
            store: ProcessStore::new(),
            subsystems: self.subsystems,
            host: self
                .host
                .unwrap_or_else(|| Box::new(SystemHost::unbudgeted(0))),
            capabilities: HashMap::default(),
            stats: KernelStats::default(),
            phase: Phase::Idle,
        }
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The supervisory kernel: one instance per host invocation
///
/// Owns the decoder registry, the identifier allocator, the process store,
/// and any registered subsystems, and drives them through the strict
/// load / start-of-cycle / run / end-of-cycle sequence. All state the next
/// invocation needs leaves through the snapshot returned by `end_of_cycle`.
pub struct Kernel {
    registry: DecoderRegistry,
    allocator: IdAllocator,
    store: ProcessStore,
    subsystems: Vec<Box<dyn Subsystem>>,
    host: Box<dyn HostEnv>,
    capabilities: HashMap<SpecKey, Capability, RandomState>,
    stats: KernelStats,
    phase: Phase,
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    /// Phase 1: rebuild the live system from the persisted snapshot
    ///
    /// Every record flows through the decoder registry; decode failures drop
    /// that record only. Re-registration through the store rebuilds the
    /// dependency graph as a side effect, with no re-declaration needed.
    pub fn load(&mut self, snapshot: &Snapshot) {
        self.advance_phase(Phase::Idle, Phase::Loaded, "load");
        if !self.store.is_empty() {
            // Each invocation rebuilds from the flat list; stale live state
            // would otherwise collide with the re-registered processes
            debug!("load: clearing {} in-memory processes before rebuild", self.store.len());
            self.store = ProcessStore::new();
        }
        self.capabilities.clear();
        self.allocator.load(snapshot.next_id);

        for record in &snapshot.processes {
            match self
                .registry
                .decode(&record.type_tag, record.id.clone(), record.payload.clone())
            {
                Some(process) => {
                    let priority = self.registry.priority(&record.type_tag);
                    self.store.add(process, priority);
                }
                None => {
                    self.stats.records_dropped += 1;
                }
            }
        }

        for pid in &snapshot.suspended {
            self.store.flag_suspended(pid);
        }

        for subsystem in self.subsystems.iter_mut() {
            let slice = snapshot.subsystems.get(subsystem.name());
            if let Err(e) = subsystem.load(slice) {
                report::programming_error(
                    "kernel",
                    format!("subsystem {} failed to load: {e}", subsystem.name()),
                );
            }
        }

        info!(
            "loaded {} processes from {} records, {} suspended",
            self.store.len(),
            snapshot.processes.len(),
            snapshot.suspended.len()
        );
    }

    /// Phase 2: forward-order subsystem hook, clears per-cycle state
    pub fn start_of_cycle(&mut self) {
        self.advance_phase(Phase::Loaded, Phase::Started, "start_of_cycle");
        self.capabilities.clear();
        for subsystem in self.subsystems.iter_mut() {
            subsystem.start_of_cycle();
        }
    }

    /// Phase 3: run every non-suspended process in execution order
    ///
    /// Each process receives the capability objects its declared dependencies
    /// produced earlier this same cycle. A fault (Err or panic) is logged
    /// with the process identity and isolated; the cycle proceeds.
    pub fn run(&mut self) {
        self.advance_phase(Phase::Started, Phase::Ran, "run");
        let ctx = CycleContext::new(self.host.as_ref());
        let order: Vec<Pid> = self.store.execution_order().to_vec();

        for pid in order {
            if self.store.is_suspended(&pid) {
                debug!("skipping suspended process {}", pid);
                continue;
            }
            let (own_key, declared, slot) = match self.store.get(&pid) {
                Some(process) => {
                    let specifier = process.specifier();
                    (specifier.key(), process.dependencies(), specifier)
                }
                None => {
                    report::programming_error(
                        "kernel",
                        format!("run: execution order id {pid} has no process"),
                    );
                    continue;
                }
            };
            let bag = resolve_capabilities(&self.capabilities, &declared);
            let Some(process) = self.store.get_mut(&pid) else {
                continue;
            };

            match catch_unwind(AssertUnwindSafe(|| process.run(&ctx, &bag))) {
                Ok(Ok(Some(cap))) => {
                    self.capabilities.insert(own_key, cap);
                    self.stats.processes_run += 1;
                }
                Ok(Ok(None)) => {
                    self.stats.processes_run += 1;
                }
                Ok(Err(e)) => {
                    self.stats.faults_isolated += 1;
                    error!("process {} ({}) faulted: {}", pid, slot, e);
                }
                Err(payload) => {
                    self.stats.faults_isolated += 1;
                    error!("process {} ({}) panicked: {}", pid, slot, panic_message(payload));
                }
            }
        }
    }

    /// Phase 4: reverse-order subsystem hook, then encode the outgoing snapshot
    pub fn end_of_cycle(&mut self) -> Snapshot {
        self.advance_phase(Phase::Ran, Phase::Idle, "end_of_cycle");

        let mut subsystems = BTreeMap::new();
        for subsystem in self.subsystems.iter_mut().rev() {
            if let Some(slice) = subsystem.end_of_cycle() {
                subsystems.insert(subsystem.name().to_string(), slice);
            }
        }

        let (processes, dropped) = self.store.encode_all();
        self.stats.records_dropped += dropped;
        self.stats.cycles_completed += 1;

        Snapshot {
            next_id: self.allocator.next_value(),
            suspended: self.store.suspended_ids(),
            processes,
            subsystems,
        }
    }

    /// Drive all four phases for one host invocation
    pub fn run_cycle(&mut self, snapshot: &Snapshot) -> Snapshot {
        self.load(snapshot);
        self.start_of_cycle();
        self.run();
        self.end_of_cycle()
    }

    /// Create and register a process, atomically
    ///
    /// Allocates the id, builds the process, and verifies every declared
    /// specifier resolves to a live process. On any failure nothing is
    /// registered: both lookup maps and the execution list are untouched.
    pub fn add_process<F>(&mut self, ctor: F) -> KernelResult<Pid>
    where
        F: FnOnce(Pid) -> Box<dyn Process>,
    {
        let pid = self.allocator.generate();
        let process = ctor(pid.clone());
        if process.id() != &pid {
            return Err(ProcessError::CreationFailed(
                format!(
                    "constructor returned process with id {}, expected {}",
                    process.id(),
                    pid
                )
                .into(),
            )
            .into());
        }
        let missing = self.store.check_dependencies(&process.dependencies());
        if !missing.is_empty() {
            return Err(ProcessError::MissingDependencies { id: pid, missing }.into());
        }
        let priority = self.registry.priority(&process.type_tag());
        info!("spawned process {} as {}", pid, process.specifier());
        self.store.add(process, priority);
        self.stats.processes_spawned += 1;
        Ok(pid)
    }

    /// Kill a process and suspend its transitive dependents
    ///
    /// The cascade set is returned so callers can surface what was affected.
    /// The pre-removal hook runs after the process is detached from the maps
    /// and graph, immediately before it is dropped.
    pub fn kill_process(&mut self, pid: &Pid) -> KernelResult<HashSet<Pid, RandomState>> {
        let (mut process, cascade) = self.store.remove(pid)?;
        for dependent in &cascade {
            self.store.flag_suspended(dependent);
        }
        process.on_remove();
        self.stats.processes_killed += 1;
        info!(
            "killed process {} ({}), {} dependents suspended",
            pid,
            process.specifier(),
            cascade.len()
        );
        Ok(cascade)
    }

    /// Suspend a process, escalating through its transitive dependents
    pub fn suspend(&mut self, pid: &Pid) -> KernelResult<HashSet<Pid, RandomState>> {
        Ok(self.store.suspend(pid)?)
    }

    /// Clear the suspension flag for a single id; dependents stay suspended
    pub fn resume(&mut self, pid: &Pid) -> KernelResult<()> {
        Ok(self.store.resume(pid)?)
    }

    pub fn is_suspended(&self, pid: &Pid) -> bool {
        self.store.is_suspended(pid)
    }

    /// Runnable processes in execution order
    pub fn list_processes(&self) -> Vec<&dyn Process> {
        self.store.list()
    }

    /// Every live process in execution order, suspended included
    pub fn list_all_processes(&self) -> Vec<&dyn Process> {
        self.store.list_all()
    }

    pub fn get_by_id(&self, pid: &Pid) -> Option<&dyn Process> {
        self.store.get(pid)
    }

    pub fn get_by_specifier(&self, tag: &TypeTag, identifier: &str) -> Option<&dyn Process> {
        self.store.get_by_specifier(tag, identifier)
    }

    /// One-hop dependents of a process's slot
    pub fn dependents_of(&self, pid: &Pid) -> HashSet<Pid, RandomState> {
        self.store.dependents_of(pid)
    }

    /// The cascade set a suspend or kill of this process would affect
    pub fn transitive_dependents_of(&self, pid: &Pid) -> HashSet<Pid, RandomState> {
        self.store.transitive_dependents_of(pid)
    }

    /// Specifiers a live process declared
    pub fn dependencies_of(&self, pid: &Pid) -> Vec<Specifier> {
        self.store.dependencies_of(pid)
    }

    /// Read-only view of the process store
    pub fn store(&self) -> &ProcessStore {
        &self.store
    }

    pub fn stats(&self) -> &KernelStats {
        &self.stats
    }

    fn advance_phase(&mut self, expected: Phase, next: Phase, name: &str) {
        if self.phase != expected {
            report::programming_error(
                "kernel",
                format!(
                    "phase {name} entered from {:?}, expected {:?}; the four-phase order is load, start_of_cycle, run, end_of_cycle",
                    self.phase, expected
                ),
            );
        }
        self.phase = next;
    }
}

fn resolve_capabilities(
    table: &HashMap<SpecKey, Capability, RandomState>,
    declared: &[Specifier],
) -> Capabilities {
    let mut bag = Capabilities::empty();
    for specifier in declared {
        let key = specifier.key();
        if let Some(cap) = table.get(&key) {
            bag.insert(key, cap.clone());
        }
    }
    bag
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
