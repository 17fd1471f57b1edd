/*!
 * Process Store
 * Authoritative process collections: lookup maps, execution list, suspension
 */

use super::graph::DependencyGraph;
use super::traits::Process;
use super::types::{ProcessRecord, SpecKey, Specifier, TypeTag};
use crate::core::errors::ProcessError;
use crate::core::id::Pid;
use crate::core::report;
use crate::core::types::{Priority, DEFAULT_PRIORITY};
use ahash::RandomState;
use log::debug;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Execution-order candidate: higher priority pops first, then earlier insertion
struct ReadyEntry {
    priority: Priority,
    sequence: u64,
    pid: Pid,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Owner of the authoritative collections
///
/// Every live process has exactly one entry in each lookup map and one node
/// in the execution list. All mutation flows through store methods, called
/// from the kernel's single thread of control, so no locks are needed.
pub struct ProcessStore {
    by_id: HashMap<Pid, Box<dyn Process>, RandomState>,
    by_specifier: HashMap<SpecKey, Pid, RandomState>,
    execution: Vec<Pid>,
    suspended: HashSet<Pid, RandomState>,
    graph: DependencyGraph,
    priorities: HashMap<Pid, Priority, RandomState>,
    sequence: HashMap<Pid, u64, RandomState>,
    next_sequence: u64,
}

impl ProcessStore {
    pub fn new() -> Self {
        Self {
            by_id: HashMap::default(),
            by_specifier: HashMap::default(),
            execution: Vec::new(),
            suspended: HashSet::default(),
            graph: DependencyGraph::new(),
            priorities: HashMap::default(),
            sequence: HashMap::default(),
            next_sequence: 0,
        }
    }

    /// Register a process and rebuild its graph edges
    ///
    /// The dependency precondition is enforced by the creation flow, not
    /// here: load-time re-registration must accept processes whose
    /// dependencies appear later in the snapshot.
    pub fn add(&mut self, process: Box<dyn Process>, priority: Priority) {
        let pid = process.id().clone();
        if self.by_id.contains_key(&pid) {
            report::programming_error(
                "process_store",
                format!("add: id {pid} is already registered, refusing duplicate"),
            );
            return;
        }

        let specifier = process.specifier();
        let key = specifier.key();
        if let Some(occupant) = self.by_specifier.get(&key) {
            report::programming_error(
                "process_store",
                format!("add: slot {key} already occupied by {occupant}, replacing with {pid}"),
            );
        }

        let dependencies = process.dependencies();
        self.graph.add(&pid, &specifier, &dependencies);
        self.by_specifier.insert(key, pid.clone());
        self.priorities.insert(pid.clone(), priority);
        self.sequence.insert(pid.clone(), self.next_sequence);
        self.next_sequence += 1;
        self.execution.push(pid.clone());
        self.by_id.insert(pid.clone(), process);
        self.recompute_order();
        debug!("registered process {} as {}", pid, specifier);
    }

    /// Unregister a process, returning it with its cascade set
    ///
    /// The cascade is computed before any edge is stripped so the caller can
    /// mark every transitive dependent suspended. Expected-but-missing map
    /// entries are reported, never fatal.
    pub fn remove(
        &mut self,
        pid: &Pid,
    ) -> Result<(Box<dyn Process>, HashSet<Pid, RandomState>), ProcessError> {
        let cascade = self.graph.transitive_dependents_of(pid);
        let Some(process) = self.by_id.remove(pid) else {
            return Err(ProcessError::NotFound(pid.clone()));
        };

        let key = process.specifier().key();
        match self.by_specifier.remove(&key) {
            Some(owner) if owner == *pid => {}
            Some(other) => {
                // The slot belonged to someone else; put it back
                report::programming_error(
                    "process_store",
                    format!("remove: slot {key} was owned by {other}, not {pid}"),
                );
                self.by_specifier.insert(key, other);
            }
            None => {
                report::programming_error(
                    "process_store",
                    format!("remove: expected slot entry {key} was already missing"),
                );
            }
        }

        let before = self.execution.len();
        self.execution.retain(|entry| entry != pid);
        if self.execution.len() == before {
            report::programming_error(
                "process_store",
                format!("remove: id {pid} had no execution list node"),
            );
        }

        self.priorities.remove(pid);
        self.sequence.remove(pid);
        self.suspended.remove(pid);
        self.graph.remove(pid);
        self.recompute_order();
        Ok((process, cascade))
    }

    /// Suspend a process and escalate through its transitive dependents
    pub fn suspend(&mut self, pid: &Pid) -> Result<HashSet<Pid, RandomState>, ProcessError> {
        if !self.by_id.contains_key(pid) {
            return Err(ProcessError::NotFound(pid.clone()));
        }
        let cascade = self.graph.transitive_dependents_of(pid);
        self.suspended.insert(pid.clone());
        for dependent in &cascade {
            self.suspended.insert(dependent.clone());
        }
        debug!("suspended {} (+{} cascaded)", pid, cascade.len());
        Ok(cascade)
    }

    /// Clear the suspension flag for a single id
    ///
    /// Cascaded dependents stay suspended: whether they are safe to resume is
    /// a policy decision above the kernel.
    pub fn resume(&mut self, pid: &Pid) -> Result<(), ProcessError> {
        if !self.by_id.contains_key(pid) {
            return Err(ProcessError::NotFound(pid.clone()));
        }
        self.suspended.remove(pid);
        Ok(())
    }

    /// Restore a persisted suspension flag without re-escalating
    pub(crate) fn flag_suspended(&mut self, pid: &Pid) {
        if self.by_id.contains_key(pid) {
            self.suspended.insert(pid.clone());
        }
    }

    /// Directly suspended or cascaded-suspended
    pub fn is_suspended(&self, pid: &Pid) -> bool {
        self.suspended.contains(pid)
    }

    /// Specifiers that do not currently resolve to a live process
    pub fn check_dependencies(&self, specifiers: &[Specifier]) -> Vec<Specifier> {
        specifiers
            .iter()
            .filter(|spec| !self.by_specifier.contains_key(&spec.key()))
            .cloned()
            .collect()
    }

    pub fn contains(&self, pid: &Pid) -> bool {
        self.by_id.contains_key(pid)
    }

    pub fn get(&self, pid: &Pid) -> Option<&dyn Process> {
        self.by_id.get(pid).map(|process| process.as_ref())
    }

    pub fn get_mut(&mut self, pid: &Pid) -> Option<&mut (dyn Process + 'static)> {
        self.by_id.get_mut(pid).map(|process| process.as_mut())
    }

    pub fn get_by_specifier(&self, tag: &TypeTag, identifier: &str) -> Option<&dyn Process> {
        let key = Specifier::new(tag.clone(), identifier).key();
        self.by_specifier.get(&key).and_then(|pid| self.get(pid))
    }

    /// Current execution order (includes suspended ids)
    pub fn execution_order(&self) -> &[Pid] {
        &self.execution
    }

    /// Runnable processes in execution order
    pub fn list(&self) -> Vec<&dyn Process> {
        self.execution
            .iter()
            .filter(|pid| !self.suspended.contains(*pid))
            .filter_map(|pid| self.get(pid))
            .collect()
    }

    /// Every live process in execution order, suspended included
    pub fn list_all(&self) -> Vec<&dyn Process> {
        self.execution.iter().filter_map(|pid| self.get(pid)).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// One-hop dependents of a process's slot
    pub fn dependents_of(&self, pid: &Pid) -> HashSet<Pid, RandomState> {
        self.graph.dependents_of(pid)
    }

    /// Transitive closure of dependents, the cascade set
    pub fn transitive_dependents_of(&self, pid: &Pid) -> HashSet<Pid, RandomState> {
        self.graph.transitive_dependents_of(pid)
    }

    /// Specifiers a live process declared
    pub fn dependencies_of(&self, pid: &Pid) -> Vec<Specifier> {
        self.get(pid)
            .map(|process| process.dependencies())
            .unwrap_or_default()
    }

    /// Suspension flags to persist, in stable id order
    pub fn suspended_ids(&self) -> Vec<Pid> {
        let mut ids: Vec<Pid> = self.suspended.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Encode every live process in execution order
    ///
    /// A failing `encode` drops that record and is reported; encode is a pure
    /// read, so the in-memory store stays consistent either way.
    pub fn encode_all(&self) -> (Vec<ProcessRecord>, u64) {
        let mut records = Vec::with_capacity(self.execution.len());
        let mut dropped = 0;
        for pid in &self.execution {
            let Some(process) = self.get(pid) else {
                report::programming_error(
                    "process_store",
                    format!("encode: execution list id {pid} has no process"),
                );
                dropped += 1;
                continue;
            };
            match process.encode() {
                Ok(payload) => records.push(ProcessRecord {
                    type_tag: process.type_tag(),
                    id: pid.clone(),
                    payload,
                }),
                Err(e) => {
                    report::programming_error(
                        "process_store",
                        format!("encode failed for {} ({}): {e}", pid, process.specifier()),
                    );
                    dropped += 1;
                }
            }
        }
        (records, dropped)
    }

    /// Stable topological execution order
    ///
    /// Dependencies run before their dependents; ties break on the static
    /// per-type priority (higher first), then insertion sequence. A detected
    /// cycle falls back to priority order for the remainder.
    fn recompute_order(&mut self) {
        let mut indegree: HashMap<Pid, usize, RandomState> = HashMap::default();
        let mut edges: HashMap<Pid, Vec<Pid>, RandomState> = HashMap::default();

        for pid in self.by_id.keys() {
            indegree.entry(pid.clone()).or_insert(0);
        }
        for pid in self.by_id.keys() {
            for key in self.graph.declared_of(pid) {
                if let Some(dep_pid) = self.graph.live_pid_for_key(key) {
                    if dep_pid != pid {
                        edges.entry(dep_pid.clone()).or_default().push(pid.clone());
                        *indegree.entry(pid.clone()).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut ready: BinaryHeap<ReadyEntry> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(pid, _)| self.ready_entry(pid))
            .collect();

        let mut order = Vec::with_capacity(self.by_id.len());
        while let Some(entry) = ready.pop() {
            order.push(entry.pid.clone());
            if let Some(dependents) = edges.get(&entry.pid) {
                for dependent in dependents {
                    if let Some(degree) = indegree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(self.ready_entry(dependent));
                        }
                    }
                }
            }
        }

        if order.len() < self.by_id.len() {
            report::programming_error(
                "process_store",
                "dependency cycle detected, remainder falls back to priority order",
            );
            let placed: HashSet<&Pid, RandomState> = order.iter().collect();
            let mut remainder: Vec<Pid> = self
                .by_id
                .keys()
                .filter(|pid| !placed.contains(*pid))
                .cloned()
                .collect();
            remainder.sort_by(|a, b| {
                let pa = self.priorities.get(a).copied().unwrap_or(DEFAULT_PRIORITY);
                let pb = self.priorities.get(b).copied().unwrap_or(DEFAULT_PRIORITY);
                pb.cmp(&pa).then_with(|| {
                    let sa = self.sequence.get(a).copied().unwrap_or(u64::MAX);
                    let sb = self.sequence.get(b).copied().unwrap_or(u64::MAX);
                    sa.cmp(&sb)
                })
            });
            order.extend(remainder);
        }

        self.execution = order;
    }

    fn ready_entry(&self, pid: &Pid) -> ReadyEntry {
        ReadyEntry {
            priority: self.priorities.get(pid).copied().unwrap_or(DEFAULT_PRIORITY),
            sequence: self.sequence.get(pid).copied().unwrap_or(u64::MAX),
            pid: pid.clone(),
        }
    }
}

impl Default for ProcessStore {
    fn default() -> Self {
        Self::new()
    }
}
