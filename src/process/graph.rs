/*!
 * Dependency Graph
 * Who-depends-on-whom, keyed by logical slot, rebuilt every cycle
 */

use super::types::{SpecKey, Specifier};
use crate::core::id::Pid;
use crate::core::report;
use ahash::RandomState;
use std::collections::{HashMap, HashSet};

/// Directed dependency structure over logical (type, identifier) slots
///
/// Two adjacency maps keyed by the synthetic slot key, never by process id:
/// the relation is declared against the logical slot, which must keep
/// resolving across id churn. Derived state only; rebuilt from the flat
/// process list on every load and never persisted.
pub struct DependencyGraph {
    /// Slot key -> id of the process currently occupying the slot
    live: HashMap<SpecKey, Pid, RandomState>,
    /// Slot key -> ids of processes that declared a dependency on it
    dependents: HashMap<SpecKey, HashSet<Pid, RandomState>, RandomState>,
    /// Reverse index: id -> slot keys whose dependent sets it joined
    joined: HashMap<Pid, Vec<SpecKey>, RandomState>,
    /// Reverse index: id -> its own slot key
    own_key: HashMap<Pid, SpecKey, RandomState>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            live: HashMap::default(),
            dependents: HashMap::default(),
            joined: HashMap::default(),
            own_key: HashMap::default(),
        }
    }

    /// Record a process as live under its slot and join its dependencies
    pub fn add(&mut self, pid: &Pid, own: &Specifier, dependencies: &[Specifier]) {
        let key = own.key();
        if let Some(previous) = self.live.insert(key.clone(), pid.clone()) {
            if previous != *pid {
                report::programming_error(
                    "dependency_graph",
                    format!("slot {key} was already live under id {previous}, now {pid}"),
                );
            }
        }
        self.own_key.insert(pid.clone(), key);

        let mut joined = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let dep_key = dependency.key();
            self.dependents
                .entry(dep_key.clone())
                .or_default()
                .insert(pid.clone());
            joined.push(dep_key);
        }
        self.joined.insert(pid.clone(), joined);
    }

    /// Inverse of `add`: strip the id from every dependent set and clear its slot
    pub fn remove(&mut self, pid: &Pid) {
        match self.joined.remove(pid) {
            Some(joined) => {
                for key in joined {
                    if let Some(set) = self.dependents.get_mut(&key) {
                        set.remove(pid);
                        if set.is_empty() {
                            self.dependents.remove(&key);
                        }
                    }
                }
            }
            None => {
                report::programming_error(
                    "dependency_graph",
                    format!("remove: id {pid} had no dependency record"),
                );
            }
        }
        if let Some(key) = self.own_key.remove(pid) {
            // Only clear the slot if this id still owns it
            if self.live.get(&key) == Some(pid) {
                self.live.remove(&key);
            }
        }
    }

    /// Ids that directly depend on the given process's slot (one hop)
    pub fn dependents_of(&self, pid: &Pid) -> HashSet<Pid, RandomState> {
        match self.own_key.get(pid) {
            Some(key) => self.dependents_of_key(key),
            None => HashSet::default(),
        }
    }

    fn dependents_of_key(&self, key: &SpecKey) -> HashSet<Pid, RandomState> {
        self.dependents.get(key).cloned().unwrap_or_default()
    }

    /// Recursive closure of `dependents_of`, used to compute cascade sets
    ///
    /// The relation is a DAG in well-formed configurations, but the visited
    /// set guards against cycles rather than assuming acyclicity.
    pub fn transitive_dependents_of(&self, pid: &Pid) -> HashSet<Pid, RandomState> {
        let mut collected: HashSet<Pid, RandomState> = HashSet::default();
        let mut worklist: Vec<Pid> = self.dependents_of(pid).into_iter().collect();
        while let Some(current) = worklist.pop() {
            if current == *pid || !collected.insert(current.clone()) {
                continue;
            }
            worklist.extend(self.dependents_of(&current));
        }
        collected
    }

    /// Id currently occupying a slot, if any
    pub fn live_pid(&self, spec: &Specifier) -> Option<&Pid> {
        self.live.get(&spec.key())
    }

    pub(crate) fn live_pid_for_key(&self, key: &SpecKey) -> Option<&Pid> {
        self.live.get(key)
    }

    /// Slot keys the given id declared as dependencies
    pub(crate) fn declared_of(&self, pid: &Pid) -> &[SpecKey] {
        self.joined.get(pid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
