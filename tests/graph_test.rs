/*!
 * Dependency Graph Tests
 * Adjacency maintenance, transitive closure, and cycle defense
 */

mod common;

use common::{pid, spec};
use cycle_os_kernel::DependencyGraph;
use pretty_assertions::assert_eq;

#[test]
fn test_add_records_live_slot_and_dependents() {
    let mut graph = DependencyGraph::new();
    graph.add(&pid(1), &spec("rd", "main"), &[]);
    graph.add(&pid(2), &spec("ch", "c1"), &[spec("rd", "main")]);

    assert_eq!(graph.live_pid(&spec("rd", "main")), Some(&pid(1)));
    assert_eq!(graph.live_pid(&spec("ch", "c1")), Some(&pid(2)));
    assert_eq!(graph.len(), 2);

    let dependents = graph.dependents_of(&pid(1));
    assert!(dependents.contains(&pid(2)));
    assert_eq!(dependents.len(), 1);
}

#[test]
fn test_transitive_closure_collects_indirect_dependents() {
    let mut graph = DependencyGraph::new();
    graph.add(&pid(1), &spec("rd", "main"), &[]);
    graph.add(&pid(2), &spec("ch", "c1"), &[spec("rd", "main")]);
    graph.add(&pid(3), &spec("gc", "g1"), &[spec("ch", "c1")]);
    graph.add(&pid(4), &spec("gc", "g2"), &[spec("ch", "c1")]);

    let closure = graph.transitive_dependents_of(&pid(1));
    assert!(closure.contains(&pid(2)));
    assert!(closure.contains(&pid(3)));
    assert!(closure.contains(&pid(4)));
    assert_eq!(closure.len(), 3);

    // One hop only
    let direct = graph.dependents_of(&pid(1));
    assert_eq!(direct.len(), 1);
}

#[test]
fn test_transitive_closure_survives_cycles() {
    let mut graph = DependencyGraph::new();
    graph.add(&pid(1), &spec("aa", "a"), &[spec("bb", "b")]);
    graph.add(&pid(2), &spec("bb", "b"), &[spec("aa", "a")]);

    let closure = graph.transitive_dependents_of(&pid(1));
    assert!(closure.contains(&pid(2)));
}

#[test]
fn test_remove_strips_edges_and_slot() {
    let mut graph = DependencyGraph::new();
    graph.add(&pid(1), &spec("rd", "main"), &[]);
    graph.add(&pid(2), &spec("ch", "c1"), &[spec("rd", "main")]);

    graph.remove(&pid(2));
    assert!(graph.dependents_of(&pid(1)).is_empty());
    assert_eq!(graph.live_pid(&spec("ch", "c1")), None);
    assert_eq!(graph.len(), 1);

    graph.remove(&pid(1));
    assert!(graph.is_empty());
}

#[test]
fn test_slot_resolves_across_id_churn() {
    let mut graph = DependencyGraph::new();
    graph.add(&pid(1), &spec("rd", "main"), &[]);
    graph.add(&pid(2), &spec("ch", "c1"), &[spec("rd", "main")]);

    // The occupant dies and a replacement claims the same logical slot
    graph.remove(&pid(1));
    graph.add(&pid(9), &spec("rd", "main"), &[]);

    assert_eq!(graph.live_pid(&spec("rd", "main")), Some(&pid(9)));
    let dependents = graph.dependents_of(&pid(9));
    assert!(dependents.contains(&pid(2)));
}
