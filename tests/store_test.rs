/*!
 * Process Store Tests
 * Lookup invariants, cascade computation, suspension, and execution order
 */

mod common;

use common::{pid, spec, TestProc};
use cycle_os_kernel::{ProcessError, ProcessStore, TypeTag};
use pretty_assertions::assert_eq;

fn add(store: &mut ProcessStore, index: u64, tag: &str, ident: &str, deps: Vec<&str>) {
    let deps = deps
        .into_iter()
        .map(|raw| {
            let (tag, ident) = raw.split_once(':').expect("dep format tag:ident");
            spec(tag, ident)
        })
        .collect();
    let priority = 5;
    store.add(Box::new(TestProc::new(pid(index), tag, ident, deps)), priority);
}

#[test]
fn test_add_then_lookup_by_id_and_specifier() {
    let mut store = ProcessStore::new();
    add(&mut store, 1, "rd", "main", vec![]);

    let by_id = store.get(&pid(1)).expect("process by id");
    assert_eq!(by_id.identifier(), "main");

    let by_spec = store
        .get_by_specifier(&TypeTag::new("rd"), "main")
        .expect("process by specifier");
    assert_eq!(by_spec.id(), &pid(1));

    assert_eq!(store.len(), 1);
    assert_eq!(store.execution_order(), &[pid(1)]);
}

#[test]
fn test_remove_returns_transitive_cascade() {
    let mut store = ProcessStore::new();
    add(&mut store, 1, "rd", "main", vec![]);
    add(&mut store, 2, "ch", "c1", vec!["rd:main"]);
    add(&mut store, 3, "gc", "g1", vec!["ch:c1"]);

    let (removed, cascade) = store.remove(&pid(1)).expect("remove succeeds");
    assert_eq!(removed.identifier(), "main");
    assert!(cascade.contains(&pid(2)));
    assert!(cascade.contains(&pid(3)));
    assert_eq!(cascade.len(), 2);

    assert!(!store.contains(&pid(1)));
    assert!(store.contains(&pid(2)));
    assert!(store.contains(&pid(3)));
}

#[test]
fn test_remove_unknown_id_errs() {
    let mut store = ProcessStore::new();
    let result = store.remove(&pid(99));
    assert_eq!(
        result.err().map(|e| matches!(e, ProcessError::NotFound(_))),
        Some(true)
    );
}

#[test]
fn test_suspend_cascades_resume_is_single() {
    let mut store = ProcessStore::new();
    add(&mut store, 1, "rd", "main", vec![]);
    add(&mut store, 2, "ch", "c1", vec!["rd:main"]);
    add(&mut store, 3, "gc", "g1", vec!["ch:c1"]);

    let cascade = store.suspend(&pid(1)).expect("suspend succeeds");
    assert_eq!(cascade.len(), 2);
    assert!(store.is_suspended(&pid(1)));
    assert!(store.is_suspended(&pid(2)));
    assert!(store.is_suspended(&pid(3)));

    store.resume(&pid(1)).expect("resume succeeds");
    assert!(!store.is_suspended(&pid(1)));
    // Cascaded dependents are not automatically resumed
    assert!(store.is_suspended(&pid(2)));
    assert!(store.is_suspended(&pid(3)));
}

#[test]
fn test_check_dependencies_reports_missing() {
    let mut store = ProcessStore::new();
    add(&mut store, 1, "rd", "main", vec![]);

    let missing = store.check_dependencies(&[spec("rd", "main"), spec("tx", "hub")]);
    assert_eq!(missing, vec![spec("tx", "hub")]);

    assert!(store.check_dependencies(&[spec("rd", "main")]).is_empty());
}

#[test]
fn test_execution_order_puts_dependencies_first() {
    let mut store = ProcessStore::new();
    // The dependent carries the higher static priority; the topological
    // refinement must still run its dependency first.
    store.add(Box::new(TestProc::new(pid(1), "ch", "c1", vec![spec("rd", "main")])), 90);
    store.add(Box::new(TestProc::new(pid(2), "rd", "main", vec![])), 10);

    assert_eq!(store.execution_order(), &[pid(2), pid(1)]);
}

#[test]
fn test_execution_order_priority_tiebreak() {
    let mut store = ProcessStore::new();
    store.add(Box::new(TestProc::new(pid(1), "lo", "a", vec![])), 1);
    store.add(Box::new(TestProc::new(pid(2), "hi", "b", vec![])), 50);
    store.add(Box::new(TestProc::new(pid(3), "lo", "c", vec![])), 1);

    // Higher priority first, insertion order within equal priority
    assert_eq!(store.execution_order(), &[pid(2), pid(1), pid(3)]);
}

#[test]
fn test_list_skips_suspended_list_all_keeps_them() {
    let mut store = ProcessStore::new();
    add(&mut store, 1, "rd", "main", vec![]);
    add(&mut store, 2, "ch", "c1", vec!["rd:main"]);

    store.suspend(&pid(2)).expect("suspend succeeds");

    let runnable: Vec<&str> = store.list().iter().map(|p| p.identifier()).collect();
    assert_eq!(runnable, vec!["main"]);

    let all: Vec<&str> = store.list_all().iter().map(|p| p.identifier()).collect();
    assert_eq!(all, vec!["main", "c1"]);
}

#[test]
fn test_encode_all_preserves_execution_order() {
    let mut store = ProcessStore::new();
    add(&mut store, 1, "ch", "c1", vec!["rd:main"]);
    add(&mut store, 2, "rd", "main", vec![]);

    let (records, dropped) = store.encode_all();
    assert_eq!(dropped, 0);
    let tags: Vec<&str> = records.iter().map(|r| r.type_tag.as_str()).collect();
    assert_eq!(tags, vec!["rd", "ch"]);
    assert_eq!(records[0].id, pid(2));
}

#[test]
fn test_dependents_queries() {
    let mut store = ProcessStore::new();
    add(&mut store, 1, "rd", "main", vec![]);
    add(&mut store, 2, "ch", "c1", vec!["rd:main"]);
    add(&mut store, 3, "gc", "g1", vec!["ch:c1"]);

    let direct = store.dependents_of(&pid(1));
    assert!(direct.contains(&pid(2)));
    assert!(!direct.contains(&pid(3)));

    let transitive = store.transitive_dependents_of(&pid(1));
    assert!(transitive.contains(&pid(2)));
    assert!(transitive.contains(&pid(3)));

    assert_eq!(store.dependencies_of(&pid(2)), vec![spec("rd", "main")]);
}
