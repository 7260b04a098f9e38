use std::cell::RefCell;
use std::rc::Rc;

use photoflow::history::{EditHistory, HistoryObserver};
use photoflow::snapshot::Snapshot;

fn step(label: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.set("label", label);
    snapshot
}

fn label(snapshot: &Snapshot) -> String {
    snapshot.text("label").unwrap_or("base").to_string()
}

struct Recorder(Rc<RefCell<Vec<String>>>);

impl HistoryObserver for Recorder {
    fn current_changed(&mut self, current: &Snapshot) {
        self.0.borrow_mut().push(label(current));
    }
}

#[test]
fn undo_returns_to_state_before_last_step() {
    let mut history = EditHistory::new(step("base"));
    history.register(step("s1"), false);
    history.register(step("s2"), false);

    assert!(history.undo());
    assert_eq!(label(history.current()), "s1");

    assert!(history.undo());
    assert_eq!(label(history.current()), "base");
}

#[test]
fn redo_restores_state_before_undo() {
    let mut history = EditHistory::new(step("base"));
    history.register(step("s1"), false);
    history.undo();
    assert!(history.redo());
    assert_eq!(label(history.current()), "s1");
}

#[test]
fn two_transitory_steps_leave_one_entry() {
    let mut history = EditHistory::new(step("base"));
    history.register(step("t1"), true);
    history.register(step("t2"), true);
    assert_eq!(history.depth(), 1);
    assert_eq!(label(history.current()), "t2");
}

#[test]
fn permanent_step_replaces_transitory() {
    let mut history = EditHistory::new(step("base"));
    history.register(step("t1"), true);
    history.register(step("s1"), false);
    assert_eq!(history.depth(), 1);
    assert_eq!(label(history.current()), "s1");

    // The surviving entry is permanent: undoing it lands on the baseline.
    history.undo();
    assert_eq!(label(history.current()), "base");
}

#[test]
fn transitory_runs_collapse_in_longer_sequences() {
    // S1, T1, T2, S2, then undo: current is S1.
    let mut history = EditHistory::new(step("base"));
    history.register(step("s1"), false);
    history.register(step("t1"), true);
    history.register(step("t2"), true);
    history.register(step("s2"), false);

    assert!(history.undo());
    assert_eq!(label(history.current()), "s1");
}

#[test]
fn canceling_drops_only_the_transitory_entry() {
    let mut history = EditHistory::new(step("base"));
    history.register(step("s1"), false);
    history.register(step("t1"), true);
    assert_eq!(label(history.current()), "t1");

    history.remove_transitory_steps();
    assert_eq!(history.depth(), 1);
    assert_eq!(label(history.current()), "s1");
}

#[test]
fn new_step_clears_redo() {
    let mut history = EditHistory::new(step("base"));
    history.register(step("s1"), false);
    history.register(step("s2"), false);
    history.undo();
    assert!(history.can_redo());

    history.register(step("s3"), false);
    assert!(!history.can_redo());
    assert!(!history.redo());
}

#[test]
fn notifications_flush_in_operation_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut history = EditHistory::new(step("base"));
    history.set_observer(Box::new(Recorder(seen.clone())));

    history.register(step("s1"), false);
    history.register(step("s2"), false);
    history.undo();
    assert!(seen.borrow().is_empty(), "nothing delivered before flush");

    history.flush_notifications();
    assert_eq!(*seen.borrow(), vec!["s1", "s2", "s1"]);

    // Later operations queue fresh notifications.
    history.redo();
    history.flush_notifications();
    assert_eq!(seen.borrow().last().unwrap(), "s2");
}
