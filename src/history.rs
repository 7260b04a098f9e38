use log::debug;

use crate::snapshot::Snapshot;

/// One undo-history entry: a graph-wide snapshot, optionally marked
/// transitory while an interaction is still in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct EditStep {
    pub snapshot: Snapshot,
    pub transitory: bool,
}

/// Observer of history navigation.
///
/// Notifications are queued and delivered by [`EditHistory::flush_notifications`],
/// which the host calls once per UI tick. The ordering contract: the
/// observer sees the `current` produced by each operation before any
/// subsequent operation's notification.
pub trait HistoryObserver {
    fn current_changed(&mut self, current: &Snapshot);
}

/// Two-stack undo/redo manager over structural snapshots.
///
/// At most one transitory step ever exists in the undo stack: registering
/// any new step first discards the existing transitory one. The redo stack
/// is cleared whenever a new step is registered.
pub struct EditHistory {
    baseline: Snapshot,
    undo_stack: Vec<EditStep>,
    redo_stack: Vec<EditStep>,
    observer: Option<Box<dyn HistoryObserver>>,
    pending: Vec<Snapshot>,
}

impl EditHistory {
    /// Creates a history whose empty state renders as `baseline`.
    pub fn new(baseline: Snapshot) -> Self {
        Self {
            baseline,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            observer: None,
            pending: Vec::new(),
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn HistoryObserver>) {
        self.observer = Some(observer);
    }

    /// The state to render: top of the undo stack, or the baseline if the
    /// undo stack is empty.
    pub fn current(&self) -> &Snapshot {
        self.undo_stack
            .last()
            .map(|step| &step.snapshot)
            .unwrap_or(&self.baseline)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pushes a new step. Any existing transitory entry is dropped first,
    /// and the redo stack is cleared.
    pub fn register(&mut self, snapshot: Snapshot, transitory: bool) {
        self.drop_transitory();
        debug!(
            "history: register step (transitory={transitory}), depth {}",
            self.undo_stack.len() + 1
        );
        self.undo_stack.push(EditStep {
            snapshot,
            transitory,
        });
        self.redo_stack.clear();
        self.queue_notification();
    }

    /// Drops any transitory entry without pushing anything new, used when
    /// an in-progress edit is canceled.
    pub fn remove_transitory_steps(&mut self) {
        if self.drop_transitory() {
            self.queue_notification();
        }
    }

    /// Moves the top of the undo stack onto the redo stack. No-op when the
    /// undo stack is empty.
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(step) => {
                debug!("history: undo, depth {}", self.undo_stack.len());
                self.redo_stack.push(step);
                self.queue_notification();
                true
            }
            None => false,
        }
    }

    /// Moves the top of the redo stack back onto the undo stack. No-op when
    /// the redo stack is empty.
    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(step) => {
                debug!("history: redo, depth {}", self.undo_stack.len() + 1);
                self.undo_stack.push(step);
                self.queue_notification();
                true
            }
            None => false,
        }
    }

    /// Clears both stacks, keeping the baseline.
    pub fn clear(&mut self) {
        if self.undo_stack.is_empty() && self.redo_stack.is_empty() {
            return;
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.queue_notification();
    }

    /// Delivers queued observer notifications in the order the operations
    /// happened. The host calls this once per UI frame.
    pub fn flush_notifications(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if let Some(observer) = self.observer.as_mut() {
            for snapshot in &pending {
                observer.current_changed(snapshot);
            }
        }
    }

    /// Number of entries in the undo stack (transitory included).
    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }

    fn drop_transitory(&mut self) -> bool {
        let before = self.undo_stack.len();
        self.undo_stack.retain(|step| !step.transitory);
        before != self.undo_stack.len()
    }

    fn queue_notification(&mut self) {
        self.pending.push(self.current().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(label: &str) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.set("label", label);
        snapshot
    }

    #[test]
    fn current_falls_back_to_baseline() {
        let history = EditHistory::new(step("base"));
        assert_eq!(history.current(), &step("base"));
    }

    #[test]
    fn undo_redo_are_inverse() {
        let mut history = EditHistory::new(step("base"));
        history.register(step("s1"), false);
        history.register(step("s2"), false);

        assert!(history.undo());
        assert_eq!(history.current(), &step("s1"));
        assert!(history.redo());
        assert_eq!(history.current(), &step("s2"));
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut history = EditHistory::new(step("base"));
        assert!(!history.undo());
        assert!(!history.redo());
        assert_eq!(history.current(), &step("base"));
    }

    #[test]
    fn transitory_steps_coalesce() {
        let mut history = EditHistory::new(step("base"));
        history.register(step("t1"), true);
        history.register(step("t2"), true);
        assert_eq!(history.depth(), 1);
        assert_eq!(history.current(), &step("t2"));

        history.register(step("s1"), false);
        assert_eq!(history.depth(), 1);
        assert_eq!(history.current(), &step("s1"));
    }

    #[test]
    fn register_clears_redo() {
        let mut history = EditHistory::new(step("base"));
        history.register(step("s1"), false);
        history.undo();
        assert!(history.can_redo());

        history.register(step("s2"), false);
        assert!(!history.can_redo());
    }

    #[test]
    fn cancel_removes_only_transitory() {
        let mut history = EditHistory::new(step("base"));
        history.register(step("s1"), false);
        history.register(step("t1"), true);

        history.remove_transitory_steps();
        assert_eq!(history.depth(), 1);
        assert_eq!(history.current(), &step("s1"));
    }
}
