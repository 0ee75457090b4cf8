//! Pending queue, postponed actions and the suspension counter.
//!
//! Pure bookkeeping, no I/O. The engine holds this behind one mutex and
//! forwards whatever `release` hands back while still holding it, so the
//! forwarding order is the queue order.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::action::{ActionId, ActionLike, Envelope};

struct Pending<A> {
    envelope: Envelope<A>,
    /// Own observers finished (or there were none).
    settled: bool,
}

struct Postponed<A> {
    envelope: Envelope<A>,
    admit: oneshot::Sender<()>,
}

/// Result of a release step.
pub(crate) struct Release<A> {
    pub forwarded: Vec<Envelope<A>>,
    pub admitted: Option<ActionId>,
}

pub(crate) struct PendingQueue<A> {
    entries: VecDeque<Pending<A>>,
    postponed: VecDeque<Postponed<A>>,
    suspended: usize,
}

impl<A: ActionLike> PendingQueue<A> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            postponed: VecDeque::new(),
            suspended: 0,
        }
    }

    /// Top-level actions wait while another cycle is still draining.
    pub fn must_postpone(&self, envelope: &Envelope<A>) -> bool {
        envelope.is_top_level() && !(self.entries.is_empty() && self.postponed.is_empty())
    }

    /// Park a top-level action. The receiver fires once it has been admitted
    /// into the queue.
    pub fn postpone(&mut self, envelope: Envelope<A>) -> oneshot::Receiver<()> {
        let (admit, admitted) = oneshot::channel();
        self.postponed.push_back(Postponed { envelope, admit });
        admitted
    }

    /// Reentrant actions go right before their trigger, or to the front when
    /// the trigger is no longer queued. Top-level actions go to the back.
    pub fn enqueue(&mut self, envelope: Envelope<A>) {
        let pending = Pending {
            envelope,
            settled: false,
        };
        match pending.envelope.issued_during_handling_of {
            None => self.entries.push_back(pending),
            Some(trigger) => match self.position(trigger) {
                Some(index) => self.entries.insert(index, pending),
                None => self.entries.push_front(pending),
            },
        }
    }

    /// Mark an action ready to forward. False if it is not queued.
    pub fn settle(&mut self, id: ActionId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.entries[index].settled = true;
                true
            }
            None => false,
        }
    }

    /// Take an action out of the queue or the postponed list without
    /// forwarding it.
    pub fn withdraw(&mut self, id: ActionId) -> bool {
        if let Some(index) = self.position(id) {
            self.entries.remove(index);
            return true;
        }
        if let Some(index) = self.postponed.iter().position(|p| p.envelope.id == id) {
            self.postponed.remove(index);
            return true;
        }
        false
    }

    pub fn suspend(&mut self, count: usize) {
        self.suspended += count;
    }

    pub fn resume(&mut self, count: usize) {
        self.suspended = self.suspended.saturating_sub(count);
    }

    /// While nothing is suspended, hand back the settled prefix of the queue.
    /// Once the queue is empty, admit the oldest postponed action.
    pub fn release(&mut self) -> Release<A> {
        let mut release = Release {
            forwarded: Vec::new(),
            admitted: None,
        };
        if self.suspended > 0 {
            return release;
        }

        while self.entries.front().is_some_and(|p| p.settled) {
            if let Some(pending) = self.entries.pop_front() {
                release.forwarded.push(pending.envelope);
            }
        }

        if self.entries.is_empty() {
            release.admitted = self.admit_next();
        }
        release
    }

    fn admit_next(&mut self) -> Option<ActionId> {
        while let Some(postponed) = self.postponed.pop_front() {
            let id = postponed.envelope.id;
            self.enqueue(postponed.envelope);
            if postponed.admit.send(()).is_ok() {
                return Some(id);
            }
            // Waiter went away before admission.
            self.withdraw(id);
        }
        None
    }

    fn position(&self, id: ActionId) -> Option<usize> {
        self.entries.iter().position(|p| p.envelope.id == id)
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.postponed.is_empty() && self.suspended == 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn postponed_len(&self) -> usize {
        self.postponed.len()
    }

    pub fn suspended(&self) -> usize {
        self.suspended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;

    fn top(id: u64, t: &str) -> Envelope<Action> {
        Envelope::top_level(ActionId(id), Action::new(t))
    }

    fn nested(id: u64, t: &str, trigger: u64) -> Envelope<Action> {
        Envelope::reentrant(ActionId(id), Action::new(t), ActionId(trigger), false)
    }

    fn types(forwarded: &[Envelope<Action>]) -> Vec<&str> {
        forwarded.iter().map(|e| e.action_type()).collect()
    }

    #[test]
    fn nested_action_splices_before_its_trigger() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "A1"));
        queue.enqueue(nested(2, "A2", 1));
        queue.enqueue(nested(3, "A3", 2));
        queue.enqueue(nested(4, "A4", 3));
        for id in [4, 3, 2, 1] {
            queue.settle(ActionId(id));
        }

        let release = queue.release();
        assert_eq!(types(&release.forwarded), vec!["A4", "A3", "A2", "A1"]);
        assert!(queue.is_idle());
    }

    #[test]
    fn siblings_keep_dispatch_order() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "A"));
        queue.enqueue(nested(2, "B", 1));
        queue.enqueue(nested(3, "C", 1));
        for id in [2, 3, 1] {
            queue.settle(ActionId(id));
        }
        assert_eq!(types(&queue.release().forwarded), vec!["B", "C", "A"]);
    }

    #[test]
    fn orphaned_nested_action_goes_to_the_front() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "X"));
        queue.enqueue(nested(2, "LATE", 99));
        queue.settle(ActionId(2));

        let release = queue.release();
        assert_eq!(types(&release.forwarded), vec!["LATE"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn unsettled_front_blocks_everything_behind_it() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "A"));
        queue.enqueue(nested(2, "B", 1));
        queue.settle(ActionId(1));

        assert!(queue.release().forwarded.is_empty());
        queue.settle(ActionId(2));
        assert_eq!(types(&queue.release().forwarded), vec!["B", "A"]);
    }

    #[test]
    fn suspension_holds_back_settled_actions() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "A"));
        queue.settle(ActionId(1));
        queue.suspend(2);

        assert!(queue.release().forwarded.is_empty());
        queue.resume(1);
        assert!(queue.release().forwarded.is_empty());
        queue.resume(1);
        assert_eq!(types(&queue.release().forwarded), vec!["A"]);
    }

    #[test]
    fn top_level_actions_are_postponed_while_queue_is_busy() {
        let mut queue = PendingQueue::new();
        let first = top(1, "A");
        assert!(!queue.must_postpone(&first));
        queue.enqueue(first);

        let second = top(2, "B");
        assert!(queue.must_postpone(&second));
        assert!(!queue.must_postpone(&nested(3, "C", 1)));

        let mut admitted = queue.postpone(second);
        assert!(admitted.try_recv().is_err());

        queue.settle(ActionId(1));
        let release = queue.release();
        assert_eq!(types(&release.forwarded), vec!["A"]);
        assert_eq!(release.admitted, Some(ActionId(2)));
        assert!(admitted.try_recv().is_ok());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.postponed_len(), 0);
    }

    #[test]
    fn postponed_actions_are_admitted_one_at_a_time_in_order() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "A"));
        let _b = queue.postpone(top(2, "B"));
        let _c = queue.postpone(top(3, "C"));

        queue.settle(ActionId(1));
        assert_eq!(queue.release().admitted, Some(ActionId(2)));
        assert_eq!(queue.postponed_len(), 1);

        queue.settle(ActionId(2));
        let release = queue.release();
        assert_eq!(types(&release.forwarded), vec!["B"]);
        assert_eq!(release.admitted, Some(ActionId(3)));
    }

    #[test]
    fn abandoned_postponed_actions_are_skipped() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "A"));
        drop(queue.postpone(top(2, "GONE")));
        let _c = queue.postpone(top(3, "C"));

        queue.settle(ActionId(1));
        assert_eq!(queue.release().admitted, Some(ActionId(3)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn withdraw_covers_queue_and_postponed_list() {
        let mut queue = PendingQueue::new();
        queue.enqueue(top(1, "A"));
        let _b = queue.postpone(top(2, "B"));

        assert!(queue.withdraw(ActionId(2)));
        assert!(queue.withdraw(ActionId(1)));
        assert!(!queue.withdraw(ActionId(1)));
        assert!(queue.is_idle());
    }
}
