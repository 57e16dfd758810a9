//! Validation of log entries against one view of the protocol.
//!
//! A [`ValidationPass`] walks entries in order-count order and keeps a
//! location cursor in the view's [`FlowMap`]. Each entry is either accepted
//! (the cursor moves to its target), skipped because the view does not
//! subscribe to its event, or discarded. Discards come in two kinds:
//!
//! - [`DiscardKind::Plain`]: the entry does not fit the accepted history
//! - [`DiscardKind::Competition`]: the entry lost a branch competition, and
//!   every entry based on it loses too
//!
//! Running a fresh pass over the same entries always yields the same view,
//! which is what makes merging confluent.

use std::collections::BTreeMap;
use std::sync::Arc;
use swarmlog_theory::{FlowMap, SharedTables};
use swarmlog_types::{EventId, LogEntry, ModelSettings, OrderCount};

/// Why an entry was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardKind {
    Plain,
    Competition,
}

/// Outcome of validating one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accepted,
    /// The view does not track this event
    Unsubscribed,
    Discarded(DiscardKind),
}

/// Tables and switches a pass validates against.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    shared: Arc<SharedTables>,
    flow: FlowMap,
    branch_tracking: bool,
    standard_setting: bool,
}

impl ValidationRules {
    /// Rules for a role's projected view.
    #[must_use]
    pub fn new(shared: Arc<SharedTables>, flow: FlowMap, settings: &ModelSettings) -> Self {
        Self {
            shared,
            flow,
            branch_tracking: settings.branch_tracking,
            standard_setting: settings.standard_setting,
        }
    }

    /// Rules of the true global log, over the whole protocol.
    #[must_use]
    pub fn global(shared: Arc<SharedTables>, settings: &ModelSettings) -> Self {
        let flow = shared.global_flow.clone();
        Self::new(shared, flow, settings)
    }

    #[must_use]
    pub fn flow(&self) -> &FlowMap {
        &self.flow
    }

    #[must_use]
    pub fn shared(&self) -> &SharedTables {
        &self.shared
    }

    fn checks_ties(&self) -> bool {
        self.branch_tracking && !self.standard_setting
    }

    fn resolves_branches(&self) -> bool {
        !self.standard_setting
    }

    /// Latest entry of `history` the event is tied to, other than `exclude`.
    #[must_use]
    pub fn find_tied_to(
        &self,
        history: &[LogEntry],
        event: EventId,
        exclude: OrderCount,
    ) -> Option<OrderCount> {
        history
            .iter()
            .rev()
            .find(|entry| entry.order != exclude && self.shared.tied_to.contains(event, entry.event))
            .map(|entry| entry.order)
    }
}

/// State of one walk over a sequence of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPass {
    accepted: Vec<LogEntry>,
    discarded: BTreeMap<OrderCount, DiscardKind>,
    seen: BTreeMap<OrderCount, EventId>,
    cursor: usize,
}

impl ValidationPass {
    /// An empty pass with the cursor at the view's initial location.
    #[must_use]
    pub fn new(rules: &ValidationRules) -> Self {
        Self {
            accepted: Vec::new(),
            discarded: BTreeMap::new(),
            seen: BTreeMap::new(),
            cursor: rules.flow.initial(),
        }
    }

    /// Accepted entries in order
    #[must_use]
    pub fn accepted(&self) -> &[LogEntry] {
        &self.accepted
    }

    #[must_use]
    pub fn discarded(&self) -> &BTreeMap<OrderCount, DiscardKind> {
        &self.discarded
    }

    /// Location id reached by the accepted entries
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_accepted(&self, order: OrderCount) -> bool {
        self.seen.contains_key(&order) && !self.discarded.contains_key(&order)
    }

    /// Validate `entry` and record the verdict.
    ///
    /// A `sticky` entry was discarded earlier and may not come back.
    pub fn admit(&mut self, rules: &ValidationRules, entry: &LogEntry, sticky: bool) -> Verdict {
        let verdict = self.judge(rules, entry, sticky);
        match verdict {
            Verdict::Accepted => {
                if let Some(target) = rules.flow.target(entry.event) {
                    self.cursor = target;
                }
                self.accepted.push(*entry);
                self.seen.insert(entry.order, entry.event);
            }
            Verdict::Discarded(kind) => {
                self.discarded.insert(entry.order, kind);
                self.seen.insert(entry.order, entry.event);
            }
            Verdict::Unsubscribed => {}
        }
        tracing::trace!(entry = %entry, ?verdict, cursor = self.cursor, "validated entry");
        verdict
    }

    fn judge(&self, rules: &ValidationRules, entry: &LogEntry, sticky: bool) -> Verdict {
        let Some((source, target)) = rules.flow.flow(entry.event) else {
            return Verdict::Unsubscribed;
        };
        if sticky {
            return Verdict::Discarded(DiscardKind::Plain);
        }

        // Competition losses are contagious along based-on links.
        if let Some(predecessor) = entry.based_on.order() {
            if self.discarded.get(&predecessor) == Some(&DiscardKind::Competition) {
                return Verdict::Discarded(DiscardKind::Competition);
            }
        }

        if rules.checks_ties() {
            if let Some(tied) = entry.tied_to.filter(|tied| self.seen.contains_key(tied)) {
                let expected = rules.find_tied_to(&self.accepted, entry.event, entry.order);
                if self.discarded.contains_key(&tied) || expected != Some(tied) {
                    return Verdict::Discarded(DiscardKind::Competition);
                }
            }
        }

        let branches = &rules.shared.branches;
        if source != self.cursor {
            if rules.resolves_branches() && branches.is_branching(entry.event) {
                return Verdict::Discarded(self.resolve_branch(rules, entry));
            }
            return Verdict::Discarded(DiscardKind::Plain);
        }

        // A second occurrence on a loop-free stretch repeats history.
        if !branches.is_branching(entry.event) && source != target {
            let repeated = self.accepted.iter().any(|earlier| {
                earlier.event == entry.event
                    && (earlier.tied_to == entry.tied_to || earlier.based_on == entry.based_on)
            });
            if repeated {
                return Verdict::Discarded(DiscardKind::Plain);
            }
        }

        Verdict::Accepted
    }

    fn resolve_branch(&self, rules: &ValidationRules, entry: &LogEntry) -> DiscardKind {
        let branches = &rules.shared.branches;

        if let Some(tied) = entry.tied_to {
            if self.discarded.get(&tied) == Some(&DiscardKind::Plain) {
                let left_branch = self
                    .seen
                    .get(&tied)
                    .is_some_and(|&tied_event| !branches.same_partition(entry.event, tied_event));
                if left_branch {
                    return DiscardKind::Plain;
                }
            }
        }

        self.accepted
            .iter()
            .rev()
            .find(|accepted| branches.same_partition(entry.event, accepted.event))
            .map_or(DiscardKind::Plain, |rival| {
                if rival.event == entry.event {
                    DiscardKind::Plain
                } else {
                    DiscardKind::Competition
                }
            })
    }
}
