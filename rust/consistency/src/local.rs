//! One role instance's log.
//!
//! The log remembers every entry it has learned about, accepted or not. Its
//! view is recomputed from that knowledge in order-count order whenever the
//! knowledge grows, so two logs that know the same entries hold the same
//! view no matter in which order they learned them. Previously discarded
//! entries that now fit are re-admitted (consolidation).
//!
//! Every change of view is reported as a [`MergeOutcome`]: the entries the
//! role must retract, newest first, and the entries it must then replay.

use crate::error::LogOverflow;
use crate::global::{pad, GlobalLog};
use crate::validation::{DiscardKind, ValidationPass, ValidationRules};
use std::collections::{BTreeMap, BTreeSet};
use swarmlog_types::{BasedOn, EventId, InstanceId, Location, LogEntry, OrderCount, RawLogEntry};

/// Result of inserting an own emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    /// The entry with resolved links
    pub entry: LogEntry,
    /// Whether the own view accepted it
    pub accepted: bool,
}

/// Change of view caused by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entries to retract from the role, newest first
    pub backtrack: Vec<LogEntry>,
    /// Entries to replay on the role, oldest first
    pub advance: Vec<LogEntry>,
    /// Previously discarded entries that are accepted again
    pub consolidated: Vec<LogEntry>,
    pub newly_discarded: Vec<(LogEntry, DiscardKind)>,
    /// Entries this log had not known before
    pub learned: usize,
}

impl MergeOutcome {
    /// Check whether the merge changed the view or the discard sets
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.backtrack.is_empty()
            || !self.advance.is_empty()
            || !self.consolidated.is_empty()
            || !self.newly_discarded.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LocalLog {
    owner: InstanceId,
    rules: ValidationRules,
    known: BTreeMap<OrderCount, LogEntry>,
    pass: ValidationPass,
    sticky: BTreeSet<OrderCount>,
    standard_setting: bool,
}

impl LocalLog {
    #[must_use]
    pub fn new(owner: InstanceId, rules: ValidationRules, standard_setting: bool) -> Self {
        let pass = ValidationPass::new(&rules);
        Self {
            owner,
            rules,
            known: BTreeMap::new(),
            pass,
            sticky: BTreeSet::new(),
            standard_setting,
        }
    }

    #[must_use]
    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    #[must_use]
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Accepted entries in order
    #[must_use]
    pub fn view(&self) -> &[LogEntry] {
        self.pass.accepted()
    }

    #[must_use]
    pub fn discarded(&self) -> &BTreeMap<OrderCount, DiscardKind> {
        self.pass.discarded()
    }

    /// Every entry this log knows, in order
    pub fn known(&self) -> impl Iterator<Item = &LogEntry> {
        self.known.values()
    }

    /// Protocol location reached by the view
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        self.rules.flow().locations().get(self.pass.cursor())
    }

    /// Insert an own emission of `event`.
    ///
    /// Links the entry to the newest accepted entry and to the entry it is
    /// tied to, records it in the global log and revalidates.
    ///
    /// # Errors
    ///
    /// Returns [`LogOverflow`] when the global log is full.
    pub fn insert(&mut self, event: EventId, global: &mut GlobalLog) -> Result<Insertion, LogOverflow> {
        let order = global.reserve()?;
        let mut entry = LogEntry::pending(event, self.owner, order);
        entry.based_on = self
            .view()
            .last()
            .map_or(BasedOn::Root, |last| BasedOn::Entry(last.order));
        entry.tied_to = self.rules.find_tied_to(self.view(), event, order);

        global.record(entry);
        self.known.insert(order, entry);
        self.revalidate();

        let accepted = self.pass.is_accepted(order);
        tracing::debug!(owner = %self.owner, entry = %entry, accepted, "inserted entry");
        Ok(Insertion { entry, accepted })
    }

    /// Learn `incoming` entries and recompute the view.
    pub fn merge<'a>(&mut self, incoming: impl IntoIterator<Item = &'a LogEntry>) -> MergeOutcome {
        let mut learned = 0;
        for entry in incoming {
            if !self.known.contains_key(&entry.order) {
                self.known.insert(entry.order, LogEntry { ignored: false, ..*entry });
                learned += 1;
            }
        }
        if learned == 0 {
            return MergeOutcome::default();
        }

        let old_view = self.view().to_vec();
        let old_discarded = self.discarded().clone();
        self.revalidate();

        let new_view = self.view();
        let common = old_view
            .iter()
            .zip(new_view)
            .take_while(|(old, new)| old.order == new.order)
            .count();
        let backtrack: Vec<LogEntry> = old_view[common..].iter().rev().copied().collect();
        let advance: Vec<LogEntry> = new_view[common..].to_vec();
        let consolidated = new_view
            .iter()
            .filter(|entry| old_discarded.contains_key(&entry.order))
            .copied()
            .collect();
        let newly_discarded = self
            .discarded()
            .iter()
            .filter(|(order, _)| !old_discarded.contains_key(order))
            .filter_map(|(order, kind)| self.known.get(order).map(|entry| (*entry, *kind)))
            .collect();

        let outcome = MergeOutcome {
            backtrack,
            advance,
            consolidated,
            newly_discarded,
            learned,
        };
        tracing::debug!(
            owner = %self.owner,
            learned,
            backtrack = outcome.backtrack.len(),
            advance = outcome.advance.len(),
            consolidated = outcome.consolidated.len(),
            discarded = outcome.newly_discarded.len(),
            "merged log"
        );
        outcome
    }

    /// Entries to hand to the next log, with local discards marked ignored.
    #[must_use]
    pub fn export(&self) -> Vec<LogEntry> {
        self.known
            .values()
            .map(|entry| LogEntry {
                ignored: self.discarded().contains_key(&entry.order),
                ..*entry
            })
            .collect()
    }

    /// `currentLog` as the automata hold it, padded to `log_size` slots.
    #[must_use]
    pub fn raw(&self, log_size: usize) -> Vec<RawLogEntry> {
        pad(self.view().iter(), log_size)
    }

    fn revalidate(&mut self) {
        let mut pass = ValidationPass::new(&self.rules);
        for entry in self.known.values() {
            pass.admit(&self.rules, entry, self.sticky.contains(&entry.order));
        }
        if self.standard_setting {
            self.sticky.extend(pass.discarded().keys().copied());
        }
        self.pass = pass;
    }
}
