//! The global log: every entry ever inserted, in order-count order.
//!
//! It hands out order counts, enforces the log capacity and keeps the true
//! view, the history validated against the whole protocol rather than one
//! role's projection.

use crate::error::LogOverflow;
use crate::validation::{DiscardKind, ValidationPass, ValidationRules};
use std::collections::BTreeMap;
use swarmlog_types::{Location, LogEntry, OrderCount, RawLogEntry};

#[derive(Debug, Clone)]
pub struct GlobalLog {
    capacity: usize,
    next: OrderCount,
    entries: Vec<LogEntry>,
    rules: ValidationRules,
    truth: ValidationPass,
}

impl GlobalLog {
    /// An empty log holding at most `capacity` entries.
    #[must_use]
    pub fn new(rules: ValidationRules, capacity: usize) -> Self {
        let truth = ValidationPass::new(&rules);
        Self {
            capacity,
            next: OrderCount::FIRST,
            entries: Vec::new(),
            rules,
            truth,
        }
    }

    /// Reserve the next order count.
    ///
    /// # Errors
    ///
    /// Returns [`LogOverflow`] when the log is already full.
    pub fn reserve(&mut self) -> Result<OrderCount, LogOverflow> {
        if self.is_full() {
            tracing::debug!(capacity = self.capacity, "global log overflow");
            return Err(LogOverflow {
                capacity: self.capacity,
            });
        }
        let order = self.next;
        self.next = order.next();
        Ok(order)
    }

    /// Append an inserted entry and validate it against the true view.
    pub fn record(&mut self, entry: LogEntry) {
        let verdict = self.truth.admit(&self.rules, &entry, false);
        tracing::trace!(entry = %entry, ?verdict, "recorded in global log");
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Entries accepted by the whole-protocol validation
    #[must_use]
    pub fn true_view(&self) -> &[LogEntry] {
        self.truth.accepted()
    }

    #[must_use]
    pub fn true_discarded(&self) -> &BTreeMap<OrderCount, DiscardKind> {
        self.truth.discarded()
    }

    /// Protocol location reached by the true view
    #[must_use]
    pub fn true_location(&self) -> Option<&Location> {
        self.rules.flow().locations().get(self.truth.cursor())
    }

    /// `globalLog` as the automata hold it, padded to `log_size` slots.
    #[must_use]
    pub fn raw(&self, log_size: usize) -> Vec<RawLogEntry> {
        pad(self.entries.iter(), log_size)
    }
}

pub(crate) fn pad<'a>(entries: impl Iterator<Item = &'a LogEntry>, size: usize) -> Vec<RawLogEntry> {
    let mut raw: Vec<RawLogEntry> = entries.map(LogEntry::to_raw).collect();
    raw.resize(size.max(raw.len()), RawLogEntry::default());
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use swarmlog_theory::{GraphAnalyser, SharedTables};
    use swarmlog_types::{BasedOn, Event, EventId, InstanceId, ModelSettings, ProtocolGraph};

    fn log(capacity: usize) -> GlobalLog {
        let graph = ProtocolGraph::new(
            "S0",
            vec![
                Event::new("e1", "S0", "S1", "A"),
                Event::new("e2", "S1", "S2", "B"),
            ],
        )
        .unwrap();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let shared = Arc::new(SharedTables::build(&graph, &analysis));
        let settings = ModelSettings::uniform([("A", 1), ("B", 1)]);
        GlobalLog::new(ValidationRules::global(shared, &settings), capacity)
    }

    #[test]
    fn test_reserve_until_full() {
        let mut log = log(1);
        let order = log.reserve().unwrap();
        assert_eq!(order, OrderCount::FIRST);
        log.record(LogEntry {
            based_on: BasedOn::Root,
            ..LogEntry::pending(EventId(0), InstanceId(0), order)
        });
        assert!(log.is_full());
        assert_matches!(log.reserve(), Err(LogOverflow { capacity: 1 }));
    }

    #[test]
    fn test_true_view_tracks_location() {
        let mut log = log(4);
        let first = log.reserve().unwrap();
        log.record(LogEntry {
            based_on: BasedOn::Root,
            ..LogEntry::pending(EventId(0), InstanceId(0), first)
        });
        assert_eq!(log.true_location().unwrap().as_str(), "S1");

        let raw = log.raw(3);
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0].order_count, 1);
        assert!(raw[1].is_empty());
    }
}
