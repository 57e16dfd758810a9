//! Dense integer numbering and the lookup tables shared by every automaton.
//!
//! Automata compare integers, never names. This module assigns each event a
//! stable [`EventId`] and derives the tables indexed by it:
//!
//! - [`BranchPartitionTable`]: branching events grouped by source location
//! - [`FlowMap`]: `(source, target)` location ids per event, for one view
//! - [`TiedToTable`]: the tied-to set of each event as event ids
//!
//! Raw rows use `-1` as the sentinel for "absent".

use crate::analysis::AnalysisResult;
use std::collections::{BTreeMap, BTreeSet};
use swarmlog_types::{Event, EventId, Location, ProtocolGraph, RoleProjection};

/// Sentinel filling unused cells of every raw table.
pub const NONE: i64 = -1;

fn raw(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(NONE)
}

/// Bijection between event names and dense ids, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventNumbering {
    names: Vec<String>,
    ids: BTreeMap<String, EventId>,
}

impl EventNumbering {
    /// Number the events of `graph` in declaration order.
    #[must_use]
    pub fn from_graph(graph: &ProtocolGraph) -> Self {
        let mut numbering = Self::default();
        for event in graph.events() {
            if !numbering.ids.contains_key(event.name()) {
                let id = EventId(numbering.names.len());
                numbering.ids.insert(event.name().to_string(), id);
                numbering.names.push(event.name().to_string());
            }
        }
        numbering
    }

    /// Get the id of the named event
    #[must_use]
    pub fn id(&self, name: &str) -> Option<EventId> {
        self.ids.get(name).copied()
    }

    /// Get the name of an event id
    #[must_use]
    pub fn name(&self, id: EventId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ids and names in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (EventId(index), name.as_str()))
    }
}

/// Branching events partitioned by their shared source location.
///
/// Partitions are ordered by source location name; ids inside a partition
/// are ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchPartitionTable {
    partitions: Vec<Vec<EventId>>,
    partition_of: Vec<Option<usize>>,
}

impl BranchPartitionTable {
    /// Partition `branching` using the ids of `numbering`.
    #[must_use]
    pub fn new<'a>(
        branching: impl IntoIterator<Item = &'a Event>,
        numbering: &EventNumbering,
    ) -> Self {
        let mut by_source: BTreeMap<&Location, BTreeSet<EventId>> = BTreeMap::new();
        for event in branching {
            if let Some(id) = numbering.id(event.name()) {
                by_source.entry(event.source()).or_default().insert(id);
            }
        }

        let mut partition_of = vec![None; numbering.len()];
        let partitions: Vec<Vec<EventId>> = by_source
            .into_values()
            .map(|ids| ids.into_iter().collect())
            .collect();
        for (index, partition) in partitions.iter().enumerate() {
            for id in partition {
                partition_of[id.index()] = Some(index);
            }
        }

        Self {
            partitions,
            partition_of,
        }
    }

    /// Get the partitions
    #[must_use]
    pub fn partitions(&self) -> &[Vec<EventId>] {
        &self.partitions
    }

    /// Width of the widest partition, at least one.
    #[must_use]
    pub fn width(&self) -> usize {
        self.partitions.iter().map(Vec::len).max().unwrap_or(0).max(1)
    }

    /// Partitions as a rectangular table padded with [`NONE`]. A protocol
    /// without branches yields the single row `[-1]`.
    #[must_use]
    pub fn padded_rows(&self) -> Vec<Vec<i64>> {
        if self.partitions.is_empty() {
            return vec![vec![NONE]];
        }
        let width = self.width();
        self.partitions
            .iter()
            .map(|partition| pad(partition.iter().map(|id| raw(id.index())), width))
            .collect()
    }

    /// `is_branching[event_id]`
    #[must_use]
    pub fn is_branching_row(&self) -> Vec<bool> {
        self.partition_of.iter().map(Option::is_some).collect()
    }

    /// `branch_partition_of[event_id]`, [`NONE`] when not branching.
    #[must_use]
    pub fn partition_row(&self) -> Vec<i64> {
        self.partition_of
            .iter()
            .map(|partition| partition.map_or(NONE, raw))
            .collect()
    }

    #[must_use]
    pub fn is_branching(&self, id: EventId) -> bool {
        self.partition_of(id).is_some()
    }

    /// Get the partition index of an event
    #[must_use]
    pub fn partition_of(&self, id: EventId) -> Option<usize> {
        self.partition_of.get(id.index()).copied().flatten()
    }

    /// Check whether two events compete at the same branch point
    #[must_use]
    pub fn same_partition(&self, a: EventId, b: EventId) -> bool {
        match (self.partition_of(a), self.partition_of(b)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// All members of the partition containing `id`; empty when not branching.
    #[must_use]
    pub fn siblings(&self, id: EventId) -> &[EventId] {
        self.partition_of(id)
            .and_then(|index| self.partitions.get(index))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Rebuild the branching event set from raw rows.
    ///
    /// Sentinels and ids unknown to `numbering` or `graph` are skipped.
    #[must_use]
    pub fn decode(
        rows: &[Vec<i64>],
        numbering: &EventNumbering,
        graph: &ProtocolGraph,
    ) -> BTreeSet<Event> {
        rows.iter()
            .flatten()
            .filter_map(|&cell| usize::try_from(cell).ok())
            .filter_map(|index| numbering.name(EventId(index)))
            .filter_map(|name| graph.event(name))
            .cloned()
            .collect()
    }
}

/// Location ids and per-event `(source, target)` pairs of one view of the
/// protocol.
///
/// Locations are numbered by first encounter over the view's events, own
/// events first, source before target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMap {
    locations: Vec<Location>,
    flows: Vec<Option<(usize, usize)>>,
    initial: usize,
}

impl FlowMap {
    /// Flow map of a role's projected view.
    #[must_use]
    pub fn for_projection(projection: &RoleProjection, numbering: &EventNumbering) -> Self {
        Self::build(projection.events(), projection.initial(), numbering)
    }

    /// Flow map of the whole protocol.
    #[must_use]
    pub fn for_graph(graph: &ProtocolGraph, numbering: &EventNumbering) -> Self {
        Self::build(graph.events().iter(), graph.initial(), numbering)
    }

    fn build<'a>(
        events: impl Iterator<Item = &'a Event>,
        initial: &Location,
        numbering: &EventNumbering,
    ) -> Self {
        let mut locations: Vec<Location> = Vec::new();
        let mut flows = vec![None; numbering.len()];
        for event in events {
            let source = intern(event.source(), &mut locations);
            let target = intern(event.target(), &mut locations);
            if let Some(id) = numbering.id(event.name()) {
                flows[id.index()] = Some((source, target));
            }
        }
        let initial = intern(initial, &mut locations);

        Self {
            locations,
            flows,
            initial,
        }
    }

    /// Source location id of an event in this view
    #[must_use]
    pub fn source(&self, id: EventId) -> Option<usize> {
        self.flow(id).map(|(source, _)| source)
    }

    /// Target location id of an event in this view
    #[must_use]
    pub fn target(&self, id: EventId) -> Option<usize> {
        self.flow(id).map(|(_, target)| target)
    }

    #[must_use]
    pub fn flow(&self, id: EventId) -> Option<(usize, usize)> {
        self.flows.get(id.index()).copied().flatten()
    }

    /// Check whether the event is part of this view
    #[must_use]
    pub fn contains(&self, id: EventId) -> bool {
        self.flow(id).is_some()
    }

    /// Location id of the view's initial location
    #[must_use]
    pub fn initial(&self) -> usize {
        self.initial
    }

    #[must_use]
    pub fn location_id(&self, location: &Location) -> Option<usize> {
        self.locations.iter().position(|known| known == location)
    }

    /// Locations in id order
    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// `flow[event_id] = [source, target]`, `[-1, -1]` for absent events.
    #[must_use]
    pub fn raw_rows(&self) -> Vec<[i64; 2]> {
        self.flows
            .iter()
            .map(|flow| match flow {
                Some((source, target)) => [raw(*source), raw(*target)],
                None => [NONE, NONE],
            })
            .collect()
    }
}

/// Tied-to sets as event ids, one row per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiedToTable {
    rows: Vec<Vec<EventId>>,
}

impl TiedToTable {
    /// Translate the tied-to sets of `analysis`.
    #[must_use]
    pub fn new(analysis: &AnalysisResult, numbering: &EventNumbering) -> Self {
        let rows = numbering
            .iter()
            .map(|(_, name)| {
                let ids: BTreeSet<EventId> = analysis
                    .tied_to(name)
                    .into_iter()
                    .filter_map(|event| numbering.id(event.name()))
                    .collect();
                ids.into_iter().collect()
            })
            .collect();
        Self { rows }
    }

    /// `maxAmountOfTied`: the longest row, at least one.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0).max(1)
    }

    /// Tied-to ids of an event; empty for unknown ids.
    #[must_use]
    pub fn row(&self, id: EventId) -> &[EventId] {
        self.rows
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check whether `candidate` is in the tied-to set of `id`
    #[must_use]
    pub fn contains(&self, id: EventId, candidate: EventId) -> bool {
        self.row(id).contains(&candidate)
    }

    #[must_use]
    pub fn padded_rows(&self) -> Vec<Vec<i64>> {
        let width = self.width();
        self.rows
            .iter()
            .map(|row| pad(row.iter().map(|id| raw(id.index())), width))
            .collect()
    }
}

/// Every table that does not depend on a particular role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTables {
    pub numbering: EventNumbering,
    pub branches: BranchPartitionTable,
    pub tied_to: TiedToTable,
    /// Flow map of the whole protocol, used by the true global log
    pub global_flow: FlowMap,
}

impl SharedTables {
    #[must_use]
    pub fn build(graph: &ProtocolGraph, analysis: &AnalysisResult) -> Self {
        let numbering = EventNumbering::from_graph(graph);
        let branches = BranchPartitionTable::new(&analysis.branching_events, &numbering);
        let tied_to = TiedToTable::new(analysis, &numbering);
        let global_flow = FlowMap::for_graph(graph, &numbering);

        tracing::debug!(
            events = numbering.len(),
            partitions = branches.partitions().len(),
            max_tied = tied_to.width(),
            locations = global_flow.locations().len(),
            "built shared tables"
        );

        Self {
            numbering,
            branches,
            tied_to,
            global_flow,
        }
    }
}

fn intern(location: &Location, locations: &mut Vec<Location>) -> usize {
    if let Some(index) = locations.iter().position(|known| known == location) {
        return index;
    }
    locations.push(location.clone());
    locations.len() - 1
}

fn pad(values: impl Iterator<Item = i64>, width: usize) -> Vec<i64> {
    let mut row: Vec<i64> = values.collect();
    row.resize(width.max(row.len()), NONE);
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::GraphAnalyser;

    fn diamond() -> ProtocolGraph {
        ProtocolGraph::new(
            "S",
            vec![
                Event::new("a", "S", "A", "R1"),
                Event::new("b", "S", "B", "R2"),
                Event::new("c", "A", "T", "R1"),
                Event::new("d", "B", "T", "R2"),
                Event::new("e", "T", "U", "R1"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_numbering_in_declaration_order() {
        let numbering = EventNumbering::from_graph(&diamond());
        assert_eq!(numbering.id("a"), Some(EventId(0)));
        assert_eq!(numbering.id("e"), Some(EventId(4)));
        assert_eq!(numbering.name(EventId(2)), Some("c"));
        assert_eq!(numbering.id("zzz"), None);
    }

    #[test]
    fn test_branch_table_rows() {
        let graph = diamond();
        let tables = SharedTables::build(&graph, &GraphAnalyser::new(&graph).analyse_graph());
        assert_eq!(tables.branches.padded_rows(), vec![vec![0, 1]]);
        assert_eq!(
            tables.branches.is_branching_row(),
            vec![true, true, false, false, false]
        );
        assert_eq!(tables.branches.partition_row(), vec![0, 0, -1, -1, -1]);
        assert!(tables.branches.same_partition(EventId(0), EventId(1)));
        assert_eq!(tables.branches.siblings(EventId(2)), &[] as &[EventId]);
    }

    #[test]
    fn test_empty_branch_table_is_sentinel() {
        let graph = ProtocolGraph::new("S", vec![Event::new("a", "S", "T", "R")]).unwrap();
        let numbering = EventNumbering::from_graph(&graph);
        let table = BranchPartitionTable::new(std::iter::empty(), &numbering);
        assert_eq!(table.padded_rows(), vec![vec![-1]]);
        assert!(BranchPartitionTable::decode(&table.padded_rows(), &numbering, &graph).is_empty());
    }

    #[test]
    fn test_tied_to_rows_are_padded() {
        let graph = diamond();
        let tables = SharedTables::build(&graph, &GraphAnalyser::new(&graph).analyse_graph());
        assert_eq!(tables.tied_to.width(), 2);
        // `e` leaves the join point and is preceded by both branches.
        assert_eq!(tables.tied_to.padded_rows()[4], vec![0, 1]);
        assert_eq!(tables.tied_to.padded_rows()[2], vec![0, -1]);
        // Root-level branches carry no tie.
        assert_eq!(tables.tied_to.padded_rows()[0], vec![-1, -1]);
    }

    #[test]
    fn test_flow_map_numbers_by_first_encounter() {
        let graph = diamond();
        let numbering = EventNumbering::from_graph(&graph);
        let flow = FlowMap::for_graph(&graph, &numbering);
        assert_eq!(flow.initial(), 0);
        assert_eq!(flow.flow(EventId(0)), Some((0, 1)));
        assert_eq!(flow.flow(EventId(1)), Some((0, 2)));
        assert_eq!(flow.location_id(&Location::new("T")), Some(3));
        assert_eq!(flow.raw_rows()[4], [3, 4]);
    }

    #[test]
    fn test_flow_map_of_projection_marks_absent_events() {
        let graph = diamond();
        let numbering = EventNumbering::from_graph(&graph);
        let projection = RoleProjection::new(
            "R1",
            Location::new("A"),
            vec![graph.events()[2].clone(), graph.events()[4].clone()],
        );
        let flow = FlowMap::for_projection(&projection, &numbering);
        assert!(!flow.contains(EventId(1)));
        assert_eq!(flow.raw_rows()[1], [-1, -1]);
        assert_eq!(flow.source(EventId(2)), Some(flow.initial()));
    }
}
