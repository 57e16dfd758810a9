//! Locations, edges and the automaton graph.

use crate::declaration::Declaration;
use crate::expression::Expression;
use petgraph::graph::{EdgeIndex as GraphEdge, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Graph;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Time semantics of a location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LocationKind {
    /// Time may pass
    #[default]
    Normal,
    /// Time may not pass
    Urgent,
    /// Time may not pass and the next transition must leave a committed
    /// location
    Committed,
}

/// A control location of an automaton.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    name: String,
    kind: LocationKind,
    invariant: Option<Expression>,
}

impl Location {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LocationKind::Normal,
            invariant: None,
        }
    }

    #[must_use]
    pub fn urgent(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(LocationKind::Urgent)
    }

    #[must_use]
    pub fn committed(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(LocationKind::Committed)
    }

    #[must_use]
    pub fn with_kind(mut self, kind: LocationKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_invariant(mut self, invariant: Expression) -> Self {
        self.invariant = Some(invariant);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    #[must_use]
    pub fn invariant(&self) -> Option<&Expression> {
        self.invariant.as_ref()
    }
}

/// Direction of a channel synchronisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// Emit on the channel (`!`)
    Send,
    /// Wait on the channel (`?`)
    Receive,
}

impl Display for SyncAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "!"),
            Self::Receive => write!(f, "?"),
        }
    }
}

/// Channel synchronisation of an edge, optionally indexed into a channel
/// array.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SyncLabel {
    pub channel: String,
    pub index: Option<Expression>,
    pub action: SyncAction,
}

impl SyncLabel {
    #[must_use]
    pub fn send(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            index: None,
            action: SyncAction::Send,
        }
    }

    #[must_use]
    pub fn receive(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            index: None,
            action: SyncAction::Receive,
        }
    }

    /// Index into a channel array
    #[must_use]
    pub fn at(mut self, index: Expression) -> Self {
        self.index = Some(index);
        self
    }
}

impl Display for SyncLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel)?;
        if let Some(index) = &self.index {
            write!(f, "[{index}]")?;
        }
        write!(f, "{}", self.action)
    }
}

/// Effect of taking an edge.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Update {
    /// `target = value`
    Assign(Expression, Expression),
    /// `target++`
    Increment(Expression),
    /// `target--`
    Decrement(Expression),
    /// A function call evaluated for its side effects
    Call(Expression),
}

impl Update {
    #[must_use]
    pub fn assign(target: Expression, value: Expression) -> Self {
        Self::Assign(target, value)
    }

    /// Call a named function for its side effects
    #[must_use]
    pub fn call(function: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Self::Call(Expression::call(function, arguments))
    }
}

impl Display for Update {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign(target, value) => write!(f, "{target} = {value}"),
            Self::Increment(target) => write!(f, "{target}++"),
            Self::Decrement(target) => write!(f, "{target}--"),
            Self::Call(call) => write!(f, "{call}"),
        }
    }
}

/// Guard, synchronisation and updates of one transition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Edge {
    pub guard: Option<Expression>,
    pub sync: Option<SyncLabel>,
    pub updates: Vec<Update>,
}

impl Edge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a guard conjunct
    #[must_use]
    pub fn when(mut self, condition: Expression) -> Self {
        self.guard = Some(match self.guard.take() {
            Some(guard) => guard.and(condition),
            None => condition,
        });
        self
    }

    #[must_use]
    pub fn sync(mut self, sync: SyncLabel) -> Self {
        self.sync = Some(sync);
        self
    }

    #[must_use]
    pub fn update(mut self, update: Update) -> Self {
        self.updates.push(update);
        self
    }

    #[must_use]
    pub fn updates(mut self, updates: impl IntoIterator<Item = Update>) -> Self {
        self.updates.extend(updates);
        self
    }

    /// Channel name of the synchronisation, if any
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.sync.as_ref().map(|sync| sync.channel.as_str())
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(guard) = &self.guard {
            parts.push(format!("[{guard}]"));
        }
        if let Some(sync) = &self.sync {
            parts.push(sync.to_string());
        }
        if !self.updates.is_empty() {
            let updates: Vec<String> = self.updates.iter().map(ToString::to_string).collect();
            parts.push(updates.join(", "));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Index of a location in an automaton.
///
/// Wraps petgraph's `NodeIndex` to provide a type-safe handle to locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationIndex(NodeIndex);

impl LocationIndex {
    /// Returns the numeric index of this location.
    #[must_use]
    pub fn index(self) -> usize {
        self.0.index()
    }
}

/// Index of an edge in an automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeIndex(GraphEdge);

impl EdgeIndex {
    #[must_use]
    pub fn index(self) -> usize {
        self.0.index()
    }
}

/// Errors that can occur when building an automaton.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomatonError {
    /// Two locations share a name
    #[error("automaton '{automaton}' already has a location named '{location}'")]
    DuplicateLocation { automaton: String, location: String },
    /// An edge or the initial location refers to a location not in the graph
    #[error("automaton '{automaton}' has no location with index {index}")]
    UnknownLocation { automaton: String, index: usize },
}

/// A process template: locations, edges, local declarations and an
/// optional instance parameter such as `Client_t id`.
#[derive(Clone, Debug)]
pub struct Automaton {
    name: String,
    parameter: Option<String>,
    declarations: Vec<Declaration>,
    graph: Graph<Location, Edge>,
    initial: Option<LocationIndex>,
}

impl Automaton {
    /// Creates a new automaton with no locations.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter: None,
            declarations: Vec::new(),
            graph: Graph::new(),
            initial: None,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    /// Returns the size of this automaton as (locations, edges).
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        (self.graph.node_count(), self.graph.edge_count())
    }

    pub fn declare(&mut self, declaration: Declaration) {
        self.declarations.push(declaration);
    }

    #[must_use]
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Adds a location and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`AutomatonError::DuplicateLocation`] if the name is taken.
    pub fn add_location(&mut self, location: Location) -> Result<LocationIndex, AutomatonError> {
        if self.find_location(location.name()).is_some() {
            return Err(AutomatonError::DuplicateLocation {
                automaton: self.name.clone(),
                location: location.name().to_string(),
            });
        }
        Ok(LocationIndex(self.graph.add_node(location)))
    }

    /// Adds an edge between two existing locations.
    ///
    /// # Errors
    ///
    /// Returns [`AutomatonError::UnknownLocation`] if either endpoint is not
    /// a location of this automaton.
    pub fn add_edge(
        &mut self,
        from: LocationIndex,
        to: LocationIndex,
        edge: Edge,
    ) -> Result<EdgeIndex, AutomatonError> {
        self.check(from)?;
        self.check(to)?;
        Ok(EdgeIndex(self.graph.add_edge(from.0, to.0, edge)))
    }

    /// Marks the initial location.
    ///
    /// # Errors
    ///
    /// Returns [`AutomatonError::UnknownLocation`] for a foreign index.
    pub fn set_initial(&mut self, initial: LocationIndex) -> Result<(), AutomatonError> {
        self.check(initial)?;
        self.initial = Some(initial);
        Ok(())
    }

    #[must_use]
    pub fn initial(&self) -> Option<LocationIndex> {
        self.initial
    }

    fn check(&self, index: LocationIndex) -> Result<(), AutomatonError> {
        if index.index() < self.graph.node_count() {
            Ok(())
        } else {
            Err(AutomatonError::UnknownLocation {
                automaton: self.name.clone(),
                index: index.index(),
            })
        }
    }

    /// Look up a location by name
    #[must_use]
    pub fn find_location(&self, name: &str) -> Option<LocationIndex> {
        self.graph
            .node_indices()
            .find(|&index| self.graph[index].name() == name)
            .map(LocationIndex)
    }

    #[must_use]
    pub fn location(&self, index: LocationIndex) -> Option<&Location> {
        self.graph.node_weight(index.0)
    }

    /// Returns an iterator over all locations with their indices.
    pub fn locations(&self) -> impl Iterator<Item = (LocationIndex, &Location)> {
        self.graph
            .node_indices()
            .map(move |index| (LocationIndex(index), &self.graph[index]))
    }

    /// Source, target and label of an edge.
    #[must_use]
    pub fn edge(&self, index: EdgeIndex) -> Option<(LocationIndex, LocationIndex, &Edge)> {
        let (source, target) = self.graph.edge_endpoints(index.0)?;
        let edge = self.graph.edge_weight(index.0)?;
        Some((LocationIndex(source), LocationIndex(target), edge))
    }

    /// Returns an iterator over all edges in insertion order.
    ///
    /// Each item is a tuple of (source, target, edge).
    pub fn edges(&self) -> impl Iterator<Item = (LocationIndex, LocationIndex, &Edge)> {
        self.graph.edge_references().map(|edge| {
            (
                LocationIndex(edge.source()),
                LocationIndex(edge.target()),
                edge.weight(),
            )
        })
    }

    /// Returns an iterator over the edges leaving a location.
    ///
    /// Each item is a tuple of (edge index, target, edge).
    pub fn edges_from(
        &self,
        LocationIndex(index): LocationIndex,
    ) -> impl Iterator<Item = (EdgeIndex, LocationIndex, &Edge)> {
        self.graph
            .edges(index)
            .map(|edge| (EdgeIndex(edge.id()), LocationIndex(edge.target()), edge.weight()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_add_and_query() {
        let mut automaton = Automaton::new("Client").with_parameter("Client_t id");
        let s0 = automaton.add_location(Location::urgent("S0")).unwrap();
        let s1 = automaton.add_location(Location::new("S1")).unwrap();
        automaton.set_initial(s0).unwrap();

        let edge = Edge::new()
            .when(Expression::var("ready"))
            .sync(SyncLabel::send("go").at(Expression::var("id")))
            .update(Update::Increment(Expression::var("count")));
        let index = automaton.add_edge(s0, s1, edge).unwrap();

        assert_eq!(automaton.size(), (2, 1));
        assert_eq!(automaton.find_location("S1"), Some(s1));
        let (from, to, edge) = automaton.edge(index).unwrap();
        assert_eq!((from, to), (s0, s1));
        assert_eq!(edge.to_string(), "[ready] go[id]! count++");
        assert_eq!(automaton.edges_from(s0).count(), 1);
        assert_eq!(automaton.edges_from(s1).count(), 0);
    }

    #[test]
    fn test_duplicate_location() {
        let mut automaton = Automaton::new("Log");
        automaton.add_location(Location::new("idle")).unwrap();
        assert_matches!(
            automaton.add_location(Location::committed("idle")),
            Err(AutomatonError::DuplicateLocation { location, .. }) if location == "idle"
        );
    }

    #[test]
    fn test_foreign_index() {
        let mut other = Automaton::new("Other");
        other.add_location(Location::new("a")).unwrap();
        let foreign = other.add_location(Location::new("b")).unwrap();

        let mut automaton = Automaton::new("Log");
        let only = automaton.add_location(Location::new("idle")).unwrap();
        assert_matches!(
            automaton.add_edge(only, foreign, Edge::new()),
            Err(AutomatonError::UnknownLocation { index: 1, .. })
        );
    }

    #[test]
    fn test_guard_conjuncts_accumulate() {
        let edge = Edge::new()
            .when(Expression::var("a"))
            .when(Expression::var("b").or(Expression::var("c")));
        assert_eq!(edge.guard.unwrap().to_string(), "a && (b || c)");
    }
}
