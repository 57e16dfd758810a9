//! The global protocol graph.

use crate::event::{Event, Location};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors detected while building a [`ProtocolGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The protocol declares no events at all
    #[error("protocol declares no events")]
    EmptyProtocol,

    /// An event has an empty name
    #[error("event from '{from}' to '{to}' has an empty name")]
    EmptyEventName { from: Location, to: Location },

    /// An event has no owning role
    #[error("event '{event}' has no owning role")]
    MissingRole { event: String },

    /// Two events share a name
    #[error("event '{event}' is declared more than once")]
    DuplicateEvent { event: String },

    /// The initial location is not an endpoint of any event
    #[error("initial location '{location}' is not used by any event")]
    UnknownInitial { location: Location },

    /// Nothing can happen from the initial location
    #[error("initial location '{location}' has no outgoing events")]
    InitialWithoutOutgoing { location: Location },
}

/// Directed multigraph of locations connected by events.
///
/// Events keep their declaration order; adjacency is cached per location so
/// traversals never rescan the whole event list.
///
/// # Examples
///
/// ```
/// use swarmlog_types::{Event, Location, ProtocolGraph};
///
/// let graph = ProtocolGraph::new(
///     "S0",
///     vec![
///         Event::new("request", "S0", "S1", "Client"),
///         Event::new("accept", "S1", "S2", "Provider"),
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(graph.out_degree(&Location::new("S0")), 1);
/// assert!(graph.is_terminal(&Location::new("S2")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolGraph {
    initial: Location,
    events: Vec<Event>,
    outgoing: BTreeMap<Location, Vec<usize>>,
    incoming: BTreeMap<Location, Vec<usize>>,
}

impl ProtocolGraph {
    /// Build and validate a protocol graph.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] naming the offending event or location when
    /// the protocol is empty, an event is unnamed or unowned, a name repeats,
    /// or the initial location is unusable.
    pub fn new(initial: impl Into<Location>, events: Vec<Event>) -> Result<Self, GraphError> {
        let initial = initial.into();
        if events.is_empty() {
            return Err(GraphError::EmptyProtocol);
        }

        let mut names = BTreeSet::new();
        for event in &events {
            if event.name().is_empty() {
                return Err(GraphError::EmptyEventName {
                    from: event.source().clone(),
                    to: event.target().clone(),
                });
            }
            if event.role().is_empty() {
                return Err(GraphError::MissingRole {
                    event: event.name().to_string(),
                });
            }
            if !names.insert(event.name()) {
                return Err(GraphError::DuplicateEvent {
                    event: event.name().to_string(),
                });
            }
        }

        let graph = Self::from_parts(initial, events);
        if !graph.outgoing.contains_key(&graph.initial) && !graph.incoming.contains_key(&graph.initial)
        {
            return Err(GraphError::UnknownInitial {
                location: graph.initial,
            });
        }
        if graph.is_terminal(&graph.initial) {
            return Err(GraphError::InitialWithoutOutgoing {
                location: graph.initial,
            });
        }

        Ok(graph)
    }

    fn from_parts(initial: Location, events: Vec<Event>) -> Self {
        let mut outgoing: BTreeMap<Location, Vec<usize>> = BTreeMap::new();
        let mut incoming: BTreeMap<Location, Vec<usize>> = BTreeMap::new();
        for (index, event) in events.iter().enumerate() {
            outgoing.entry(event.source().clone()).or_default().push(index);
            incoming.entry(event.target().clone()).or_default().push(index);
        }

        Self {
            initial,
            events,
            outgoing,
            incoming,
        }
    }

    /// Get the initial location
    #[must_use]
    pub fn initial(&self) -> &Location {
        &self.initial
    }

    /// Get all events in declaration order
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Look up an event by name
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.name() == name)
    }

    /// Events leaving `location`, in declaration order.
    pub fn outgoing<'a>(&'a self, location: &Location) -> impl Iterator<Item = &'a Event> + 'a {
        self.adjacent(&self.outgoing, location)
    }

    /// Events entering `location`, in declaration order.
    pub fn incoming<'a>(&'a self, location: &Location) -> impl Iterator<Item = &'a Event> + 'a {
        self.adjacent(&self.incoming, location)
    }

    fn adjacent<'a>(
        &'a self,
        map: &'a BTreeMap<Location, Vec<usize>>,
        location: &Location,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        map.get(location)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(move |&index| &self.events[index])
    }

    /// Number of events leaving `location`
    #[must_use]
    pub fn out_degree(&self, location: &Location) -> usize {
        self.outgoing.get(location).map_or(0, Vec::len)
    }

    /// Number of events entering `location`
    #[must_use]
    pub fn in_degree(&self, location: &Location) -> usize {
        self.incoming.get(location).map_or(0, Vec::len)
    }

    /// A location without outgoing events ends the protocol.
    #[must_use]
    pub fn is_terminal(&self, location: &Location) -> bool {
        self.out_degree(location) == 0
    }

    /// All locations, sorted by name.
    #[must_use]
    pub fn locations(&self) -> BTreeSet<&Location> {
        self.events
            .iter()
            .flat_map(|event| [event.source(), event.target()])
            .collect()
    }

    /// All roles that own at least one event, sorted by name.
    #[must_use]
    pub fn roles(&self) -> BTreeSet<&str> {
        self.events.iter().map(Event::role).collect()
    }

    /// Events owned by `role`, in declaration order.
    pub fn events_of<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |event| event.role() == role)
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// A validated graph is never empty; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
