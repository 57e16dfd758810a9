//! A role's local view of the protocol.

use crate::event::{Event, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The subgraph and subscriptions one role needs to behave correctly.
///
/// `own_events` are emitted by the role itself, `other_events` are observed.
/// Their union is the role's subscribed subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProjection {
    name: String,
    initial: Location,
    subscriptions: BTreeSet<String>,
    own_events: Vec<Event>,
    other_events: Vec<Event>,
}

impl RoleProjection {
    /// Build a projection whose subscriptions are exactly the names of its
    /// events. Events are split by owner.
    #[must_use]
    pub fn new(name: impl Into<String>, initial: Location, events: Vec<Event>) -> Self {
        let name = name.into();
        let subscriptions = events.iter().map(|event| event.name().to_string()).collect();
        let (own_events, other_events) = events
            .into_iter()
            .partition(|event: &Event| event.role() == name);

        Self {
            name,
            initial,
            subscriptions,
            own_events,
            other_events,
        }
    }

    /// Build a projection from explicitly listed parts, as supplied by a
    /// projection override file.
    #[must_use]
    pub fn from_parts(
        name: impl Into<String>,
        initial: Location,
        subscriptions: BTreeSet<String>,
        own_events: Vec<Event>,
        other_events: Vec<Event>,
    ) -> Self {
        Self {
            name: name.into(),
            initial,
            subscriptions,
            own_events,
            other_events,
        }
    }

    /// Get the role name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the role's initial location
    #[must_use]
    pub fn initial(&self) -> &Location {
        &self.initial
    }

    /// Get the subscribed event names
    #[must_use]
    pub fn subscriptions(&self) -> &BTreeSet<String> {
        &self.subscriptions
    }

    /// Get the events emitted by this role
    #[must_use]
    pub fn own_events(&self) -> &[Event] {
        &self.own_events
    }

    /// Get the events observed by this role
    #[must_use]
    pub fn other_events(&self) -> &[Event] {
        &self.other_events
    }

    /// Own events first, then observed ones.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.own_events.iter().chain(self.other_events.iter())
    }

    /// Look up a projected event by name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events().find(|event| event.name() == name)
    }

    /// Check whether this role emits the named event
    #[must_use]
    pub fn owns(&self, event: &str) -> bool {
        self.own_events.iter().any(|e| e.name() == event)
    }

    /// Check whether this role subscribes to the named event
    #[must_use]
    pub fn subscribes(&self, event: &str) -> bool {
        self.subscriptions.contains(event)
    }

    /// Locations used by the projected events, sorted by name.
    #[must_use]
    pub fn locations(&self) -> BTreeSet<&Location> {
        self.events()
            .flat_map(|event| [event.source(), event.target()])
            .collect()
    }
}
