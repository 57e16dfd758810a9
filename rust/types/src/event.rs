//! Locations and events of a swarm protocol.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A point in the control flow of the protocol or of a role's view of it.
///
/// Locations have no identity beyond their name; they exist because events
/// start or end at them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    /// Create a location with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the location name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Location {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Location {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named event type moving the protocol from `source` to `target`.
///
/// Equality compares all four fields, so two edges between the same pair of
/// locations stay distinct. Hashing only looks at the name; names are unique
/// within a protocol.
///
/// # Examples
///
/// ```
/// use swarmlog_types::Event;
///
/// let request = Event::new("request", "S0", "S1", "Client");
/// assert_eq!(request.name(), "request");
/// assert_eq!(request.role(), "Client");
/// assert!(!request.is_self_loop());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Event {
    name: String,
    source: Location,
    target: Location,
    role: String,
}

impl Event {
    /// Create a new event
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: impl Into<Location>,
        target: impl Into<Location>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            role: role.into(),
        }
    }

    /// Get the globally unique event name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the location the event leaves
    #[must_use]
    pub fn source(&self) -> &Location {
        &self.source
    }

    /// Get the location the event enters
    #[must_use]
    pub fn target(&self) -> &Location {
        &self.target
    }

    /// Get the role that emits this event
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Check whether the event starts and ends at the same location
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Same event, redirected to a different target location.
    #[must_use]
    pub fn retargeted(&self, target: Location) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }
}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}: {} -> {}",
            self.name, self.role, self.source, self.target
        )
    }
}

/// Dense integer identifier of an event type.
///
/// Assigned once per build by the numbering layer. Automata compare these
/// instead of names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub usize);

impl EventId {
    /// Get the id as a table index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
