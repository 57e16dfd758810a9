//! Projection of the Global Protocol onto Roles
//!
//! A role tracks only the part of the protocol it needs to act correctly:
//!
//! - its **own** events
//! - the events **preceding** its own events, so it knows when it may act
//! - the events of every **necessary branch**, a branch partition from whose
//!   source location one of its own events is reachable
//!
//! Every other event is spliced out of a copy of the graph: edges pointing
//! at the excluded event's source are redirected to its target, and the
//! initial location moves past excluded prefix events. The result keeps the
//! projected subgraph connected.
//!
//! ```
//! use swarmlog_theory::Projector;
//! use swarmlog_types::{Event, ProtocolGraph};
//!
//! let graph = ProtocolGraph::new(
//!     "S0",
//!     vec![
//!         Event::new("warmup", "S0", "S1", "Other"),
//!         Event::new("idle", "S1", "S2", "Other"),
//!         Event::new("work", "S2", "S3", "Worker"),
//!     ],
//! )
//! .unwrap();
//!
//! let projection = Projector::new(&graph).project("Worker").unwrap();
//! assert_eq!(projection.initial().as_str(), "S1");
//! assert_eq!(projection.other_events()[0].name(), "idle");
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use swarmlog_types::{Event, Location, ProtocolGraph, RoleProjection};
use thiserror::Error;

/// Errors that can occur during projection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// The role emits no event of the protocol
    #[error("role '{role}' owns no events in the protocol")]
    UnknownRole { role: String },
}

/// Computes role projections of one protocol graph.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'g> {
    graph: &'g ProtocolGraph,
}

impl<'g> Projector<'g> {
    #[must_use]
    pub fn new(graph: &'g ProtocolGraph) -> Self {
        Self { graph }
    }

    /// All events reachable by directed traversal from `location`.
    #[must_use]
    pub fn reachable_events(&self, location: &Location) -> BTreeSet<&'g Event> {
        let mut reached = BTreeSet::new();
        let mut seen: BTreeSet<&Location> = BTreeSet::new();
        let mut queue: VecDeque<&Location> = VecDeque::new();
        seen.insert(location);
        queue.push_back(location);

        while let Some(current) = queue.pop_front() {
            for event in self.graph.outgoing(current) {
                reached.insert(event);
                if seen.insert(event.target()) {
                    queue.push_back(event.target());
                }
            }
        }

        reached
    }

    /// Branch partitions `role` must observe: those whose source location
    /// reaches one of the role's own events.
    #[must_use]
    pub fn necessary_branch_events(&self, role: &str) -> BTreeSet<&'g Event> {
        let mut partitions: BTreeMap<&Location, Vec<&'g Event>> = BTreeMap::new();
        for event in self.graph.events() {
            if self.graph.out_degree(event.source()) > 1 {
                partitions.entry(event.source()).or_default().push(event);
            }
        }

        partitions
            .into_iter()
            .filter(|(source, _)| {
                self.reachable_events(source)
                    .iter()
                    .any(|event| event.role() == role)
            })
            .flat_map(|(_, events)| events)
            .collect()
    }

    /// Project the protocol onto `role`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UnknownRole`] when the role owns no event.
    pub fn project(&self, role: &str) -> Result<RoleProjection, ProjectionError> {
        let own: BTreeSet<&Event> = self.graph.events_of(role).collect();
        if own.is_empty() {
            return Err(ProjectionError::UnknownRole {
                role: role.to_string(),
            });
        }

        let own_sources: BTreeSet<&Location> = own.iter().map(|event| event.source()).collect();
        let mut kept: BTreeSet<&str> = own.iter().map(|event| event.name()).collect();
        kept.extend(
            self.graph
                .events()
                .iter()
                .filter(|event| own_sources.contains(event.target()))
                .map(Event::name),
        );
        kept.extend(self.necessary_branch_events(role).into_iter().map(Event::name));

        let mut initial = self.graph.initial().clone();
        let mut working: Vec<Event> = self.graph.events().to_vec();
        for excluded in self.graph.events() {
            if kept.contains(excluded.name()) {
                continue;
            }
            let Some(index) = working.iter().position(|e| e.name() == excluded.name()) else {
                continue;
            };
            let removed = working.remove(index);
            if removed.source() == &initial {
                initial = removed.target().clone();
            }
            for event in &mut working {
                if event.target() == removed.source() {
                    *event = event.retargeted(removed.target().clone());
                }
            }
        }

        let projection = RoleProjection::new(role, initial, working);
        tracing::debug!(
            role,
            own = projection.own_events().len(),
            other = projection.other_events().len(),
            initial = %projection.initial(),
            "projected role"
        );
        Ok(projection)
    }

    /// Project onto every role owning events, in role-name order.
    ///
    /// # Errors
    ///
    /// Never fails for roles taken from the graph itself; the error type is
    /// shared with [`Projector::project`].
    pub fn project_all(&self) -> Result<BTreeMap<String, RoleProjection>, ProjectionError> {
        self.graph
            .roles()
            .into_iter()
            .map(|role| {
                self.project(role)
                    .map(|projection| (role.to_string(), projection))
            })
            .collect()
    }
}
