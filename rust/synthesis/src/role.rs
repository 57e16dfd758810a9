//! Role automata: one template per role, instantiated once per instance.
//!
//! Locations are the role's projected locations. Every subscribed event gets
//! an advance edge (source to target, driven by the log) and a backtrack edge
//! (target to source, driven by a retraction). Own events additionally get an
//! emission edge that hands a pending entry to the role's log.

use crate::context::SynthesisContext;
use crate::error::SynthesisError;
use crate::functions::LogFunction;
use crate::names;
use std::collections::BTreeMap;
use swarmlog_automata::{
    Automaton, Declaration, Edge, EdgeIndex, Expression, Location, LocationIndex, SyncLabel, Type,
    Update,
};
use swarmlog_theory::numbering::NONE;
use swarmlog_types::{Event, EventId, Location as ProtocolLocation, LoopBounding, RoleProjection};

/// Marker for "resolve the causal predecessor on insertion"
const UNRESOLVED: i64 = -2;

/// Edges synthesized for one subscribed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEdges {
    pub advance: EdgeIndex,
    pub backtrack: EdgeIndex,
    /// Present for own events only
    pub emit: Option<EdgeIndex>,
}

/// The synthesized template of one role.
#[derive(Debug, Clone)]
pub struct RoleAutomaton {
    role: String,
    automaton: Automaton,
    initial: LocationIndex,
    locations: BTreeMap<String, LocationIndex>,
    edges: BTreeMap<EventId, EventEdges>,
}

fn instance() -> Expression {
    Expression::var("log_id_start").plus(Expression::var("id"))
}

fn clock() -> Expression {
    Expression::var("x")
}

fn clock_reset() -> Update {
    Update::assign(clock(), Expression::int(0))
}

/// Counter gating re-entry of a loop event
fn loop_counter(context: &SynthesisContext<'_>, event: &str) -> Expression {
    match context.settings.loop_bounding {
        LoopBounding::RoleLocal => Expression::var("loopCounter")
            .at(instance())
            .at(context.id(event)),
        LoopBounding::Global => Expression::var("loopCountMap").at(context.id(event)),
    }
}

/// Counter of emissions that lead away from every exit path
fn non_exit_counter(context: &SynthesisContext<'_>, event: &str) -> Expression {
    Expression::var("nonExitCounterMap")
        .at(instance())
        .at(context.id(event))
}

/// Whether `event` can no longer be emitted by this instance
fn exhausted(context: &SynthesisContext<'_>, event: &str) -> Option<Expression> {
    let mut reasons = Vec::new();
    if context.is_loop_event(event) {
        reasons.push(loop_counter(context, event).equals(Expression::var("loopBound")));
    }
    if context.is_path_bounded(event) {
        reasons.push(non_exit_counter(context, event).equals(Expression::var("pathBound")));
    }
    (!reasons.is_empty()).then(|| Expression::any(reasons))
}

/// Kind and invariant of a location from all own events leaving it.
///
/// Untimed locations with own events are urgent. Timed ones may wait up to
/// the latest deadline of their own events, or indefinitely once any
/// bounded branch has been used up.
fn location_for(
    context: &SynthesisContext<'_>,
    location: &ProtocolLocation,
    own_outgoing: &[&Event],
) -> Location {
    let name = names::location(location.as_str());
    if own_outgoing.is_empty() {
        return Location::new(name);
    }
    if !context.is_timed() {
        return Location::urgent(name);
    }

    let deadlines: Option<Vec<u32>> = own_outgoing
        .iter()
        .map(|event| context.event_timing(event.name()).and_then(|t| t.max_time))
        .collect();
    let Some(deadline) = deadlines.and_then(|deadlines| deadlines.into_iter().max()) else {
        return Location::new(name);
    };

    let time_bound = clock().less_eq(Expression::int(deadline));
    let releases = own_outgoing
        .iter()
        .filter_map(|event| exhausted(context, event.name()));
    Location::new(name)
        .with_invariant(Expression::any(std::iter::once(time_bound).chain(releases)))
}

impl RoleAutomaton {
    pub(crate) fn build(
        context: &SynthesisContext<'_>,
        projection: &RoleProjection,
    ) -> Result<Self, SynthesisError> {
        let role = projection.name();
        let offset = context
            .layout
            .offset(role)
            .ok_or_else(|| SynthesisError::UnconfiguredRole {
                role: role.to_string(),
            })?;

        let mut automaton =
            Automaton::new(role).with_parameter(format!("{} id", names::instance_type(role)));
        automaton.declare(Declaration::int_constant(
            "log_id_start",
            i64::try_from(offset).unwrap_or(NONE),
        ));
        if context.is_timed() {
            automaton.declare(Declaration::variable(Type::Clock, "x", None));
        }

        let mut locations = projection.locations();
        locations.insert(projection.initial());
        let mut indices = BTreeMap::new();
        for location in locations {
            let own_outgoing: Vec<&Event> = projection
                .own_events()
                .iter()
                .filter(|event| event.source() == location)
                .collect();
            let index = automaton.add_location(location_for(context, location, &own_outgoing))?;
            indices.insert(location.as_str().to_string(), index);
        }
        let initial = indices
            .get(projection.initial().as_str())
            .copied()
            .ok_or_else(|| SynthesisError::UnknownProjectedEvent {
                role: role.to_string(),
                event: projection.initial().to_string(),
            })?;
        automaton.set_initial(initial)?;

        let mut edges = BTreeMap::new();
        for event in projection.events() {
            let id = context.tables.numbering.id(event.name()).ok_or_else(|| {
                SynthesisError::UnknownProjectedEvent {
                    role: role.to_string(),
                    event: event.name().to_string(),
                }
            })?;
            let (Some(&source), Some(&target)) = (
                indices.get(event.source().as_str()),
                indices.get(event.target().as_str()),
            ) else {
                continue;
            };

            let resets = context.is_timed().then(clock_reset);
            let backtrack = Edge::new()
                .when(Expression::var("currentEventResetID").equals(context.id(event.name())))
                .sync(
                    SyncLabel::receive(names::backtrack_channel(role)).at(Expression::var("id")),
                )
                .updates(resets.clone());
            let backtrack = automaton.add_edge(target, source, backtrack)?;

            let advance = Edge::new()
                .sync(
                    SyncLabel::receive(names::advance_channel(role, event.name()))
                        .at(Expression::var("id")),
                )
                .updates(resets);
            let advance = automaton.add_edge(source, target, advance)?;

            let emit = if projection.owns(event.name()) {
                Some(automaton.add_edge(source, target, emission_edge(context, role, event))?)
            } else {
                None
            };

            edges.insert(
                id,
                EventEdges {
                    advance,
                    backtrack,
                    emit,
                },
            );
        }

        let (location_count, edge_count) = automaton.size();
        tracing::debug!(
            role,
            locations = location_count,
            edges = edge_count,
            "synthesized role automaton"
        );

        Ok(Self {
            role: role.to_string(),
            automaton,
            initial,
            locations: indices,
            edges,
        })
    }

    /// Get the role name
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    #[must_use]
    pub fn initial(&self) -> LocationIndex {
        self.initial
    }

    /// Edges of a subscribed event
    #[must_use]
    pub fn edges(&self, id: EventId) -> Option<EventEdges> {
        self.edges.get(&id).copied()
    }

    /// Subscribed events with their edges, in id order.
    pub fn events(&self) -> impl Iterator<Item = (EventId, EventEdges)> + '_ {
        self.edges.iter().map(|(id, edges)| (*id, *edges))
    }

    /// Automaton location standing for a protocol location
    #[must_use]
    pub fn location(&self, protocol_location: &str) -> Option<LocationIndex> {
        self.locations.get(protocol_location).copied()
    }

    /// Protocol location an automaton location stands for
    #[must_use]
    pub fn protocol_location(&self, index: LocationIndex) -> Option<&str> {
        self.locations
            .iter()
            .find(|(_, &candidate)| candidate == index)
            .map(|(name, _)| name.as_str())
    }
}

fn emission_edge(context: &SynthesisContext<'_>, role: &str, event: &Event) -> Edge {
    let name = event.name();
    let mut edge = Edge::new();
    let mut updates = Vec::new();

    if let Some(timing) = context.event_timing(name) {
        if let Some(min) = timing.min_time {
            edge = edge.when(clock().greater_eq(Expression::int(min)));
        }
        if let Some(max) = timing.max_time {
            edge = edge.when(clock().less_eq(Expression::int(max)));
        }
    }
    if context.is_timed() {
        updates.push(clock_reset());
    }

    updates.push(LogFunction::SetLogEntryForUpdate.update(vec![
        context.id(name),
        instance(),
        Expression::Number(UNRESOLVED),
        Expression::Boolean(false),
    ]));

    if context.is_loop_event(name) {
        let counter = loop_counter(context, name);
        edge = edge.when(counter.clone().less(Expression::var("loopBound")));
        updates.push(Update::Increment(counter));
    }
    if context.is_path_bounded(name) {
        let counter = non_exit_counter(context, name);
        edge = edge.when(counter.clone().less(Expression::var("pathBound")));
        updates.push(Update::Increment(counter));
    }

    edge.sync(SyncLabel::send(names::emit_channel(role)).at(Expression::var("id")))
        .updates(updates)
}
