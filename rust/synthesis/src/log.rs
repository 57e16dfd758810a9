//! Log automata: one template per role, instantiated once per instance.
//!
//! A log waits in `idle` for three things: an emission from its role
//! instance, a propagated log addressed to it, or its own decision to
//! propagate pending updates. Every bookkeeping step after that runs through
//! committed locations, so insertion, merging, backtracking and delivery
//! appear atomic to the verifier.
//!
//! ```text
//!  idle --do_log_update?--> accepting --(policy)--> propagating --propagate_log!--> idle
//!  idle --propagate_log?--> merging --> backtracking <--> retracting
//!                             |              |
//!                             +--> reading <-+ <--> delivering
//!                                     +--propagate_log!--> idle
//!  accepting --chan_overflow!--> overflow
//! ```
//!
//! A log with propagation timing rests in a committed `start` location and
//! waits for its propagation window in `waiting`.

use crate::context::SynthesisContext;
use crate::declarations::LOG_ENTRY_TYPE;
use crate::error::SynthesisError;
use crate::functions::LogFunction;
use crate::names;
use swarmlog_automata::{
    Automaton, Declaration, Edge, Expression, Initializer, Location, LocationIndex, SyncLabel,
    Type, Update,
};
use swarmlog_theory::numbering::NONE;
use swarmlog_theory::FlowMap;
use swarmlog_types::{DelayPolicy, RoleProjection};

pub const IDLE: &str = "idle";
pub const ACCEPTING: &str = "accepting";
pub const PROPAGATING: &str = "propagating";
pub const MERGING: &str = "merging";
pub const BACKTRACKING: &str = "backtracking";
pub const RETRACTING: &str = "retracting";
pub const READING: &str = "reading";
pub const DELIVERING: &str = "delivering";
pub const OVERFLOW: &str = "overflow";
pub const START: &str = "start";
pub const WAITING: &str = "waiting";

/// The synthesized log template of one role.
#[derive(Debug, Clone)]
pub struct LogAutomaton {
    role: String,
    automaton: Automaton,
    functions: Vec<LogFunction>,
    flow: FlowMap,
}

fn var(name: &str) -> Expression {
    Expression::var(name)
}

fn assign(target: &str, value: Expression) -> Update {
    Update::assign(var(target), value)
}

fn int(value: usize) -> Expression {
    Expression::int(value)
}

/// Global id of this log
fn me() -> Expression {
    var("log_id_start").plus(var("id"))
}

fn log_slot(field: &str) -> Expression {
    var("currentLog").at(var("counter")).field(field.to_string())
}

fn unset_list(name: &str, log_size: usize) -> Declaration {
    Declaration::array(
        Type::Int,
        name,
        vec![var("logSize")],
        Some(Initializer::ints(std::iter::repeat(NONE).take(log_size))),
    )
}

/// Resting and waiting locations plus the per-log flags that shape edges.
struct Shape {
    idle: LocationIndex,
    rest: LocationIndex,
    wait: LocationIndex,
    timed: bool,
    policy: DelayPolicy,
}

impl LogAutomaton {
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
        let numbering = &context.tables.numbering;
        let flow = FlowMap::for_projection(projection, numbering);
        let functions = LogFunction::local_set(projection, numbering);
        let log_timing = context.log_timing(role);
        let policy = context.settings.delay(role).unwrap_or(DelayPolicy::Nothing);

        let mut automaton = Automaton::new(names::log_template(role))
            .with_parameter(format!("{} id", names::instance_type(role)));
        declare_locals(&mut automaton, context, projection, &flow, offset);
        if log_timing.is_some() {
            automaton.declare(Declaration::variable(Type::Clock, "x", None));
        }

        let idle = automaton.add_location(Location::new(IDLE))?;
        let accepting = automaton.add_location(Location::committed(ACCEPTING))?;
        let propagating = automaton.add_location(Location::committed(PROPAGATING))?;
        let merging = automaton.add_location(Location::committed(MERGING))?;
        let backtracking = automaton.add_location(Location::committed(BACKTRACKING))?;
        let retracting = automaton.add_location(Location::committed(RETRACTING))?;
        let reading = automaton.add_location(Location::committed(READING))?;
        let delivering = automaton.add_location(Location::committed(DELIVERING))?;
        let overflow = automaton.add_location(Location::new(OVERFLOW))?;

        let shape = match log_timing {
            Some(timing) => {
                let start = automaton.add_location(Location::committed(START))?;
                let mut waiting = Location::new(WAITING);
                if let Some(max) = timing.max_time {
                    waiting = waiting.with_invariant(var("x").less_eq(Expression::int(max)));
                }
                let waiting = automaton.add_location(waiting)?;
                automaton.add_edge(start, idle, Edge::new().when(var("newUpdates").negate()))?;
                automaton.add_edge(start, waiting, Edge::new().when(var("newUpdates")))?;
                Shape {
                    idle,
                    rest: start,
                    wait: waiting,
                    timed: true,
                    policy,
                }
            }
            None => Shape {
                idle,
                rest: idle,
                wait: idle,
                timed: false,
                policy,
            },
        };
        automaton.set_initial(shape.rest)?;

        let waiting_locations: Vec<LocationIndex> = if shape.timed {
            vec![shape.idle, shape.wait]
        } else {
            vec![shape.idle]
        };

        // Emission, merge and overflow are accepted wherever the log waits.
        for &from in &waiting_locations {
            automaton.add_edge(from, accepting, accept_edge(role))?;
            automaton.add_edge(
                from,
                merging,
                Edge::new()
                    .when(var("currentLogToPropagate").equals(me()))
                    .sync(SyncLabel::receive(names::PROPAGATE_LOG))
                    .update(LogFunction::MergePropagationLog.update(vec![])),
            )?;
            automaton.add_edge(
                from,
                overflow,
                Edge::new().sync(SyncLabel::receive(names::OVERFLOW)),
            )?;
            if shape.policy == DelayPolicy::EventsEmitted {
                automaton.add_edge(
                    from,
                    propagating,
                    Edge::new()
                        .when(var("forcedToPropagate").at(me()))
                        .sync(SyncLabel::receive(names::FORCE_PROPAGATE))
                        .updates(handoff(&shape)),
                )?;
            }
        }

        let mut propagate = Edge::new();
        if let Some(min) = log_timing.and_then(|timing| timing.min_time) {
            propagate = propagate.when(var("x").greater_eq(Expression::int(min)));
        }
        let propagate = propagate.when(var("newUpdates"));
        automaton.add_edge(shape.wait, propagating, propagate.updates(handoff(&shape)))?;
        automaton.add_edge(
            propagating,
            shape.rest,
            Edge::new().sync(SyncLabel::send(names::PROPAGATE_LOG)),
        )?;

        automaton.add_edge(
            accepting,
            overflow,
            Edge::new()
                .when(var("logOverflow"))
                .sync(SyncLabel::send(names::OVERFLOW)),
        )?;
        for (to, edge) in accept_exits(role, &shape, propagating) {
            automaton.add_edge(accepting, to, edge)?;
        }

        add_merge_edges(
            &mut automaton,
            context,
            role,
            projection,
            &shape,
            [merging, backtracking, retracting, reading, delivering],
        )?;

        let (location_count, edge_count) = automaton.size();
        tracing::debug!(
            role,
            ?policy,
            timed = shape.timed,
            locations = location_count,
            edges = edge_count,
            "synthesized log automaton"
        );

        Ok(Self {
            role: role.to_string(),
            automaton,
            functions,
            flow,
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

    /// Template-local functions
    #[must_use]
    pub fn functions(&self) -> &[LogFunction] {
        &self.functions
    }

    /// Flow map of the role's projected view, as declared in
    /// `eventLocationMap`
    #[must_use]
    pub fn flow(&self) -> &FlowMap {
        &self.flow
    }
}

fn declare_locals(
    automaton: &mut Automaton,
    context: &SynthesisContext<'_>,
    projection: &RoleProjection,
    flow: &FlowMap,
    offset: usize,
) {
    let log_size = context.settings.log_size;
    let numbering = &context.tables.numbering;
    let mut subscriptions: Vec<i64> = projection
        .subscriptions()
        .iter()
        .filter_map(|name| numbering.id(name))
        .filter_map(|id| i64::try_from(id.index()).ok())
        .collect();
    subscriptions.resize(numbering.len().max(subscriptions.len()), NONE);

    let locals = [
        Declaration::int_constant("log_id_start", i64::try_from(offset).unwrap_or(NONE)),
        Declaration::array(
            Type::Named(LOG_ENTRY_TYPE.to_string()),
            "currentLog",
            vec![var("logSize")],
            None,
        ),
        Declaration::variable(Type::Int, "updatesSincePropagation", Some(int(0))),
        Declaration::variable(Type::Bool, "newUpdates", Some(Expression::Boolean(false))),
        Declaration::variable(Type::Int, "counter", Some(int(0))),
        unset_list("emittedOrderCounts", log_size),
        unset_list("discardedEvents", log_size),
        unset_list("discardedDueToCompetionEvents", log_size),
        Declaration::variable(Type::Bool, "backTracking", Some(Expression::Boolean(false))),
        Declaration::variable(Type::Bool, "didLogChange", Some(Expression::Boolean(false))),
        Declaration::variable(Type::Int, "currentSizeOfLog", Some(int(0))),
        unset_list("discardedEventIDs", log_size),
        Declaration::variable(Type::Int, "resetCount", Some(int(0))),
        Declaration::variable(Type::Int, "eventsToRead", Some(int(0))),
        Declaration::constant_array(
            Type::Int,
            "subscriptions",
            vec![var("amountOfUniqueEvents")],
            Initializer::ints(subscriptions),
        ),
        Declaration::int_constant("initialLocation", i64::try_from(flow.initial()).unwrap_or(NONE)),
        Declaration::variable(Type::Int, "currentLocation", Some(int(flow.initial()))),
        Declaration::constant_array(
            Type::Int,
            "eventLocationMap",
            vec![var("amountOfUniqueEvents"), Expression::int(2)],
            Initializer::table(flow.raw_rows()),
        ),
    ];
    for declaration in locals {
        automaton.declare(declaration);
    }
}

fn accept_edge(role: &str) -> Edge {
    Edge::new()
        .sync(SyncLabel::receive(names::emit_channel(role)).at(var("id")))
        .updates([
            LogFunction::UpdateLog.update(vec![var("currentLog"), var("emittedOrderCounts"), me()]),
            Update::Increment(var("updatesSincePropagation")),
            assign("newUpdates", Expression::Boolean(true)),
            Update::Increment(var("currentSizeOfLog")),
        ])
}

/// Hand the token to the next log and publish the local view.
fn handoff(shape: &Shape) -> Vec<Update> {
    let mut updates = Vec::new();
    if shape.timed {
        updates.push(assign("x", int(0)));
    }
    updates.extend([
        assign(
            "currentLogToPropagate",
            me().plus(int(1)).modulo(var("amountOfLogs")),
        ),
        assign("updatesSincePropagation", int(0)),
        assign("newUpdates", Expression::Boolean(false)),
        LogFunction::SetPropagationLog.update(vec![var("currentLog")]),
    ]);
    if shape.policy == DelayPolicy::EventsEmitted {
        updates.extend([
            Update::assign(var("globalUpdatesSincePropagation").at(me()), int(0)),
            Update::assign(var("forcedToPropagate").at(me()), Expression::Boolean(false)),
            LogFunction::CalculateAnyForcedToPropagate.update(vec![]),
        ]);
    }
    updates
}

/// Edges back to the resting location. A timed log restarts its clock on
/// the first update since it last propagated.
fn rest_edges(shape: &Shape, guard: Expression) -> Vec<(LocationIndex, Edge)> {
    if !shape.timed {
        return vec![(shape.rest, Edge::new().when(guard))];
    }
    let first = var("updatesSincePropagation").equals(int(1));
    vec![
        (
            shape.rest,
            Edge::new()
                .when(guard.clone())
                .when(first.clone())
                .update(assign("x", int(0))),
        ),
        (shape.rest, Edge::new().when(guard).when(first.negate())),
    ]
}

/// Leaving `accepting` without overflow, according to the delay policy.
fn accept_exits(
    role: &str,
    shape: &Shape,
    propagating: LocationIndex,
) -> Vec<(LocationIndex, Edge)> {
    let fits = var("logOverflow").negate();
    let threshold_exceeded = var("updatesSincePropagation").greater(var(&names::max_updates(role)));
    match (shape.policy, shape.timed) {
        (DelayPolicy::Nothing, false) => vec![(
            propagating,
            Edge::new().when(fits).updates(handoff(shape)),
        )],
        (DelayPolicy::Nothing, true) => rest_edges(shape, fits),
        (DelayPolicy::EventsSelfEmitted, _) => {
            let mut exits = vec![(
                propagating,
                Edge::new()
                    .when(fits.clone())
                    .when(threshold_exceeded.clone())
                    .updates(handoff(shape)),
            )];
            exits.extend(rest_edges(shape, fits.and(threshold_exceeded.negate())));
            exits
        }
        (DelayPolicy::EventsEmitted, _) => {
            let forced = var("forcedToPropagate").at(me());
            let any_forced = var("anyForcedToPropagate");
            let mut exits = vec![(
                propagating,
                Edge::new()
                    .when(fits.clone())
                    .when(forced.clone())
                    .updates(handoff(shape)),
            )];
            for (to, edge) in rest_edges(
                shape,
                fits.clone().and(forced.negate()).and(any_forced.clone()),
            ) {
                exits.push((to, edge.sync(SyncLabel::send(names::FORCE_PROPAGATE))));
            }
            exits.extend(rest_edges(shape, fits.and(any_forced.negate())));
            exits
        }
    }
}

fn add_merge_edges(
    automaton: &mut Automaton,
    context: &SynthesisContext<'_>,
    role: &str,
    projection: &RoleProjection,
    shape: &Shape,
    [merging, backtracking, retracting, reading, delivering]: [LocationIndex; 5],
) -> Result<(), SynthesisError> {
    let changed = var("didLogChange");
    let pending_resets = var("resetCount").not_equals(int(0));
    let start_reading = assign("counter", var("currentSizeOfLog").minus(var("eventsToRead")));
    let next_log = LogFunction::SetNextLogToPropagate.update(vec![]);

    automaton.add_edge(
        merging,
        backtracking,
        Edge::new()
            .when(changed.clone().and(pending_resets.clone()))
            .updates([
                start_reading.clone(),
                next_log.clone(),
                assign("backTracking", Expression::Boolean(true)),
            ]),
    )?;
    automaton.add_edge(
        merging,
        reading,
        Edge::new()
            .when(changed.negate().or(var("resetCount").equals(int(0))))
            .updates([start_reading, next_log]),
    )?;

    let last_reset = var("discardedEventIDs").at(var("resetCount").minus(int(1)));
    let consume_reset = [
        Update::assign(last_reset.clone(), Expression::Number(NONE)),
        Update::Decrement(var("resetCount")),
    ];
    automaton.add_edge(
        backtracking,
        retracting,
        Edge::new()
            .when(pending_resets)
            .update(assign("currentEventResetID", last_reset)),
    )?;
    let subscribed_reset = LogFunction::IsInSubscriptions
        .call(vec![var("subscriptions"), var("currentEventResetID")]);
    automaton.add_edge(
        retracting,
        backtracking,
        Edge::new()
            .when(subscribed_reset.clone())
            .sync(SyncLabel::send(names::backtrack_channel(role)).at(var("id")))
            .updates(consume_reset.clone()),
    )?;
    automaton.add_edge(
        retracting,
        backtracking,
        Edge::new()
            .when(subscribed_reset.negate())
            .updates(consume_reset),
    )?;
    automaton.add_edge(
        backtracking,
        reading,
        Edge::new().when(var("resetCount").equals(int(0))),
    )?;

    let at_end = var("counter")
        .equals(var("logSize"))
        .or(log_slot("orderCount").equals(int(0)));
    automaton.add_edge(
        reading,
        shape.rest,
        Edge::new()
            .when(at_end.clone())
            .sync(SyncLabel::send(names::PROPAGATE_LOG))
            .updates([
                assign("didLogChange", Expression::Boolean(false)),
                assign("backTracking", Expression::Boolean(false)),
                assign("eventsToRead", int(0)),
            ]),
    )?;
    automaton.add_edge(reading, delivering, Edge::new().when(at_end.negate()))?;

    for event in projection.events() {
        automaton.add_edge(
            delivering,
            reading,
            Edge::new()
                .when(log_slot("eventID").equals(context.id(event.name())))
                .sync(
                    SyncLabel::send(names::advance_channel(role, event.name())).at(var("id")),
                )
                .update(Update::Increment(var("counter"))),
        )?;
    }
    automaton.add_edge(
        delivering,
        reading,
        Edge::new()
            .when(
                LogFunction::IsInSubscriptions
                    .call(vec![var("subscriptions"), log_slot("eventID")])
                    .negate(),
            )
            .update(Update::Increment(var("counter"))),
    )?;
    Ok(())
}
