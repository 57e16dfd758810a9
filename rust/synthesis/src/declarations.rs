//! Global declarations of an assembled model.
//!
//! Every shared table, counter and channel is declared here, once, so the
//! owner and size of each piece of shared state can be read off the model.

use crate::context::SynthesisContext;
use crate::names;
use swarmlog_automata::{Declaration, Expression, Initializer, Type};
use swarmlog_theory::numbering::NONE;
use swarmlog_types::LoopBounding;

/// Name of the log record type
pub const LOG_ENTRY_TYPE: &str = "logEntryType";

fn int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn var(name: &str) -> Expression {
    Expression::var(name)
}

fn entry_type() -> Type {
    Type::Named(LOG_ENTRY_TYPE.to_string())
}

/// Log-sized array of entries
fn entry_log(name: &str) -> Declaration {
    Declaration::array(entry_type(), name, vec![var("logSize")], None)
}

/// Log-sized array of order counts, all unset
fn order_list(name: &str, log_size: usize) -> Declaration {
    Declaration::array(
        Type::Int,
        name,
        vec![var("logSize")],
        Some(Initializer::ints(std::iter::repeat(NONE).take(log_size))),
    )
}

/// `int name[amountOfLogs][amountOfUniqueEvents];`
fn per_instance_event_counter(name: &str) -> Declaration {
    Declaration::array(
        Type::Int,
        name,
        vec![var("amountOfLogs"), var("amountOfUniqueEvents")],
        None,
    )
}

pub(crate) fn global_declarations(context: &SynthesisContext<'_>) -> Vec<Declaration> {
    let settings = context.settings;
    let tables = context.tables;
    let mut declarations = vec![
        Declaration::bool_constant("branchTrackingEnabled", settings.branch_tracking),
        Declaration::bool_constant("standardSetting", settings.standard_setting),
        Declaration::int_constant("logSize", int(settings.log_size)),
        Declaration::typedef(
            "logSize_t",
            Type::Range(Expression::int(0), var("logSize").minus(Expression::int(1))),
        ),
        Declaration::typedef(
            LOG_ENTRY_TYPE,
            Type::Struct(vec![
                (Type::Int, "eventID".into()),
                (Type::Int, "emitterID".into()),
                (Type::Int, "orderCount".into()),
                (Type::Int, "basedOnOrderCount".into()),
                (Type::Int, "tiedTo".into()),
                (Type::Bool, "ignored".into()),
            ]),
        ),
    ];

    for role in context.layout.roles() {
        let count = context.layout.count(role).unwrap_or(0);
        let count_name = names::instance_count(role);
        declarations.push(Declaration::int_constant(&count_name, int(count)));
        declarations.push(Declaration::typedef(
            names::instance_type(role),
            Type::Range(Expression::int(0), var(&count_name).minus(Expression::int(1))),
        ));
    }
    declarations.push(Declaration::int_constant(
        "amountOfLogs",
        int(context.layout.total()),
    ));

    declarations.extend(event_tables(context));
    declarations.extend(log_state(context));

    declarations.push(Declaration::int_constant("loopBound", i64::from(settings.loop_bound)));
    match settings.loop_bounding {
        LoopBounding::RoleLocal => declarations.push(per_instance_event_counter("loopCounter")),
        LoopBounding::Global => declarations.push(Declaration::array(
            Type::Int,
            "loopCountMap",
            vec![var("amountOfUniqueEvents")],
            None,
        )),
    }
    if let Some(path_bound) = settings.path_bound {
        declarations.push(Declaration::int_constant("pathBound", i64::from(path_bound)));
        declarations.push(per_instance_event_counter("nonExitCounterMap"));
    }

    declarations.push(Declaration::variable(
        Type::Int,
        "currentLogToPropagate",
        Some(Expression::int(0)),
    ));
    declarations.push(Declaration::variable(
        Type::Int,
        "amountOfPropagation",
        Some(Expression::int(0)),
    ));
    for role in context.layout.roles() {
        declarations.push(Declaration::int_constant(
            names::max_updates(role),
            i64::from(settings.delay_threshold(role)),
        ));
    }
    if settings.uses_global_event_bound() {
        declarations.push(Declaration::array(
            Type::Int,
            "globalUpdatesSincePropagation",
            vec![var("amountOfLogs")],
            None,
        ));
        declarations.push(Declaration::array(
            Type::Bool,
            "forcedToPropagate",
            vec![var("amountOfLogs")],
            None,
        ));
        declarations.push(Declaration::variable(
            Type::Bool,
            "anyForcedToPropagate",
            Some(Expression::Boolean(false)),
        ));
    }

    if context.is_timed() {
        declarations.push(Declaration::variable(Type::Clock, "globalTime", None));
    }

    declarations.extend(channels(context));

    tracing::debug!(
        declarations = declarations.len(),
        events = tables.numbering.len(),
        "built global declarations"
    );
    declarations
}

fn event_tables(context: &SynthesisContext<'_>) -> Vec<Declaration> {
    let tables = context.tables;
    let mut declarations: Vec<Declaration> = tables
        .numbering
        .iter()
        .map(|(id, name)| Declaration::int_constant(names::event_id(name), int(id.index())))
        .collect();

    declarations.push(Declaration::int_constant(
        "amountOfUniqueEvents",
        int(tables.numbering.len()),
    ));
    declarations.push(Declaration::int_constant(
        "maxAmountOfTied",
        int(tables.tied_to.width()),
    ));
    declarations.push(Declaration::constant_array(
        Type::Int,
        "eventsTiedTo",
        vec![var("amountOfUniqueEvents"), var("maxAmountOfTied")],
        Initializer::table(tables.tied_to.padded_rows()),
    ));

    let partitions = tables.branches.padded_rows();
    declarations.push(Declaration::int_constant(
        "amountOfBranchPartitions",
        int(partitions.len()),
    ));
    declarations.push(Declaration::int_constant(
        "maxBranchWidth",
        int(tables.branches.width()),
    ));
    declarations.push(Declaration::constant_array(
        Type::Int,
        "branchPartitions",
        vec![var("amountOfBranchPartitions"), var("maxBranchWidth")],
        Initializer::table(partitions),
    ));
    declarations.push(Declaration::constant_array(
        Type::Bool,
        "isBranchingList",
        vec![var("amountOfUniqueEvents")],
        Initializer::bools(tables.branches.is_branching_row()),
    ));
    declarations.push(Declaration::constant_array(
        Type::Int,
        "branchPartitionOf",
        vec![var("amountOfUniqueEvents")],
        Initializer::ints(tables.branches.partition_row()),
    ));

    let flow = &tables.global_flow;
    declarations.push(Declaration::variable(
        Type::Int,
        "globalCurrentLocation",
        Some(Expression::int(flow.initial())),
    ));
    declarations.push(Declaration::constant_array(
        Type::Int,
        "globalEventLocationMap",
        vec![var("amountOfUniqueEvents"), Expression::int(2)],
        Initializer::table(flow.raw_rows()),
    ));
    declarations
}

fn log_state(context: &SynthesisContext<'_>) -> Vec<Declaration> {
    let log_size = context.settings.log_size;
    vec![
        Declaration::variable(Type::Int, "eventOrderCounter", Some(Expression::int(1))),
        Declaration::variable(entry_type(), "tempLogEntry", None),
        Declaration::variable(
            Type::Int,
            "currentLogEntryEmitterID",
            Some(Expression::Number(NONE)),
        ),
        entry_log("propagationLog"),
        entry_log("globalLog"),
        Declaration::variable(Type::Int, "globalLogIndex", Some(Expression::int(0))),
        entry_log("trueGlobalLog"),
        order_list("trueDiscardedEvents", log_size),
        order_list("trueDiscardedDueToCompetionEvents", log_size),
        Declaration::variable(Type::Int, "trueCurrentIndex", Some(Expression::int(0))),
        Declaration::variable(Type::Int, "currentEventResetID", Some(Expression::Number(NONE))),
        Declaration::variable(Type::Bool, "logOverflow", Some(Expression::Boolean(false))),
    ]
}

fn channels(context: &SynthesisContext<'_>) -> Vec<Declaration> {
    let mut declarations = vec![
        Declaration::channel(names::PROPAGATE_LOG, true, true, vec![]),
        Declaration::channel(names::OVERFLOW, false, true, vec![]),
    ];
    if context.settings.uses_global_event_bound() {
        declarations.push(Declaration::channel(names::FORCE_PROPAGATE, true, true, vec![]));
    }

    for role in context.layout.roles() {
        let index = vec![var(&names::instance_type(role))];
        declarations.push(Declaration::channel(
            names::emit_channel(role),
            false,
            false,
            index.clone(),
        ));
        declarations.push(Declaration::channel(
            names::backtrack_channel(role),
            false,
            false,
            index.clone(),
        ));
        let Some(projection) = context.projections.get(role) else {
            continue;
        };
        for event in projection.events() {
            declarations.push(Declaration::channel(
                names::advance_channel(role, event.name()),
                false,
                true,
                index.clone(),
            ));
        }
    }
    declarations
}
