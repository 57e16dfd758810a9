//! Model assembly over the negotiation protocol.

use assert_matches::assert_matches;
use std::collections::BTreeSet;
use swarmlog_automata::{Automaton, LocationKind};
use swarmlog_synthesis::{log, LogFunction, Model, ModelBuilder, Query, SynthesisError};
use swarmlog_theory::AnalysisError;
use swarmlog_types::{
    ConfigError, DelayPolicy, Event, EventTiming, Location, LogTiming, ModelSettings,
    ProtocolGraph, RoleProjection, TimingData, TimingError,
};

/// Client/provider negotiation with a retry loop and a final choice.
fn negotiation() -> ProtocolGraph {
    ProtocolGraph::new(
        "S0",
        vec![
            Event::new("request", "S0", "S1", "C"),
            Event::new("accept", "S1", "S2", "P"),
            Event::new("reject", "S1", "S0", "P"),
            Event::new("confirm", "S2", "S3", "C"),
            Event::new("cancel", "S2", "S3", "P"),
        ],
    )
    .unwrap()
}

fn settings() -> ModelSettings {
    ModelSettings::uniform([("C", 2), ("P", 1)])
}

fn edge_labels(automaton: &Automaton) -> Vec<String> {
    automaton.edges().map(|(_, _, edge)| edge.to_string()).collect()
}

fn declared(model: &Model) -> Vec<String> {
    model.declarations().iter().map(ToString::to_string).collect()
}

#[test]
fn test_negotiation_model_structure() {
    let graph = negotiation();
    let model = ModelBuilder::new(&graph, settings()).build().unwrap();

    assert_eq!(model.system(), vec!["C", "P", "C_log", "P_log"]);
    assert_eq!(model.layout().offset("P"), Some(2));

    let client = model.role("C").unwrap();
    assert_eq!(client.automaton().parameter(), Some("C_t id"));
    let initial = client.initial();
    assert_eq!(client.protocol_location(initial), Some("S0"));

    let numbering = &model.tables().numbering;
    let request = numbering.id("request").unwrap();
    let accept = numbering.id("accept").unwrap();
    assert!(client.edges(request).unwrap().emit.is_some());
    assert!(client.edges(accept).unwrap().emit.is_none());

    // S0 has an own event of C and no timing, so C may not linger there.
    let s0 = client.location("S0").unwrap();
    assert_eq!(
        client.automaton().location(s0).unwrap().kind(),
        LocationKind::Urgent
    );
}

#[test]
fn test_emission_edge_guards_and_updates() {
    let graph = negotiation();
    let model = ModelBuilder::new(&graph, settings().with_path_bound(1))
        .build()
        .unwrap();
    let numbering = &model.tables().numbering;

    let client = model.role("C").unwrap();
    let emit = client.edges(numbering.id("request").unwrap()).unwrap().emit.unwrap();
    let (_, _, edge) = client.automaton().edge(emit).unwrap();
    let label = edge.to_string();
    assert!(label.contains("[loopCounter[log_id_start + id][request_ID] < loopBound]"));
    assert!(label.contains("do_log_update_C[id]!"));
    assert!(label.contains("setLogEntryForUpdate(request_ID, log_id_start + id, -2, false)"));
    assert!(label.contains("loopCounter[log_id_start + id][request_ID]++"));

    // reject loops back without reaching an exit, so it is also path bounded.
    let provider = model.role("P").unwrap();
    let emit = provider
        .edges(numbering.id("reject").unwrap())
        .unwrap()
        .emit
        .unwrap();
    let (_, _, edge) = provider.automaton().edge(emit).unwrap();
    assert!(edge
        .to_string()
        .contains("nonExitCounterMap[log_id_start + id][reject_ID] < pathBound"));

    let backtrack = provider
        .edges(numbering.id("reject").unwrap())
        .unwrap()
        .backtrack;
    let (from, to, edge) = provider.automaton().edge(backtrack).unwrap();
    assert_eq!(provider.protocol_location(from), Some("S0"));
    assert_eq!(provider.protocol_location(to), Some("S1"));
    assert_eq!(
        edge.to_string(),
        "[currentEventResetID == reject_ID] backtrack_P[id]?"
    );
}

#[test]
fn test_log_automaton_immediate_propagation() {
    let graph = negotiation();
    let model = ModelBuilder::new(&graph, settings()).build().unwrap();
    let log = model.log("C").unwrap();
    let automaton = log.automaton();

    assert_eq!(automaton.name(), "C_log");
    let initial = automaton.initial().unwrap();
    assert_eq!(automaton.location(initial).unwrap().name(), log::IDLE);
    assert!(automaton.find_location(log::OVERFLOW).is_some());
    assert!(automaton.find_location(log::START).is_none());

    let accepting = automaton.find_location(log::ACCEPTING).unwrap();
    let propagating = automaton.find_location(log::PROPAGATING).unwrap();
    let exits: Vec<_> = automaton.edges_from(accepting).collect();
    assert!(exits
        .iter()
        .any(|(_, to, edge)| *to == propagating && edge.guard.is_some()));
    assert!(exits
        .iter()
        .any(|(_, _, edge)| edge.channel() == Some("chan_overflow")));

    let labels = edge_labels(automaton);
    assert!(labels.iter().any(|label| label
        == "do_log_update_C[id]? updateLog(currentLog, emittedOrderCounts, log_id_start + id), \
            updatesSincePropagation++, newUpdates = true, currentSizeOfLog++"));
    assert!(labels
        .iter()
        .any(|label| label == "[currentLog[counter].eventID == accept_ID] advance_C_accept[id]! counter++"));
    assert!(labels
        .iter()
        .any(|label| label.starts_with("[currentLogToPropagate == log_id_start + id] propagate_log?")));

    assert_eq!(
        log.functions(),
        &[
            LogFunction::HandleLogEntry {
                own: vec![
                    model.tables().numbering.id("request").unwrap(),
                    model.tables().numbering.id("confirm").unwrap(),
                ],
                other: ["accept", "reject", "cancel"]
                    .iter()
                    .filter_map(|name| model.tables().numbering.id(name))
                    .collect(),
            },
            LogFunction::MergePropagationLog,
        ]
    );
}

#[test]
fn test_delay_policies_shape_the_log() {
    let graph = negotiation();
    let settings = settings()
        .with_delay("C", DelayPolicy::EventsSelfEmitted, 2)
        .with_delay("P", DelayPolicy::EventsEmitted, 3);
    let model = ModelBuilder::new(&graph, settings).build().unwrap();

    let client = edge_labels(model.log("C").unwrap().automaton());
    assert!(client
        .iter()
        .any(|label| label.contains("updatesSincePropagation > maxUpdatesSincePropagation_C")));

    let provider = edge_labels(model.log("P").unwrap().automaton());
    assert!(provider.iter().any(|label| label.contains("force_propagate!")));
    assert!(provider.iter().any(|label| label.contains("force_propagate?")));

    let declarations = declared(&model);
    assert!(declarations.contains(&"const int maxUpdatesSincePropagation_C = 2;".to_string()));
    assert!(declarations.contains(&"urgent broadcast chan force_propagate;".to_string()));
    assert!(model
        .functions()
        .contains(&LogFunction::CalculateAnyForcedToPropagate));
}

#[test]
fn test_global_declarations() {
    let graph = negotiation();
    let model = ModelBuilder::new(&graph, settings().with_log_size(8))
        .build()
        .unwrap();
    let declarations = declared(&model);

    for expected in [
        "const int logSize = 8;",
        "const int request_ID = 0;",
        "const int NUMBER_OF_C = 2;",
        "typedef int[0, NUMBER_OF_C - 1] C_t;",
        "const int amountOfLogs = 3;",
        "int eventOrderCounter = 1;",
        "bool logOverflow = false;",
        "urgent broadcast chan propagate_log;",
        "broadcast chan chan_overflow;",
        "chan do_log_update_C[C_t];",
        "chan backtrack_P[P_t];",
        "broadcast chan advance_C_accept[C_t];",
        "int loopCounter[amountOfLogs][amountOfUniqueEvents];",
    ] {
        assert!(
            declarations.iter().any(|declaration| declaration == expected),
            "missing {expected}"
        );
    }
    assert!(!declarations.iter().any(|d| d.contains("force_propagate")));
    assert!(!declarations.iter().any(|d| d.contains("globalTime")));
}

#[test]
fn test_timed_model() {
    let graph = negotiation();
    let timing = TimingData {
        events: vec![EventTiming {
            event: "request".into(),
            min_time: Some(1),
            max_time: Some(4),
        }],
        logs: vec![LogTiming {
            role_name: "P".into(),
            min_time: Some(2),
            max_time: Some(5),
        }],
    };
    let model = ModelBuilder::new(&graph, settings().with_timing(timing))
        .build()
        .unwrap();

    let client = model.role("C").unwrap();
    let s0 = client.location("S0").unwrap();
    let location = client.automaton().location(s0).unwrap();
    assert_eq!(location.kind(), LocationKind::Normal);
    let invariant = location.invariant().unwrap().to_string();
    assert!(invariant.starts_with("x <= 4"));
    assert!(invariant.contains("loopCounter[log_id_start + id][request_ID] == loopBound"));

    let provider_log = model.log("P").unwrap().automaton();
    let initial = provider_log.initial().unwrap();
    assert_eq!(provider_log.location(initial).unwrap().name(), log::START);
    let waiting = provider_log.find_location(log::WAITING).unwrap();
    assert_eq!(
        provider_log.location(waiting).unwrap().invariant().unwrap().to_string(),
        "x <= 5"
    );
    assert!(edge_labels(provider_log)
        .iter()
        .any(|label| label.starts_with("[x >= 2 && newUpdates]")));

    // Client logs carry no timing of their own.
    let client_log = model.log("C").unwrap().automaton();
    assert!(client_log.find_location(log::START).is_none());

    assert!(declared(&model).contains(&"clock globalTime;".to_string()));
    assert!(model
        .queries()
        .iter()
        .any(|query| matches!(query, Query::TimeBound { .. })));
}

#[test]
fn test_timed_location_with_several_bounded_branches() {
    // R chooses at S between two retry loops and leaving for good.
    let graph = ProtocolGraph::new(
        "S",
        vec![
            Event::new("poll", "S", "A", "R"),
            Event::new("ack", "A", "S", "Q"),
            Event::new("ping", "S", "B", "R"),
            Event::new("pong", "B", "S", "Q"),
            Event::new("stop", "S", "T", "R"),
        ],
    )
    .unwrap();
    let timed = |event: &str, max_time| EventTiming {
        event: event.into(),
        min_time: Some(0),
        max_time: Some(max_time),
    };
    let timing = TimingData {
        events: vec![timed("poll", 3), timed("ping", 5), timed("stop", 2)],
        logs: vec![],
    };
    let settings = ModelSettings::uniform([("Q", 1), ("R", 1)]).with_timing(timing);
    let model = ModelBuilder::new(&graph, settings).build().unwrap();

    let role = model.role("R").unwrap();
    let s = role.location("S").unwrap();
    let location = role.automaton().location(s).unwrap();
    assert_eq!(location.kind(), LocationKind::Normal);

    // The latest deadline holds until either loop has run out.
    let invariant = location.invariant().unwrap().to_string();
    let disjuncts: BTreeSet<&str> = invariant.split(" || ").collect();
    assert_eq!(
        disjuncts,
        BTreeSet::from([
            "x <= 5",
            "loopCounter[log_id_start + id][poll_ID] == loopBound",
            "loopCounter[log_id_start + id][ping_ID] == loopBound",
        ])
    );
}

#[test]
fn test_configuration_errors_abort() {
    let graph = negotiation();

    let missing = ModelSettings::uniform([("C", 1)]);
    assert_matches!(
        ModelBuilder::new(&graph, missing).build(),
        Err(SynthesisError::Config(ConfigError::MissingInstances { role })) if role == "P"
    );

    let timing = TimingData {
        events: vec![EventTiming {
            event: "teleport".into(),
            min_time: None,
            max_time: Some(1),
        }],
        logs: vec![],
    };
    assert_matches!(
        ModelBuilder::new(&graph, settings().with_timing(timing)).build(),
        Err(SynthesisError::Timing(TimingError::UnknownEvent { event })) if event == "teleport"
    );

    let foreign = RoleProjection::new("Z", Location::new("S0"), vec![]);
    assert_matches!(
        ModelBuilder::new(&graph, settings()).with_projection(foreign).build(),
        Err(SynthesisError::UnconfiguredRole { role }) if role == "Z"
    );

    let bogus = RoleProjection::new(
        "C",
        Location::new("S0"),
        vec![Event::new("teleport", "S0", "S9", "C")],
    );
    assert_matches!(
        ModelBuilder::new(&graph, settings()).with_projection(bogus).build(),
        Err(SynthesisError::UnknownProjectedEvent { event, .. }) if event == "teleport"
    );
}

#[test]
fn test_unexitable_loop_needs_no_path_bound() {
    let graph = ProtocolGraph::new(
        "A",
        vec![Event::new("ping", "A", "B", "R"), Event::new("pong", "B", "A", "R")],
    )
    .unwrap();
    let settings = ModelSettings::uniform([("R", 1)]);
    assert!(ModelBuilder::new(&graph, settings.clone()).build().is_ok());
    assert_matches!(
        ModelBuilder::new(&graph, settings.with_path_bound(2)).build(),
        Err(SynthesisError::Analysis(AnalysisError::NoExit { .. }))
    );
}

#[test]
fn test_projection_override_replaces_computed_projection() {
    let graph = negotiation();
    let events: Vec<Event> = graph.events().to_vec();
    let reduced = RoleProjection::new(
        "P",
        Location::new("S1"),
        events
            .into_iter()
            .filter(|event| event.role() == "P")
            .collect(),
    );
    let model = ModelBuilder::new(&graph, settings())
        .with_projection(reduced)
        .build()
        .unwrap();
    let provider = model.role("P").unwrap();
    assert_eq!(provider.protocol_location(provider.initial()), Some("S1"));
    let request = model.tables().numbering.id("request").unwrap();
    assert!(provider.edges(request).is_none());
    assert!(!declared(&model)
        .iter()
        .any(|d| d == "broadcast chan advance_P_request[P_t];"));
}

#[test]
fn test_standard_queries() {
    let graph = negotiation();
    let model = ModelBuilder::new(&graph, settings()).build().unwrap();
    let queries: Vec<String> = model.queries().iter().map(ToString::to_string).collect();
    assert_eq!(queries.len(), 3);
    assert!(queries[0].starts_with("A[] forall(i: C_t) forall(j: P_t)"));
    assert!(queries[0].contains("C(i).S3"));
    assert_eq!(queries[1], "A[] not C_log(0).overflow");
    assert_eq!(queries[2], "sup: globalLogIndex");
}
