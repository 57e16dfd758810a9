//! Property-Based Invariant Tests for Graph Analysis
//!
//! Random protocol graphs, including cyclic ones, exercise termination and
//! determinism of every analysis. Using deterministic seeds for
//! reproducibility.

use proptest::prelude::*;
use proptest::strategy::ValueTree;
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use std::collections::BTreeSet;
use swarmlog_theory::{
    required_log_capacity, BranchPartitionTable, EventNumbering, GraphAnalyser, Projector,
    SharedTables,
};
use swarmlog_types::{Event, Location, ModelSettings, ProtocolGraph};

/// Deterministic seed for reproducibility
const SEED: [u8; 32] = [
    0x53, 0x77, 0x61, 0x72, 0x6D, 0x47, 0x72, 0x61, // "SwarmGra"
    0x70, 0x68, 0x49, 0x6E, 0x76, 0x61, 0x72, 0x69, // "phInvari"
    0x61, 0x6E, 0x74, 0x54, 0x65, 0x73, 0x74, 0x53, // "antTestS"
    0x65, 0x65, 0x64, 0x46, 0x6F, 0x72, 0x52, 0x73, // "eedForRs"
];

const ROLES: [&str; 3] = ["A", "B", "C"];

// ============================================================================
// Strategies for generating protocol graphs
// ============================================================================

/// Up to `max_edges` events over at most `max_locations` locations. The first
/// event always leaves the initial location `L0`.
fn graph_strategy(max_locations: usize, max_edges: usize) -> BoxedStrategy<ProtocolGraph> {
    (2..=max_locations)
        .prop_flat_map(move |locations| {
            prop::collection::vec(
                (0..locations, 0..locations, 0..ROLES.len()),
                1..=max_edges,
            )
        })
        .prop_map(|edges| {
            let events = edges
                .into_iter()
                .enumerate()
                .map(|(index, (source, target, role))| {
                    let source = if index == 0 { 0 } else { source };
                    Event::new(
                        format!("e{index}"),
                        format!("L{source}"),
                        format!("L{target}"),
                        ROLES[role],
                    )
                })
                .collect();
            ProtocolGraph::new("L0", events).expect("generated graph is valid")
        })
        .boxed()
}

fn runner(cases: u32) -> TestRunner {
    TestRunner::new_with_rng(
        Config {
            cases,
            ..Config::default()
        },
        TestRng::from_seed(RngAlgorithm::ChaCha, &SEED),
    )
}

// ============================================================================
// Invariant Tests: Analysis
// ============================================================================

#[test]
fn prop_analysis_is_deterministic() {
    let mut runner = runner(100);
    let strategy = graph_strategy(5, 8);

    for _ in 0..100 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let first = GraphAnalyser::new(&graph).analyse_graph();
        let second = GraphAnalyser::new(&graph).analyse_graph();
        assert_eq!(first, second, "analysis of {graph:?} is not deterministic");
    }
}

#[test]
fn prop_loop_members_lie_on_cycles() {
    let mut runner = runner(100);
    let strategy = graph_strategy(5, 8);

    for _ in 0..100 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let analyser = GraphAnalyser::new(&graph);
        let projector = Projector::new(&graph);

        for (start, members) in analyser.find_loops() {
            // A loop start can always come back to its own source.
            let reachable = projector.reachable_events(start.target());
            assert!(
                start.is_self_loop() || reachable.iter().any(|e| e.target() == start.source()),
                "{start} does not close a cycle"
            );
            for member in &members {
                assert!(reachable.contains(member), "{member} unreachable from {start}");
            }
        }
    }
}

#[test]
fn prop_tied_to_sets_are_branching_or_roots() {
    let mut runner = runner(100);
    let strategy = graph_strategy(6, 10);

    for _ in 0..100 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let result = GraphAnalyser::new(&graph).analyse_graph();

        for (name, tied) in &result.tied_to {
            for event in tied {
                let root = graph.in_degree(event.source()) == 0;
                assert!(
                    result.branching_events.contains(event) || root,
                    "{name} is tied to {event}, which neither branches nor starts the protocol"
                );
            }
        }
    }
}

#[test]
fn prop_exit_paths_end_in_terminal_locations() {
    let mut runner = runner(100);
    let strategy = graph_strategy(5, 8);

    for _ in 0..100 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let result = GraphAnalyser::new(&graph).analyse_graph();

        for (start, path) in &result.exit_paths {
            let mut location: &Location = start.target();
            for event in path {
                assert_eq!(event.source(), location, "exit path of {start} is not a walk");
                location = event.target();
            }
            assert!(graph.is_terminal(location));
        }
    }
}

// ============================================================================
// Invariant Tests: Numbering and Projection
// ============================================================================

#[test]
fn prop_numbering_is_stable() {
    let mut runner = runner(50);
    let strategy = graph_strategy(5, 8);

    for _ in 0..50 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        assert_eq!(
            EventNumbering::from_graph(&graph),
            EventNumbering::from_graph(&graph)
        );
    }
}

#[test]
fn prop_branch_table_round_trips() {
    let mut runner = runner(100);
    let strategy = graph_strategy(5, 8);

    for _ in 0..100 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let result = GraphAnalyser::new(&graph).analyse_graph();
        let tables = SharedTables::build(&graph, &result);
        let decoded = BranchPartitionTable::decode(
            &tables.branches.padded_rows(),
            &tables.numbering,
            &graph,
        );
        assert_eq!(decoded, result.branching_events);
    }
}

#[test]
fn prop_projection_is_sound() {
    let mut runner = runner(100);
    let strategy = graph_strategy(6, 10);

    for _ in 0..100 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let projector = Projector::new(&graph);

        for (role, projection) in projector.project_all().unwrap() {
            let projected: BTreeSet<&str> = projection.events().map(Event::name).collect();

            for own in graph.events_of(&role) {
                assert!(projection.owns(own.name()));
            }

            for location in graph.locations() {
                if graph.out_degree(location) < 2 {
                    continue;
                }
                let needed = projector
                    .reachable_events(location)
                    .iter()
                    .any(|event| event.role() == role);
                if needed {
                    assert!(
                        graph.outgoing(location).any(|e| projected.contains(e.name())),
                        "{role} observes no branch at {location}"
                    );
                }
            }
        }
    }
}

#[test]
fn prop_capacity_covers_every_simple_path() {
    let mut runner = runner(50);
    let strategy = graph_strategy(5, 7);

    for _ in 0..50 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let result = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform(ROLES.iter().map(|role| (*role, 1)));
        let capacity = required_log_capacity(&graph, &result, &settings);

        // Any single outgoing event of the initial location is a valid run.
        assert!(capacity.as_usize() >= 1);
        assert!(capacity.as_usize() <= graph.len() * 2 * ROLES.len());
    }
}
