//! Analysis, projection and numbering over small reference protocols.

use std::collections::BTreeSet;
use swarmlog_theory::{
    BranchPartitionTable, EventNumbering, GraphAnalyser, Projector, SharedTables,
};
use swarmlog_types::{Event, Location, ProtocolGraph};

fn names<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<&'a str> {
    events.into_iter().map(Event::name).collect()
}

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

fn diamond() -> ProtocolGraph {
    ProtocolGraph::new(
        "S",
        vec![
            Event::new("viaA", "S", "A", "R1"),
            Event::new("viaB", "S", "B", "R2"),
            Event::new("joinA", "A", "T", "R1"),
            Event::new("joinB", "B", "T", "R2"),
            Event::new("after", "T", "U", "R1"),
        ],
    )
    .unwrap()
}

#[test]
fn test_single_cycle_loop_start_is_first_edge_reached() {
    let graph = ProtocolGraph::new(
        "A",
        vec![Event::new("ab", "A", "B", "R"), Event::new("ba", "B", "A", "R")],
    )
    .unwrap();
    let loops = GraphAnalyser::new(&graph).find_loops();

    // The cycle is keyed by its first event on the walk from the initial
    // location; the edge closing it back to the initial location is a member.
    assert_eq!(loops.len(), 1);
    let ab = Event::new("ab", "A", "B", "R");
    assert_eq!(names(&loops[&ab]), vec!["ba"]);
}

#[test]
fn test_negotiation_analysis() {
    let graph = negotiation();
    let result = GraphAnalyser::new(&graph).analyse_graph();

    let request = graph.event("request").unwrap();
    assert_eq!(result.loop_starts.len(), 1);
    assert_eq!(names(&result.loop_starts[request]), vec!["reject"]);
    assert_eq!(
        names(&result.branching_events),
        vec!["accept", "cancel", "confirm", "reject"]
    );
    assert_eq!(names(&result.joining_events), vec!["cancel", "confirm"]);

    // `request` is not branching, so it needs an exit path.
    assert_eq!(names(&result.exit_paths[request]), vec!["accept", "confirm"]);
    assert!(result.unexitable.is_empty());

    // `request` is preceded by `reject`, a loop member, so it keeps its tie.
    assert_eq!(names(result.tied_to("request")), vec!["reject"]);
    assert_eq!(names(result.tied_to("confirm")), vec!["accept"]);
}

#[test]
fn test_diamond_partition_and_ties() {
    let graph = diamond();
    let analyser = GraphAnalyser::new(&graph);
    let result = analyser.analyse_graph();

    assert_eq!(names(&result.branching_events), vec!["viaA", "viaB"]);
    assert_eq!(names(result.tied_to("joinA")), vec!["viaA"]);
    assert_eq!(names(result.tied_to("joinB")), vec!["viaB"]);

    // Statically both branches precede the join; at runtime exactly one of
    // them is taken and the entry ties to that one.
    let tied: BTreeSet<&str> = result.tied_to("after").into_iter().map(Event::name).collect();
    assert_eq!(tied, ["viaA", "viaB"].into_iter().collect());
    assert!(result.loop_starts.is_empty());
}

#[test]
fn test_numbering_is_stable_across_builds() {
    let graph = negotiation();
    let first = EventNumbering::from_graph(&graph);
    let second = EventNumbering::from_graph(&graph.clone());
    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(|(_, name)| name).collect::<Vec<_>>(),
        vec!["request", "accept", "reject", "confirm", "cancel"]
    );
}

#[test]
fn test_branch_table_round_trip() {
    let graph = negotiation();
    let result = GraphAnalyser::new(&graph).analyse_graph();
    let tables = SharedTables::build(&graph, &result);

    let decoded =
        BranchPartitionTable::decode(&tables.branches.padded_rows(), &tables.numbering, &graph);
    assert_eq!(decoded, result.branching_events);
    assert_eq!(tables.branches.partitions().len(), 2);
}

#[test]
fn test_projection_soundness_on_negotiation() {
    let graph = negotiation();
    let projector = Projector::new(&graph);

    for (role, projection) in projector.project_all().unwrap() {
        for own in graph.events_of(&role) {
            assert!(projection.owns(own.name()), "{role} lost {own}");
        }
        assert_eq!(
            projection.subscriptions().iter().map(String::as_str).collect::<BTreeSet<_>>(),
            projection.events().map(Event::name).collect::<BTreeSet<_>>()
        );
    }

    // The provider acts at S1 and S2, so it observes both client events.
    let provider = projector.project("P").unwrap();
    assert_eq!(names(provider.other_events()), vec!["request", "confirm"]);
    assert_eq!(provider.initial(), &Location::new("S0"));
}
