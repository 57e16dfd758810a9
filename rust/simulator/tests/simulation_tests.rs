//! End-to-end runs of synthesized models.

use assert_matches::assert_matches;
use swarmlog_simulator::{
    explore, Action, Simulation, SimulationConfig, SimulationError, SimulationOutcome, System,
};
use swarmlog_synthesis::{Model, ModelBuilder};
use swarmlog_types::{DelayPolicy, Event, InstanceId, ModelSettings, ProtocolGraph};

/// `e1` by A, `e2` by B, `e3` by A, one after the other.
fn linear() -> ProtocolGraph {
    ProtocolGraph::new(
        "S0",
        vec![
            Event::new("e1", "S0", "S1", "A"),
            Event::new("e2", "S1", "S2", "B"),
            Event::new("e3", "S2", "S3", "A"),
        ],
    )
    .unwrap()
}

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

fn model(graph: &ProtocolGraph, settings: ModelSettings) -> Model {
    ModelBuilder::new(graph, settings).build().unwrap()
}

#[test]
fn test_small_log_overflows() {
    let graph = linear();
    let model = model(&graph, ModelSettings::uniform([("A", 1), ("B", 1)]).with_log_size(2));
    assert_eq!(model.capacity().as_usize(), 3);

    let report = Simulation::new(&model, SimulationConfig::default())
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(report.outcome, SimulationOutcome::Overflow { capacity: 2 });
    assert_eq!(report.trace.emissions().len(), 3);
}

#[test]
fn test_sufficient_log_never_overflows() {
    let graph = linear();
    let model = model(&graph, ModelSettings::uniform([("A", 1), ("B", 1)]).with_log_size(3));

    for report in explore(&model, 11, 20, 100).unwrap() {
        assert_eq!(report.outcome, SimulationOutcome::Completed);
    }

    let mut simulation = Simulation::new(&model, SimulationConfig::default()).unwrap();
    simulation.run().unwrap();
    assert_eq!(simulation.system().global().len(), 3);
    assert_eq!(simulation.system().location(InstanceId(0)), Some("S3"));
    assert_eq!(simulation.system().location(InstanceId(1)), Some("S2"));
}

#[test]
fn test_negotiation_converges() {
    let graph = negotiation();
    let settings = ModelSettings::uniform([("C", 2), ("P", 1)]).with_log_size(64);
    let model = model(&graph, settings);

    let reports = explore(&model, 2024, 50, 500).unwrap();
    assert!(reports
        .iter()
        .all(|report| report.outcome == SimulationOutcome::Completed));
}

/// Rebuild `settings` with the log sized to the computed capacity.
fn at_capacity(graph: &ProtocolGraph, settings: ModelSettings) -> (Model, usize) {
    let capacity = model(graph, settings.clone()).capacity().as_usize();
    (model(graph, settings.with_log_size(capacity)), capacity)
}

fn assert_no_overflow(model: &Model, seed: u64, runs: usize) {
    for report in explore(model, seed, runs, 500).unwrap() {
        assert_matches!(
            report.outcome,
            SimulationOutcome::Completed | SimulationOutcome::StepLimit,
            "{:?}",
            report.trace
        );
    }
}

#[test]
fn test_computed_capacity_suffices_with_immediate_propagation() {
    let (model, capacity) = at_capacity(
        &negotiation(),
        ModelSettings::uniform([("C", 2), ("P", 1)]),
    );
    assert_eq!(capacity, 7);
    assert_no_overflow(&model, 7, 50);
}

#[test]
fn test_computed_capacity_suffices_with_self_emitted_delay() {
    let settings = ModelSettings::uniform([("C", 2), ("P", 1)])
        .with_delay("C", DelayPolicy::EventsSelfEmitted, 2)
        .with_delay("P", DelayPolicy::EventsSelfEmitted, 2);
    let (model, capacity) = at_capacity(&negotiation(), settings);
    assert_eq!(capacity, 10);
    assert_no_overflow(&model, 3, 300);
}

#[test]
fn test_computed_capacity_suffices_with_emitted_delay() {
    let settings = ModelSettings::uniform([("C", 2), ("P", 1)])
        .with_delay("C", DelayPolicy::EventsEmitted, 2)
        .with_delay("P", DelayPolicy::EventsEmitted, 1);
    let (model, capacity) = at_capacity(&negotiation(), settings);
    assert_eq!(capacity, 10);
    assert_no_overflow(&model, 17, 300);
}

#[test]
fn test_deferred_propagation_converges() {
    let graph = negotiation();
    let settings = ModelSettings::uniform([("C", 2), ("P", 1)])
        .with_log_size(64)
        .with_delay("C", DelayPolicy::EventsSelfEmitted, 1)
        .with_delay("P", DelayPolicy::EventsEmitted, 2);
    let model = model(&graph, settings);

    // Deferred propagation lets instances race; views still agree once
    // everything has been exchanged.
    let reports = explore(&model, 99, 50, 500).unwrap();
    assert_eq!(reports.len(), 50);
}

#[test]
fn test_runs_replay_from_seed() {
    let graph = negotiation();
    let model = model(&graph, ModelSettings::uniform([("C", 2), ("P", 1)]).with_log_size(64));
    let config = SimulationConfig {
        seed: 5,
        max_steps: 200,
    };

    let first = Simulation::new(&model, config).unwrap().run().unwrap();
    let second = Simulation::new(&model, config).unwrap().run().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_step_limit() {
    let graph = negotiation();
    let model = model(&graph, ModelSettings::uniform([("C", 2), ("P", 1)]).with_log_size(64));
    let config = SimulationConfig {
        seed: 1,
        max_steps: 1,
    };

    let mut simulation = Simulation::new(&model, config).unwrap();
    let report = simulation.run().unwrap();
    assert_eq!(report.outcome, SimulationOutcome::StepLimit);
    assert_eq!(report.steps, 1);
    assert_matches!(report.trace.records[0].action, Action::Emit { .. });
}

#[test]
fn test_emission_off_location_is_desync() {
    let graph = linear();
    let model = model(&graph, ModelSettings::uniform([("A", 1), ("B", 1)]));
    let mut system = System::new(&model).unwrap();
    let e3 = model.tables().numbering.id("e3").unwrap();

    assert!(!system.enabled_emissions().contains(&(InstanceId(0), e3)));
    assert_matches!(
        system.emit(InstanceId(0), e3),
        Err(SimulationError::Desync { instance: InstanceId(0), event }) if event == e3
    );
}
