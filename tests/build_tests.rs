//! Builds from JSON documents, end to end.

use assert_matches::assert_matches;
use swarmlog::simulator::{explore, SimulationOutcome};
use swarmlog::types::TimingError;
use swarmlog::{build, BuildError, BuildRequest, DelayPolicy, Query, SynthesisError};

const PROTOCOL: &str = r#"{
    "initial": "S0",
    "transitions": [
        {"source": "S0", "target": "S1", "label": {"tag": "Execute", "logType": ["request"], "role": "C"}},
        {"source": "S1", "target": "S2", "label": {"tag": "Execute", "logType": ["accept"], "role": "P"}},
        {"source": "S1", "target": "S0", "label": {"tag": "Execute", "logType": ["reject"], "role": "P"}},
        {"source": "S2", "target": "S3", "label": {"tag": "Execute", "logType": ["confirm"], "role": "C"}},
        {"source": "S2", "target": "S3", "label": {"tag": "Execute", "logType": ["cancel"], "role": "P"}}
    ]
}"#;

const SETTINGS: &str = r#"{
    "role_instances": {"C": 2, "P": 1},
    "delay_policy": {"C": "S", "P": "NOTHING"},
    "delay_amount": {"C": 1},
    "loop_counter": 2,
    "log_size": 32
}"#;

fn request() -> BuildRequest {
    BuildRequest {
        protocol: PROTOCOL.to_string(),
        settings: SETTINGS.to_string(),
        ..BuildRequest::default()
    }
}

#[test]
fn test_build_from_json() {
    let model = build(&request()).unwrap();
    assert_eq!(model.system(), vec!["C", "P", "C_log", "P_log"]);
    assert_eq!(model.settings().delay("C"), Some(DelayPolicy::EventsSelfEmitted));
    assert_eq!(model.settings().loop_bound, 2);
    assert!(model
        .queries()
        .iter()
        .any(|query| matches!(query, Query::SizeBound)));
}

#[test]
fn test_built_model_simulates() {
    let model = build(&request()).unwrap();
    for report in explore(&model, 3, 25, 400).unwrap() {
        assert_eq!(report.outcome, SimulationOutcome::Completed);
    }
}

#[test]
fn test_timing_file() {
    let mut request = request();
    request.timing = Some(
        r#"{"events": [{"logType": "request", "min_time": 1, "max_time": 4}],
            "logs": [{"role_name": "P", "max_time": 2}]}"#
            .to_string(),
    );
    let model = build(&request).unwrap();
    let timing = model.timing().unwrap();
    assert_eq!(timing.event("request").unwrap().max_time, Some(4));
    assert_eq!(timing.event("accept").unwrap().max_time, Some(0));
}

#[test]
fn test_timing_for_unknown_event() {
    let mut request = request();
    request.timing = Some(r#"{"events": [{"logType": "nope"}], "logs": []}"#.to_string());
    assert_matches!(
        build(&request),
        Err(BuildError::Synthesis(SynthesisError::Timing(TimingError::UnknownEvent { event })))
            if event == "nope"
    );
}

#[test]
fn test_malformed_documents() {
    let mut broken = request();
    broken.settings = "{".to_string();
    assert_matches!(build(&broken), Err(BuildError::Settings(_)));

    let mut broken = request();
    broken.protocol = r#"{"initial": "S0", "transitions": [
        {"source": "S0", "target": "S1", "label": {"logType": ["x"]}}]}"#
        .to_string();
    assert_matches!(build(&broken), Err(BuildError::Input(_)));
}

#[test]
fn test_missing_instances() {
    let mut request = request();
    request.settings = r#"{"role_instances": {"C": 1}, "delay_policy": {"C": "N"}}"#.to_string();
    assert_matches!(build(&request), Err(BuildError::Synthesis(SynthesisError::Config(_))));
}
