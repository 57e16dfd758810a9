//! Trace collection for simulation runs.
//!
//! Records what each step did and where every touched instance ended up.

use serde::{Deserialize, Serialize};
use std::fmt;
use swarmlog_types::{EventId, InstanceId};

/// What a simulation step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// An instance emitted an event into its log
    Emit { instance: InstanceId, event: EventId },
    /// An instance's log started a propagation wave
    Propagate { instance: InstanceId },
}

impl Action {
    /// Instance that took the step
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        match self {
            Self::Emit { instance, .. } | Self::Propagate { instance } => *instance,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emit { instance, event } => write!(f, "{instance} emits e{event}"),
            Self::Propagate { instance } => write!(f, "{instance} propagates"),
        }
    }
}

/// A single step record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Simulation step index.
    pub step: usize,
    pub action: Action,
    /// Protocol location of the acting instance after the step.
    pub location: String,
    /// Entries in the global log after the step.
    pub entries: usize,
}

/// Collected trace from a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// All recorded step records.
    pub records: Vec<StepRecord>,
}

impl Trace {
    /// Create an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step.
    pub fn record(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    /// Get all records of steps taken by one instance.
    #[must_use]
    pub fn records_for_instance(&self, instance: InstanceId) -> Vec<&StepRecord> {
        self.records
            .iter()
            .filter(|r| r.action.instance() == instance)
            .collect()
    }

    /// Events emitted over the run, in order.
    #[must_use]
    pub fn emissions(&self) -> Vec<EventId> {
        self.records
            .iter()
            .filter_map(|r| match r.action {
                Action::Emit { event, .. } => Some(event),
                Action::Propagate { .. } => None,
            })
            .collect()
    }
}
