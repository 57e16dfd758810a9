//! Error types for simulation.

use swarmlog_types::{EventId, InstanceId};
use thiserror::Error;

/// Errors raised while driving a model.
///
/// These are defects of the model or the simulator, never capacity
/// conditions: overflow is a [`SimulationOutcome`](crate::SimulationOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// The layout names a role the model has no automata for.
    #[error("role '{role}' has no synthesized automata")]
    MissingRole { role: String },

    /// A backtrack or advance signal found no matching edge.
    #[error("instance {instance} has no edge for event {event} at its location")]
    Desync { instance: InstanceId, event: EventId },

    /// A role automaton and its log disagree on the protocol location.
    #[error("instance {instance} is at '{role_location}' but its log is at '{log_location}'")]
    LocationMismatch {
        instance: InstanceId,
        role_location: String,
        log_location: String,
    },

    /// Two logs disagree on the entries both subscribe to.
    #[error("logs {left} and {right} diverged")]
    Diverged { left: InstanceId, right: InstanceId },

    /// A log disagrees with the true global log.
    #[error("log {instance} disagrees with the true global log")]
    TrueViewMismatch { instance: InstanceId },
}
