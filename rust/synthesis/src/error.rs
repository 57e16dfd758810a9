//! Errors that abort a build before any automaton is produced.

use swarmlog_automata::AutomatonError;
use swarmlog_theory::{AnalysisError, ProjectionError};
use swarmlog_types::{ConfigError, TimingError};
use thiserror::Error;

/// Errors that can occur while assembling a model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid timing data: {0}")]
    Timing(#[from] TimingError),

    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("automaton construction failed: {0}")]
    Automaton(#[from] AutomatonError),

    /// A projection was supplied for a role without instances
    #[error("role '{role}' has a projection but no configured instances")]
    UnconfiguredRole { role: String },

    /// A supplied projection mentions an event the protocol does not define
    #[error("projection of role '{role}' refers to unknown event '{event}'")]
    UnknownProjectedEvent { role: String, event: String },
}
