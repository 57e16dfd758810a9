//! Swarmlog: Swarm Protocols Compiled to Timed Automata
//!
//! Swarmlog turns a swarm protocol (a graph of locations connected by events,
//! each owned by a role) into a network of automata that an external model
//! checker can explore: one role automaton and one log automaton per role,
//! plus the shared declarations the log automata use to insert, propagate,
//! merge and backtrack entries of an eventually consistent event log.
//!
//! # Crates
//!
//! - [`types`]: protocol graph, projections, log entries, settings, input
//! - [`theory`]: analysis, projection, numbering and capacity
//! - [`automata`]: the target automaton representation
//! - [`synthesis`]: role and log automaton synthesis, model assembly
//! - [`consistency`]: executable semantics of the log functions
//! - [`simulator`]: seeded simulation and convergence checks
//!
//! # Example
//!
//! ```rust
//! use swarmlog::{synthesize, Event, ModelSettings, ProtocolGraph};
//!
//! let graph = ProtocolGraph::new(
//!     "S0",
//!     vec![
//!         Event::new("request", "S0", "S1", "Client"),
//!         Event::new("deliver", "S1", "S2", "Provider"),
//!     ],
//! )
//! .unwrap();
//! let settings = ModelSettings::uniform([("Client", 1), ("Provider", 1)]);
//!
//! let model = synthesize(&graph, settings).unwrap();
//! assert_eq!(model.system(), vec!["Client", "Provider", "Client_log", "Provider_log"]);
//! ```

use std::collections::BTreeMap;
use thiserror::Error;

pub use swarmlog_automata as automata;
pub use swarmlog_consistency as consistency;
pub use swarmlog_simulator as simulator;
pub use swarmlog_synthesis as synthesis;
pub use swarmlog_theory as theory;
pub use swarmlog_types as types;

pub use swarmlog_synthesis::{Model, ModelBuilder, Query, SynthesisError};
pub use swarmlog_types::{
    input::{InputError, ProjectionInput, ProtocolInput},
    DelayPolicy, Event, ModelSettings, ProtocolGraph, RoleProjection, TimingData,
};

/// Errors of a build from JSON inputs.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A protocol, projection or timing file is malformed
    #[error(transparent)]
    Input(#[from] InputError),

    /// The settings file is malformed
    #[error("malformed settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Synthesize the model of `graph` under `settings`.
///
/// # Errors
///
/// Returns a [`SynthesisError`] for invalid settings or timing data, roles
/// without events and unexitable loops under path bounding.
pub fn synthesize(graph: &ProtocolGraph, settings: ModelSettings) -> Result<Model, SynthesisError> {
    ModelBuilder::new(graph, settings).build()
}

/// The JSON documents of one build.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Global protocol
    pub protocol: String,
    /// Build configuration as a [`ModelSettings`] document
    pub settings: String,
    /// Projection overrides, keyed by role
    pub projections: BTreeMap<String, String>,
    /// Timing file; replaces any timing embedded in the settings
    pub timing: Option<String>,
}

/// Parse every document of `request` and synthesize the model.
///
/// # Errors
///
/// Returns a [`BuildError`] naming the first malformed input or the
/// synthesis failure. No partial model is produced.
pub fn build(request: &BuildRequest) -> Result<Model, BuildError> {
    let graph = ProtocolInput::from_json(&request.protocol)?.into_graph()?;
    let mut settings: ModelSettings = serde_json::from_str(&request.settings)?;
    if let Some(timing) = &request.timing {
        settings = settings.with_timing(types::input::timing_from_json(timing)?);
    }

    let mut builder = ModelBuilder::new(&graph, settings);
    for (role, text) in &request.projections {
        let projection = ProjectionInput::from_json(text)?.into_projection(role, &graph)?;
        builder = builder.with_projection(projection);
    }

    let model = builder.build()?;
    tracing::debug!(
        roles = model.roles().len(),
        declarations = model.declarations().len(),
        overrides = request.projections.len(),
        "built model"
    );
    Ok(model)
}
