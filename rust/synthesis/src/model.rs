//! Model assembly.
//!
//! [`ModelBuilder`] validates the inputs once, runs the analysis and
//! projection, builds the shared tables and then one role automaton and one
//! log automaton per role. Any failure aborts the build; no partial model is
//! ever returned.

use crate::context::SynthesisContext;
use crate::declarations::global_declarations;
use crate::error::SynthesisError;
use crate::functions::LogFunction;
use crate::layout::InstanceLayout;
use crate::log::LogAutomaton;
use crate::queries::Query;
use crate::role::RoleAutomaton;
use std::collections::BTreeMap;
use swarmlog_automata::Declaration;
use swarmlog_theory::{
    required_log_capacity, AnalysisResult, GraphAnalyser, LogCapacity, Projector, SharedTables,
};
use swarmlog_types::{ModelSettings, ProtocolGraph, RoleProjection, TimingData};

/// A complete synthesized model, ready for serialization.
#[derive(Debug, Clone)]
pub struct Model {
    graph: ProtocolGraph,
    settings: ModelSettings,
    timing: Option<TimingData>,
    analysis: AnalysisResult,
    tables: SharedTables,
    layout: InstanceLayout,
    projections: BTreeMap<String, RoleProjection>,
    capacity: LogCapacity,
    declarations: Vec<Declaration>,
    functions: Vec<LogFunction>,
    roles: Vec<RoleAutomaton>,
    logs: Vec<LogAutomaton>,
}

impl Model {
    #[must_use]
    pub fn graph(&self) -> &ProtocolGraph {
        &self.graph
    }

    #[must_use]
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Completed timing data, if any was supplied
    #[must_use]
    pub fn timing(&self) -> Option<&TimingData> {
        self.timing.as_ref()
    }

    #[must_use]
    pub fn analysis(&self) -> &AnalysisResult {
        &self.analysis
    }

    #[must_use]
    pub fn tables(&self) -> &SharedTables {
        &self.tables
    }

    #[must_use]
    pub fn layout(&self) -> &InstanceLayout {
        &self.layout
    }

    /// Projections by role name
    #[must_use]
    pub fn projections(&self) -> &BTreeMap<String, RoleProjection> {
        &self.projections
    }

    /// Entries a sequentialised run may need under the configured bounds
    #[must_use]
    pub fn capacity(&self) -> LogCapacity {
        self.capacity
    }

    /// Global declarations
    #[must_use]
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Global function library, in declaration order
    #[must_use]
    pub fn functions(&self) -> &[LogFunction] {
        &self.functions
    }

    /// Role automata, in role name order
    #[must_use]
    pub fn roles(&self) -> &[RoleAutomaton] {
        &self.roles
    }

    /// Log automata, in role name order
    #[must_use]
    pub fn logs(&self) -> &[LogAutomaton] {
        &self.logs
    }

    #[must_use]
    pub fn role(&self, name: &str) -> Option<&RoleAutomaton> {
        self.roles.iter().find(|role| role.role() == name)
    }

    #[must_use]
    pub fn log(&self, name: &str) -> Option<&LogAutomaton> {
        self.logs.iter().find(|log| log.role() == name)
    }

    /// Template names making up the system: every role, then every log.
    #[must_use]
    pub fn system(&self) -> Vec<&str> {
        self.roles
            .iter()
            .map(|role| role.automaton().name())
            .chain(self.logs.iter().map(|log| log.automaton().name()))
            .collect()
    }

    /// The standard set of verification queries.
    #[must_use]
    pub fn queries(&self) -> Vec<Query> {
        let mut queries = vec![Query::end_state(&self.graph, &self.projections)];
        if let Some(role) = self.layout.roles().next() {
            queries.push(Query::NoOverflow {
                role: role.to_string(),
            });
        }
        queries.push(Query::SizeBound);
        if self.timing.is_some() {
            queries.extend(Query::time_bounds(&self.projections));
        }
        queries
    }
}

/// Builder for [`Model`].
///
/// # Example
///
/// ```
/// use swarmlog_synthesis::ModelBuilder;
/// use swarmlog_types::{Event, ModelSettings, ProtocolGraph};
///
/// let graph = ProtocolGraph::new(
///     "S0",
///     vec![
///         Event::new("request", "S0", "S1", "C"),
///         Event::new("reply", "S1", "S2", "P"),
///     ],
/// )
/// .unwrap();
/// let settings = ModelSettings::uniform([("C", 1), ("P", 1)]);
/// let model = ModelBuilder::new(&graph, settings).build().unwrap();
/// assert_eq!(model.system(), vec!["C", "P", "C_log", "P_log"]);
/// ```
#[derive(Debug, Clone)]
pub struct ModelBuilder<'g> {
    graph: &'g ProtocolGraph,
    settings: ModelSettings,
    overrides: Vec<RoleProjection>,
}

impl<'g> ModelBuilder<'g> {
    #[must_use]
    pub fn new(graph: &'g ProtocolGraph, settings: ModelSettings) -> Self {
        Self {
            graph,
            settings,
            overrides: Vec::new(),
        }
    }

    /// Use `projection` instead of the computed projection of its role.
    #[must_use]
    pub fn with_projection(mut self, projection: RoleProjection) -> Self {
        self.overrides.push(projection);
        self
    }

    /// Validate the inputs and synthesize every template.
    ///
    /// # Errors
    ///
    /// Returns a [`SynthesisError`] for invalid settings or timing data,
    /// unprojectable roles, unexitable loops under exit-path bounding, and
    /// projection overrides that do not fit the protocol.
    pub fn build(self) -> Result<Model, SynthesisError> {
        let graph = self.graph;
        let settings = self.settings;
        settings.validate(&graph.roles())?;
        let timing = settings
            .timing
            .as_ref()
            .map(|timing| timing.completed(graph))
            .transpose()?;

        let analysis = GraphAnalyser::new(graph).analyse_graph();
        if settings.path_bound.is_some() {
            analysis.require_exit_paths()?;
        }
        let tables = SharedTables::build(graph, &analysis);
        let layout = InstanceLayout::new(&settings);

        let mut projections = Projector::new(graph).project_all()?;
        for projection in self.overrides {
            let role = projection.name().to_string();
            if layout.offset(&role).is_none() {
                return Err(SynthesisError::UnconfiguredRole { role });
            }
            let unknown = projection
                .events()
                .map(|event| event.name())
                .chain(projection.subscriptions().iter().map(String::as_str))
                .find(|name| tables.numbering.id(name).is_none())
                .map(str::to_string);
            if let Some(event) = unknown {
                return Err(SynthesisError::UnknownProjectedEvent { role, event });
            }
            projections.insert(role, projection);
        }

        let capacity = required_log_capacity(graph, &analysis, &settings);
        if !capacity.fits_in(settings.log_size) {
            tracing::warn!(
                required = capacity.as_usize(),
                log_size = settings.log_size,
                "log size is below the capacity a full run needs; overflow is reachable"
            );
        }

        let context = SynthesisContext::new(
            &settings,
            &analysis,
            &tables,
            &layout,
            &projections,
            timing.as_ref(),
        );
        let mut roles = Vec::with_capacity(projections.len());
        let mut logs = Vec::with_capacity(projections.len());
        for projection in projections.values() {
            roles.push(RoleAutomaton::build(&context, projection)?);
            logs.push(LogAutomaton::build(&context, projection)?);
        }
        let declarations = global_declarations(&context);
        let functions = LogFunction::global_set(&settings);

        tracing::debug!(
            roles = roles.len(),
            instances = layout.total(),
            declarations = declarations.len(),
            capacity = capacity.as_usize(),
            "assembled model"
        );

        Ok(Model {
            graph: graph.clone(),
            settings,
            timing,
            analysis,
            tables,
            layout,
            projections,
            capacity,
            declarations,
            functions,
            roles,
            logs,
        })
    }
}
