//! Inputs shared by every template builder during one build.

use crate::layout::InstanceLayout;
use crate::names;
use std::collections::{BTreeMap, BTreeSet};
use swarmlog_automata::Expression;
use swarmlog_theory::{AnalysisResult, SharedTables};
use swarmlog_types::{EventTiming, LogTiming, ModelSettings, RoleProjection, TimingData};

/// Validated inputs of one build. Never mutated once created.
pub(crate) struct SynthesisContext<'a> {
    pub settings: &'a ModelSettings,
    pub tables: &'a SharedTables,
    pub layout: &'a InstanceLayout,
    pub projections: &'a BTreeMap<String, RoleProjection>,
    /// Completed timing data, if any
    pub timing: Option<&'a TimingData>,
    loop_events: BTreeSet<String>,
    non_exit_events: BTreeSet<String>,
}

impl<'a> SynthesisContext<'a> {
    pub fn new(
        settings: &'a ModelSettings,
        analysis: &AnalysisResult,
        tables: &'a SharedTables,
        layout: &'a InstanceLayout,
        projections: &'a BTreeMap<String, RoleProjection>,
        timing: Option<&'a TimingData>,
    ) -> Self {
        let loop_events = analysis
            .loop_events()
            .into_iter()
            .map(|event| event.name().to_string())
            .collect();
        let non_exit_events = analysis
            .non_exit_events()
            .into_iter()
            .map(|event| event.name().to_string())
            .collect();
        Self {
            settings,
            tables,
            layout,
            projections,
            timing,
            loop_events,
            non_exit_events,
        }
    }

    /// `<event>_ID` as an expression
    pub fn id(&self, event: &str) -> Expression {
        Expression::var(names::event_id(event))
    }

    pub fn is_loop_event(&self, event: &str) -> bool {
        self.loop_events.contains(event)
    }

    /// Whether emissions of `event` count against the exit-path bound.
    pub fn is_path_bounded(&self, event: &str) -> bool {
        self.settings.path_bound.is_some() && self.non_exit_events.contains(event)
    }

    pub fn is_timed(&self) -> bool {
        self.timing.is_some()
    }

    pub fn event_timing(&self, event: &str) -> Option<&'a EventTiming> {
        self.timing.and_then(|timing| timing.event(event))
    }

    pub fn log_timing(&self, role: &str) -> Option<&'a LogTiming> {
        self.timing.and_then(|timing| timing.log(role))
    }
}
