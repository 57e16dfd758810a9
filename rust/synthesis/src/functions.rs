//! The function library referenced by guards and updates of the log
//! automata.
//!
//! Functions are identified by [`LogFunction`] rather than by source text.
//! Their executable semantics live in the consistency crate; the model only
//! records which functions exist, in which scope, and where they are called.

use std::fmt::{self, Display, Formatter};
use swarmlog_automata::{Expression, Update};
use swarmlog_theory::EventNumbering;
use swarmlog_types::{Event, EventId, ModelSettings, RoleProjection};

/// One function of the log library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogFunction {
    /// Recompute `anyForcedToPropagate` from the per-log flags
    CalculateAnyForcedToPropagate,
    IsInSubscriptions,
    IsIntInList,
    IsOrderCountInLog,
    GetEntryFromOrderCount,
    AddIntToList,
    GetEventIdFromOrderCount,
    /// Hand the propagation token to the next log on the ring
    SetNextLogToPropagate,
    /// Draw a fresh order count
    GetOrderCount,
    /// Fill the pending entry written by a role automaton
    SetLogEntryForUpdate,
    FindDifferenceInLogs,
    /// Diff two views into backtrack ids and the number of entries to read
    FindAndSetDifferenceInLogs,
    /// Most recent accepted entry whose event the given event is tied to
    FindTiedTo,
    SetPropagationLog,
    /// Validate the newest global entry against the whole protocol
    UpdateTrueGlobalLog,
    UpdateGlobalLog,
    /// Insert the pending entry, raising `logOverflow` when full
    UpdateLog,
    IsInBranchingConflict,
    /// Re-admit entries discarded only because of a losing branch
    ConsolidateLogs,
    CheckAndFixBranchCompetition,
    HandleBranchingEvent,
    /// Validate one entry against a flow map and the current cursor
    HandleEvent,
    UpdateLogEntry,
    /// Per-role dispatch of validation over the role's own and observed
    /// event ids
    HandleLogEntry {
        own: Vec<EventId>,
        other: Vec<EventId>,
    },
    /// Merge the propagated view into the local one
    MergePropagationLog,
}

impl LogFunction {
    /// Name used at call sites
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CalculateAnyForcedToPropagate => "calculateAnyForcedToPropagate",
            Self::IsInSubscriptions => "isInSubscriptions",
            Self::IsIntInList => "isIntInList",
            Self::IsOrderCountInLog => "isOrderCountInLog",
            Self::GetEntryFromOrderCount => "getEntryFromOrderCount",
            Self::AddIntToList => "addIntToList",
            Self::GetEventIdFromOrderCount => "getEventIDfromOrderCount",
            Self::SetNextLogToPropagate => "setNextLogToPropagate",
            Self::GetOrderCount => "getOrderCount",
            Self::SetLogEntryForUpdate => "setLogEntryForUpdate",
            Self::FindDifferenceInLogs => "findDifferenceInLogs",
            Self::FindAndSetDifferenceInLogs => "findAndSetDifferenceInLogs",
            Self::FindTiedTo => "findTiedTo",
            Self::SetPropagationLog => "setPropagationLog",
            Self::UpdateTrueGlobalLog => "updateTrueGlobalLog",
            Self::UpdateGlobalLog => "updateGlobalLog",
            Self::UpdateLog => "updateLog",
            Self::IsInBranchingConflict => "isInBranchingConflict",
            Self::ConsolidateLogs => "consolidateLogs",
            Self::CheckAndFixBranchCompetition => "checkAndFixBranchCompetition",
            Self::HandleBranchingEvent => "handleBranchingEvent",
            Self::HandleEvent => "handleEvent",
            Self::UpdateLogEntry => "updateLogEntry",
            Self::HandleLogEntry { .. } => "handleLogEntry",
            Self::MergePropagationLog => "mergePropagationLog",
        }
    }

    /// Whether the function is declared inside a log template rather than
    /// globally.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::HandleLogEntry { .. } | Self::MergePropagationLog)
    }

    /// Global functions, each declared after the functions it calls.
    ///
    /// The branch-competition group is left out in the standard setting.
    #[must_use]
    pub fn global_set(settings: &ModelSettings) -> Vec<Self> {
        let mut functions = Vec::new();
        if settings.uses_global_event_bound() {
            functions.push(Self::CalculateAnyForcedToPropagate);
        }
        functions.extend([
            Self::IsInSubscriptions,
            Self::IsIntInList,
            Self::IsOrderCountInLog,
            Self::GetEntryFromOrderCount,
            Self::AddIntToList,
            Self::GetEventIdFromOrderCount,
            Self::SetNextLogToPropagate,
            Self::GetOrderCount,
            Self::SetLogEntryForUpdate,
            Self::FindDifferenceInLogs,
            Self::FindAndSetDifferenceInLogs,
            Self::FindTiedTo,
            Self::SetPropagationLog,
            Self::UpdateTrueGlobalLog,
            Self::UpdateGlobalLog,
            Self::UpdateLog,
        ]);
        if !settings.standard_setting {
            functions.extend([
                Self::IsInBranchingConflict,
                Self::ConsolidateLogs,
                Self::CheckAndFixBranchCompetition,
                Self::HandleBranchingEvent,
            ]);
        }
        functions.extend([Self::HandleEvent, Self::UpdateLogEntry]);
        functions
    }

    /// Template-local functions of one role's log.
    #[must_use]
    pub fn local_set(projection: &RoleProjection, numbering: &EventNumbering) -> Vec<Self> {
        let ids = |events: &[Event]| -> Vec<EventId> {
            events
                .iter()
                .filter_map(|event| numbering.id(event.name()))
                .collect()
        };
        vec![
            Self::HandleLogEntry {
                own: ids(projection.own_events()),
                other: ids(projection.other_events()),
            },
            Self::MergePropagationLog,
        ]
    }

    /// Call expression with the given arguments
    #[must_use]
    pub fn call(&self, arguments: Vec<Expression>) -> Expression {
        Expression::call(self.name(), arguments)
    }

    /// Call evaluated for its side effects
    #[must_use]
    pub fn update(&self, arguments: Vec<Expression>) -> Update {
        Update::call(self.name(), arguments)
    }
}

impl Display for LogFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
