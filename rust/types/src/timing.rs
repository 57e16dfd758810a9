//! Optional timing constraints on events and on log propagation.

use crate::graph::ProtocolGraph;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timing constraint on emitting one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTiming {
    /// Event name
    #[serde(rename = "logType")]
    pub event: String,
    /// Earliest emission time after the role's last step
    #[serde(default)]
    pub min_time: Option<u32>,
    /// Latest emission time after the role's last step
    #[serde(default)]
    pub max_time: Option<u32>,
}

/// Timing constraint on when a role's logs propagate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTiming {
    /// Role name
    pub role_name: String,
    #[serde(default)]
    pub min_time: Option<u32>,
    #[serde(default)]
    pub max_time: Option<u32>,
}

/// Errors found while checking timing data against a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingError {
    /// Timing for an event the protocol does not declare
    #[error("timing given for unknown event '{event}'")]
    UnknownEvent { event: String },

    /// Timing for a role that owns no events
    #[error("timing given for unknown role '{role}'")]
    UnknownRole { role: String },

    /// Empty time window
    #[error("timing of '{name}' has min_time {min} greater than max_time {max}")]
    EmptyWindow { name: String, min: u32, max: u32 },
}

/// Contents of a timing file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingData {
    #[serde(default)]
    pub events: Vec<EventTiming>,
    #[serde(default)]
    pub logs: Vec<LogTiming>,
}

impl TimingData {
    /// Timing of an event
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventTiming> {
        self.events.iter().find(|timing| timing.event == name)
    }

    /// Propagation timing of a role's logs
    #[must_use]
    pub fn log(&self, role: &str) -> Option<&LogTiming> {
        self.logs.iter().find(|timing| timing.role_name == role)
    }

    /// Validate against `graph` and complete the data: events without
    /// timing become instantaneous (`min_time = max_time = 0`).
    ///
    /// # Errors
    ///
    /// Returns a [`TimingError`] naming the offending event or role.
    pub fn completed(&self, graph: &ProtocolGraph) -> Result<Self, TimingError> {
        for timing in &self.events {
            if graph.event(&timing.event).is_none() {
                return Err(TimingError::UnknownEvent {
                    event: timing.event.clone(),
                });
            }
            check_window(&timing.event, timing.min_time, timing.max_time)?;
        }

        let roles = graph.roles();
        for timing in &self.logs {
            if !roles.contains(timing.role_name.as_str()) {
                return Err(TimingError::UnknownRole {
                    role: timing.role_name.clone(),
                });
            }
            check_window(&timing.role_name, timing.min_time, timing.max_time)?;
        }

        let mut completed = self.clone();
        for event in graph.events() {
            if self.event(event.name()).is_none() {
                completed.events.push(EventTiming {
                    event: event.name().to_string(),
                    min_time: Some(0),
                    max_time: Some(0),
                });
            }
        }

        Ok(completed)
    }
}

fn check_window(name: &str, min: Option<u32>, max: Option<u32>) -> Result<(), TimingError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(TimingError::EmptyWindow {
            name: name.to_string(),
            min,
            max,
        }),
        _ => Ok(()),
    }
}
