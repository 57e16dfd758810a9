//! Serde shapes of the protocol, projection override and timing files.
//!
//! These mirror the JSON the protocol tooling emits. Converting them into a
//! [`ProtocolGraph`] or [`RoleProjection`] is the single validation point of
//! the pipeline.

use crate::event::{Event, Location};
use crate::graph::{GraphError, ProtocolGraph};
use crate::projection::RoleProjection;
use crate::timing::TimingData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors converting input files into the data model.
#[derive(Debug, Error)]
pub enum InputError {
    /// The file is not valid JSON for the expected shape
    #[error("malformed input: {0}")]
    Json(#[from] serde_json::Error),

    /// A protocol transition names no event
    #[error("transition from '{source_location}' to '{target}' has no log type")]
    MissingLogType {
        source_location: String,
        target: String,
    },

    /// A protocol transition names more than one event
    #[error("transition from '{source_location}' to '{target}' has {count} log types, expected one")]
    MultipleLogTypes {
        source_location: String,
        target: String,
        count: usize,
    },

    /// A protocol transition has no role
    #[error("event '{event}' has no role")]
    MissingRole { event: String },

    /// A projection transition has an unrecognised tag
    #[error("projection transition from '{source_location}' has unknown tag '{tag}'")]
    UnknownTag { source_location: String, tag: String },

    /// An input transition does not name its event
    #[error("projection transition from '{source_location}' has no event type")]
    MissingEventType { source_location: String },

    /// A projection refers to an event the protocol does not declare
    #[error("projection of '{role}' refers to unknown event '{event}'")]
    UnknownEvent { role: String, event: String },

    /// The protocol graph itself is invalid
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Label of a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInput {
    #[serde(rename = "logType", default)]
    pub log_type: Vec<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(rename = "eventType", default)]
    pub event_type: Option<String>,
}

/// One transition of a protocol or projection file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionInput {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: LabelInput,
}

/// A global protocol file.
///
/// ```
/// use swarmlog_types::input::ProtocolInput;
///
/// let input: ProtocolInput = serde_json::from_str(r#"{
///     "initial": "S0",
///     "transitions": [
///         {"source": "S0", "target": "S1",
///          "label": {"tag": "Execute", "logType": ["request"], "role": "Client"}}
///     ]
/// }"#).unwrap();
///
/// let graph = input.into_graph().unwrap();
/// assert_eq!(graph.events()[0].role(), "Client");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInput {
    pub initial: String,
    pub transitions: Vec<TransitionInput>,
}

impl ProtocolInput {
    /// Parse a protocol file
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Json`] when the text does not match the shape.
    pub fn from_json(text: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert into a validated protocol graph.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] naming the offending transition.
    pub fn into_graph(self) -> Result<ProtocolGraph, InputError> {
        let mut events = Vec::with_capacity(self.transitions.len());
        for transition in self.transitions {
            let TransitionInput {
                source,
                target,
                label,
            } = transition;
            let mut log_types = label.log_type;
            let name = match log_types.len() {
                0 => {
                    return Err(InputError::MissingLogType {
                        source_location: source,
                        target,
                    })
                }
                1 => log_types.remove(0),
                count => {
                    return Err(InputError::MultipleLogTypes {
                        source_location: source,
                        target,
                        count,
                    })
                }
            };
            let role = label
                .role
                .filter(|role| !role.is_empty())
                .ok_or_else(|| InputError::MissingRole {
                    event: name.clone(),
                })?;
            events.push(Event::new(name, source, target, role));
        }

        Ok(ProtocolGraph::new(self.initial, events)?)
    }
}

/// A per-role projection override file.
///
/// `Execute` transitions list the role's own log types; `Input` transitions
/// place events (own or observed) between locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub initial: String,
    pub subscriptions: Vec<String>,
    pub transitions: Vec<TransitionInput>,
}

impl ProjectionInput {
    /// Parse a projection file
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Json`] when the text does not match the shape.
    pub fn from_json(text: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert into a projection of `role`, checking every event against
    /// `graph`.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] for unknown tags, unnamed inputs and events
    /// or subscriptions the protocol does not declare.
    pub fn into_projection(
        self,
        role: &str,
        graph: &ProtocolGraph,
    ) -> Result<RoleProjection, InputError> {
        let unknown = |event: &str| InputError::UnknownEvent {
            role: role.to_string(),
            event: event.to_string(),
        };

        let own_names: BTreeSet<String> = self
            .transitions
            .iter()
            .filter(|transition| transition.label.tag.as_deref() == Some("Execute"))
            .flat_map(|transition| transition.label.log_type.iter().cloned())
            .collect();

        let mut own_events: Vec<Event> = Vec::new();
        let mut other_events: Vec<Event> = Vec::new();
        for transition in self.transitions {
            let tag = transition.label.tag.as_deref().unwrap_or_default();
            match tag {
                "Execute" => {}
                "Input" => {
                    let name = transition.label.event_type.ok_or_else(|| {
                        InputError::MissingEventType {
                            source_location: transition.source.clone(),
                        }
                    })?;
                    let declared = graph.event(&name).ok_or_else(|| unknown(name.as_str()))?;
                    let event = Event::new(
                        name.as_str(),
                        transition.source,
                        transition.target,
                        declared.role(),
                    );
                    let seen = own_events
                        .iter()
                        .chain(other_events.iter())
                        .any(|e| e.name() == name);
                    if seen {
                        continue;
                    }
                    if own_names.contains(&name) {
                        own_events.push(event);
                    } else {
                        other_events.push(event);
                    }
                }
                other => {
                    return Err(InputError::UnknownTag {
                        source_location: transition.source,
                        tag: other.to_string(),
                    })
                }
            }
        }

        let mut subscriptions = BTreeSet::new();
        for name in self.subscriptions {
            if graph.event(&name).is_none() {
                return Err(unknown(name.as_str()));
            }
            subscriptions.insert(name);
        }

        Ok(RoleProjection::from_parts(
            role,
            Location::new(self.initial),
            subscriptions,
            own_events,
            other_events,
        ))
    }
}

/// Parse a timing file
///
/// # Errors
///
/// Returns [`InputError::Json`] when the text does not match the shape.
pub fn timing_from_json(text: &str) -> Result<TimingData, InputError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const PROTOCOL: &str = r#"{
        "initial": "S0",
        "transitions": [
            {"source": "S0", "target": "S1", "label": {"tag": "Execute", "logType": ["request"], "role": "C"}},
            {"source": "S1", "target": "S2", "label": {"tag": "Execute", "logType": ["accept"], "role": "P"}}
        ]
    }"#;

    #[test]
    fn test_protocol_round_trip() {
        let graph = ProtocolInput::from_json(PROTOCOL).unwrap().into_graph().unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.initial().as_str(), "S0");
    }

    #[test]
    fn test_missing_role() {
        let text = r#"{"initial": "S0", "transitions": [
            {"source": "S0", "target": "S1", "label": {"logType": ["x"]}}]}"#;
        let result = ProtocolInput::from_json(text).unwrap().into_graph();
        assert_matches!(result, Err(InputError::MissingRole { event }) if event == "x");
    }

    #[test]
    fn test_multiple_log_types() {
        let text = r#"{"initial": "S0", "transitions": [
            {"source": "S0", "target": "S1", "label": {"logType": ["x", "y"], "role": "R"}}]}"#;
        let result = ProtocolInput::from_json(text).unwrap().into_graph();
        assert_matches!(result, Err(InputError::MultipleLogTypes { count: 2, .. }));
    }

    #[test]
    fn test_projection_override() {
        let graph = ProtocolInput::from_json(PROTOCOL).unwrap().into_graph().unwrap();
        let text = r#"{
            "initial": "S0",
            "subscriptions": ["request", "accept"],
            "transitions": [
                {"source": "S1", "target": "S1", "label": {"tag": "Execute", "logType": ["accept"]}},
                {"source": "S0", "target": "S1", "label": {"tag": "Input", "eventType": "request"}},
                {"source": "S1", "target": "S2", "label": {"tag": "Input", "eventType": "accept"}}
            ]
        }"#;
        let projection = ProjectionInput::from_json(text)
            .unwrap()
            .into_projection("P", &graph)
            .unwrap();
        assert!(projection.owns("accept"));
        assert_eq!(projection.other_events().len(), 1);
        assert_eq!(projection.other_events()[0].role(), "C");
    }

    #[test]
    fn test_projection_unknown_subscription() {
        let graph = ProtocolInput::from_json(PROTOCOL).unwrap().into_graph().unwrap();
        let text = r#"{"initial": "S0", "subscriptions": ["nope"], "transitions": []}"#;
        let result = ProjectionInput::from_json(text)
            .unwrap()
            .into_projection("P", &graph);
        assert_matches!(result, Err(InputError::UnknownEvent { event, .. }) if event == "nope");
    }

    #[test]
    fn test_bad_json() {
        assert_matches!(ProtocolInput::from_json("{"), Err(InputError::Json(_)));
    }
}
