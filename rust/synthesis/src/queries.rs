//! Verification queries over an assembled model.

use crate::names;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use swarmlog_types::{ProtocolGraph, RoleProjection};

/// A property for the external verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Every deadlock with spare log capacity leaves each role in one of its
    /// end locations. One entry per role: the role and its end locations.
    EndState(Vec<(String, Vec<String>)>),
    /// The first log of `role` never overflows
    NoOverflow { role: String },
    /// Supremum of the number of global log entries
    SizeBound,
    /// Bounds of the global clock while the first instance of `role` is in
    /// `location`
    TimeBound { role: String, location: String },
    /// Some run produces exactly this sequence of events as a log prefix;
    /// `valid_only` checks the validated global log instead of the raw one
    Reachable { events: Vec<String>, valid_only: bool },
}

impl Query {
    /// End-state query from the terminal locations of the whole protocol.
    ///
    /// Roles whose projection touches no terminal location are left out.
    #[must_use]
    pub fn end_state(
        graph: &ProtocolGraph,
        projections: &BTreeMap<String, RoleProjection>,
    ) -> Self {
        let roles = projections
            .iter()
            .filter_map(|(role, projection)| {
                let ends: Vec<String> = projection
                    .locations()
                    .into_iter()
                    .filter(|location| graph.is_terminal(location))
                    .map(|location| names::location(location.as_str()))
                    .collect();
                (!ends.is_empty()).then(|| (role.clone(), ends))
            })
            .collect();
        Self::EndState(roles)
    }

    /// One time-bound query per projected location of every role.
    #[must_use]
    pub fn time_bounds(projections: &BTreeMap<String, RoleProjection>) -> Vec<Self> {
        projections
            .iter()
            .flat_map(|(role, projection)| {
                projection
                    .locations()
                    .into_iter()
                    .map(move |location| Self::TimeBound {
                        role: role.clone(),
                        location: names::location(location.as_str()),
                    })
            })
            .collect()
    }
}

/// Quantifier variable of the `index`-th role: `i`, `j`, `k`, ...
fn quantifier(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|offset| b'i'.checked_add(offset))
        .map_or('z', char::from)
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndState(roles) => {
                write!(f, "A[] ")?;
                for (index, (role, _)) in roles.iter().enumerate() {
                    write!(f, "forall({}: {}) ", quantifier(index), names::instance_type(role))?;
                }
                write!(f, "(deadlock and globalLog[logSize - 1].orderCount == 0) imply ")?;
                let clauses: Vec<String> = roles
                    .iter()
                    .enumerate()
                    .map(|(index, (role, ends))| {
                        let options: Vec<String> = ends
                            .iter()
                            .map(|end| format!("{role}({}).{end}", quantifier(index)))
                            .collect();
                        format!("({})", options.join(" or "))
                    })
                    .collect();
                write!(f, "{}", clauses.join(" and "))
            }
            Self::NoOverflow { role } => {
                write!(f, "A[] not {}(0).overflow", names::log_template(role))
            }
            Self::SizeBound => write!(f, "sup: globalLogIndex"),
            Self::TimeBound { role, location } => {
                write!(f, "bounds{{{role}(0).{location}}}: globalTime")
            }
            Self::Reachable { events, valid_only } => {
                let log = if *valid_only { "trueGlobalLog" } else { "globalLog" };
                let conditions: Vec<String> = events
                    .iter()
                    .enumerate()
                    .map(|(slot, event)| format!("{log}[{slot}].eventID == {}", names::event_id(event)))
                    .collect();
                write!(f, "E<> {}", conditions.join(" and "))?;
                if !events.is_empty() {
                    write!(f, " and {log}[{}].orderCount != 0", events.len() - 1)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachability_text() {
        let query = Query::Reachable {
            events: vec!["request".into(), "accept".into()],
            valid_only: true,
        };
        assert_eq!(
            query.to_string(),
            "E<> trueGlobalLog[0].eventID == request_ID and trueGlobalLog[1].eventID == accept_ID \
             and trueGlobalLog[1].orderCount != 0"
        );
    }

    #[test]
    fn test_end_state_text() {
        let query = Query::EndState(vec![
            ("C".into(), vec!["S3".into()]),
            ("P".into(), vec!["S3".into(), "S4".into()]),
        ]);
        assert_eq!(
            query.to_string(),
            "A[] forall(i: C_t) forall(j: P_t) (deadlock and globalLog[logSize - 1].orderCount == 0) \
             imply (C(i).S3) and (P(j).S3 or P(j).S4)"
        );
    }

    #[test]
    fn test_simple_queries() {
        assert_eq!(
            Query::NoOverflow { role: "C".into() }.to_string(),
            "A[] not C_log(0).overflow"
        );
        assert_eq!(Query::SizeBound.to_string(), "sup: globalLogIndex");
        assert_eq!(
            Query::TimeBound {
                role: "C".into(),
                location: "S1".into()
            }
            .to_string(),
            "bounds{C(0).S1}: globalTime"
        );
    }
}
