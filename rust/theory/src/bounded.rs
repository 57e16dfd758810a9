//! Bounded Unrolling of Loops
//!
//! Loops in a swarm protocol are unbounded; the synthesized automata are
//! not. Every event receives an [`IterationBudget`]:
//!
//! - **Loop events** (loop starts and members) may fire `loop_bound` times
//!   per instance of their owner, or `loop_bound` times in total when loop
//!   counting is global
//! - **Non-exit loop events** are further capped at `path_bound` per instance
//!   when exit-path bounding is enabled
//! - **Every other event** fires once
//!
//! From the budgets follows the [`LogCapacity`] a run needs. When every
//! role propagates immediately, runs are sequentialised and the capacity is
//! the longest walk from the initial location that respects every budget.
//! Once a role defers propagation, instances act on stale views: every
//! instance may emit its own events, and an instance whose entries lose a
//! branch competition may emit the events downstream of that branch again.
//! [`emission_bounds`] counts those emissions per event.
//!
//! # Example
//!
//! ```
//! use swarmlog_theory::{required_log_capacity, GraphAnalyser};
//! use swarmlog_types::{Event, ModelSettings, ProtocolGraph};
//!
//! let graph = ProtocolGraph::new(
//!     "S",
//!     vec![
//!         Event::new("go", "S", "A", "R"),
//!         Event::new("retry", "A", "S", "R"),
//!         Event::new("stop", "A", "T", "R"),
//!     ],
//! )
//! .unwrap();
//! let analysis = GraphAnalyser::new(&graph).analyse_graph();
//! let settings = ModelSettings::uniform([("R", 1)]).with_loop_bound(2);
//!
//! // go, retry, go, stop
//! assert_eq!(required_log_capacity(&graph, &analysis, &settings).as_usize(), 4);
//! ```

use crate::analysis::AnalysisResult;
use crate::limits::{IterationBudget, LogCapacity};
use crate::projection::Projector;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use swarmlog_types::{DelayPolicy, Event, Location, LoopBounding, ModelSettings, ProtocolGraph};

/// Iteration budget of every event in a sequentialised run, keyed by event
/// name.
#[must_use]
pub fn event_budgets(
    graph: &ProtocolGraph,
    analysis: &AnalysisResult,
    settings: &ModelSettings,
) -> BTreeMap<String, IterationBudget> {
    let loop_events = analysis.loop_events();
    let non_exit = analysis.non_exit_events();

    graph
        .events()
        .iter()
        .map(|event| {
            if !loop_events.contains(event) {
                return (event.name().to_string(), IterationBudget::ONCE);
            }
            (event.name().to_string(), loop_budget(settings, event, &non_exit))
        })
        .collect()
}

fn loop_budget(
    settings: &ModelSettings,
    event: &Event,
    non_exit: &BTreeSet<&Event>,
) -> IterationBudget {
    let instances = instance_count(settings, event.role());
    let mut budget = match settings.loop_bounding {
        LoopBounding::RoleLocal => settings.loop_bound.saturating_mul(instances),
        LoopBounding::Global => settings.loop_bound,
    };
    if let Some(path_bound) = settings.path_bound {
        if non_exit.contains(event) {
            budget = budget.min(path_bound.saturating_mul(instances));
        }
    }
    IterationBudget(budget)
}

fn instance_count(settings: &ModelSettings, role: &str) -> u32 {
    settings
        .instances(role)
        .and_then(|count| u32::try_from(count).ok())
        .unwrap_or(1)
}

/// Whether any role may hold back entries before propagating them.
fn defers_propagation(settings: &ModelSettings) -> bool {
    settings
        .delay_policy
        .values()
        .any(|policy| *policy != DelayPolicy::Nothing)
}

/// Upper bound on how often each event is emitted, summed over all
/// instances of its owner, when views may be stale.
///
/// Loop events keep their loop budget: the loop counters gate emissions, not
/// accepted entries. Any other event is emitted at most once per instance
/// and per change of branch an instance's view can go through upstream of
/// the event's source. Only branches several instances can take
/// concurrently are contested; knowledge travels with its causal history,
/// so an uncontested branch never changes in a view.
#[must_use]
pub fn emission_bounds(
    graph: &ProtocolGraph,
    analysis: &AnalysisResult,
    settings: &ModelSettings,
) -> BTreeMap<String, IterationBudget> {
    let loop_events = analysis.loop_events();
    let non_exit = analysis.non_exit_events();
    let projector = Projector::new(graph);

    // Locations each contested branch event leads to, itself included.
    let contested: Vec<(&Event, BTreeSet<&Location>)> = graph
        .events()
        .iter()
        .filter(|event| {
            graph.out_degree(event.source()) > 1
                && emitters_at(graph, settings, event.source()) > 1
        })
        .map(|event| {
            let mut reached: BTreeSet<&Location> = projector
                .reachable_events(event.target())
                .into_iter()
                .map(Event::target)
                .collect();
            reached.insert(event.target());
            (event, reached)
        })
        .collect();

    let mut bounds: BTreeMap<&str, IterationBudget> = BTreeMap::new();
    let mut upstream: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for event in graph.events() {
        if loop_events.contains(event) {
            bounds.insert(event.name(), loop_budget(settings, event, &non_exit));
            continue;
        }
        let branches = contested
            .iter()
            .filter(|(branch, reached)| {
                branch.name() != event.name() && reached.contains(event.source())
            })
            .map(|(branch, _)| branch.name())
            .collect();
        upstream.insert(event.name(), branches);
    }

    // Resolve events once every contested branch above them is resolved.
    while !upstream.is_empty() {
        let ready: Vec<&str> = upstream
            .iter()
            .filter(|(_, branches)| branches.iter().all(|branch| bounds.contains_key(branch)))
            .map(|(name, _)| *name)
            .collect();

        if ready.is_empty() {
            // Mutually upstream events lie on a cycle; bound them like loop events.
            for name in std::mem::take(&mut upstream).into_keys() {
                if let Some(event) = graph.event(name) {
                    tracing::warn!(event = name, "event on an unattributed cycle, using the loop bound");
                    let instances = instance_count(settings, event.role());
                    let bound = settings.loop_bound.saturating_mul(instances);
                    bounds.insert(name, IterationBudget(bound));
                }
            }
            break;
        }

        for name in ready {
            let Some(branches) = upstream.remove(name) else {
                continue;
            };
            let switches = branches
                .iter()
                .filter_map(|branch| bounds.get(branch))
                .fold(0u32, |sum, bound| sum.saturating_add(bound.0));
            let instances = graph
                .event(name)
                .map_or(1, |event| instance_count(settings, event.role()));
            let bound = switches.saturating_add(1).saturating_mul(instances);
            bounds.insert(name, IterationBudget(bound));
        }
    }

    bounds
        .into_iter()
        .map(|(name, bound)| (name.to_string(), bound))
        .collect()
}

/// Instances that can emit some event leaving `location`.
fn emitters_at(graph: &ProtocolGraph, settings: &ModelSettings, location: &Location) -> u32 {
    graph
        .outgoing(location)
        .map(Event::role)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|role| instance_count(settings, role))
        .fold(0, u32::saturating_add)
}

/// Largest number of entries a run can append to the log.
///
/// With immediate propagation everywhere this is the longest walk from the
/// initial location within the budgets of [`event_budgets`]. When some role
/// defers propagation it is at least the sum of [`emission_bounds`].
#[must_use]
pub fn required_log_capacity(
    graph: &ProtocolGraph,
    analysis: &AnalysisResult,
    settings: &ModelSettings,
) -> LogCapacity {
    let budgets = event_budgets(graph, analysis, settings);
    let remaining: Vec<u32> = graph
        .events()
        .iter()
        .map(|event| budgets.get(event.name()).map_or(1, |budget| budget.0))
        .collect();

    let mut search = CapacitySearch {
        graph,
        memo: HashMap::new(),
    };
    let mut capacity = search.longest((graph.initial().as_str().to_string(), remaining));

    if defers_propagation(settings) {
        let concurrent = emission_bounds(graph, analysis, settings)
            .values()
            .fold(0usize, |sum, bound| sum.saturating_add(bound.as_usize()));
        tracing::debug!(sequential = capacity, concurrent, "propagation is deferred");
        capacity = capacity.max(concurrent);
    }

    tracing::debug!(capacity, "computed required log capacity");
    LogCapacity(capacity)
}

/// A location and the remaining budget of every event.
type SearchState = (String, Vec<u32>);

struct CapacitySearch<'g> {
    graph: &'g ProtocolGraph,
    memo: HashMap<SearchState, usize>,
}

impl CapacitySearch<'_> {
    fn successors(&self, (location, remaining): &SearchState) -> Vec<SearchState> {
        self.graph
            .events()
            .iter()
            .enumerate()
            .filter(|(index, event)| {
                event.source().as_str() == location.as_str() && remaining[*index] > 0
            })
            .map(|(index, event)| {
                let mut next = remaining.clone();
                next[index] -= 1;
                (event.target().as_str().to_string(), next)
            })
            .collect()
    }

    /// Longest walk from `start`, evaluated in post-order on an explicit
    /// stack. Every step consumes budget, so states form a DAG.
    fn longest(&mut self, start: SearchState) -> usize {
        let mut stack = vec![(start.clone(), false)];
        while let Some((state, expanded)) = stack.pop() {
            if self.memo.contains_key(&state) {
                continue;
            }
            let successors = self.successors(&state);
            if expanded {
                let best = successors
                    .iter()
                    .filter_map(|next| self.memo.get(next))
                    .map(|length| length + 1)
                    .max()
                    .unwrap_or(0);
                self.memo.insert(state, best);
            } else {
                let pending: Vec<SearchState> = successors
                    .into_iter()
                    .filter(|next| !self.memo.contains_key(next))
                    .collect();
                stack.push((state, true));
                stack.extend(pending.into_iter().map(|next| (next, false)));
            }
        }
        self.memo.get(&start).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::GraphAnalyser;

    fn negotiation() -> ProtocolGraph {
        ProtocolGraph::new(
            "S0",
            vec![
                Event::new("request", "S0", "S1", "C"),
                Event::new("accept", "S1", "S2", "P"),
                Event::new("reject", "S1", "S0", "P"),
                Event::new("confirm", "S2", "S3", "C"),
                Event::new("cancel", "S2", "S3", "P"),
            ],
        )
        .unwrap()
    }

    fn retry_loop() -> ProtocolGraph {
        ProtocolGraph::new(
            "S",
            vec![
                Event::new("go", "S", "A", "R"),
                Event::new("retry", "A", "S", "R"),
                Event::new("stop", "A", "T", "Q"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_linear_protocol_needs_one_slot_per_event() {
        let graph = ProtocolGraph::new(
            "S0",
            vec![
                Event::new("e1", "S0", "S1", "A"),
                Event::new("e2", "S1", "S2", "B"),
                Event::new("e3", "S2", "S3", "A"),
            ],
        )
        .unwrap();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform([("A", 1), ("B", 1)]);
        let capacity = required_log_capacity(&graph, &analysis, &settings);
        assert_eq!(capacity, LogCapacity(3));
        assert!(capacity.fits_in(3));
        assert!(!capacity.fits_in(2));
    }

    #[test]
    fn test_role_local_budget_scales_with_instances() {
        let graph = retry_loop();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform([("R", 3), ("Q", 1)]).with_loop_bound(2);
        let budgets = event_budgets(&graph, &analysis, &settings);
        assert_eq!(budgets["go"], IterationBudget(6));
        assert_eq!(budgets["stop"], IterationBudget::ONCE);
    }

    #[test]
    fn test_global_budget_ignores_instances() {
        let graph = retry_loop();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let mut settings = ModelSettings::uniform([("R", 3), ("Q", 1)]).with_loop_bound(2);
        settings.loop_bounding = LoopBounding::Global;
        let budgets = event_budgets(&graph, &analysis, &settings);
        assert_eq!(budgets["retry"], IterationBudget(2));
    }

    #[test]
    fn test_path_bound_caps_non_exit_events() {
        let graph = retry_loop();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform([("R", 1), ("Q", 1)])
            .with_loop_bound(5)
            .with_path_bound(1);
        let budgets = event_budgets(&graph, &analysis, &settings);
        // `retry` never leads out of the loop; `go` starts the exit path.
        assert_eq!(budgets["retry"], IterationBudget(1));
        assert_eq!(budgets["go"], IterationBudget(5));
        // go, retry, go, stop
        assert_eq!(
            required_log_capacity(&graph, &analysis, &settings),
            LogCapacity(4)
        );
    }

    #[test]
    fn test_large_loop_bound_does_not_recurse() {
        let graph = retry_loop();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform([("R", 1), ("Q", 1)]).with_loop_bound(10_000);
        // go and retry alternate, the last go is followed by stop.
        assert_eq!(
            required_log_capacity(&graph, &analysis, &settings),
            LogCapacity(20_000)
        );
    }

    #[test]
    fn test_immediate_propagation_is_sequential() {
        let graph = negotiation();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform([("C", 2), ("P", 1)]);
        // request, reject, request, reject, request, accept, confirm
        assert_eq!(
            required_log_capacity(&graph, &analysis, &settings),
            LogCapacity(7)
        );
    }

    #[test]
    fn test_deferred_propagation_counts_every_emitter() {
        let graph = negotiation();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform([("C", 2), ("P", 1)])
            .with_delay("C", DelayPolicy::EventsSelfEmitted, 2)
            .with_delay("P", DelayPolicy::EventsSelfEmitted, 2);

        let bounds = emission_bounds(&graph, &analysis, &settings);
        assert_eq!(bounds["request"], IterationBudget(4));
        assert_eq!(bounds["reject"], IterationBudget(2));
        // Only P decides at S1, so the branch there is never contested.
        assert_eq!(bounds["accept"], IterationBudget(1));
        // Both clients may confirm while the provider cancels.
        assert_eq!(bounds["confirm"], IterationBudget(2));
        assert_eq!(bounds["cancel"], IterationBudget(1));
        assert_eq!(
            required_log_capacity(&graph, &analysis, &settings),
            LogCapacity(10)
        );
    }

    #[test]
    fn test_contested_branch_allows_reemission_downstream() {
        // Two deciders race at S; whoever loses may walk the winner's branch
        // and emit `finish` a second time.
        let graph = ProtocolGraph::new(
            "S",
            vec![
                Event::new("left", "S", "A", "D"),
                Event::new("right", "S", "B", "D"),
                Event::new("join_left", "A", "T", "W"),
                Event::new("join_right", "B", "T", "W"),
                Event::new("finish", "T", "U", "W"),
            ],
        )
        .unwrap();
        let analysis = GraphAnalyser::new(&graph).analyse_graph();
        let settings = ModelSettings::uniform([("D", 2), ("W", 1)])
            .with_delay("D", DelayPolicy::EventsEmitted, 1);

        let bounds = emission_bounds(&graph, &analysis, &settings);
        assert_eq!(bounds["left"], IterationBudget(2));
        // One emission plus one per contested entry that leads to A.
        assert_eq!(bounds["join_left"], IterationBudget(3));
        // Both branches lead to T.
        assert_eq!(bounds["finish"], IterationBudget(5));
        assert_eq!(
            required_log_capacity(&graph, &analysis, &settings),
            LogCapacity(2 + 2 + 3 + 3 + 5)
        );
    }
}
