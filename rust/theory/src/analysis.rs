//! Structural Analysis of Protocol Graphs
//!
//! [`GraphAnalyser`] answers the structural questions the synthesizer needs:
//!
//! - **Branching events** leave a location with more than one outgoing event
//! - **Joining events** enter a location with more than one incoming event
//! - **Loops** map a loop-start event to the events inside that loop
//! - **Tied-to sets** are the branching events that causally precede an event
//! - **Exit paths** are the shortest routes from a loop start to a terminal
//!
//! # Determinism
//!
//! Loop detection starts at the initial location and then visits every
//! remaining location in name order. When a location takes part in several
//! cycles, the loop start recorded for each cycle is the one met first in
//! that order.

use std::collections::{BTreeMap, BTreeSet};
use swarmlog_types::{Event, Location, ProtocolGraph};
use thiserror::Error;

/// Structural defects that make a graph unusable under the chosen bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// A loop that must be left again reaches no terminal location
    #[error("loop starting with '{event}' reaches no terminal location")]
    NoExit { event: String },
}

/// Everything the analyser derives from one protocol graph.
///
/// Built once by [`GraphAnalyser::analyse_graph`] and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Loop-start event to the events inside its loop
    pub loop_starts: BTreeMap<Event, BTreeSet<Event>>,
    /// Events leaving a location with out-degree above one
    pub branching_events: BTreeSet<Event>,
    /// Events entering a location with in-degree above one
    pub joining_events: BTreeSet<Event>,
    /// Event name to the branching events preceding it
    pub tied_to: BTreeMap<String, BTreeSet<Event>>,
    /// Loop-start event to its shortest route to a terminal location
    pub exit_paths: BTreeMap<Event, Vec<Event>>,
    /// Loop starts that need an exit path but reach no terminal location
    pub unexitable: BTreeSet<Event>,
}

impl AnalysisResult {
    /// Loop starts and loop members together.
    #[must_use]
    pub fn loop_events(&self) -> BTreeSet<&Event> {
        self.loop_starts
            .iter()
            .flat_map(|(start, members)| std::iter::once(start).chain(members.iter()))
            .collect()
    }

    /// Check whether the named event starts or belongs to a loop
    #[must_use]
    pub fn is_loop_event(&self, name: &str) -> bool {
        self.loop_events().iter().any(|event| event.name() == name)
    }

    /// Events on at least one computed exit path, including the loop starts
    /// those paths leave from.
    #[must_use]
    pub fn exit_events(&self) -> BTreeSet<&Event> {
        self.exit_paths
            .iter()
            .flat_map(|(start, path)| std::iter::once(start).chain(path.iter()))
            .collect()
    }

    /// Loop events that lie on no exit path. Emitting these does not move a
    /// role towards the end of the protocol.
    #[must_use]
    pub fn non_exit_events(&self) -> BTreeSet<&Event> {
        let exits = self.exit_events();
        self.loop_events()
            .into_iter()
            .filter(|event| !exits.iter().any(|exit| exit.name() == event.name()))
            .collect()
    }

    /// Check that every loop start needing an exit path has one.
    ///
    /// Exit-path bounding caps non-exit events, so a loop without a way out
    /// would deadlock every run once its budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NoExit`] for the first unexitable loop start.
    pub fn require_exit_paths(&self) -> Result<(), AnalysisError> {
        match self.unexitable.iter().next() {
            Some(event) => Err(AnalysisError::NoExit {
                event: event.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Tied-to set of the named event; empty when it has none.
    #[must_use]
    pub fn tied_to(&self, name: &str) -> Vec<&Event> {
        self.tied_to
            .get(name)
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }
}

/// Pure structural queries over a fixed protocol graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphAnalyser<'g> {
    graph: &'g ProtocolGraph,
}

impl<'g> GraphAnalyser<'g> {
    /// Create an analyser for `graph`
    #[must_use]
    pub fn new(graph: &'g ProtocolGraph) -> Self {
        Self { graph }
    }

    /// Events whose source location has more than one outgoing event.
    #[must_use]
    pub fn find_branching_events(&self) -> BTreeSet<Event> {
        self.graph
            .events()
            .iter()
            .filter(|event| self.graph.out_degree(event.source()) > 1)
            .cloned()
            .collect()
    }

    /// Events whose target location has more than one incoming event.
    #[must_use]
    pub fn find_joining_events(&self) -> BTreeSet<Event> {
        self.graph
            .events()
            .iter()
            .filter(|event| self.graph.in_degree(event.target()) > 1)
            .cloned()
            .collect()
    }

    /// Detect loops by depth-first enumeration of simple paths.
    ///
    /// An outgoing event whose target is already on the current path is a
    /// back edge. Scanning the path backwards from the back edge, the first
    /// event leaving the back edge's target is the loop start; every event
    /// passed on the way, back edge included, is a loop member. Members
    /// found for the same loop start along different paths are merged.
    #[must_use]
    pub fn find_loops(&self) -> BTreeMap<Event, BTreeSet<Event>> {
        let mut loops: BTreeMap<Event, BTreeSet<Event>> = BTreeMap::new();
        let mut visited: BTreeSet<&Location> = BTreeSet::new();

        for root in self.roots() {
            if visited.contains(root) {
                continue;
            }

            // Each frame is a location on the current path and the index of
            // the next outgoing event to try. `path_events[i]` leads from
            // `frames[i]` to `frames[i + 1]`.
            let mut frames: Vec<(&Location, usize)> = vec![(root, 0)];
            let mut path_events: Vec<&Event> = Vec::new();
            visited.insert(root);

            while let Some(&(location, next)) = frames.last() {
                let Some(event) = self.graph.outgoing(location).nth(next) else {
                    frames.pop();
                    path_events.pop();
                    continue;
                };
                let top = frames.len() - 1;
                frames[top].1 += 1;

                let target = event.target();
                if frames.iter().any(|(on_path, _)| *on_path == target) {
                    path_events.push(event);
                    record_loop(&mut loops, &path_events, target);
                    path_events.pop();
                } else {
                    visited.insert(target);
                    frames.push((target, 0));
                    path_events.push(event);
                }
            }
        }

        loops
    }

    /// Branching events that precede `event`.
    ///
    /// Walks backwards from the event's source. A branching incoming event is
    /// collected and ends that path; a non-branching one is walked through.
    /// An event whose source has no incoming events ties to itself. Each
    /// location is expanded at most once, so cycles terminate.
    #[must_use]
    pub fn find_preceding_branch_events(
        &self,
        event: &Event,
        branching_events: &BTreeSet<Event>,
    ) -> BTreeSet<Event> {
        let mut preceding = BTreeSet::new();
        let mut expanded: BTreeSet<&Location> = BTreeSet::new();
        let mut work: Vec<&Event> = vec![event];

        while let Some(current) = work.pop() {
            let source = current.source();
            if self.graph.in_degree(source) == 0 {
                preceding.insert(current.clone());
                continue;
            }
            if !expanded.insert(source) {
                continue;
            }
            for incoming in self.graph.incoming(source) {
                if branching_events.contains(incoming) {
                    preceding.insert(incoming.clone());
                } else {
                    work.push(incoming);
                }
            }
        }

        preceding
    }

    /// Shortest route from `event`'s target to a terminal location.
    ///
    /// Enumerates simple paths depth-first and keeps the first path with the
    /// fewest events. Returns an empty path when the target is terminal and
    /// `None` when no terminal location is reachable.
    #[must_use]
    pub fn find_shortest_path_to_exit(&self, event: &Event) -> Option<Vec<Event>> {
        let start = event.target();
        if self.graph.is_terminal(start) {
            return Some(Vec::new());
        }

        let mut best: Option<Vec<&Event>> = None;
        let mut frames: Vec<(&Location, usize)> = vec![(start, 0)];
        let mut path_events: Vec<&Event> = Vec::new();

        while let Some(&(location, next)) = frames.last() {
            let exhausted = best
                .as_ref()
                .is_some_and(|best| path_events.len() + 1 >= best.len());
            let candidate = if exhausted {
                None
            } else {
                self.graph.outgoing(location).nth(next)
            };
            let Some(candidate) = candidate else {
                frames.pop();
                path_events.pop();
                continue;
            };
            let top = frames.len() - 1;
            frames[top].1 += 1;

            let target = candidate.target();
            if self.graph.is_terminal(target) {
                let mut path = path_events.clone();
                path.push(candidate);
                best = Some(path);
            } else if !frames.iter().any(|(on_path, _)| *on_path == target) {
                frames.push((target, 0));
                path_events.push(candidate);
            }
        }

        best.map(|path| path.into_iter().cloned().collect())
    }

    /// Run every analysis and assemble the result.
    ///
    /// Events leaving the initial location lose their tied-to set when any
    /// member of it is outside every loop: a root-level branch needs no
    /// context. Loop starts get an exit path when they are not branching, or
    /// when every sibling in their branch partition starts a loop too.
    #[must_use]
    pub fn analyse_graph(&self) -> AnalysisResult {
        let loop_starts = self.find_loops();
        let branching_events = self.find_branching_events();
        let joining_events = self.find_joining_events();

        let loop_events: BTreeSet<&Event> = loop_starts
            .iter()
            .flat_map(|(start, members)| std::iter::once(start).chain(members.iter()))
            .collect();

        let initial = self.graph.initial();
        let mut tied_to = BTreeMap::new();
        for event in self.graph.events() {
            let mut preceding = self.find_preceding_branch_events(event, &branching_events);
            let leaves_loop_context = preceding.iter().any(|e| !loop_events.contains(e));
            if event.source() == initial && leaves_loop_context {
                preceding.clear();
            }
            tied_to.insert(event.name().to_string(), preceding);
        }

        let mut exit_paths = BTreeMap::new();
        let mut unexitable = BTreeSet::new();
        for start in loop_starts.keys() {
            let needs_exit = !branching_events.contains(start)
                || self
                    .graph
                    .outgoing(start.source())
                    .all(|sibling| loop_starts.contains_key(sibling));
            if !needs_exit {
                continue;
            }
            match self.find_shortest_path_to_exit(start) {
                Some(path) => {
                    exit_paths.insert(start.clone(), path);
                }
                None => {
                    unexitable.insert(start.clone());
                }
            }
        }

        tracing::debug!(
            loops = loop_starts.len(),
            branching = branching_events.len(),
            joining = joining_events.len(),
            exit_paths = exit_paths.len(),
            unexitable = unexitable.len(),
            "analysed protocol graph"
        );

        AnalysisResult {
            loop_starts,
            branching_events,
            joining_events,
            tied_to,
            exit_paths,
            unexitable,
        }
    }

    fn roots(&self) -> Vec<&'g Location> {
        let initial = self.graph.initial();
        std::iter::once(initial)
            .chain(
                self.graph
                    .locations()
                    .into_iter()
                    .filter(move |location| *location != initial),
            )
            .collect()
    }
}

fn record_loop(
    loops: &mut BTreeMap<Event, BTreeSet<Event>>,
    path_events: &[&Event],
    back_target: &Location,
) {
    let mut members = BTreeSet::new();
    for event in path_events.iter().rev() {
        if event.source() == back_target {
            loops
                .entry((*event).clone())
                .or_default()
                .extend(members);
            return;
        }
        members.insert((*event).clone());
    }
}
