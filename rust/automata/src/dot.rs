//! DOT format export for automata.
//!
//! DOT files can be visualized using Graphviz tools.

use crate::automaton::{Automaton, LocationKind};
use std::fmt::{self, Display, Formatter};

/// Wrapper for exporting an automaton in DOT format.
///
/// # Example
///
/// ```rust
/// use swarmlog_automata::{Automaton, Dot, Edge, Location};
///
/// let mut automaton = Automaton::new("Client");
/// let a = automaton.add_location(Location::new("S0")).unwrap();
/// let b = automaton.add_location(Location::committed("S1")).unwrap();
/// automaton.add_edge(a, b, Edge::new()).unwrap();
/// assert!(Dot::new(&automaton).to_string().contains("0 -> 1"));
/// ```
pub struct Dot<'a>(&'a Automaton);

impl<'a> Dot<'a> {
    /// Creates a new DOT exporter for the given automaton.
    #[must_use]
    pub fn new(automaton: &'a Automaton) -> Self {
        Self(automaton)
    }
}

impl Display for Dot<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "digraph \"{}\" {{", self.0.name())?;
        let (locations, edges) = self.0.size();

        if locations > 0 {
            writeln!(f)?;
        }

        for (index, location) in self.0.locations() {
            let shape = match location.kind() {
                LocationKind::Normal => "circle",
                LocationKind::Urgent => "doublecircle",
                LocationKind::Committed => "box",
            };
            write!(f, "    {} [label=\"{}", index.index(), location.name())?;
            if let Some(invariant) = location.invariant() {
                write!(f, "\\n{invariant}")?;
            }
            writeln!(f, "\", shape={shape}];")?;
        }

        if edges > 0 {
            writeln!(f)?;
        }

        for (from, to, edge) in self.0.edges() {
            let (from, to) = (from.index(), to.index());
            writeln!(f, "    {from} -> {to} [label=\"{edge}\"];")?;
        }

        write!(f, "}}")
    }
}
