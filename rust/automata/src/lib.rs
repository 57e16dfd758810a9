//! Timed Automata for Synthesized Protocol Models
//!
//! This crate provides the target representation the synthesizer emits:
//!
//! - [`Expression`] - guards, invariants and update right-hand sides
//! - [`Automaton`] - a process template of [`Location`]s joined by [`Edge`]s
//! - [`Declaration`] - typed constants, variables, type aliases and channels
//! - [`Dot`] - DOT export for visual inspection
//!
//! Nothing here knows about swarm protocols; the synthesizer fills these
//! structures and an external serializer renders them.
//!
//! # Example
//!
//! ```rust
//! use swarmlog_automata::{Automaton, Edge, Expression, Location, SyncLabel, Update};
//!
//! let mut automaton = Automaton::new("Client").with_parameter("Client_t id");
//! let s0 = automaton.add_location(Location::urgent("S0")).unwrap();
//! let s1 = automaton.add_location(Location::new("S1")).unwrap();
//! automaton.set_initial(s0).unwrap();
//!
//! let emit = Edge::new()
//!     .sync(SyncLabel::send("do_log_update_Client").at(Expression::var("id")))
//!     .update(Update::call("setLogEntryForUpdate", vec![Expression::var("request_ID")]));
//! automaton.add_edge(s0, s1, emit).unwrap();
//! ```

mod automaton;
mod declaration;
mod dot;
mod expression;

pub use self::automaton::{
    Automaton, AutomatonError, Edge, EdgeIndex, Location, LocationIndex, LocationKind, SyncAction,
    SyncLabel, Update,
};
pub use self::declaration::{Declaration, Initializer, Type};
pub use self::dot::Dot;
pub use self::expression::{Associativity, BinaryOp, Expression, Operator, UnaryOp};
