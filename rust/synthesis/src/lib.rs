//! Synthesis of Role and Log Automata
//!
//! This crate turns a validated protocol graph and its settings into a
//! [`Model`]:
//!
//! - **Global declarations**: event ids, the branch, tied-to and flow tables,
//!   shared counters and every channel
//! - **Role automata**: emission, advance and backtrack edges per projected
//!   event, gated by loop, exit-path and timing bounds
//! - **Log automata**: insertion, round-robin propagation, merge,
//!   backtracking, delivery and overflow
//! - **Queries**: end-state, overflow, size-bound, time-bound and
//!   reachability properties for the verifier
//!
//! Synthesis is a single-threaded batch step. All concurrency belongs to
//! the generated model.

mod context;
mod declarations;
mod error;
mod functions;
mod layout;
pub mod log;
mod model;
pub mod names;
mod queries;
mod role;

pub use declarations::LOG_ENTRY_TYPE;
pub use error::SynthesisError;
pub use functions::LogFunction;
pub use layout::InstanceLayout;
pub use log::LogAutomaton;
pub use model::{Model, ModelBuilder};
pub use queries::Query;
pub use role::{EventEdges, RoleAutomaton};
