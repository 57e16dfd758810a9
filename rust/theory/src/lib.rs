//! Swarm Protocol Theory Algorithms
//!
//! This crate provides pure algorithms over a [`ProtocolGraph`]:
//!
//! - **Analysis**: loops, branching and joining events, tied-to sets, exit paths
//! - **Projection**: the minimal subgraph each role must track
//! - **Numbering**: dense event ids and the lookup tables shared by all automata
//! - **Bounding**: per-event iteration budgets and the log capacity they imply
//!
//! Nothing here performs I/O. Every traversal over a possibly cyclic graph
//! runs on an explicit stack with visited sets.
//!
//! [`ProtocolGraph`]: swarmlog_types::ProtocolGraph

pub mod analysis;
pub mod bounded;
pub mod limits;
pub mod numbering;
pub mod projection;

pub use analysis::{AnalysisError, AnalysisResult, GraphAnalyser};
pub use bounded::{emission_bounds, event_budgets, required_log_capacity};
pub use limits::{IterationBudget, LogCapacity};
pub use numbering::{BranchPartitionTable, EventNumbering, FlowMap, SharedTables, TiedToTable};
pub use projection::{ProjectionError, Projector};
