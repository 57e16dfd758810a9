//! Reference Semantics of the Swarm Log
//!
//! This crate executes what the synthesized log automata encode, on typed
//! entries instead of integer arrays:
//!
//! - **Insertion**: causal and tied-to links, fresh order counts, overflow
//! - **Validation**: flow-map cursor, branch competition, contagious discards
//! - **Merge**: recompute the view from everything known, report the
//!   backtrack/advance diff and re-admitted entries
//! - **True global log**: the history validated against the whole protocol
//!
//! The simulator drives these logs; tests use them to check convergence.

mod error;
mod global;
mod local;
mod validation;

pub use error::LogOverflow;
pub use global::GlobalLog;
pub use local::{Insertion, LocalLog, MergeOutcome};
pub use validation::{DiscardKind, ValidationPass, ValidationRules, Verdict};
