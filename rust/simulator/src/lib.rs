//! Deterministic Simulation of Synthesized Models
//!
//! Executes a [`Model`](swarmlog_synthesis::Model) the way the verifier
//! would explore one path through it:
//!
//! - role instances fire their emission edges within loop and path budgets
//! - logs insert, propagate around the instance ring and merge
//! - merges replay backtrack and advance signals on the role automata
//! - an emission into a full global log ends the run in overflow
//!
//! Every choice is drawn from a seeded [`SimRng`], so runs replay exactly.

mod error;
pub mod rng;
mod runner;
mod system;
pub mod trace;

pub use error::SimulationError;
pub use rng::SimRng;
pub use runner::{explore, Simulation, SimulationConfig, SimulationOutcome, SimulationReport};
pub use system::{Emission, System};
pub use trace::{Action, StepRecord, Trace};
