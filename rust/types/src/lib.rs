//! Core Types for Swarm Protocol Synthesis
//!
//! This crate provides the data model shared by every stage of the pipeline:
//!
//! - **Protocol graph**: locations connected by events, each owned by one role
//! - **Role projection**: the subgraph and subscriptions a single role tracks
//! - **Log entries**: the runtime record shape used by the log automata
//! - **Settings**: instance counts, delay policies, bounds and timing data
//! - **Input**: serde shapes of the protocol, projection and timing files
//!
//! Validation happens once, at the boundary. Everything downstream of a
//! successfully built [`ProtocolGraph`] and a validated [`ModelSettings`]
//! treats its input as well-formed.

mod event;
mod graph;
pub mod input;
mod log;
mod projection;
mod settings;
mod timing;

pub use event::{Event, EventId, Location};
pub use graph::{GraphError, ProtocolGraph};
pub use log::{BasedOn, InstanceId, LogEntry, OrderCount, RawEntryError, RawLogEntry};
pub use projection::RoleProjection;
pub use settings::{ConfigError, DelayPolicy, LoopBounding, ModelSettings};
pub use timing::{EventTiming, LogTiming, TimingData, TimingError};
