//! Error types for log operations.

use thiserror::Error;

/// The global log has no room for another entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("log capacity of {capacity} entries exceeded")]
pub struct LogOverflow {
    pub capacity: usize,
}
