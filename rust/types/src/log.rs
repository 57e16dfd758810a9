//! Log entry records exchanged between log automata.
//!
//! [`LogEntry`] is the typed form used by the consistency layer.
//! [`RawLogEntry`] is the flat integer record the automata declare, with
//! sentinels for "empty slot", "root", "unresolved" and "no tie".

use crate::event::EventId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Global id of one role instance (and of its log).
///
/// Roles are ordered by name and instances are numbered consecutively, so
/// instance `k` of a role starts at that role's offset plus `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub usize);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Globally monotonic sequence number of a log entry. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCount(u32);

impl OrderCount {
    /// The first order count handed out
    pub const FIRST: Self = Self(1);

    /// Wrap a raw value; zero is the empty-slot sentinel and is rejected.
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    /// Get the raw value
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The order count following this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for OrderCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Causal predecessor of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BasedOn {
    /// First entry of its emitter's log
    Root,
    /// Not yet known; resolved when the entry is inserted
    Unresolved,
    /// The entry with this order count
    Entry(OrderCount),
}

impl BasedOn {
    /// Get the predecessor order count, if any
    #[must_use]
    pub fn order(self) -> Option<OrderCount> {
        match self {
            Self::Entry(order) => Some(order),
            Self::Root | Self::Unresolved => None,
        }
    }

    fn to_raw(self) -> i64 {
        match self {
            Self::Root => -1,
            Self::Unresolved => -2,
            Self::Entry(order) => i64::from(order.get()),
        }
    }
}

/// One occurrence of an event in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    /// Event type
    pub event: EventId,
    /// Instance that emitted the event
    pub emitter: InstanceId,
    /// Global sequence number
    pub order: OrderCount,
    /// Causal predecessor
    pub based_on: BasedOn,
    /// Branch-tracking predecessor
    pub tied_to: Option<OrderCount>,
    /// Rejected during validation
    pub ignored: bool,
}

impl LogEntry {
    /// A freshly emitted entry, before insertion resolves its links.
    #[must_use]
    pub fn pending(event: EventId, emitter: InstanceId, order: OrderCount) -> Self {
        Self {
            event,
            emitter,
            order,
            based_on: BasedOn::Unresolved,
            tied_to: None,
            ignored: false,
        }
    }

    /// Flatten into the integer record used by the automata.
    #[must_use]
    pub fn to_raw(&self) -> RawLogEntry {
        RawLogEntry {
            event_id: self.event.0 as i64,
            emitter_id: self.emitter.0 as i64,
            order_count: i64::from(self.order.get()),
            based_on_order_count: self.based_on.to_raw(),
            tied_to: self.tied_to.map_or(-1, |order| i64::from(order.get())),
            ignored: self.ignored,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} e{} by {}", self.order, self.event, self.emitter)?;
        if let Some(order) = self.based_on.order() {
            write!(f, " on {order}")?;
        }
        if let Some(tied) = self.tied_to {
            write!(f, " tied {tied}")?;
        }
        if self.ignored {
            write!(f, " ignored")?;
        }
        write!(f, "]")
    }
}

/// Errors decoding a [`RawLogEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RawEntryError {
    /// A field holds a value outside its domain
    #[error("field '{field}' holds invalid value {value}")]
    InvalidField { field: &'static str, value: i64 },
}

/// Flat integer shape of a log entry, exactly as the automata declare it.
///
/// `orderCount == 0` marks an empty slot, `basedOnOrderCount` uses `-1` for
/// root and `-2` for unresolved, `tiedTo` uses `-1` for none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawLogEntry {
    #[serde(rename = "eventID")]
    pub event_id: i64,
    #[serde(rename = "emitterID")]
    pub emitter_id: i64,
    #[serde(rename = "orderCount")]
    pub order_count: i64,
    #[serde(rename = "basedOnOrderCount")]
    pub based_on_order_count: i64,
    #[serde(rename = "tiedTo")]
    pub tied_to: i64,
    pub ignored: bool,
}

impl RawLogEntry {
    /// Check whether this slot is unused
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Decode back into a typed entry. Empty slots decode to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RawEntryError::InvalidField`] when a field is out of range.
    pub fn decode(&self) -> Result<Option<LogEntry>, RawEntryError> {
        if self.is_empty() {
            return Ok(None);
        }

        let order = positive("orderCount", self.order_count)?;
        let based_on = match self.based_on_order_count {
            -1 => BasedOn::Root,
            -2 => BasedOn::Unresolved,
            value => BasedOn::Entry(positive("basedOnOrderCount", value)?),
        };
        let tied_to = match self.tied_to {
            -1 => None,
            value => Some(positive("tiedTo", value)?),
        };

        Ok(Some(LogEntry {
            event: EventId(index("eventID", self.event_id)?),
            emitter: InstanceId(index("emitterID", self.emitter_id)?),
            order,
            based_on,
            tied_to,
            ignored: self.ignored,
        }))
    }
}

fn positive(field: &'static str, value: i64) -> Result<OrderCount, RawEntryError> {
    u32::try_from(value)
        .ok()
        .and_then(OrderCount::new)
        .ok_or(RawEntryError::InvalidField { field, value })
}

fn index(field: &'static str, value: i64) -> Result<usize, RawEntryError> {
    usize::try_from(value).map_err(|_| RawEntryError::InvalidField { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_raw_sentinels() {
        let entry = LogEntry::pending(EventId(2), InstanceId(1), OrderCount::FIRST);
        let raw = entry.to_raw();
        assert_eq!(raw.based_on_order_count, -2);
        assert_eq!(raw.tied_to, -1);
        assert_eq!(raw.order_count, 1);

        let root = LogEntry {
            based_on: BasedOn::Root,
            ..entry
        };
        assert_eq!(root.to_raw().based_on_order_count, -1);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let entry = LogEntry {
            event: EventId(3),
            emitter: InstanceId(0),
            order: OrderCount::new(7).unwrap(),
            based_on: BasedOn::Entry(OrderCount::new(5).unwrap()),
            tied_to: OrderCount::new(4),
            ignored: true,
        };
        assert_eq!(entry.to_raw().decode().unwrap(), Some(entry));
    }

    #[test]
    fn test_empty_slot() {
        assert_eq!(RawLogEntry::default().decode().unwrap(), None);
    }

    #[test]
    fn test_invalid_field() {
        let raw = RawLogEntry {
            order_count: 3,
            based_on_order_count: -5,
            ..RawLogEntry::default()
        };
        assert_matches!(
            raw.decode(),
            Err(RawEntryError::InvalidField { field: "basedOnOrderCount", value: -5 })
        );
    }

    #[test]
    fn test_serde_field_names() {
        let raw = LogEntry::pending(EventId(0), InstanceId(0), OrderCount::FIRST).to_raw();
        let json = serde_json::to_value(raw).unwrap();
        assert_eq!(json["basedOnOrderCount"], -2);
        assert_eq!(json["eventID"], 0);
    }
}
