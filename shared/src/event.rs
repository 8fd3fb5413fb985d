use crate::storage::StorageRecord;
use crate::types::{EventFlags, PlayerId, EVENT_FLAG_PRIORITY_MASK, EVENT_FLAG_TRANSIENT};
use serde_json::Value;

/// A player-attributed record carried by ticks and the event channel.
///
/// On the wire an event is a positional array keyed by numeric offsets; in
/// memory it is a tagged variant with named fields, converted only at the
/// codec boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    /// Priority bits plus the transient bit. `None` means "not yet stamped";
    /// the event buffer fills in its default priority before forwarding.
    pub flags: Option<EventFlags>,
    pub player_id: PlayerId,
    /// Local events never leave the process and are never embedded in a tick
    /// sent to the log service.
    pub local: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    Join {
        name: Option<String>,
        storage: Option<Vec<StorageRecord>>,
    },
    Leave,
    Timestamp {
        timestamp: f64,
    },
    Message {
        data: Value,
    },
    PointDown {
        pointer_id: i64,
        x: f64,
        y: f64,
        target: Option<i64>,
    },
    PointMove {
        pointer_id: i64,
        x: f64,
        y: f64,
        start_dx: f64,
        start_dy: f64,
        prev_dx: f64,
        prev_dy: f64,
        target: Option<i64>,
    },
    PointUp {
        pointer_id: i64,
        x: f64,
        y: f64,
        start_dx: f64,
        start_dy: f64,
        prev_dx: f64,
        prev_dy: f64,
        target: Option<i64>,
    },
    Operation {
        code: i64,
        data: Value,
    },
}

impl Event {
    pub fn new(kind: EventKind, player_id: impl Into<PlayerId>) -> Self {
        Self {
            kind,
            flags: None,
            player_id: player_id.into(),
            local: false,
        }
    }

    pub fn local(kind: EventKind, player_id: impl Into<PlayerId>) -> Self {
        Self {
            local: true,
            ..Self::new(kind, player_id)
        }
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn is_join_or_leave(&self) -> bool {
        matches!(self.kind, EventKind::Join { .. } | EventKind::Leave)
    }

    pub fn is_transient(&self) -> bool {
        self.flags
            .map(|f| f & EVENT_FLAG_TRANSIENT != 0)
            .unwrap_or(false)
    }

    pub fn priority(&self) -> Option<EventFlags> {
        self.flags.map(|f| f & EVENT_FLAG_PRIORITY_MASK)
    }

    /// Stamps `default` onto the event if no flags were set yet.
    pub fn stamp_default_flags(&mut self, default: EventFlags) {
        if self.flags.is_none() {
            self.flags = Some(default & EVENT_FLAG_PRIORITY_MASK);
        }
    }
}
