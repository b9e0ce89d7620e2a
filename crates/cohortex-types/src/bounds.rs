use chrono::Duration;

use crate::error::{Error, Result};
use crate::{RECORD_END_COLUMN, RECORD_START_COLUMN};

/// Which endpoints of a window participate in its aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Both,
    Left,
    Right,
    None,
}

impl Closed {
    pub fn from_flags(left_inclusive: bool, right_inclusive: bool) -> Self {
        match (left_inclusive, right_inclusive) {
            (true, true) => Closed::Both,
            (true, false) => Closed::Left,
            (false, true) => Closed::Right,
            (false, false) => Closed::None,
        }
    }
}

/// Direction of an event-bounded window relative to its anchor row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundDirection {
    /// The bound is the nearest qualifying row after the anchor row.
    RowToBound,
    /// The bound is the nearest qualifying row before the anchor row.
    BoundToRow,
}

/// A window endpoint at a fixed temporal offset from its anchor row.
///
/// `window_size` is signed; a negative size describes a window that extends
/// backward in time from `anchor + offset`. Inclusivity flags are relative
/// to temporal order: `left_inclusive` always governs the earlier bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalBounds {
    pub left_inclusive: bool,
    pub window_size: Duration,
    pub right_inclusive: bool,
    pub offset: Duration,
}

impl TemporalBounds {
    pub fn new(left_inclusive: bool, window_size: Duration, right_inclusive: bool) -> Self {
        Self {
            left_inclusive,
            window_size,
            right_inclusive,
            offset: Duration::zero(),
        }
    }

    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset = offset;
        self
    }

    pub fn closed(&self) -> Closed {
        Closed::from_flags(self.left_inclusive, self.right_inclusive)
    }

    /// Rolling parameters with the sign of `window_size` folded into the
    /// offset: returns `(period, offset)` where `period >= 0` and the
    /// aggregation interval is `[anchor + offset, anchor + offset + period]`.
    pub fn normalized(&self) -> (Duration, Duration) {
        if self.window_size < Duration::zero() {
            (-self.window_size, self.offset + self.window_size)
        } else {
            (self.window_size, self.offset)
        }
    }
}

/// A window endpoint at the nearest row satisfying a boundary predicate.
///
/// `end_event` names a predicate column; a leading `-` means the bound lies
/// before the anchor row (the kernel scans backward).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBounds {
    pub left_inclusive: bool,
    pub end_event: String,
    pub right_inclusive: bool,
    pub offset: Duration,
}

impl EventBounds {
    pub fn new(
        left_inclusive: bool,
        end_event: impl Into<String>,
        right_inclusive: bool,
    ) -> Result<Self> {
        let end_event = end_event.into();
        if end_event.is_empty() {
            return Err(Error::Bounds("the end event must be a non-empty string".to_string()));
        }
        if end_event == RECORD_START_COLUMN {
            return Err(Error::Bounds(format!(
                "the start of the record {} cannot be an end event; use '-{}' to make it the \
                 start event",
                RECORD_START_COLUMN, RECORD_START_COLUMN
            )));
        }
        if end_event == format!("-{}", RECORD_END_COLUMN) {
            return Err(Error::Bounds(format!(
                "the end of the record {} cannot be a start event; use '{}' to make it the \
                 end event",
                RECORD_END_COLUMN, RECORD_END_COLUMN
            )));
        }
        Ok(Self {
            left_inclusive,
            end_event,
            right_inclusive,
            offset: Duration::zero(),
        })
    }

    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset = offset;
        self
    }

    pub fn direction(&self) -> BoundDirection {
        if self.end_event.starts_with('-') {
            BoundDirection::BoundToRow
        } else {
            BoundDirection::RowToBound
        }
    }

    /// The boundary predicate column name, without the direction prefix.
    pub fn event_column(&self) -> &str {
        self.end_event.strip_prefix('-').unwrap_or(&self.end_event)
    }

    pub fn closed(&self) -> Closed {
        Closed::from_flags(self.left_inclusive, self.right_inclusive)
    }
}

/// Canonical form of a window boundary: a fixed temporal offset or an
/// event-bounded scan.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointExpr {
    Temporal(TemporalBounds),
    Event(EventBounds),
}
