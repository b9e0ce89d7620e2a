use chrono::NaiveDateTime;
use cohortex_types::PredicateFrame;

use crate::error::{Error, Result};

/// Output of one aggregation kernel: the input's `(subject, timestamp)` rows
/// in order, each with its window boundary timestamps and one summed count
/// per predicate column.
///
/// Boundary timestamps are `None` when no qualifying window exists for the
/// row; counts are then zero.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAggregate {
    pub subject_ids: Vec<i64>,
    pub timestamps: Vec<NaiveDateTime>,
    pub starts: Vec<Option<NaiveDateTime>>,
    pub ends: Vec<Option<NaiveDateTime>>,
    /// Predicate column names, in frame order.
    pub names: Vec<String>,
    /// Column-major sums, parallel to `names`.
    pub counts: Vec<Vec<i64>>,
}

impl WindowAggregate {
    pub fn num_rows(&self) -> usize {
        self.subject_ids.len()
    }

    pub fn count_column(&self, name: &str) -> Option<&[i64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.counts[i].as_slice())
    }

    /// One count per predicate column for a single row.
    pub fn counts_for_row(&self, row: usize) -> Vec<i64> {
        self.counts.iter().map(|col| col[row]).collect()
    }
}

/// Event timestamps of a frame that must not contain static rows.
pub(crate) fn event_timestamps(frame: &PredicateFrame) -> Result<Vec<NaiveDateTime>> {
    frame
        .timestamps()
        .iter()
        .map(|ts| {
            ts.ok_or_else(|| {
                Error::Frame(cohortex_types::Error::Shape(
                    "aggregation requires every row to carry a real timestamp; static rows \
                     must be filtered out first"
                        .to_string(),
                ))
            })
        })
        .collect()
}

/// Inclusive per-row prefix sums of one column slice.
pub(crate) fn inclusive_prefix(values: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(values.len());
    let mut acc = 0i64;
    for v in values {
        acc += v;
        out.push(acc);
    }
    out
}
