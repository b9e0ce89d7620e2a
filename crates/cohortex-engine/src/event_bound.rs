use chrono::{Duration, NaiveDateTime};
use cohortex_types::{
    BoundDirection, Closed, EventBounds, PredicateFrame, TemporalBounds, RECORD_END_COLUMN,
    RECORD_START_COLUMN,
};

use crate::aggregate::{event_timestamps, inclusive_prefix, WindowAggregate};
use crate::error::{Error, Result};
use crate::temporal::aggregate_temporal_window;

enum BoundaryPredicate<'a> {
    Column(&'a [i64]),
    RecordStart,
    RecordEnd,
}

/// Aggregate every predicate column between each row and the nearest row on
/// which the boundary predicate is positive.
///
/// The direction comes from the bounds' `end_event` sign: forward
/// (`row_to_bound`) scans to the next qualifying row, backward
/// (`bound_to_row`) to the previous one. Whether the row and the boundary
/// row participate follows the closure flags; a signed offset shrinks the
/// interval on the row side. Rows with no qualifying boundary emit zero
/// sums and null boundary timestamps.
///
/// The kernel computes per-subject cumulative sums once and attaches each
/// row to its boundary through a sorted scan, instead of re-walking the
/// interval per row. Boundary rows carry a virtual sort key nudged by one
/// microsecond to encode inclusivity against equal timestamps.
pub fn aggregate_event_bound_window(
    frame: &PredicateFrame,
    bounds: &EventBounds,
) -> Result<WindowAggregate> {
    let ts = event_timestamps(frame)?;
    let n = frame.num_rows();
    let direction = bounds.direction();
    let closed = bounds.closed();
    let offset = bounds.offset;
    let zero = Duration::zero();
    let epsilon = Duration::microseconds(1);

    let boundary = match bounds.event_column() {
        RECORD_START_COLUMN => BoundaryPredicate::RecordStart,
        RECORD_END_COLUMN => BoundaryPredicate::RecordEnd,
        name => BoundaryPredicate::Column(frame.column(name).ok_or_else(|| {
            Error::MissingColumn(format!(
                "boundary predicate '{}' is not a column of the predicate table",
                name
            ))
        })?),
    };

    // Whether the boundary row's own counts are excluded from its cumsum,
    // and which side of a timestamp tie its virtual sort key lands on.
    let exclude_boundary_own = match direction {
        BoundDirection::BoundToRow => matches!(closed, Closed::Left | Closed::Both),
        BoundDirection::RowToBound => !matches!(closed, Closed::Right | Closed::Both),
    };
    let nudge = match direction {
        BoundDirection::BoundToRow => {
            if matches!(closed, Closed::Left | Closed::Both) {
                -epsilon
            } else {
                epsilon
            }
        }
        BoundDirection::RowToBound => {
            if matches!(closed, Closed::Right | Closed::Both) {
                epsilon
            } else {
                -epsilon
            }
        }
    };
    // Whether the anchor row's own counts are folded back into the cumsum
    // difference (added forward, removed backward).
    let adjust_row_own = match direction {
        BoundDirection::RowToBound => {
            (matches!(closed, Closed::Left | Closed::Both) && offset <= zero) || offset < zero
        }
        BoundDirection::BoundToRow => {
            (matches!(closed, Closed::Left | Closed::None) && offset <= zero) || offset < zero
        }
    };

    // A nonzero offset shrinks the window on the row side; the sum over the
    // offset interval is computed temporally and folded in afterward.
    let offset_agg = if offset != zero {
        let (left_inclusive, right_inclusive) = if offset > zero {
            let right = match direction {
                BoundDirection::RowToBound => !matches!(closed, Closed::Left | Closed::Both),
                BoundDirection::BoundToRow => matches!(closed, Closed::Right | Closed::Both),
            };
            (false, right)
        } else {
            let left = match direction {
                BoundDirection::RowToBound => matches!(closed, Closed::Left | Closed::Both),
                BoundDirection::BoundToRow => !matches!(closed, Closed::Right | Closed::Both),
            };
            (left, false)
        };
        Some(aggregate_temporal_window(
            frame,
            &TemporalBounds::new(left_inclusive, offset, right_inclusive),
        )?)
    } else {
        None
    };

    let mut starts: Vec<Option<NaiveDateTime>> = vec![None; n];
    let mut ends: Vec<Option<NaiveDateTime>> = vec![None; n];
    let mut counts: Vec<Vec<i64>> = frame.columns().iter().map(|_| vec![0i64; n]).collect();

    for range in frame.subject_ranges() {
        let sub_ts = &ts[range.clone()];
        let boundary_rows: Vec<usize> = match &boundary {
            BoundaryPredicate::Column(values) => (0..sub_ts.len())
                .filter(|&i| values[range.start + i] > 0)
                .collect(),
            BoundaryPredicate::RecordStart => vec![0],
            BoundaryPredicate::RecordEnd => vec![sub_ts.len() - 1],
        };
        let virtual_keys: Vec<NaiveDateTime> = boundary_rows
            .iter()
            .map(|&j| sub_ts[j] - offset + nudge)
            .collect();

        let prefixes: Vec<Vec<i64>> = frame
            .columns()
            .iter()
            .map(|col| inclusive_prefix(&col.values[range.clone()]))
            .collect();

        for (local, &t) in sub_ts.iter().enumerate() {
            // Forward fill takes the nearest boundary sorted strictly before
            // the row; backward fill the nearest sorted at or after it.
            let split = virtual_keys.partition_point(|&vk| vk < t);
            let attached = match direction {
                BoundDirection::RowToBound => boundary_rows.get(split).copied(),
                BoundDirection::BoundToRow => {
                    split.checked_sub(1).map(|k| boundary_rows[k])
                }
            };
            let Some(boundary_local) = attached else {
                continue;
            };

            let row = range.start + local;
            match direction {
                BoundDirection::RowToBound => {
                    starts[row] = Some(t + offset);
                    ends[row] = Some(sub_ts[boundary_local]);
                }
                BoundDirection::BoundToRow => {
                    starts[row] = Some(sub_ts[boundary_local]);
                    ends[row] = Some(t + offset);
                }
            }

            for (ci, col) in frame.columns().iter().enumerate() {
                let values = &col.values[range.clone()];
                let prefix = &prefixes[ci];
                let cumsum_at_boundary = prefix[boundary_local]
                    - if exclude_boundary_own {
                        values[boundary_local]
                    } else {
                        0
                    };
                let mut sum = match direction {
                    BoundDirection::RowToBound => cumsum_at_boundary - prefix[local],
                    BoundDirection::BoundToRow => prefix[local] - cumsum_at_boundary,
                };
                if adjust_row_own {
                    match direction {
                        BoundDirection::RowToBound => sum += values[local],
                        BoundDirection::BoundToRow => sum -= values[local],
                    }
                }
                if let Some(offset_agg) = &offset_agg {
                    let in_offset = offset_agg.counts[ci][row];
                    sum = match (direction, offset > zero) {
                        (BoundDirection::RowToBound, true) => sum - in_offset,
                        (BoundDirection::RowToBound, false) => sum + in_offset,
                        (BoundDirection::BoundToRow, true) => sum + in_offset,
                        (BoundDirection::BoundToRow, false) => sum - in_offset,
                    };
                }
                counts[ci][row] = sum;
            }
        }
    }

    Ok(WindowAggregate {
        subject_ids: frame.subject_ids().to_vec(),
        timestamps: ts,
        starts,
        ends,
        names: frame.column_names().map(String::from).collect(),
        counts,
    })
}
