use chrono::NaiveDateTime;
use cohortex_types::PredicateFrame;

/// Reference oracle: sum every predicate column of one subject over the
/// interval between `lo` and `hi` with the given endpoint inclusivities,
/// by scanning rows one at a time.
///
/// Aggregation kernels must agree with this on every emitted window.
pub fn naive_interval_sums(
    frame: &PredicateFrame,
    subject_id: i64,
    lo: NaiveDateTime,
    hi: NaiveDateTime,
    lo_inclusive: bool,
    hi_inclusive: bool,
) -> Vec<i64> {
    let mut sums = vec![0i64; frame.columns().len()];
    for row in 0..frame.num_rows() {
        if frame.subject_ids()[row] != subject_id {
            continue;
        }
        let Some(ts) = frame.timestamps()[row] else {
            continue;
        };
        let above = if lo_inclusive { ts >= lo } else { ts > lo };
        let below = if hi_inclusive { ts <= hi } else { ts < hi };
        if above && below {
            for (slot, column) in sums.iter_mut().zip(frame.columns()) {
                *slot += column.values[row];
            }
        }
    }
    sums
}
