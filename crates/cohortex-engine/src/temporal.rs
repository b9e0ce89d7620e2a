use cohortex_types::{PredicateFrame, TemporalBounds};

use crate::aggregate::{event_timestamps, inclusive_prefix, WindowAggregate};
use crate::error::Result;

/// Aggregate every predicate column over a fixed-duration window around each
/// row.
///
/// For each input row at time `t`, the emitted boundaries are
/// `timestamp_at_start = t + offset` and `timestamp_at_end = t + offset +
/// window_size`, and each predicate column holds the sum over the same
/// subject's rows inside that interval, closed per the bounds' inclusivity
/// flags. Inclusivity is relative to temporal order: `left_inclusive`
/// governs the earlier bound even for a negative `window_size`. Row count
/// and `(subject, timestamp)` order are preserved; empty windows sum to
/// zero.
pub fn aggregate_temporal_window(
    frame: &PredicateFrame,
    bounds: &TemporalBounds,
) -> Result<WindowAggregate> {
    let ts = event_timestamps(frame)?;
    let n = frame.num_rows();
    let (period, norm_offset) = bounds.normalized();

    let starts = ts.iter().map(|&t| Some(t + bounds.offset)).collect();
    let ends = ts
        .iter()
        .map(|&t| Some(t + bounds.offset + bounds.window_size))
        .collect();

    let mut counts: Vec<Vec<i64>> = frame.columns().iter().map(|_| vec![0i64; n]).collect();

    for range in frame.subject_ranges() {
        let sub_ts = &ts[range.clone()];
        let prefixes: Vec<Vec<i64>> = frame
            .columns()
            .iter()
            .map(|col| inclusive_prefix(&col.values[range.clone()]))
            .collect();

        for (local, &t) in sub_ts.iter().enumerate() {
            let interval_lo = t + norm_offset;
            let interval_hi = interval_lo + period;

            let lo = if bounds.left_inclusive {
                sub_ts.partition_point(|&x| x < interval_lo)
            } else {
                sub_ts.partition_point(|&x| x <= interval_lo)
            };
            let hi = if bounds.right_inclusive {
                sub_ts.partition_point(|&x| x <= interval_hi)
            } else {
                sub_ts.partition_point(|&x| x < interval_hi)
            };
            if hi <= lo {
                continue;
            }

            for (ci, prefix) in prefixes.iter().enumerate() {
                let below = if lo == 0 { 0 } else { prefix[lo - 1] };
                counts[ci][range.start + local] = prefix[hi - 1] - below;
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn dt(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1989, 12, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    /// Two-subject reference frame used throughout the kernel tests.
    fn reference_frame() -> PredicateFrame {
        let mut frame = PredicateFrame::new(
            vec![1, 1, 1, 1, 2, 2],
            vec![
                Some(dt(1, 12, 3)),
                Some(dt(2, 5, 17)),
                Some(dt(2, 12, 3)),
                Some(dt(6, 11, 0)),
                Some(dt(1, 13, 14)),
                Some(dt(3, 15, 17)),
            ],
        )
        .unwrap();
        frame.set_column("is_a", vec![1, 0, 1, 0, 0, 0]).unwrap();
        frame.set_column("is_b", vec![0, 1, 0, 1, 1, 0]).unwrap();
        frame.set_column("is_c", vec![1, 1, 0, 0, 1, 0]).unwrap();
        frame
    }

    fn sums(agg: &WindowAggregate, name: &str) -> Vec<i64> {
        agg.count_column(name).unwrap().to_vec()
    }

    #[test]
    fn test_week_window_closed_both() {
        let frame = reference_frame();
        let bounds = TemporalBounds::new(true, Duration::days(7), true);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        assert_eq!(agg.timestamps, frame.timestamps().iter().map(|t| t.unwrap()).collect::<Vec<_>>());
        assert_eq!(sums(&agg, "is_a"), vec![2, 1, 1, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![2, 2, 1, 1, 1, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![2, 1, 0, 0, 1, 0]);
        assert_eq!(agg.starts[0], Some(dt(1, 12, 3)));
        assert_eq!(agg.ends[0], Some(dt(8, 12, 3)));
    }

    #[test]
    fn test_day_window_closed_both() {
        let frame = reference_frame();
        let bounds = TemporalBounds::new(true, Duration::days(1), true);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        assert_eq!(sums(&agg, "is_a"), vec![2, 1, 1, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![1, 1, 0, 1, 1, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![2, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_day_window_right_exclusive() {
        let frame = reference_frame();
        let bounds = TemporalBounds::new(true, Duration::days(1), false);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        assert_eq!(sums(&agg, "is_a"), vec![1, 1, 1, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![1, 1, 0, 1, 1, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![2, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_day_window_open_both() {
        let frame = reference_frame();
        let bounds = TemporalBounds::new(false, Duration::days(1), false);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        assert_eq!(sums(&agg, "is_a"), vec![0, 1, 0, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![1, 0, 0, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_negative_day_window_open_both() {
        let frame = reference_frame();
        let bounds = TemporalBounds::new(false, Duration::days(-1), false);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        assert_eq!(sums(&agg, "is_a"), vec![0, 1, 0, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![0, 0, 1, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![0, 1, 1, 0, 0, 0]);
        // The emitted end precedes the emitted start for a negative size.
        assert_eq!(agg.starts[0], Some(dt(1, 12, 3)));
        assert_eq!(agg.ends[0], Some(NaiveDate::from_ymd_opt(1989, 11, 30).unwrap().and_hms_opt(12, 3, 0).unwrap()));
    }

    #[test]
    fn test_offset_window() {
        let frame = reference_frame();
        let bounds =
            TemporalBounds::new(false, Duration::hours(12), false).with_offset(Duration::hours(12));
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        assert_eq!(sums(&agg, "is_a"), vec![0, 0, 0, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![1, 0, 0, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![1, 0, 0, 0, 0, 0]);
        assert_eq!(agg.starts[0], Some(dt(2, 0, 3)));
        assert_eq!(agg.ends[0], Some(dt(2, 12, 3)));
    }

    #[test]
    fn test_negative_window_with_offset_closed_right() {
        let frame = reference_frame();
        let bounds =
            TemporalBounds::new(false, Duration::days(-1), true).with_offset(Duration::days(1));
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        // Window covers (t, t + 1d] even though the size is negative.
        assert_eq!(sums(&agg, "is_a"), vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![1, 0, 0, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![1, 0, 0, 0, 0, 0]);
        assert_eq!(agg.starts[0], Some(dt(2, 12, 3)));
        assert_eq!(agg.ends[0], Some(dt(1, 12, 3)));
    }

    #[test]
    fn test_negative_window_with_offset_closed_left() {
        let frame = reference_frame();
        let bounds =
            TemporalBounds::new(true, Duration::days(-1), false).with_offset(Duration::days(1));
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();

        // Window covers [t, t + 1d); the row itself is the earlier bound.
        assert_eq!(sums(&agg, "is_a"), vec![1, 1, 1, 0, 0, 0]);
        assert_eq!(sums(&agg, "is_b"), vec![1, 1, 0, 1, 1, 0]);
        assert_eq!(sums(&agg, "is_c"), vec![2, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_day_grid_forward_closed_both() {
        // Events one day apart at days 0, 1, 2, 5 with p = [1, 0, 1, 0].
        let base = dt(1, 0, 0);
        let mut frame = PredicateFrame::new(
            vec![1; 4],
            [0, 1, 2, 5]
                .into_iter()
                .map(|d| Some(base + Duration::days(d)))
                .collect(),
        )
        .unwrap();
        frame.set_column("p", vec![1, 0, 1, 0]).unwrap();

        let bounds = TemporalBounds::new(true, Duration::days(1), true);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();
        assert_eq!(sums(&agg, "p"), vec![1, 1, 1, 0]);
        assert_eq!(agg.ends[2], Some(base + Duration::days(3)));
    }

    #[test]
    fn test_day_grid_backward_right_exclusive() {
        // Same grid, window [t - 1d, t): only the preceding on-grid event
        // falls inside, via the closed earlier bound.
        let base = dt(1, 0, 0);
        let mut frame = PredicateFrame::new(
            vec![1; 4],
            [0, 1, 2, 5]
                .into_iter()
                .map(|d| Some(base + Duration::days(d)))
                .collect(),
        )
        .unwrap();
        frame.set_column("p", vec![1, 0, 1, 0]).unwrap();

        let bounds = TemporalBounds::new(true, Duration::days(-1), false);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();
        assert_eq!(sums(&agg, "p"), vec![0, 1, 0, 0]);
        assert_eq!(agg.starts[1], Some(base + Duration::days(1)));
        assert_eq!(agg.ends[1], Some(base));
    }

    #[test]
    fn test_singleton_row_included_only_when_closed() {
        let mut frame = PredicateFrame::new(vec![1], vec![Some(dt(1, 12, 3))]).unwrap();
        frame.set_column("is_a", vec![1]).unwrap();

        let closed = TemporalBounds::new(true, Duration::days(7), true);
        let agg = aggregate_temporal_window(&frame, &closed).unwrap();
        assert_eq!(sums(&agg, "is_a"), vec![1]);

        let open_left = TemporalBounds::new(false, Duration::days(7), true);
        let agg = aggregate_temporal_window(&frame, &open_left).unwrap();
        assert_eq!(sums(&agg, "is_a"), vec![0]);
    }

    #[test]
    fn test_empty_frame() {
        let frame = PredicateFrame::new(Vec::new(), Vec::new()).unwrap();
        let bounds = TemporalBounds::new(true, Duration::days(1), true);
        let agg = aggregate_temporal_window(&frame, &bounds).unwrap();
        assert_eq!(agg.num_rows(), 0);
    }

    #[test]
    fn test_rejects_static_rows() {
        let frame = PredicateFrame::new(vec![1], vec![None]).unwrap();
        let bounds = TemporalBounds::new(true, Duration::days(1), true);
        assert!(aggregate_temporal_window(&frame, &bounds).is_err());
    }
}
