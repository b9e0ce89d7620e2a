use cohortex_types::{PredicateFrame, ANY_EVENT_COLUMN};
use cohortex_task::CountBounds;
use tracing::info;

use crate::error::{Error, Result};

/// Evaluate per-predicate inclusive `[min, max]` count constraints and
/// return one keep/drop flag per row.
///
/// The pseudo-name `*` binds to the any-event column; a constraint named
/// `_` or with no bounds at all rejects the configuration.
pub fn constraint_mask<'a, F>(
    constraints: &[(String, CountBounds)],
    num_rows: usize,
    lookup: F,
) -> Result<Vec<bool>>
where
    F: Fn(&str) -> Option<&'a [i64]>,
{
    let mut keep = vec![true; num_rows];

    for (name, bounds) in constraints {
        if name == "_" {
            return Err(Error::Constraint(
                "'_' is not a valid constraint predicate".to_string(),
            ));
        }
        if bounds.min.is_none() && bounds.max.is_none() {
            return Err(Error::Constraint(format!(
                "constraint for '{}' has no bounds: None - None",
                name
            )));
        }
        if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
            if max < min {
                return Err(Error::Constraint(format!(
                    "constraint for '{}' is reversed: {} - {}",
                    name, min, max
                )));
            }
        }

        let column_name = if name == "*" { ANY_EVENT_COLUMN } else { name };
        let values = lookup(column_name).ok_or_else(|| {
            Error::MissingColumn(format!(
                "constraint predicate '{}' is not a column of the summarized table",
                column_name
            ))
        })?;

        let mut excluded = 0usize;
        for (row, &value) in values.iter().enumerate() {
            let out_of_range = bounds.min.is_some_and(|min| value < min)
                || bounds.max.is_some_and(|max| value > max);
            if out_of_range && keep[row] {
                excluded += 1;
                keep[row] = false;
            }
        }
        info!(
            predicate = column_name,
            excluded, "Applied count constraint"
        );
    }

    Ok(keep)
}

/// Filter the subject universe on subject-level facts: keep subjects whose
/// static (null-timestamp) row is positive in every listed column, then drop
/// the static rows and columns.
pub fn check_static_variables(
    static_predicates: &[&str],
    frame: &PredicateFrame,
) -> Result<PredicateFrame> {
    for name in static_predicates {
        if !frame.has_column(name) {
            return Err(Error::MissingColumn(format!(
                "static predicate '{}' not found in the predicates dataframe",
                name
            )));
        }
    }

    let columns: Vec<&[i64]> = static_predicates
        .iter()
        .filter_map(|name| frame.column(name))
        .collect();

    let mut keep = vec![false; frame.num_rows()];
    for range in frame.subject_ranges() {
        // The static row, when present, sorts first within the subject.
        let static_row = range.start;
        let admitted = frame.timestamps()[static_row].is_none()
            && columns.iter().all(|col| col[static_row] > 0);
        if admitted {
            for row in range {
                keep[row] = frame.timestamps()[row].is_some();
            }
        }
    }

    let mut filtered = frame.clone();
    filtered.retain_rows(&keep);
    let names: Vec<&str> = static_predicates.to_vec();
    filtered.drop_columns(&names);
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1989, 12, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn bounds(min: Option<i64>, max: Option<i64>) -> CountBounds {
        CountBounds { min, max }
    }

    #[test]
    fn test_mask_applies_min_and_max() {
        let values = [0i64, 1, 2, 3, 4];
        let constraints = vec![("p".to_string(), bounds(Some(1), Some(3)))];
        let keep = constraint_mask(&constraints, 5, |name| {
            (name == "p").then_some(&values[..])
        })
        .unwrap();
        assert_eq!(keep, vec![false, true, true, true, false]);
    }

    #[test]
    fn test_mask_open_sides() {
        let values = [0i64, 5, 10];
        let max_only = vec![("p".to_string(), bounds(None, Some(0)))];
        let keep = constraint_mask(&max_only, 3, |_| Some(&values[..])).unwrap();
        assert_eq!(keep, vec![true, false, false]);

        let min_only = vec![("p".to_string(), bounds(Some(1), None))];
        let keep = constraint_mask(&min_only, 3, |_| Some(&values[..])).unwrap();
        assert_eq!(keep, vec![false, true, true]);
    }

    #[test]
    fn test_mask_rejects_invalid_tuples() {
        let values = [0i64];
        assert!(constraint_mask(
            &[("p".to_string(), bounds(None, None))],
            1,
            |_| Some(&values[..])
        )
        .is_err());
        assert!(constraint_mask(
            &[("p".to_string(), bounds(Some(3), Some(1)))],
            1,
            |_| Some(&values[..])
        )
        .is_err());
        assert!(constraint_mask(
            &[("_".to_string(), bounds(Some(1), None))],
            1,
            |_| Some(&values[..])
        )
        .is_err());
    }

    #[test]
    fn test_mask_star_binds_to_any_event() {
        let values = [0i64, 2];
        let constraints = vec![("*".to_string(), bounds(Some(1), None))];
        let keep = constraint_mask(&constraints, 2, |name| {
            (name == ANY_EVENT_COLUMN).then_some(&values[..])
        })
        .unwrap();
        assert_eq!(keep, vec![false, true]);
    }

    #[test]
    fn test_static_filter_keeps_positive_subjects() {
        let mut frame = PredicateFrame::new(
            vec![1, 1, 1, 2, 2],
            vec![None, Some(dt(1, 12, 3)), Some(dt(2, 5, 17)), None, Some(dt(1, 13, 14))],
        )
        .unwrap();
        frame.set_column("is_a", vec![0, 1, 4, 3, 3]).unwrap();
        frame.set_column("male", vec![1, 0, 0, 0, 0]).unwrap();

        let filtered = check_static_variables(&["male"], &frame).unwrap();
        assert_eq!(filtered.subject_ids(), &[1, 1]);
        assert!(filtered.timestamps().iter().all(|ts| ts.is_some()));
        assert!(!filtered.has_column("male"));
        assert_eq!(filtered.column("is_a").unwrap(), &[1, 4]);
    }

    #[test]
    fn test_static_filter_missing_column() {
        let frame = PredicateFrame::new(vec![1], vec![None]).unwrap();
        let err = check_static_variables(&["female"], &frame).unwrap_err();
        assert!(err.to_string().contains("female"));
    }
}
