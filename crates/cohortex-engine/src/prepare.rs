use cohortex_task::{Combinator, TaskConfig};
use cohortex_types::{
    PredicateFrame, ANY_EVENT_COLUMN, RECORD_END_COLUMN, RECORD_START_COLUMN,
};
use tracing::info;

use crate::error::{Error, Result};

/// Materialize the task's derived predicate columns (in dependency order)
/// and the reserved columns the task references, on top of the plain
/// predicate columns supplied by the upstream generator.
pub fn materialize(frame: &mut PredicateFrame, cfg: &TaskConfig) -> Result<()> {
    let static_names = cfg.static_predicates();

    for (name, derived) in cfg.derived_predicates() {
        let inputs: Vec<Vec<i64>> = derived
            .inputs
            .iter()
            .map(|input| {
                let values = frame.column(input).ok_or_else(|| {
                    Error::MissingColumn(format!(
                        "derived predicate '{}' needs column '{}'",
                        name, input
                    ))
                })?;
                // Subject-level facts live on the static row only; spread
                // them across the subject before combining.
                if static_names.contains(&input.as_str()) {
                    Ok(propagate_per_subject(frame, values))
                } else {
                    Ok(values.to_vec())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let column = (0..frame.num_rows())
            .map(|row| {
                let hit = match derived.combinator {
                    Combinator::And => inputs.iter().all(|col| col[row] > 0),
                    Combinator::Or => inputs.iter().any(|col| col[row] > 0),
                };
                i64::from(hit)
            })
            .collect();
        frame.set_column(name, column)?;
        info!(predicate = name, "Added derived predicate column");
    }

    let mut wants_any_event = cfg.trigger() == ANY_EVENT_COLUMN;
    let mut wants_record_start = cfg.trigger() == RECORD_START_COLUMN;
    let mut wants_record_end = cfg.trigger() == RECORD_END_COLUMN;
    for (_, window) in cfg.windows() {
        for referenced in window.referenced_predicates() {
            if referenced == ANY_EVENT_COLUMN || referenced == "*" {
                wants_any_event = true;
            }
        }
        for constrained in window.constraint_predicates() {
            match constrained {
                "*" => wants_any_event = true,
                RECORD_START_COLUMN => wants_record_start = true,
                RECORD_END_COLUMN => wants_record_end = true,
                _ => {}
            }
        }
    }

    if wants_any_event {
        let column = frame
            .timestamps()
            .iter()
            .map(|ts| i64::from(ts.is_some()))
            .collect();
        frame.set_column(ANY_EVENT_COLUMN, column)?;
    }
    if wants_record_start {
        frame.set_column(RECORD_START_COLUMN, record_marker(frame, true))?;
    }
    if wants_record_end {
        frame.set_column(RECORD_END_COLUMN, record_marker(frame, false))?;
    }

    Ok(())
}

/// Spread each subject's first value (its static row) across the subject.
fn propagate_per_subject(frame: &PredicateFrame, values: &[i64]) -> Vec<i64> {
    let mut out = vec![0i64; values.len()];
    for range in frame.subject_ranges() {
        let first = values[range.start];
        for slot in &mut out[range] {
            *slot = first;
        }
    }
    out
}

/// 1 on each subject's earliest (or latest) real-timestamp row, else 0.
fn record_marker(frame: &PredicateFrame, start: bool) -> Vec<i64> {
    let mut out = vec![0i64; frame.num_rows()];
    for range in frame.subject_ranges() {
        let real = range.filter(|&row| frame.timestamps()[row].is_some());
        let marked = if start {
            real.clone().next()
        } else {
            real.clone().next_back()
        };
        if let Some(row) = marked {
            out[row] = 1;
        }
    }
    out
}
