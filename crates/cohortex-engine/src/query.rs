use chrono::Duration;
use cohortex_task::{CountBounds, Endpoint, TaskConfig};
use cohortex_types::{CohortRow, PredicateFrame, QueryResult};
use tracing::{info, warn};

use crate::constraints::{check_static_variables, constraint_mask};
use crate::error::{Error, Result};
use crate::prepare::materialize;
use crate::subtree::{extract_subtree, Anchor};

/// Evaluate a task specification against a predicate table.
///
/// A pure function of its inputs: validates the frame shape, materializes
/// derived and reserved columns, applies the subject-level static filter,
/// seeds one candidate anchor per trigger event, walks the window tree, and
/// shapes the result. An empty result is not an error; the returned table
/// always carries the declared schema.
pub fn query(cfg: &TaskConfig, frame: &PredicateFrame) -> Result<QueryResult> {
    frame.validate()?;

    let mut frame = frame.clone();
    materialize(&mut frame, cfg)?;

    let static_predicates = cfg.static_predicates();
    let frame = if static_predicates.is_empty() {
        info!("No static predicates declared; dropping null-timestamp rows");
        let keep: Vec<bool> = frame.timestamps().iter().map(|ts| ts.is_some()).collect();
        let mut frame = frame;
        frame.retain_rows(&keep);
        frame
    } else {
        info!("Filtering subjects on static predicates");
        check_static_variables(&static_predicates, &frame)?
    };

    let mut result = QueryResult {
        predicate_names: frame.column_names().map(String::from).collect(),
        node_names: cfg.tree().summary_names(),
        has_label: cfg.label_window().is_some(),
        has_prediction_time: cfg.index_timestamp_window().is_some(),
        rows: Vec::new(),
    };

    if frame.is_empty() {
        warn!("No rows remain after subject filtering; returning an empty result");
        return Ok(result);
    }

    info!("Window tree:\n{}", cfg.tree());
    info!("Beginning query...");

    // Seed the root with one candidate anchor per trigger event.
    let trigger_constraint = [(
        cfg.trigger().to_string(),
        CountBounds { min: Some(1), max: None },
    )];
    let keep = constraint_mask(&trigger_constraint, frame.num_rows(), |name| {
        frame.column(name)
    })?;
    let anchors: Vec<Anchor> = keep
        .iter()
        .enumerate()
        .filter(|&(_, &kept)| kept)
        .filter_map(|(row, _)| {
            frame.timestamps()[row].map(|ts| (frame.subject_ids()[row], ts))
        })
        .collect();

    if anchors.is_empty() {
        warn!(trigger = cfg.trigger(), "No rows found for the trigger event");
        return Ok(result);
    }

    let realizations = extract_subtree(
        cfg.tree(),
        cfg.tree().root(),
        &anchors,
        &frame,
        Duration::zero(),
    )?;

    let label = cfg.label_node();
    let index = cfg.index_node();
    let label_index = match &label {
        Some((_, predicate)) => {
            Some(result.predicate_names.iter().position(|n| n == predicate).ok_or_else(
                || {
                    Error::MissingColumn(format!(
                        "label predicate '{}' is not a column of the predicate table",
                        predicate
                    ))
                },
            )?)
        }
        None => None,
    };

    for realization in realizations {
        // Re-order the collected summaries into tree preorder.
        let summaries = result
            .node_names
            .iter()
            .map(|name| {
                realization
                    .summaries
                    .iter()
                    .find(|s| &s.window_name == name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::Endpoint(format!(
                            "realization is missing a summary for node '{}'",
                            name
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let label_value = match (&label, label_index) {
            (Some((node, _)), Some(col)) => summaries
                .iter()
                .find(|s| &s.window_name == node)
                .map(|s| s.counts[col]),
            _ => None,
        };
        let prediction_time = index.as_ref().and_then(|(node, field)| {
            let summary = summaries.iter().find(|s| &s.window_name == node)?;
            match field {
                Endpoint::Start => summary.timestamp_at_start,
                Endpoint::End => summary.timestamp_at_end,
            }
        });

        result.rows.push(CohortRow {
            subject_id: realization.subject_id,
            trigger: realization.anchor,
            prediction_time,
            label: label_value,
            summaries,
        });
    }

    result.rows.sort_by_key(|row| (row.subject_id, row.trigger));

    if result.rows.is_empty() {
        warn!("No valid realizations found; returning an empty result");
    } else {
        let subjects: std::collections::HashSet<i64> =
            result.rows.iter().map(|r| r.subject_id).collect();
        info!(
            rows = result.rows.len(),
            subjects = subjects.len(),
            "Query complete"
        );
        if result.has_label {
            let mut labels = result.rows.iter().filter_map(|r| r.label);
            if let Some(first) = labels.next() {
                if labels.all(|l| l == first) {
                    warn!(
                        label = first,
                        "All labels in the extracted cohort are the same; double-check the \
                         task configuration if this is not expected"
                    );
                }
            }
        }
    }

    Ok(result)
}
