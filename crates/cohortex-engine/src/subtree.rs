use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDateTime};
use cohortex_task::WindowTree;
use cohortex_types::{BoundDirection, EndpointExpr, PredicateFrame, WindowSummary};
use tracing::info;

use crate::constraints::constraint_mask;
use crate::error::{Error, Result};
use crate::event_bound::aggregate_event_bound_window;
use crate::temporal::aggregate_temporal_window;

/// A candidate origin for a subtree evaluation.
pub(crate) type Anchor = (i64, NaiveDateTime);

/// One realization of a subtree: the anchor it grew from plus the window
/// summaries collected below it.
#[derive(Debug, Clone)]
pub(crate) struct Realization {
    pub subject_id: i64,
    pub anchor: NaiveDateTime,
    pub summaries: Vec<WindowSummary>,
}

/// Evaluate the subtree rooted at `node` for every candidate anchor,
/// returning the anchors that realize every descendant window together with
/// their per-node summaries.
///
/// `offset_from_anchor` accumulates the temporal displacement between the
/// current anchors and the node they stand for; it threads into temporal
/// children and resets when an event-bound child establishes a new concrete
/// anchor row.
pub(crate) fn extract_subtree(
    tree: &WindowTree,
    node: usize,
    anchors: &[Anchor],
    frame: &PredicateFrame,
    offset_from_anchor: Duration,
) -> Result<Vec<Realization>> {
    let children = &tree.node(node).children;
    if children.is_empty() {
        return Ok(anchors
            .iter()
            .map(|&(subject_id, anchor)| Realization {
                subject_id,
                anchor,
                summaries: Vec::new(),
            })
            .collect());
    }

    let anchor_set: HashSet<Anchor> = anchors.iter().copied().collect();
    let mut child_results: Vec<Vec<Realization>> = Vec::with_capacity(children.len());

    for &child in children {
        let child_node = tree.node(child);
        info!(node = child_node.name.as_str(), "Summarizing subtree");

        // Step 1: summarize the window from the current anchors to this
        // child, threading the accumulated offset into the endpoint.
        let endpoint = child_node.endpoint.as_ref().ok_or_else(|| {
            Error::Endpoint(format!(
                "node '{}' carries no endpoint expression",
                child_node.name
            ))
        })?;
        let (agg, child_anchor_of_row, child_offset) = match endpoint {
            EndpointExpr::Temporal(bounds) => {
                let mut bounds = bounds.clone();
                bounds.offset = bounds.offset + offset_from_anchor;
                let agg = aggregate_temporal_window(frame, &bounds)?;
                // A temporal child keeps the anchor row; the displacement
                // rides along in the offset instead.
                let anchors_by_row: Vec<Option<NaiveDateTime>> =
                    agg.timestamps.iter().copied().map(Some).collect();
                (agg, anchors_by_row, offset_from_anchor + bounds.window_size)
            }
            EndpointExpr::Event(bounds) => {
                let mut bounds = bounds.clone();
                bounds.offset = bounds.offset + offset_from_anchor;
                let direction = bounds.direction();
                let agg = aggregate_event_bound_window(frame, &bounds)?;
                // The bound row is a real event and becomes the anchor for
                // the subtree below, so the offset starts over.
                let anchors_by_row = match direction {
                    BoundDirection::RowToBound => agg.ends.clone(),
                    BoundDirection::BoundToRow => agg.starts.clone(),
                };
                (agg, anchors_by_row, Duration::zero())
            }
        };

        // Step 2: restrict to rows anchoring a live subtree realization.
        let mut keep: Vec<bool> = (0..agg.num_rows())
            .map(|row| anchor_set.contains(&(agg.subject_ids[row], agg.timestamps[row])))
            .collect();

        // Step 3: apply this child's count constraints.
        let constraint_keep = constraint_mask(
            &child_node.constraints,
            agg.num_rows(),
            |name| agg.count_column(name),
        )?;
        for (flag, ok) in keep.iter_mut().zip(constraint_keep) {
            *flag = *flag && ok;
        }

        // Step 4: promote valid child anchors, deduplicated in first-seen
        // order. Rows whose bound never materialized cannot anchor a child.
        let mut child_anchors: Vec<Anchor> = Vec::new();
        let mut seen: HashSet<Anchor> = HashSet::new();
        for row in 0..agg.num_rows() {
            if !keep[row] {
                continue;
            }
            if let Some(child_anchor) = child_anchor_of_row[row] {
                let key = (agg.subject_ids[row], child_anchor);
                if seen.insert(key) {
                    child_anchors.push(key);
                }
            }
        }

        // Step 5: recurse below the child.
        let descendant = extract_subtree(tree, child, &child_anchors, frame, child_offset)?;

        // Step 6: lift the recursive result back into this anchor space and
        // attach this child's summary per surviving row.
        let mut lift: HashMap<Anchor, Vec<usize>> = HashMap::new();
        let mut summaries: Vec<(NaiveDateTime, WindowSummary)> = Vec::with_capacity(agg.num_rows());
        for row in 0..agg.num_rows() {
            if !keep[row] {
                continue;
            }
            let Some(child_anchor) = child_anchor_of_row[row] else {
                continue;
            };
            lift.entry((agg.subject_ids[row], child_anchor))
                .or_default()
                .push(summaries.len());
            summaries.push((
                agg.timestamps[row],
                WindowSummary {
                    window_name: child_node.name.clone(),
                    timestamp_at_start: agg.starts[row],
                    timestamp_at_end: agg.ends[row],
                    counts: agg.counts_for_row(row),
                },
            ));
        }

        let mut lifted: Vec<Realization> = Vec::new();
        for realization in descendant {
            let Some(rows) = lift.get(&(realization.subject_id, realization.anchor)) else {
                continue;
            };
            for &slot in rows {
                let (anchor, summary) = &summaries[slot];
                let mut merged = Vec::with_capacity(1 + realization.summaries.len());
                merged.push(summary.clone());
                merged.extend(realization.summaries.iter().cloned());
                lifted.push(Realization {
                    subject_id: realization.subject_id,
                    anchor: *anchor,
                    summaries: merged,
                });
            }
        }
        child_results.push(lifted);
    }

    // Step 7: inner-join the children; a realization survives only when
    // every child subtree realizes under the same anchor.
    let mut results = child_results.into_iter();
    let mut joined = match results.next() {
        Some(first) => first,
        None => Vec::new(),
    };
    for sibling in results {
        let mut by_anchor: HashMap<Anchor, Vec<&Realization>> = HashMap::new();
        for realization in &sibling {
            by_anchor
                .entry((realization.subject_id, realization.anchor))
                .or_default()
                .push(realization);
        }
        let mut merged = Vec::new();
        for left in &joined {
            let Some(matches) = by_anchor.get(&(left.subject_id, left.anchor)) else {
                continue;
            };
            for right in matches {
                let mut summaries = left.summaries.clone();
                summaries.extend(right.summaries.iter().cloned());
                merged.push(Realization {
                    subject_id: left.subject_id,
                    anchor: left.anchor,
                    summaries,
                });
            }
        }
        joined = merged;
    }

    Ok(joined)
}
