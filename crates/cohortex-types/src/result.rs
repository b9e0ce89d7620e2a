use chrono::NaiveDateTime;

/// Aggregated statistics for one retained window-tree node, attached to a
/// single cohort row.
///
/// `counts` is parallel to the predicate column order recorded in
/// [`QueryResult::predicate_names`].
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub window_name: String,
    pub timestamp_at_start: Option<NaiveDateTime>,
    pub timestamp_at_end: Option<NaiveDateTime>,
    pub counts: Vec<i64>,
}

/// One realization of the full window tree for one subject and trigger event.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortRow {
    pub subject_id: i64,
    pub trigger: NaiveDateTime,
    pub prediction_time: Option<NaiveDateTime>,
    pub label: Option<i64>,
    /// One summary per retained node, ordered as [`QueryResult::node_names`].
    pub summaries: Vec<WindowSummary>,
}

/// The engine's result table.
///
/// The schema (predicate order, retained node names, optional columns) is
/// carried even when `rows` is empty, so an empty shard still yields a
/// well-formed output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub predicate_names: Vec<String>,
    /// Retained window-tree node names in tree preorder, trigger excluded.
    pub node_names: Vec<String>,
    pub has_label: bool,
    pub has_prediction_time: bool,
    pub rows: Vec<CohortRow>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}
