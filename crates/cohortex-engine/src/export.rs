use chrono::NaiveDateTime;
use cohortex_types::QueryResult;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};

/// One row of the MEDS label schema.
///
/// `boolean_value` carries the coerced label; the other optional value
/// columns exist for schema compatibility and are always null here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedsLabelRow {
    pub subject_id: i64,
    pub prediction_time: Option<NaiveDateTime>,
    pub boolean_value: Option<bool>,
    pub integer_value: Option<i64>,
    pub float_value: Option<f64>,
    pub categorical_value: Option<String>,
}

/// Reshape a query result into MEDS label rows: `label` becomes
/// `boolean_value` (nonzero means true) and the window summary columns are
/// dropped.
pub fn to_meds_labels(result: &QueryResult) -> Result<Vec<MedsLabelRow>> {
    if !result.has_prediction_time {
        warn!(
            "Result has no prediction_time column; declare `index_timestamp` on a window to \
             populate the MEDS prediction time"
        );
    }
    if !result.node_names.is_empty() {
        warn!(
            dropped = result.node_names.len(),
            "Dropping window summary columns not present in the MEDS label schema"
        );
    }
    if !result.has_label && !result.is_empty() {
        return Err(Error::Export(
            "result has no label column to export as boolean_value".to_string(),
        ));
    }

    Ok(result
        .rows
        .iter()
        .map(|row| MedsLabelRow {
            subject_id: row.subject_id,
            prediction_time: row.prediction_time,
            boolean_value: row.label.map(|count| count != 0),
            integer_value: None,
            float_value: None,
            categorical_value: None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cohortex_types::CohortRow;

    fn result_with_label(label: Option<i64>) -> QueryResult {
        let trigger = NaiveDate::from_ymd_opt(1991, 1, 27)
            .unwrap()
            .and_hms_opt(23, 32, 0)
            .unwrap();
        QueryResult {
            predicate_names: vec!["death".to_string()],
            node_names: vec!["target.end".to_string()],
            has_label: true,
            has_prediction_time: true,
            rows: vec![CohortRow {
                subject_id: 1,
                trigger,
                prediction_time: Some(trigger),
                label,
                summaries: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_label_coerces_to_boolean() {
        let rows = to_meds_labels(&result_with_label(Some(0))).unwrap();
        assert_eq!(rows[0].boolean_value, Some(false));

        // Counts above one still coerce to true; the raw count lives only
        // in the engine result.
        let rows = to_meds_labels(&result_with_label(Some(3))).unwrap();
        assert_eq!(rows[0].boolean_value, Some(true));
    }

    #[test]
    fn test_unlabeled_result_is_rejected() {
        let mut result = result_with_label(Some(1));
        result.has_label = false;
        result.rows[0].label = None;
        assert!(to_meds_labels(&result).is_err());
    }

    #[test]
    fn test_empty_result_exports_empty() {
        let mut result = result_with_label(None);
        result.has_label = false;
        result.rows.clear();
        assert!(to_meds_labels(&result).unwrap().is_empty());
    }
}
