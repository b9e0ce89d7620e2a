use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;
use cohortex_engine::MedsLabelRow;
use cohortex_types::QueryResult;
use serde_json::{json, Map, Value};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: Option<NaiveDateTime>) -> Value {
    match ts {
        Some(ts) => Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        None => Value::Null,
    }
}

/// Write one JSON object per cohort row, with one nested summary object per
/// retained window-tree node.
pub fn write_json(result: &QueryResult, mut out: impl Write) -> Result<()> {
    for row in &result.rows {
        let mut object = Map::new();
        object.insert("subject_id".to_string(), json!(row.subject_id));
        if result.has_prediction_time {
            object.insert(
                "prediction_time".to_string(),
                format_ts(row.prediction_time),
            );
        }
        if result.has_label {
            object.insert("label".to_string(), json!(row.label));
        }
        object.insert("trigger".to_string(), format_ts(Some(row.trigger)));

        for summary in &row.summaries {
            let mut fields = Map::new();
            fields.insert("window_name".to_string(), json!(summary.window_name));
            fields.insert(
                "timestamp_at_start".to_string(),
                format_ts(summary.timestamp_at_start),
            );
            fields.insert(
                "timestamp_at_end".to_string(),
                format_ts(summary.timestamp_at_end),
            );
            for (name, count) in result.predicate_names.iter().zip(&summary.counts) {
                fields.insert(name.clone(), json!(count));
            }
            object.insert(
                format!("{}_summary", summary.window_name),
                Value::Object(fields),
            );
        }

        serde_json::to_writer(&mut out, &Value::Object(object))?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Write flat MEDS label rows as CSV.
pub fn write_meds_csv(rows: &[MedsLabelRow], out: impl Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
