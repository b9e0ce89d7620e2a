use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use cohortex_task::{PredicateDef, TaskConfig};
use cohortex_types::PredicateFrame;
use tracing::info;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Load a predicate table from CSV, keeping only the task's declared plain
/// predicate columns.
///
/// An empty timestamp field marks a subject-level (static) row. Rows are
/// sorted by `(subject_id, timestamp)` with nulls first, and rows sharing a
/// `(subject_id, timestamp)` key are merged by summing their counts, the
/// same clean-up the upstream predicate generator applies.
pub fn load_predicate_csv(path: &Path, cfg: &TaskConfig) -> Result<PredicateFrame> {
    let plain_names: Vec<&str> = cfg
        .predicates()
        .iter()
        .filter(|(_, def)| matches!(def, PredicateDef::Plain(_)))
        .map(|(name, _)| name.as_str())
        .collect();

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open predicate table '{}'", path.display()))?;
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let Some(subject_col) = position("subject_id") else {
        bail!("predicate table '{}' lacks a 'subject_id' column", path.display());
    };
    let Some(timestamp_col) = position("timestamp") else {
        bail!("predicate table '{}' lacks a 'timestamp' column", path.display());
    };
    let predicate_cols: Vec<(usize, &str)> = plain_names
        .iter()
        .map(|&name| {
            position(name)
                .map(|idx| (idx, name))
                .with_context(|| format!("predicate table lacks declared column '{}'", name))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rows: Vec<(i64, Option<NaiveDateTime>, Vec<i64>)> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("row {} is unreadable", line + 2))?;
        let subject_id: i64 = record
            .get(subject_col)
            .unwrap_or_default()
            .trim()
            .parse()
            .with_context(|| format!("row {}: bad subject_id", line + 2))?;
        let timestamp = parse_timestamp(record.get(timestamp_col).unwrap_or_default())
            .with_context(|| format!("row {}: bad timestamp", line + 2))?;
        let counts = predicate_cols
            .iter()
            .map(|&(idx, name)| {
                let field = record.get(idx).unwrap_or_default().trim();
                if field.is_empty() {
                    Ok(0)
                } else {
                    field.parse::<i64>().with_context(|| {
                        format!("row {}: column '{}' is not an integer count", line + 2, name)
                    })
                }
            })
            .collect::<Result<Vec<i64>>>()?;
        rows.push((subject_id, timestamp, counts));
    }

    rows.sort_by_key(|(subject_id, timestamp, _)| (*subject_id, *timestamp));

    // Merge duplicate (subject, timestamp) keys by summing counts.
    let mut merged: Vec<(i64, Option<NaiveDateTime>, Vec<i64>)> = Vec::with_capacity(rows.len());
    for row in rows {
        match merged.last_mut() {
            Some(last) if last.0 == row.0 && last.1 == row.1 => {
                for (acc, v) in last.2.iter_mut().zip(&row.2) {
                    *acc += v;
                }
            }
            _ => merged.push(row),
        }
    }

    let mut frame = PredicateFrame::new(
        merged.iter().map(|(s, _, _)| *s).collect(),
        merged.iter().map(|(_, ts, _)| *ts).collect(),
    )?;
    for (slot, &name) in plain_names.iter().enumerate() {
        frame.set_column(name, merged.iter().map(|(_, _, c)| c[slot]).collect())?;
    }

    info!(
        rows = frame.num_rows(),
        columns = plain_names.len(),
        "Loaded predicate table"
    );
    Ok(frame)
}

fn parse_timestamp(field: &str) -> Result<Option<NaiveDateTime>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(field, format) {
            return Ok(Some(ts));
        }
    }
    bail!("unrecognized timestamp '{}'", field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn task() -> TaskConfig {
        TaskConfig::from_yaml_str(
            r#"
predicates:
  admission:
    code: ADMISSION
  discharge:
    code: DISCHARGE
trigger: admission
windows:
  stay:
    start: trigger
    end: start -> discharge
    start_inclusive: True
    end_inclusive: True
"#,
        )
        .unwrap()
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_loads_and_sorts() {
        let file = write_csv(
            "subject_id,timestamp,admission,discharge,extra\n\
             2,1996-03-08 02:24:00,1,0,9\n\
             1,,0,0,9\n\
             1,1989-12-01 12:03:00,1,0,9\n",
        );
        let frame = load_predicate_csv(file.path(), &task()).unwrap();
        assert_eq!(frame.subject_ids(), &[1, 1, 2]);
        assert_eq!(frame.timestamps()[0], None);
        // Undeclared columns are not loaded.
        assert!(!frame.has_column("extra"));
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_merges_duplicate_timestamps() {
        let file = write_csv(
            "subject_id,timestamp,admission,discharge\n\
             1,06/07/1996 15:00,1,0\n\
             1,06/07/1996 15:00,0,1\n",
        );
        let frame = load_predicate_csv(file.path(), &task()).unwrap();
        assert_eq!(frame.num_rows(), 1);
        assert_eq!(frame.column("admission").unwrap(), &[1]);
        assert_eq!(frame.column("discharge").unwrap(), &[1]);
    }

    #[test]
    fn test_missing_declared_column() {
        let file = write_csv("subject_id,timestamp,admission\n1,,0\n");
        let err = load_predicate_csv(file.path(), &task()).unwrap_err();
        assert!(err.to_string().contains("discharge"));
    }

    #[test]
    fn test_missing_subject_column() {
        let file = write_csv("patient,timestamp,admission,discharge\n");
        assert!(load_predicate_csv(file.path(), &task()).is_err());
    }
}
