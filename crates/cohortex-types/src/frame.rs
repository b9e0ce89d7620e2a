use std::ops::Range;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// A named predicate column holding one integer count per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<i64>,
}

/// Column-oriented predicate table over `(subject_id, timestamp, p1..pk)`.
///
/// Rows are sorted by `(subject_id, timestamp)` with null timestamps first
/// within each subject; a null timestamp marks a subject-level (static) row.
/// `validate` checks these properties; the aggregation kernels rely on them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateFrame {
    subject_ids: Vec<i64>,
    timestamps: Vec<Option<NaiveDateTime>>,
    columns: Vec<Column>,
}

impl PredicateFrame {
    pub fn new(subject_ids: Vec<i64>, timestamps: Vec<Option<NaiveDateTime>>) -> Result<Self> {
        if subject_ids.len() != timestamps.len() {
            return Err(Error::Shape(format!(
                "subject_id and timestamp lengths differ: {} vs {}",
                subject_ids.len(),
                timestamps.len()
            )));
        }
        Ok(Self {
            subject_ids,
            timestamps,
            columns: Vec::new(),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.subject_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subject_ids.is_empty()
    }

    pub fn subject_ids(&self) -> &[i64] {
        &self.subject_ids
    }

    pub fn timestamps(&self) -> &[Option<NaiveDateTime>] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[i64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Add a predicate column, replacing any existing column of the same name.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<i64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.num_rows() {
            return Err(Error::Shape(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.num_rows()
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        self.columns.retain(|c| !names.contains(&c.name.as_str()));
    }

    /// Keep only the rows where `keep` is true. `keep` must cover every row.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let index: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        self.subject_ids = index.iter().map(|&i| self.subject_ids[i]).collect();
        self.timestamps = index.iter().map(|&i| self.timestamps[i]).collect();
        for col in &mut self.columns {
            col.values = index.iter().map(|&i| col.values[i]).collect();
        }
    }

    /// Sort rows by `(subject_id, timestamp)` with null timestamps first.
    /// The sort is stable, so equal keys keep their input order.
    pub fn sort_rows(&mut self) {
        let mut order: Vec<usize> = (0..self.num_rows()).collect();
        order.sort_by_key(|&i| (self.subject_ids[i], self.timestamps[i]));

        self.subject_ids = order.iter().map(|&i| self.subject_ids[i]).collect();
        self.timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        for col in &mut self.columns {
            col.values = order.iter().map(|&i| col.values[i]).collect();
        }
    }

    /// Check the shape invariants: sorted by `(subject_id, timestamp)` with
    /// nulls first, at most one null-timestamp row per subject, and unique
    /// `(subject_id, timestamp)` pairs.
    pub fn validate(&self) -> Result<()> {
        for i in 1..self.num_rows() {
            let (prev_subj, subj) = (self.subject_ids[i - 1], self.subject_ids[i]);
            if prev_subj > subj {
                return Err(Error::Shape(format!(
                    "rows are not sorted by subject_id at row {}",
                    i
                )));
            }
            if prev_subj < subj {
                continue;
            }
            match (self.timestamps[i - 1], self.timestamps[i]) {
                (None, None) => {
                    return Err(Error::Shape(format!(
                        "subject {} has more than one null-timestamp row",
                        subj
                    )));
                }
                (Some(_), None) => {
                    return Err(Error::Shape(format!(
                        "null-timestamp row out of order for subject {}",
                        subj
                    )));
                }
                (Some(prev_ts), Some(ts)) if prev_ts >= ts => {
                    return Err(Error::Shape(format!(
                        "(subject_id, timestamp) not strictly increasing for subject {} at {}",
                        subj, ts
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Contiguous row ranges, one per subject, in frame order.
    pub fn subject_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for i in 1..=self.num_rows() {
            if i == self.num_rows() || self.subject_ids[i] != self.subject_ids[start] {
                ranges.push(start..i);
                start = i;
            }
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1989, 12, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample() -> PredicateFrame {
        let mut frame = PredicateFrame::new(
            vec![1, 1, 1, 2, 2],
            vec![None, Some(ts(1, 12)), Some(ts(2, 5)), Some(ts(1, 13)), Some(ts(3, 15))],
        )
        .unwrap();
        frame.set_column("is_a", vec![0, 1, 0, 1, 0]).unwrap();
        frame
    }

    #[test]
    fn test_validate_accepts_sorted_frame() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_timestamps() {
        let frame = PredicateFrame::new(
            vec![1, 1],
            vec![Some(ts(1, 12)), Some(ts(1, 12))],
        )
        .unwrap();
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unsorted_subjects() {
        let frame = PredicateFrame::new(vec![2, 1], vec![None, None]).unwrap();
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_double_static_rows() {
        let frame = PredicateFrame::new(vec![1, 1], vec![None, None]).unwrap();
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_sort_rows_puts_nulls_first() {
        let mut frame = PredicateFrame::new(
            vec![2, 1, 1],
            vec![Some(ts(1, 13)), Some(ts(1, 12)), None],
        )
        .unwrap();
        frame.set_column("is_a", vec![3, 2, 1]).unwrap();
        frame.sort_rows();

        assert_eq!(frame.subject_ids(), &[1, 1, 2]);
        assert_eq!(frame.timestamps()[0], None);
        assert_eq!(frame.column("is_a").unwrap(), &[1, 2, 3]);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_retain_rows_filters_every_column() {
        let mut frame = sample();
        frame.retain_rows(&[false, true, true, true, false]);
        assert_eq!(frame.num_rows(), 3);
        assert_eq!(frame.subject_ids(), &[1, 1, 2]);
        assert_eq!(frame.column("is_a").unwrap(), &[1, 0, 1]);
    }

    #[test]
    fn test_subject_ranges() {
        let frame = sample();
        let ranges = frame.subject_ranges();
        assert_eq!(ranges, vec![0..3, 3..5]);
    }

    #[test]
    fn test_set_column_replaces_existing() {
        let mut frame = sample();
        frame.set_column("is_a", vec![9, 9, 9, 9, 9]).unwrap();
        assert_eq!(frame.columns().len(), 1);
        assert_eq!(frame.column("is_a").unwrap(), &[9; 5]);
    }

    #[test]
    fn test_set_column_rejects_length_mismatch() {
        let mut frame = sample();
        assert!(frame.set_column("is_b", vec![1, 2]).is_err());
    }
}
