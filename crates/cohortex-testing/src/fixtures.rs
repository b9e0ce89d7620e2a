use chrono::NaiveDateTime;
use cohortex_task::TaskConfig;
use cohortex_types::PredicateFrame;

/// Parse a fixture timestamp of the form `12/1/1989 12:03`.
pub fn parse_ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%m/%d/%Y %H:%M")
        .unwrap_or_else(|e| panic!("bad fixture timestamp '{}': {}", raw, e))
}

fn frame_from_rows(
    columns: &[&str],
    rows: &[(i64, Option<&str>, &[&str])],
) -> PredicateFrame {
    let subject_ids = rows.iter().map(|(s, _, _)| *s).collect();
    let timestamps = rows.iter().map(|(_, ts, _)| ts.map(parse_ts)).collect();
    let mut frame = PredicateFrame::new(subject_ids, timestamps).expect("fixture shape");
    for &column in columns {
        let values = rows
            .iter()
            .map(|(_, _, flags)| i64::from(flags.contains(&column)))
            .collect();
        frame.set_column(column, values).expect("fixture column");
    }
    frame
}

/// Two-subject frame from the temporal aggregation reference cases:
/// `is_a`, `is_b`, `is_c` counts over six rows.
pub fn temporal_frame() -> PredicateFrame {
    let mut frame = PredicateFrame::new(
        vec![1, 1, 1, 1, 2, 2],
        [
            "12/1/1989 12:03",
            "12/2/1989 5:17",
            "12/2/1989 12:03",
            "12/6/1989 11:00",
            "12/1/1989 13:14",
            "12/3/1989 15:17",
        ]
        .into_iter()
        .map(|ts| Some(parse_ts(ts)))
        .collect(),
    )
    .expect("fixture shape");
    frame.set_column("is_a", vec![1, 0, 1, 0, 0, 0]).expect("fixture column");
    frame.set_column("is_b", vec![0, 1, 0, 1, 1, 0]).expect("fixture column");
    frame.set_column("is_c", vec![1, 1, 0, 0, 1, 0]).expect("fixture column");
    frame
}

/// Two-subject frame from the event-bound aggregation reference cases;
/// `is_c` marks the boundary rows.
pub fn event_bound_frame() -> PredicateFrame {
    let mut frame = PredicateFrame::new(
        vec![1, 1, 1, 2, 2, 2, 2, 2],
        [
            "12/1/1989 12:03",
            "12/3/1989 13:14",
            "12/5/1989 15:17",
            "12/2/1989 12:03",
            "12/4/1989 13:14",
            "12/6/1989 15:17",
            "12/8/1989 16:22",
            "12/10/1989 3:07",
        ]
        .into_iter()
        .map(|ts| Some(parse_ts(ts)))
        .collect(),
    )
    .expect("fixture shape");
    frame.set_column("is_a", vec![1, 0, 1, 1, 1, 1, 0, 0]).expect("fixture column");
    frame.set_column("is_b", vec![0, 1, 0, 1, 0, 1, 1, 1]).expect("fixture column");
    frame.set_column("is_c", vec![0, 1, 0, 0, 0, 1, 0, 1]).expect("fixture column");
    frame
}

/// The canonical in-hospital-mortality task document.
pub const MORTALITY_TASK_YAML: &str = r#"
description: 24-hour in-hospital mortality prediction
predicates:
  admission:
    code: event_type//ADMISSION
  discharge:
    code: event_type//DISCHARGE
  death:
    code: event_type//DEATH
  discharge_or_death:
    expr: or(discharge, death)
  male:
    code: SEX//male
    static: true
trigger: admission
windows:
  input:
    start: NULL
    end: trigger + 24h
    start_inclusive: True
    end_inclusive: True
    has:
      _ANY_EVENT: (5, None)
    index_timestamp: end
  gap:
    start: trigger
    end: start + 48h
    start_inclusive: False
    end_inclusive: True
    has:
      admission: (None, 0)
      discharge: (None, 0)
      death: (None, 0)
  target:
    start: gap.end
    end: start -> discharge_or_death
    start_inclusive: False
    end_inclusive: True
    label: death
"#;

pub fn mortality_task() -> TaskConfig {
    TaskConfig::from_yaml_str(MORTALITY_TASK_YAML).expect("fixture task")
}

/// The canonical mortality dataset: three event-bearing subjects plus
/// subject-level demographics. Subject 2 is not male; subject 3's input
/// window is too sparse; subject 1's second admission is the one surviving
/// realization.
pub fn mortality_frame() -> PredicateFrame {
    const A: &[&str] = &["admission"];
    const D: &[&str] = &["discharge"];
    const X: &[&str] = &["death"];
    const M: &[&str] = &["male"];
    const N: &[&str] = &[];

    let rows: &[(i64, Option<&str>, &[&str])] = &[
        (1, None, M),
        (1, Some("12/1/1989 12:03"), A),
        (1, Some("12/1/1989 13:14"), N),
        (1, Some("12/1/1989 15:17"), N),
        (1, Some("12/1/1989 16:17"), N),
        (1, Some("12/1/1989 20:17"), N),
        (1, Some("12/2/1989 3:00"), N),
        (1, Some("12/2/1989 9:00"), N),
        (1, Some("12/2/1989 10:00"), N),
        (1, Some("12/2/1989 14:22"), N),
        (1, Some("12/2/1989 15:00"), D),
        (1, Some("1/21/1991 11:59"), N),
        (1, Some("1/27/1991 23:32"), A),
        (1, Some("1/27/1991 23:46"), N),
        (1, Some("1/28/1991 3:18"), N),
        (1, Some("1/28/1991 3:28"), N),
        (1, Some("1/28/1991 4:36"), N),
        (1, Some("1/29/1991 23:32"), N),
        (1, Some("1/30/1991 5:00"), N),
        (1, Some("1/30/1991 8:00"), N),
        (1, Some("1/30/1991 11:00"), N),
        (1, Some("1/30/1991 14:00"), N),
        (1, Some("1/30/1991 14:15"), N),
        (1, Some("1/31/1991 1:00"), N),
        (1, Some("1/31/1991 2:15"), D),
        (1, Some("2/8/1991 8:15"), N),
        (1, Some("3/3/1991 19:33"), A),
        (1, Some("3/3/1991 20:33"), N),
        (1, Some("3/3/1991 21:38"), X),
        (2, None, N),
        (2, Some("3/8/1996 2:24"), A),
        (2, Some("3/8/1996 2:35"), N),
        (2, Some("3/8/1996 4:00"), N),
        (2, Some("3/8/1996 10:00"), N),
        (2, Some("3/8/1996 16:00"), D),
        (2, Some("6/5/1996 0:32"), A),
        (2, Some("6/5/1996 0:48"), N),
        (2, Some("6/5/1996 1:59"), N),
        (2, Some("6/7/1996 6:00"), N),
        (2, Some("6/7/1996 9:00"), N),
        (2, Some("6/7/1996 12:00"), N),
        (2, Some("6/7/1996 15:00"), N),
        (2, Some("6/8/1996 3:00"), X),
        (3, None, M),
        (3, Some("3/8/1996 2:22"), N),
        (3, Some("3/8/1996 2:24"), A),
        (3, Some("3/8/1996 2:37"), N),
        (3, Some("3/9/1996 8:00"), N),
        (3, Some("3/9/1996 11:00"), N),
        (3, Some("3/9/1996 19:00"), N),
        (3, Some("3/9/1996 22:00"), N),
        (3, Some("3/11/1996 21:00"), N),
        (3, Some("3/12/1996 0:00"), X),
    ];

    frame_from_rows(&["admission", "discharge", "death", "male"], rows)
}
