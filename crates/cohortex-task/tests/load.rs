use std::io::Write;

use cohortex_task::TaskConfig;

const TASK: &str = r#"
predicates:
  admission:
    code: event_type//ADMISSION
  discharge:
    code: event_type//DISCHARGE
trigger: admission
windows:
  stay:
    start: trigger
    end: start -> discharge
    start_inclusive: True
    end_inclusive: True
"#;

#[test]
fn test_load_from_yaml_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(TASK.as_bytes()).unwrap();

    let cfg = TaskConfig::load(file.path()).unwrap();
    assert_eq!(cfg.trigger(), "admission");
    assert_eq!(cfg.tree().summary_names(), vec!["stay.end"]);
}

#[test]
fn test_load_missing_file_names_the_path() {
    let err = TaskConfig::load("/nonexistent/task.yaml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/task.yaml"));
}

#[test]
fn test_load_rejects_non_yaml_extension() {
    assert!(TaskConfig::load("/tmp/task.toml").is_err());
}
