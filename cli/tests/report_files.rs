use cli::{expand_patterns, overall_status, read_results, FileSettings};
use reporter::{ErrorFormatter, ReporterConfig, RunStatus, TestRunPayload, TestStatus};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_result_files_become_payloads() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("unit.json"),
        r#"{"tests": [
            {"test_id": "@T1a2b", "title": "adds", "status": "passed", "run_time": 3.5},
            {"title": "divides", "status": "failed", "message": "wrong quotient",
             "diff": {"actual": "3", "expected": "4"},
             "steps": [{"title": "prepare", "status": "passed", "duration": 1.2,
                        "children": [{"title": "load fixture", "status": "passed"}]},
                       {"title": "divide", "status": "failed"}]}
        ]}"#,
    )
    .unwrap();

    let files = expand_patterns(&[format!("{}/*.json", dir.path().display())]).unwrap();
    let records = read_results(&files[0]).unwrap();
    assert_eq!(overall_status(&records), RunStatus::Failed);

    let formatter = ErrorFormatter::new(false);
    let passed = TestRunPayload::build(
        "key",
        records[0].test_id.clone(),
        records[0].status,
        &records[0].to_test_run(),
        &formatter,
        Vec::new(),
    );
    assert_eq!(passed.test_id.as_deref(), Some("@T1a2b"));
    assert_eq!(passed.run_time, Some(3.5));
    assert_eq!(passed.stack, "");

    let failed = TestRunPayload::build(
        "key",
        None,
        TestStatus::Failed,
        &records[1].to_test_run(),
        &formatter,
        Vec::new(),
    );
    assert_eq!(failed.message, "wrong quotient");
    assert!(failed.stack.starts_with(
        "✔ prepare (1ms)\n  ✔ load fixture\n✖ divide\n\n################[ Failure ]################\nwrong quotient"
    ));
    assert!(failed.stack.ends_with("+ expected: 4\n- actual:   3"));
    assert_eq!(failed.steps[0]["children"][0]["parent"]["$ref"], "$[0]");
}

#[test]
fn test_settings_file_under_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("testomat.toml");
    fs::write(
        &path,
        "url = \"https://self-hosted.example\"\napi_key = \"tstmt_file\"\nenv = \"staging\"\n",
    )
    .unwrap();

    let config = FileSettings::load(&path)
        .unwrap()
        .apply(ReporterConfig::new())
        .with_env("production");

    assert_eq!(config.api_root(), "https://self-hosted.example");
    assert_eq!(config.env.as_deref(), Some("production"));
    assert!(config.validate().is_ok());
}
