//! JSON result files consumed by `testomat report`.
//!
//! A file holds either a list of results or an object with a `tests` list:
//!
//! ```json
//! {"tests": [{"title": "logs in", "status": "failed", "message": "expected 200",
//!             "diff": {"actual": "500", "expected": "200"},
//!             "steps": [{"title": "open page", "status": "passed"}]}]}
//! ```

use crate::settings::CliError;
use reporter::{Failure, RunStatus, Step, TestRun, TestStatus};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ResultFile {
    List(Vec<ResultRecord>),
    Wrapped { tests: Vec<ResultRecord> },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiffRecord {
    pub actual: String,
    pub expected: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StepRecord {
    pub title: String,
    #[serde(default)]
    pub status: Option<TestStatus>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub children: Vec<StepRecord>,
}

impl StepRecord {
    fn to_step(&self) -> Step {
        let step = Step::with_details(self.title.clone(), self.status, self.duration);
        for child in &self.children {
            step.add_child(&child.to_step());
        }
        step
    }
}

/// One test result as written by a test framework integration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResultRecord {
    #[serde(default)]
    pub test_id: Option<String>,
    pub title: String,
    pub status: TestStatus,
    #[serde(default)]
    pub suite_title: Option<String>,
    #[serde(default)]
    pub suite_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub diff: Option<DiffRecord>,
    #[serde(default)]
    pub run_time: Option<f64>,
    #[serde(default)]
    pub example: Option<Value>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl ResultRecord {
    /// Failed records carry their message, diff and stack as a [`Failure`];
    /// other records only keep the message.
    pub fn to_test_run(&self) -> TestRun {
        let mut run = TestRun::new(self.title.clone());
        run.test_id = self.test_id.clone();
        run.suite_title = self.suite_title.clone();
        run.suite_id = self.suite_id.clone();
        run.run_time = self.run_time;
        run.example = self.example.clone();
        run.files = self.files.clone();
        run.steps = self.steps.iter().map(StepRecord::to_step).collect();

        if self.status == TestStatus::Failed {
            let mut failure = Failure::new(self.message.clone().unwrap_or_default());
            if let Some(diff) = &self.diff {
                failure = failure.with_diff(diff.actual.clone(), diff.expected.clone());
            }
            if let Some(stack) = &self.stack {
                failure = failure.with_stack(stack.clone());
            }
            run.failure = Some(failure);
        } else {
            run.message = self.message.clone();
        }

        run
    }
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRecord>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ResultFile = serde_json::from_str(&text).map_err(|source| CliError::ResultFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match file {
        ResultFile::List(records) => records,
        ResultFile::Wrapped { tests } => tests,
    })
}

/// Expands glob patterns into a sorted, de-duplicated list of files.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for pattern in patterns {
        let entries = glob::glob(pattern).map_err(|source| CliError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        files.extend(entries.filter_map(Result::ok).filter(|path| path.is_file()));
    }
    files.sort();
    files.dedup();
    Ok(files)
}

pub fn overall_status(records: &[ResultRecord]) -> RunStatus {
    RunStatus::aggregate(records.iter().map(|record| &record.status))
}
