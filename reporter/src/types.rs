use crate::format::Failure;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Outcome of a single test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passed" | "pass" => Ok(TestStatus::Passed),
            "failed" | "fail" => Ok(TestStatus::Failed),
            "skipped" | "skip" | "pending" => Ok(TestStatus::Skipped),
            _ => Err(format!("Invalid test status: {}", s)),
        }
    }
}

/// Aggregate status sent when a run is finalized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
    /// Run ended without a pass/fail verdict.
    Finished,
}

pub const PARALLEL_SUFFIX: &str = "_parallel";

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Finished => "finished",
        }
    }

    /// Event tag understood by the reporter API, e.g. `pass` or `fail_parallel`.
    pub fn status_event(&self, parallel: bool) -> String {
        let tag = match self {
            RunStatus::Passed => "pass",
            RunStatus::Failed => "fail",
            RunStatus::Finished => "finish",
        };
        if parallel {
            format!("{}{}", tag, PARALLEL_SUFFIX)
        } else {
            tag.to_string()
        }
    }

    /// Failed if any test failed, passed otherwise. An empty run is `Finished`.
    pub fn aggregate<'a>(statuses: impl IntoIterator<Item = &'a TestStatus>) -> Self {
        let mut seen_any = false;
        for status in statuses {
            seen_any = true;
            if *status == TestStatus::Failed {
                return RunStatus::Failed;
            }
        }
        if seen_any {
            RunStatus::Passed
        } else {
            RunStatus::Finished
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passed" | "pass" => Ok(RunStatus::Passed),
            "failed" | "fail" => Ok(RunStatus::Failed),
            "finished" | "finish" => Ok(RunStatus::Finished),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// Opaque reference returned by an [`crate::ArtifactResolver`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Everything known about one executed test.
#[derive(Debug, Clone, Default)]
pub struct TestRun {
    pub test_id: Option<String>,
    pub title: Option<String>,
    pub suite_title: Option<String>,
    pub suite_id: Option<String>,
    pub message: Option<String>,
    pub failure: Option<Failure>,
    /// Elapsed time in milliseconds.
    pub run_time: Option<f64>,
    pub example: Option<serde_json::Value>,
    pub files: Vec<PathBuf>,
    pub steps: Vec<Step>,
}

impl TestRun {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    pub fn with_suite(mut self, suite_title: impl Into<String>, suite_id: Option<String>) -> Self {
        self.suite_title = Some(suite_title.into());
        self.suite_id = suite_id;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_failure(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_run_time(mut self, millis: f64) -> Self {
        self.run_time = Some(millis);
        self
    }

    pub fn with_example(mut self, example: serde_json::Value) -> Self {
        self.example = Some(example);
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.files.push(file.into());
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}
