//! Request bodies sent to the reporter API.

use crate::format::ErrorFormatter;
use crate::step::{render_trace, Step};
use crate::types::{ArtifactRef, RunStatus, TestRun, TestStatus};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

pub const REF_KEY: &str = "$ref";

/// Body of `POST /api/reporter` and of the resume `PUT`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunBody {
    pub api_key: String,
    pub title: Option<String>,
    pub parallel: bool,
    pub group_title: Option<String>,
    pub env: Option<String>,
}

/// Body of the final `PUT /api/reporter/{run_id}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusUpdateBody {
    pub api_key: String,
    pub status_event: String,
    pub status: RunStatus,
}

impl StatusUpdateBody {
    pub fn new(api_key: impl Into<String>, status: RunStatus, parallel: bool) -> Self {
        Self {
            api_key: api_key.into(),
            status_event: status.status_event(parallel),
            status,
        }
    }
}

/// Body of `POST /api/reporter/{run_id}/testrun`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TestRunPayload {
    pub api_key: String,
    pub files: Vec<String>,
    pub steps: Value,
    pub status: TestStatus,
    pub stack: String,
    pub example: Option<Value>,
    pub title: Option<String>,
    pub suite_title: Option<String>,
    pub suite_id: Option<String>,
    pub test_id: Option<String>,
    pub message: String,
    pub run_time: Option<f64>,
    pub artifacts: Vec<ArtifactRef>,
}

impl TestRunPayload {
    /// Builds the body for one result. An explicit `test_id` wins over the
    /// one carried by `run`.
    pub fn build(
        api_key: &str,
        test_id: Option<String>,
        status: TestStatus,
        run: &TestRun,
        formatter: &ErrorFormatter,
        artifacts: Vec<ArtifactRef>,
    ) -> Self {
        let step_trace = render_trace(&run.steps);
        let failure_text = run.failure.as_ref().map(|failure| formatter.format(failure));
        let stack = formatter.compose(Some(step_trace.as_str()), failure_text.as_deref());

        let message = run
            .message
            .clone()
            .or_else(|| run.failure.as_ref().map(|f| f.message.clone()))
            .unwrap_or_default();

        Self {
            api_key: api_key.to_string(),
            files: run
                .files
                .iter()
                .map(|file| file.to_string_lossy().into_owned())
                .collect(),
            steps: Decycler::new().steps(&run.steps),
            status,
            stack,
            example: run.example.clone(),
            title: run.title.clone(),
            suite_title: run.suite_title.clone(),
            suite_id: run.suite_id.clone(),
            test_id: test_id.or_else(|| run.test_id.clone()),
            message,
            run_time: run.run_time,
            artifacts,
        }
    }
}

/// Serializes step graphs, replacing every repeated node with
/// `{"$ref": "<path of first occurrence>"}`.
///
/// Paths use `$` for the root followed by `[index]` and `.field` segments,
/// e.g. `$[0].children[1]`. [`resolve_ref`] reverses them.
#[derive(Debug, Default)]
pub struct Decycler {
    seen: HashMap<usize, String>,
}

impl Decycler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&mut self, steps: &[Step]) -> Value {
        Value::Array(
            steps
                .iter()
                .enumerate()
                .map(|(index, step)| self.step(step, format!("$[{}]", index)))
                .collect(),
        )
    }

    fn step(&mut self, step: &Step, path: String) -> Value {
        if let Some(first) = self.seen.get(&step.id()) {
            return json!({ REF_KEY: first });
        }
        self.seen.insert(step.id(), path.clone());

        let mut object = Map::new();
        object.insert("title".to_string(), Value::String(step.title().to_string()));
        if let Some(status) = step.status() {
            object.insert("status".to_string(), json!(status));
        }
        if let Some(duration) = step.duration() {
            object.insert("duration".to_string(), json!(duration));
        }

        let children = step
            .children()
            .iter()
            .enumerate()
            .map(|(index, child)| self.step(child, format!("{}.children[{}]", path, index)))
            .collect();
        object.insert("children".to_string(), Value::Array(children));

        let parent = match step.parent() {
            Some(parent) => self.step(&parent, format!("{}.parent", path)),
            None => Value::Null,
        };
        object.insert("parent".to_string(), parent);

        Value::Object(object)
    }
}

/// Follows a `$ref` path produced by [`Decycler`] inside `root`.
pub fn resolve_ref<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut rest = path.strip_prefix('$')?;
    let mut current = root;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let index: usize = after[..end].parse().ok()?;
            current = current.as_array()?.get(index)?;
            rest = &after[end + 1..];
        } else if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            current = current.as_object()?.get(&after[..end])?;
            rest = &after[end..];
        } else {
            return None;
        }
    }

    Some(current)
}

/// Returns the target when `value` is a `{"$ref": ...}` placeholder.
pub fn follow<'a>(root: &'a Value, value: &'a Value) -> Option<&'a Value> {
    match value.get(REF_KEY).and_then(Value::as_str) {
        Some(path) => resolve_ref(root, path),
        None => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_update_body() {
        let body = StatusUpdateBody::new("key", RunStatus::Passed, true);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"api_key": "key", "status_event": "pass_parallel", "status": "passed"})
        );
    }

    #[test]
    fn test_run_body_shape() {
        let body = RunBody {
            api_key: "key".into(),
            title: Some("nightly".into()),
            parallel: false,
            group_title: None,
            env: Some("ci".into()),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"api_key": "key", "title": "nightly", "parallel": false, "group_title": null, "env": "ci"})
        );
    }

    #[test]
    fn test_build_payload() {
        let root = Step::new("open page");
        root.child("click");
        let run = TestRun::new("logs in")
            .with_test_id("from-run")
            .with_suite("Auth", Some("S1".into()))
            .with_run_time(42.0)
            .with_example(json!({"user": "admin"}))
            .with_file("/tmp/shot.png")
            .with_step(root)
            .with_failure(crate::format::Failure::new("expected 1").with_diff("2", "1"));

        let payload = TestRunPayload::build(
            "key",
            Some("explicit".into()),
            TestStatus::Failed,
            &run,
            &ErrorFormatter::new(false),
            vec![ArtifactRef::new("https://s3/shot.png")],
        );

        assert_eq!(payload.test_id.as_deref(), Some("explicit"));
        assert_eq!(payload.message, "expected 1");
        assert_eq!(payload.files, vec!["/tmp/shot.png".to_string()]);
        assert!(payload.stack.starts_with("• open page\n  • click\n\n"));
        assert!(payload.stack.contains("[ Failure ]"));
        assert!(payload.stack.contains("+ expected: 1"));
        assert_eq!(payload.steps[0]["children"][0]["parent"], json!({"$ref": "$[0]"}));

        let value = serde_json::to_value(&payload).unwrap();
        for key in [
            "api_key", "files", "steps", "status", "stack", "example", "title",
            "suite_title", "suite_id", "test_id", "message", "run_time", "artifacts",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["status"], "failed");
        assert_eq!(value["artifacts"], json!(["https://s3/shot.png"]));
    }

    #[test]
    fn test_build_payload_without_failure() {
        let run = TestRun::new("t")
            .with_test_id("embedded")
            .with_message("ok")
            .with_step(Step::new("only step"));

        let payload = TestRunPayload::build(
            "key",
            None,
            TestStatus::Passed,
            &run,
            &ErrorFormatter::new(false),
            Vec::new(),
        );

        assert_eq!(payload.test_id.as_deref(), Some("embedded"));
        assert_eq!(payload.stack, "• only step");
        assert_eq!(payload.message, "ok");

        let bare = TestRunPayload::build(
            "key",
            None,
            TestStatus::Skipped,
            &TestRun::default(),
            &ErrorFormatter::new(false),
            Vec::new(),
        );
        assert_eq!(bare.stack, "");
        assert_eq!(bare.steps, json!([]));
    }

    #[test]
    fn test_back_reference_becomes_ref() {
        let root = Step::new("root");
        let child = root.child("child");
        child.child("grandchild");

        let value = Decycler::new().steps(&[root]);

        assert_eq!(value[0]["title"], "root");
        assert_eq!(value[0]["parent"], Value::Null);
        assert_eq!(value[0]["children"][0]["parent"], json!({"$ref": "$[0]"}));
        assert_eq!(
            value[0]["children"][0]["children"][0]["parent"],
            json!({"$ref": "$[0].children[0]"})
        );
    }

    #[test]
    fn test_cyclic_tree_round_trips() {
        let root = Step::new("suite hook");
        let child = root.child("step");

        let text = serde_json::to_string(&Decycler::new().steps(&[child.clone(), root])).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        // The child came first, so its parent is serialized in full under it
        // and the later top-level root is a reference back to that position.
        assert_eq!(parsed[0]["parent"]["title"], "suite hook");
        assert_eq!(parsed[0]["parent"]["children"][0], json!({"$ref": "$[0]"}));
        assert_eq!(parsed[1], json!({"$ref": "$[0].parent"}));

        let root_again = follow(&parsed, &parsed[1]).unwrap();
        assert_eq!(root_again["title"], "suite hook");
        let child_again = follow(&parsed, &root_again["children"][0]).unwrap();
        assert_eq!(child_again["title"], "step");
    }

    #[test]
    fn test_shared_node_serialized_once() {
        let shared = Step::new("shared");
        let a = Step::new("a");
        a.add_child(&shared);

        let value = Decycler::new().steps(&[a, shared]);
        assert_eq!(value[1], json!({"$ref": "$[0].children[0]"}));
    }

    #[test]
    fn test_resolve_ref_rejects_bad_paths() {
        let value = json!([{"children": []}]);
        assert!(resolve_ref(&value, "$[0].children[3]").is_none());
        assert!(resolve_ref(&value, "[0]").is_none());
        assert!(resolve_ref(&value, "$[x]").is_none());
        assert_eq!(resolve_ref(&value, "$"), Some(&value));
    }
}
