//! Step trees attached to test results.
//!
//! Children are owned by their parent; every child keeps a weak link back to
//! the parent, so a tree walked through both edges is cyclic. Serializers must
//! go through [`crate::payload::Decycler`].

use crate::types::TestStatus;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

struct StepNode {
    title: String,
    status: Option<TestStatus>,
    duration: Option<f64>,
    children: RwLock<Vec<Step>>,
    parent: RwLock<Weak<StepNode>>,
}

/// Shared handle to a node in a step tree. Cloning shares the node.
#[derive(Clone)]
pub struct Step(Arc<StepNode>);

impl Step {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_details(title, None, None)
    }

    pub fn with_details(
        title: impl Into<String>,
        status: Option<TestStatus>,
        duration: Option<f64>,
    ) -> Self {
        Self(Arc::new(StepNode {
            title: title.into(),
            status,
            duration,
            children: RwLock::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
        }))
    }

    pub fn title(&self) -> &str {
        &self.0.title
    }

    pub fn status(&self) -> Option<TestStatus> {
        self.0.status
    }

    /// Duration in milliseconds.
    pub fn duration(&self) -> Option<f64> {
        self.0.duration
    }

    /// Identity of the underlying node; equal for clones of the same step.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn children(&self) -> Vec<Step> {
        self.0
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn parent(&self) -> Option<Step> {
        self.0
            .parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
            .map(Step)
    }

    /// Appends `child` and points its parent link here.
    ///
    /// Returns `false` without changing anything when `child` is this step or
    /// one of its ancestors, since owning an ancestor would leak the tree.
    pub fn add_child(&self, child: &Step) -> bool {
        if self.is_self_or_descendant_of(child) {
            return false;
        }

        *child.0.parent.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(&self.0);
        self.0
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child.clone());
        true
    }

    /// Convenience for building trees top-down.
    pub fn child(&self, title: impl Into<String>) -> Step {
        let child = Step::new(title);
        self.add_child(&child);
        child
    }

    fn is_self_or_descendant_of(&self, other: &Step) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(step) = cursor {
            if step.id() == other.id() {
                return true;
            }
            cursor = step.parent();
        }
        false
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Step {}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("title", &self.0.title)
            .field("status", &self.0.status)
            .field("duration", &self.0.duration)
            .field("children", &self.children().len())
            .field("parent", &self.parent().map(|p| p.0.title.clone()))
            .finish()
    }
}

/// Plain-text rendering of step trees, one indented line per step.
pub fn render_trace(steps: &[Step]) -> String {
    let mut lines = Vec::new();
    let mut visited = HashSet::new();
    for step in steps {
        render_into(step, 0, &mut visited, &mut lines);
    }
    lines.join("\n")
}

fn render_into(step: &Step, depth: usize, visited: &mut HashSet<usize>, lines: &mut Vec<String>) {
    if !visited.insert(step.id()) {
        return;
    }

    let marker = match step.status() {
        Some(TestStatus::Passed) => "✔",
        Some(TestStatus::Failed) => "✖",
        Some(TestStatus::Skipped) => "-",
        None => "•",
    };

    let mut line = format!("{}{} {}", "  ".repeat(depth), marker, step.title());
    if let Some(duration) = step.duration() {
        line.push_str(&format!(" ({}ms)", duration.round()));
    }
    lines.push(line);

    for child in step.children() {
        render_into(&child, depth + 1, visited, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_links() {
        let root = Step::new("open page");
        let child = root.child("click login");
        let grandchild = child.child("wait for redirect");

        assert_eq!(root.children(), vec![child.clone()]);
        assert_eq!(child.parent(), Some(root.clone()));
        assert_eq!(grandchild.parent().and_then(|p| p.parent()), Some(root.clone()));
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_add_child_rejects_ancestors() {
        let root = Step::new("root");
        let child = root.child("child");

        assert!(!child.add_child(&root));
        assert!(!root.add_child(&root));
        assert!(child.children().is_empty());
    }

    #[test]
    fn test_tree_is_dropped() {
        let root = Step::new("root");
        let child = root.child("child");
        let weak_root = Arc::downgrade(&root.0);

        drop(root);
        assert!(weak_root.upgrade().is_none());
        assert!(child.parent().is_none());
    }

    #[test]
    fn test_render_trace() {
        let root = Step::with_details("login", Some(TestStatus::Passed), Some(120.4));
        root.add_child(&Step::with_details("type password", Some(TestStatus::Failed), None));
        let other = Step::new("teardown");

        let trace = render_trace(&[root, other]);
        assert_eq!(
            trace,
            "✔ login (120ms)\n  ✖ type password\n• teardown"
        );
    }

    #[test]
    fn test_render_trace_shared_step_once() {
        let shared = Step::new("shared");
        let a = Step::new("a");
        a.add_child(&shared);

        let trace = render_trace(&[a, shared]);
        assert_eq!(trace.matches("shared").count(), 1);
    }
}
