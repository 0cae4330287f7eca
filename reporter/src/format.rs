use crate::transport::{ReporterError, ReporterResult};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

const SOURCE_CONTEXT_LINES: usize = 2;
const FAILURE_BANNER: &str = "################[ Failure ]################";

const STYLE_EXPECTED: &str = "32";
const STYLE_ACTUAL: &str = "31";
const STYLE_BANNER: &str = "1;31";
const STYLE_DIM: &str = "2";

/// Expected and actual values of a failed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub actual: String,
    pub expected: String,
}

/// A failure raised by a test.
///
/// The message is always present; the diff, the custom rendering and the
/// stack trace are optional capabilities checked with `has_*`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Failure {
    pub message: String,
    pub inspect: Option<String>,
    pub diff: Option<Diff>,
    pub stack: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_diff(mut self, actual: impl Into<String>, expected: impl Into<String>) -> Self {
        self.diff = Some(Diff {
            actual: actual.into(),
            expected: expected.into(),
        });
        self
    }

    pub fn with_inspect(mut self, rendering: impl Into<String>) -> Self {
        self.inspect = Some(rendering.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn has_diff(&self) -> bool {
        self.diff.is_some()
    }

    pub fn has_custom_message(&self) -> bool {
        self.inspect.is_some()
    }

    pub fn display_message(&self) -> &str {
        self.inspect.as_deref().unwrap_or(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    pub function: Option<String>,
    pub file: String,
    pub line: usize,
    pub column: Option<usize>,
}

impl StackFrame {
    pub fn is_internal(&self) -> bool {
        const INTERNAL_PREFIXES: [&str; 3] = ["/rustc/", "internal/", "node:"];
        const INTERNAL_PARTS: [&str; 3] = ["/library/std/src/", "/library/core/src/", "/library/alloc/src/"];

        let file = self.file.replace('\\', "/");
        INTERNAL_PREFIXES.iter().any(|p| file.starts_with(p))
            || INTERNAL_PARTS.iter().any(|p| file.contains(p))
    }

    pub fn is_dependency(&self) -> bool {
        const DEPENDENCY_DIRS: [&str; 4] = ["/.cargo/registry/", "/.cargo/git/", "/node_modules/", "/vendor/"];

        let file = self.file.replace('\\', "/");
        DEPENDENCY_DIRS.iter().any(|dir| file.contains(dir))
    }

    pub fn is_real_file(&self) -> bool {
        Path::new(&self.file).is_file()
    }

    pub fn is_reportable(&self) -> bool {
        !self.is_internal() && !self.is_dependency() && self.is_real_file()
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = match self.column {
            Some(column) => format!("{}:{}:{}", self.file, self.line, column),
            None => format!("{}:{}", self.file, self.line),
        };
        match &self.function {
            Some(function) => write!(f, "{} ({})", function, location),
            None => f.write_str(&location),
        }
    }
}

fn location_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<file>(?:[A-Za-z]:)?[^\s():]+):(?P<line>\d+)(?::(?P<col>\d+))?")
            .expect("location pattern is valid")
    })
}

fn inline_function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*at\s+(?P<func>[^\s(]+)\s+\(").expect("function pattern is valid")
    })
}

fn numbered_function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\d+:\s+(?P<func>\S.*?)\s*$").expect("frame pattern is valid")
    })
}

/// Extracts frames from both `at func (file:line:col)` traces and Rust
/// backtraces, where the function sits on the line above its location.
pub fn parse_frames(stack: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut pending_function: Option<String> = None;

    for line in stack.lines() {
        if let Some(caps) = location_regex().captures(line) {
            let Ok(line_number) = caps["line"].parse::<usize>() else {
                continue;
            };
            let function = inline_function_regex()
                .captures(line)
                .map(|c| c["func"].to_string())
                .or_else(|| pending_function.take());

            frames.push(StackFrame {
                function,
                file: caps["file"].to_string(),
                line: line_number,
                column: caps.name("col").and_then(|c| c.as_str().parse().ok()),
            });
            pending_function = None;
        } else if let Some(caps) = numbered_function_regex().captures(line) {
            pending_function = Some(caps["func"].to_string());
        }
    }

    frames
}

/// Renders failures and step traces into the `stack` text of a test result.
#[derive(Debug, Clone)]
pub struct ErrorFormatter {
    colored: bool,
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ErrorFormatter {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    fn paint(&self, style: &str, text: &str) -> String {
        if self.colored {
            format!("\x1b[{}m{}\x1b[0m", style, text)
        } else {
            text.to_string()
        }
    }

    /// Message, diff and stack. A stack that fails to render is logged and
    /// left out; the rest of the text is kept.
    pub fn format(&self, failure: &Failure) -> String {
        let mut text = failure.display_message().to_string();

        if let Some(diff) = &failure.diff {
            text.push_str("\n\n");
            text.push_str(&self.render_diff(diff));
        }

        if let Some(stack) = &failure.stack {
            match self.render_stack(stack) {
                Ok(rendered) if !rendered.is_empty() => {
                    text.push_str("\n\n");
                    text.push_str(&rendered);
                }
                Ok(_) => {}
                Err(e) => warn!("Could not render stack trace: {}", e),
            }
        }

        text
    }

    pub fn render_diff(&self, diff: &Diff) -> String {
        let mut lines = Self::tag_lines("+", "expected:", &diff.expected)
            .into_iter()
            .map(|line| self.paint(STYLE_EXPECTED, &line))
            .collect::<Vec<_>>();
        lines.extend(
            Self::tag_lines("-", "actual:", &diff.actual)
                .into_iter()
                .map(|line| self.paint(STYLE_ACTUAL, &line)),
        );
        lines.join("\n")
    }

    fn tag_lines(marker: &str, tag: &str, value: &str) -> Vec<String> {
        const TAG_WIDTH: usize = 10;
        let mut lines = Vec::new();
        for (index, line) in value.split('\n').enumerate() {
            let label = if index == 0 { tag } else { "" };
            lines.push(format!("{} {:<width$}{}", marker, label, line, width = TAG_WIDTH));
        }
        lines
    }

    /// Source excerpt of the first reportable frame followed by the list of
    /// reportable frames. Empty when no frame qualifies.
    pub fn render_stack(&self, stack: &str) -> ReporterResult<String> {
        let frames: Vec<StackFrame> = parse_frames(stack)
            .into_iter()
            .filter(StackFrame::is_reportable)
            .collect();

        let Some(first) = frames.first() else {
            return Ok(String::new());
        };

        let mut rendered = self.code_frame(first)?;
        rendered.push('\n');
        for frame in &frames {
            rendered.push_str(&format!("\n    at {}", frame));
        }
        Ok(rendered)
    }

    fn code_frame(&self, frame: &StackFrame) -> ReporterResult<String> {
        let source = std::fs::read_to_string(&frame.file).map_err(|e| ReporterError::Formatting {
            message: format!("cannot read {}: {}", frame.file, e),
        })?;
        let lines: Vec<&str> = source.lines().collect();

        if frame.line == 0 || frame.line > lines.len() {
            return Err(ReporterError::Formatting {
                message: format!(
                    "line {} is outside of {} ({} lines)",
                    frame.line,
                    frame.file,
                    lines.len()
                ),
            });
        }

        let start = frame.line.saturating_sub(SOURCE_CONTEXT_LINES + 1);
        let end = (frame.line + SOURCE_CONTEXT_LINES).min(lines.len());
        let width = end.to_string().len();

        let excerpt = (start..end)
            .map(|index| {
                let number = index + 1;
                if number == frame.line {
                    self.paint(
                        STYLE_ACTUAL,
                        &format!("> {:>width$} | {}", number, lines[index], width = width),
                    )
                } else {
                    self.paint(
                        STYLE_DIM,
                        &format!("  {:>width$} | {}", number, lines[index], width = width),
                    )
                }
            })
            .collect::<Vec<_>>();

        Ok(excerpt.join("\n"))
    }

    /// Joins the step trace and the failure text under a failure banner.
    pub fn compose(&self, step_trace: Option<&str>, failure_text: Option<&str>) -> String {
        let step_trace = step_trace.filter(|t| !t.trim().is_empty());
        match (step_trace, failure_text) {
            (Some(trace), Some(text)) => {
                format!("{}\n\n{}\n{}", trace, self.paint(STYLE_BANNER, FAILURE_BANNER), text)
            }
            (Some(trace), None) => trace.to_string(),
            (None, Some(text)) => text.to_string(),
            (None, None) => String::new(),
        }
    }
}
