//! Highlights lines of the paused call stack.
//!
//! Every frame below the top one that has a source becomes a whole-line
//! decoration. Frames sharing a line (recursion) collapse into one decoration
//! that reports how many times the line occurs on the stack.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::SettingsStore;

/// One frame reported by the debugger, top of stack first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub id: i64,
    /// Source file path, `None` for frames without source
    pub path: Option<String>,
    /// One-based line
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameLineDecoration {
    /// One-based line
    pub line: u32,
    /// Smallest distance to the top frame among the frames on this line
    pub frames_up: usize,
    pub recursion_count: usize,
    /// Id of the deepest frame on this line
    pub latest_frame_id: i64,
}

impl FrameLineDecoration {
    /// Zero-based editor line
    pub fn editor_line(&self) -> u32 {
        self.line.saturating_sub(1)
    }

    /// Text rendered after the line, e.g. `2 Stack Frames up, 3rd Recursion`.
    pub fn label(&self) -> String {
        let plural = if self.frames_up == 1 { "" } else { "s" };
        let mut label = format!("{} Stack Frame{plural} up", self.frames_up);
        if self.recursion_count != 1 {
            label.push_str(&format!(", {} Recursion", ordinal(self.recursion_count)));
        }
        label
    }
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, rem) if rem != 11 => "st",
        (2, rem) if rem != 12 => "nd",
        (3, rem) if rem != 13 => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Decorations for every source path on the stack, lines in order of first
/// appearance.
pub fn decorations_by_path(frames: &[StackFrame]) -> BTreeMap<String, Vec<FrameLineDecoration>> {
    let mut by_path: BTreeMap<String, Vec<FrameLineDecoration>> = BTreeMap::new();
    let sourced = frames
        .iter()
        .filter_map(|frame| frame.path.as_deref().map(|path| (path, frame)))
        .enumerate()
        .skip(1);

    for (frames_up, (path, frame)) in sourced {
        let decorations = by_path.entry(path.to_string()).or_default();
        match decorations.iter_mut().find(|d| d.line == frame.line) {
            Some(existing) => {
                existing.frames_up = existing.frames_up.min(frames_up);
                existing.recursion_count += 1;
                existing.latest_frame_id = frame.id;
            }
            None => decorations.push(FrameLineDecoration {
                line: frame.line,
                frames_up,
                recursion_count: 1,
                latest_frame_id: frame.id,
            }),
        }
    }
    by_path
}

pub struct StackFrameLineHighlighter {
    settings: Arc<SettingsStore>,
}

impl StackFrameLineHighlighter {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self { settings }
    }

    /// Decorations for the editor showing `path`.
    pub fn decorations(&self, frames: &[StackFrame], path: &str) -> Vec<FrameLineDecoration> {
        if !self.settings.load().stack_frame_line_highlighter {
            return Vec::new();
        }
        decorations_by_path(frames).remove(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, SettingsLayer, ToggleLayer};
    use rstest::rstest;

    fn frame(id: i64, path: Option<&str>, line: u32) -> StackFrame {
        StackFrame {
            id,
            path: path.map(str::to_string),
            line,
        }
    }

    fn recursive_stack() -> Vec<StackFrame> {
        vec![
            frame(10, Some("/src/fib.rs"), 3),
            frame(9, None, 0),
            frame(8, Some("/src/fib.rs"), 5),
            frame(7, Some("/src/fib.rs"), 5),
            frame(6, Some("/src/fib.rs"), 5),
            frame(5, Some("/src/main.rs"), 12),
            frame(4, Some("/src/fib.rs"), 1),
        ]
    }

    #[test]
    fn top_frame_and_sourceless_frames_are_skipped() {
        let by_path = decorations_by_path(&recursive_stack());
        let fib = &by_path["/src/fib.rs"];
        assert!(fib.iter().all(|d| d.line != 3));
        assert_eq!(
            fib[0],
            FrameLineDecoration {
                line: 5,
                frames_up: 1,
                recursion_count: 3,
                latest_frame_id: 6,
            }
        );
        assert_eq!(by_path["/src/main.rs"][0].frames_up, 4);
    }

    #[test]
    fn labels_describe_depth_and_recursion() {
        let labels: Vec<String> = decorations_by_path(&recursive_stack())
            .values()
            .flatten()
            .map(FrameLineDecoration::label)
            .collect();
        insta::assert_snapshot!(labels.join("\n"), @r"
        1 Stack Frame up, 3rd Recursion
        5 Stack Frames up
        4 Stack Frames up
        ");
    }

    #[rstest]
    #[case(1, "1st")]
    #[case(2, "2nd")]
    #[case(3, "3rd")]
    #[case(4, "4th")]
    #[case(11, "11th")]
    #[case(12, "12th")]
    #[case(13, "13th")]
    #[case(21, "21st")]
    #[case(112, "112th")]
    fn ordinals(#[case] n: usize, #[case] expected: &str) {
        assert_eq!(ordinal(n), expected);
    }

    #[test]
    fn disabled_highlighter_returns_nothing() {
        let settings = Settings::from(SettingsLayer {
            stack_frame_line_highlighter: Some(ToggleLayer {
                enabled: Some(false),
            }),
            ..Default::default()
        });
        let highlighter = StackFrameLineHighlighter::new(Arc::new(SettingsStore::new(settings)));
        assert!(highlighter.decorations(&recursive_stack(), "/src/fib.rs").is_empty());
    }
}
