//! Unified diff hunks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiffParseError {
    #[error("invalid hunk header on line {line}: {header}")]
    InvalidHeader { line: usize, header: String },

    #[error("unexpected line {line} inside hunk: {content}")]
    UnexpectedLine { line: usize, content: String },

    #[error("hunk starting on line {line} is truncated")]
    Truncated { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineChange {
    Context,
    Added,
    Removed,
}

/// One hunk of a unified diff. Start lines are one-based; when a side has
/// zero lines its start names the line *before* the change, as git prints it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub orig_start: u32,
    pub orig_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub changes: Vec<LineChange>,
}

impl Hunk {
    /// First one-based original line in the hunk and the line just past it.
    pub(crate) fn orig_span(&self) -> (i64, i64) {
        span(self.orig_start, self.orig_lines)
    }

    pub(crate) fn new_span(&self) -> (i64, i64) {
        span(self.new_start, self.new_lines)
    }

    /// The same hunk seen from the other side of the diff.
    pub fn invert(&self) -> Hunk {
        Hunk {
            orig_start: self.new_start,
            orig_lines: self.new_lines,
            new_start: self.orig_start,
            new_lines: self.orig_lines,
            changes: self
                .changes
                .iter()
                .map(|change| match change {
                    LineChange::Context => LineChange::Context,
                    LineChange::Added => LineChange::Removed,
                    LineChange::Removed => LineChange::Added,
                })
                .collect(),
        }
    }
}

fn span(start: u32, lines: u32) -> (i64, i64) {
    let first = if lines == 0 {
        i64::from(start) + 1
    } else {
        i64::from(start)
    };
    (first, first + i64::from(lines))
}

/// Parse the hunks of a single-file unified diff (as printed by `git diff`).
/// File headers and other preamble lines are skipped.
pub fn parse_unified_diff(text: &str) -> Result<Vec<Hunk>, DiffParseError> {
    let mut hunks = Vec::new();
    let mut lines = text.lines().enumerate().peekable();

    while let Some((index, line)) = lines.next() {
        if !line.starts_with("@@") {
            continue;
        }

        let header_line = index + 1;
        let (orig_start, orig_lines, new_start, new_lines) =
            parse_header(line).ok_or_else(|| DiffParseError::InvalidHeader {
                line: header_line,
                header: line.to_string(),
            })?;

        let mut orig_remaining = orig_lines;
        let mut new_remaining = new_lines;
        let mut changes = Vec::new();

        while orig_remaining > 0 || new_remaining > 0 {
            let Some((index, body)) = lines.next() else {
                return Err(DiffParseError::Truncated { line: header_line });
            };

            // Some tools strip the single space from blank context lines.
            let change = match body.chars().next() {
                Some(' ') | None => LineChange::Context,
                Some('-') => LineChange::Removed,
                Some('+') => LineChange::Added,
                Some('\\') => continue,
                Some(_) => {
                    return Err(DiffParseError::UnexpectedLine {
                        line: index + 1,
                        content: body.to_string(),
                    })
                }
            };

            match change {
                LineChange::Context if orig_remaining > 0 && new_remaining > 0 => {
                    orig_remaining -= 1;
                    new_remaining -= 1;
                }
                LineChange::Removed if orig_remaining > 0 => orig_remaining -= 1,
                LineChange::Added if new_remaining > 0 => new_remaining -= 1,
                _ => {
                    return Err(DiffParseError::UnexpectedLine {
                        line: index + 1,
                        content: body.to_string(),
                    })
                }
            }
            changes.push(change);
        }

        // Trailing "\ No newline at end of file" markers belong to this hunk.
        while matches!(lines.peek(), Some((_, next)) if next.starts_with('\\')) {
            lines.next();
        }

        hunks.push(Hunk {
            orig_start,
            orig_lines,
            new_start,
            new_lines,
            changes,
        });
    }

    hunks.sort_by_key(|hunk| hunk.orig_start);
    Ok(hunks)
}

/// Parse `@@ -a[,b] +c[,d] @@ ...`.
fn parse_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let rest = line.strip_prefix("@@ ")?;
    let end = rest.find(" @@")?;
    let mut ranges = rest[..end].split_whitespace();

    let (orig_start, orig_lines) = parse_range(ranges.next()?.strip_prefix('-')?)?;
    let (new_start, new_lines) = parse_range(ranges.next()?.strip_prefix('+')?)?;
    if ranges.next().is_some() {
        return None;
    }

    Some((orig_start, orig_lines, new_start, new_lines))
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, lines)) => Some((start.parse().ok()?, lines.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
