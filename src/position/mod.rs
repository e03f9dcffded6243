//! Commit-to-commit position adjustment.
//!
//! Uploads are pinned to the commit they were built from while callers browse
//! arbitrary commits. Positions are translated in both directions using the
//! line-level diff of the file between the two commits: lines before any
//! change are untouched, lines after a hunk shift by that hunk's net line
//! delta, and lines inside a hunk are walked one by one. A line removed by the
//! diff has no counterpart and cannot be adjusted.

mod diff;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::StoreError;
use crate::store::DiffSource;
use crate::types::{Position, Range};

pub use diff::{parse_unified_diff, DiffParseError, Hunk, LineChange};

/// Translates positions between two commits of the same repository.
///
/// `Ok(None)` means the position has no counterpart in the target commit.
#[async_trait]
pub trait PositionAdjuster: Send + Sync {
    async fn adjust_position(
        &self,
        repository: &str,
        from_commit: &str,
        to_commit: &str,
        path: &str,
        position: Position,
    ) -> Result<Option<(String, Position)>, StoreError>;

    /// Adjust both ends of a range. If either end cannot be adjusted the
    /// whole range is unmappable.
    async fn adjust_range(
        &self,
        repository: &str,
        from_commit: &str,
        to_commit: &str,
        path: &str,
        range: Range,
    ) -> Result<Option<(String, Range)>, StoreError> {
        let Some((path, start)) = self
            .adjust_position(repository, from_commit, to_commit, path, range.start)
            .await?
        else {
            return Ok(None);
        };
        let Some((path, end)) = self
            .adjust_position(repository, from_commit, to_commit, &path, range.end)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some((path, Range { start, end })))
    }
}

/// [`PositionAdjuster`] backed by a [`DiffSource`].
///
/// Paths are carried through unchanged; renames are not tracked.
#[derive(Clone)]
pub struct DiffAdjuster {
    diffs: Arc<dyn DiffSource>,
}

impl DiffAdjuster {
    pub fn new(diffs: Arc<dyn DiffSource>) -> Self {
        Self { diffs }
    }

    async fn hunks(&self, repository: &str, from_commit: &str, to_commit: &str, path: &str) -> Result<Option<Vec<Hunk>>, StoreError> {
        if from_commit == to_commit {
            return Ok(None);
        }
        let hunks = self.diffs.diff_hunks(repository, from_commit, to_commit, path).await?;
        Ok(Some(hunks))
    }
}

#[async_trait]
impl PositionAdjuster for DiffAdjuster {
    async fn adjust_position(
        &self,
        repository: &str,
        from_commit: &str,
        to_commit: &str,
        path: &str,
        position: Position,
    ) -> Result<Option<(String, Position)>, StoreError> {
        let Some(hunks) = self.hunks(repository, from_commit, to_commit, path).await? else {
            return Ok(Some((path.to_string(), position)));
        };

        let adjusted = adjust_position(&hunks, position);
        if adjusted.is_none() {
            debug!(%path, %position, from_commit, to_commit, "position has no counterpart in target commit");
        }
        Ok(adjusted.map(|position| (path.to_string(), position)))
    }

    async fn adjust_range(
        &self,
        repository: &str,
        from_commit: &str,
        to_commit: &str,
        path: &str,
        range: Range,
    ) -> Result<Option<(String, Range)>, StoreError> {
        let Some(hunks) = self.hunks(repository, from_commit, to_commit, path).await? else {
            return Ok(Some((path.to_string(), range)));
        };

        match (adjust_position(&hunks, range.start), adjust_position(&hunks, range.end)) {
            (Some(start), Some(end)) => Ok(Some((path.to_string(), Range { start, end }))),
            _ => {
                debug!(%path, %range, from_commit, to_commit, "range has no counterpart in target commit");
                Ok(None)
            }
        }
    }
}

/// Apply hunks (ordered by original start line) to a position. The
/// character offset is preserved.
pub fn adjust_position(hunks: &[Hunk], position: Position) -> Option<Position> {
    adjust_line(hunks, position.line).map(|line| Position {
        line,
        character: position.character,
    })
}

/// Apply hunks to a zero-based line number.
pub fn adjust_line(hunks: &[Hunk], line: u32) -> Option<u32> {
    // Hunk headers are one-based.
    let target = i64::from(line) + 1;
    let mut delta: i64 = 0;

    for hunk in hunks {
        let (orig_first, orig_end) = hunk.orig_span();
        let (new_first, new_end) = hunk.new_span();

        if target < orig_first {
            break;
        }
        if target >= orig_end {
            delta = new_end - orig_end;
            continue;
        }

        let mut orig = orig_first;
        let mut new = new_first;
        for change in &hunk.changes {
            match change {
                LineChange::Context => {
                    if orig == target {
                        return u32::try_from(new - 1).ok();
                    }
                    orig += 1;
                    new += 1;
                }
                LineChange::Removed => {
                    if orig == target {
                        return None;
                    }
                    orig += 1;
                }
                LineChange::Added => new += 1,
            }
        }

        // Hunk body shorter than its header claims.
        return None;
    }

    u32::try_from(target + delta - 1).ok()
}
