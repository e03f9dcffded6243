//! Core records shared by the stores and the resolver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an upload (a precomputed, commit-pinned index).
pub type UploadId = i64;

/// An immutable index record owned by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub repository: String,
    pub commit: String,
    /// Directory (relative to the repository root) the index covers, either
    /// empty or ending in `/`
    #[serde(default)]
    pub root: String,
    pub indexer: String,
}

impl Upload {
    /// Strip this upload's root from a repository-relative path.
    pub fn path_in_bundle<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.root.as_str()).unwrap_or(path)
    }

    /// Join an in-bundle path back onto this upload's root.
    pub fn repository_path(&self, path_in_bundle: &str) -> String {
        format!("{}{}", self.root, path_in_bundle)
    }
}

/// An upload together with the query position translated into its commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustedUpload {
    pub upload: Upload,
    /// Repository-relative path at the upload's commit
    pub adjusted_path: String,
    pub adjusted_position: Position,
    /// `adjusted_path` relative to the upload root
    pub adjusted_path_in_bundle: String,
}

/// Zero-based line/character position. Ordering is lexicographic on
/// (line, character).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Self {
        Self {
            start: Position::new(start_line, start_character),
            end: Position::new(end_line, end_character),
        }
    }

    /// Returns true if the range encloses the position. Both ends are
    /// inclusive.
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A range inside one upload. `path` is relative to the upload root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub upload_id: UploadId,
    pub path: String,
    pub range: Range,
}

/// A location translated into the caller's frame of reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedLocation {
    pub upload: Upload,
    /// Repository-relative path
    pub path: String,
    /// Commit the range is expressed in
    pub adjusted_commit: String,
    pub adjusted_range: Range,
}

/// Role a moniker plays in the index that attaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonikerKind {
    Import,
    Export,
    Local,
    Implementation,
}

impl fmt::Display for MonikerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonikerKind::Import => write!(f, "import"),
            MonikerKind::Export => write!(f, "export"),
            MonikerKind::Local => write!(f, "local"),
            MonikerKind::Implementation => write!(f, "implementation"),
        }
    }
}

/// Package a moniker belongs to, when the indexer knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageInformation {
    pub manager: String,
    pub name: String,
    pub version: String,
}

/// A qualified, scheme-namespaced symbol name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Moniker {
    pub kind: MonikerKind,
    pub scheme: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageInformation>,
}

impl Moniker {
    pub fn new(kind: MonikerKind, scheme: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            scheme: scheme.into(),
            identifier: identifier.into(),
            package: None,
        }
    }

    /// True if both monikers name the same symbol, regardless of role.
    pub fn same_symbol(&self, other: &Moniker) -> bool {
        self.scheme == other.scheme && self.identifier == other.identifier
    }
}

impl fmt::Display for Moniker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.scheme, self.identifier)
    }
}

/// What the caller is looking for at the source position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    References,
    Implementations,
}

impl SearchKind {
    /// Moniker table consulted during remote search.
    pub fn table(self) -> MonikerTable {
        match self {
            SearchKind::References => MonikerTable::References,
            SearchKind::Implementations => MonikerTable::Implementations,
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchKind::References => write!(f, "references"),
            SearchKind::Implementations => write!(f, "implementations"),
        }
    }
}

/// Moniker location table searched by [`crate::store::MonikerStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonikerTable {
    Definitions,
    References,
    Implementations,
}

impl fmt::Display for MonikerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonikerTable::Definitions => write!(f, "definitions"),
            MonikerTable::References => write!(f, "references"),
            MonikerTable::Implementations => write!(f, "implementations"),
        }
    }
}
