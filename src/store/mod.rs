//! Collaborator contracts consumed by the resolver.
//!
//! The resolver never talks to a database, a graph store or git directly.
//! Each backing system is reached through one of the traits below so the
//! engine can be driven by production clients or by [`memory::InMemoryStore`].

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::position::Hunk;
use crate::types::{Location, Moniker, MonikerTable, Position, Upload, UploadId};

pub use memory::{Fixture, InMemoryStore};

/// Collaborator operation names, used in errors, logs and call accounting.
pub mod ops {
    pub const FIND_COVERING_UPLOADS: &str = "upload_store.find_covering_uploads";
    pub const GET_UPLOADS_BY_IDS: &str = "upload_store.get_uploads_by_ids";
    pub const DEFINITION_UPLOADS: &str = "upload_store.definition_uploads";
    pub const SCAN_CANDIDATES: &str = "upload_store.scan_candidate_reference_indexes";
    pub const SCAN_CANDIDATES_NEXT: &str = "upload_store.scan_candidate_reference_indexes.next";
    pub const SCAN_CANDIDATES_CLOSE: &str = "upload_store.scan_candidate_reference_indexes.close";
    pub const REFERENCES: &str = "symbol_graph.references";
    pub const IMPLEMENTATIONS: &str = "symbol_graph.implementations";
    pub const MONIKERS_BY_POSITION: &str = "symbol_graph.monikers_by_position";
    pub const SEARCH_BY_MONIKERS: &str = "moniker_store.search_by_monikers";
    pub const ADJUST_POSITION: &str = "position_adjuster.adjust_position";
    pub const ADJUST_RANGE: &str = "position_adjuster.adjust_range";
    pub const DIFF_HUNKS: &str = "diff_source.diff_hunks";
}

/// One record produced by a candidate scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub upload_id: UploadId,
    /// Encoded [`crate::bloom::BloomFilter`] of identifiers the upload
    /// imports or implements
    pub filter: Vec<u8>,
}

/// Streaming cursor over candidate reference uploads.
///
/// `close` consumes the scanner, so it runs at most once; callers must call
/// it on every path once the scanner is open.
#[async_trait]
pub trait CandidateScanner: Send {
    /// Next record, or `None` when the scan is exhausted.
    async fn next(&mut self) -> Result<Option<CandidateRecord>, StoreError>;

    /// Release the underlying resources.
    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Index metadata store.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Uploads visible from `commit` whose root covers `path`, ordered by
    /// preference.
    async fn find_covering_uploads(&self, repository: &str, commit: &str, path: &str) -> Result<Vec<Upload>, StoreError>;

    /// Uploads with the given ids. Ids the store no longer knows are omitted.
    async fn get_uploads_by_ids(&self, ids: &[UploadId]) -> Result<Vec<Upload>, StoreError>;

    /// Uploads that define any of the given monikers.
    async fn definition_uploads(&self, monikers: &[Moniker]) -> Result<Vec<Upload>, StoreError>;

    /// Open a scan over uploads that may reference the given monikers,
    /// starting at `offset` and yielding at most `limit` records. Also
    /// returns the total number of records the scan could produce from
    /// offset zero.
    async fn scan_candidate_reference_indexes(
        &self,
        repository: &str,
        commit: &str,
        monikers: &[Moniker],
        limit: usize,
        offset: usize,
    ) -> Result<(Box<dyn CandidateScanner>, usize), StoreError>;
}

/// Per-upload symbol graph store. Paths are relative to the upload root.
#[async_trait]
pub trait SymbolGraphStore: Send + Sync {
    /// References to the symbol at the position, with the total count.
    async fn references(
        &self,
        upload_id: UploadId,
        path: &str,
        position: Position,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Location>, usize), StoreError>;

    /// Implementations of the symbol at the position, with the total count.
    async fn implementations(
        &self,
        upload_id: UploadId,
        path: &str,
        position: Position,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Location>, usize), StoreError>;

    /// Monikers attached to each range enclosing the position, innermost
    /// range first.
    async fn monikers_by_position(&self, upload_id: UploadId, path: &str, position: Position) -> Result<Vec<Vec<Moniker>>, StoreError>;
}

/// Moniker location tables shared by all uploads.
#[async_trait]
pub trait MonikerStore: Send + Sync {
    /// Locations in the given uploads attached to any of the monikers, with
    /// the total count.
    async fn search_by_monikers(
        &self,
        uploads: &[Upload],
        monikers: &[Moniker],
        table: MonikerTable,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Location>, usize), StoreError>;
}

/// Line-level diffs between commits.
#[async_trait]
pub trait DiffSource: Send + Sync {
    /// Hunks turning `path` at `from_commit` into `path` at `to_commit`.
    /// An unchanged file yields no hunks.
    async fn diff_hunks(&self, repository: &str, from_commit: &str, to_commit: &str, path: &str) -> Result<Vec<Hunk>, StoreError>;
}
