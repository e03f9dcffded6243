//! In-memory implementation of every collaborator contract.
//!
//! The store is built from a [`Fixture`] (usually loaded from JSON) and backs
//! the CLI and the test suite. It counts calls per operation and can be told
//! to fail a given operation, which makes caching and error propagation
//! observable from tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ops, CandidateRecord, CandidateScanner, DiffSource, MonikerStore, SymbolGraphStore, UploadStore};
use crate::bloom::BloomFilter;
use crate::error::StoreError;
use crate::position::{parse_unified_diff, Hunk};
use crate::types::{Location, Moniker, MonikerKind, MonikerTable, Position, Range, Upload, UploadId};

/// Serializable description of a repository's indexes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub uploads: Vec<UploadFixture>,

    #[serde(default)]
    pub symbols: Vec<SymbolFixture>,

    #[serde(default)]
    pub moniker_locations: Vec<MonikerLocationFixture>,

    #[serde(default)]
    pub diffs: Vec<DiffFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFixture {
    #[serde(flatten)]
    pub upload: Upload,

    /// Additional commits from which this upload is visible
    #[serde(default)]
    pub visible_at: Vec<String>,

    /// Overrides the identifiers encoded in the upload's bloom filter
    #[serde(default)]
    pub filter_identifiers: Option<Vec<String>>,

    /// Stored as the upload's filter blob as is, bypassing encoding
    #[serde(default)]
    pub raw_filter: Option<Vec<u8>>,
}

/// A range in one upload with its monikers and graph edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFixture {
    pub upload_id: UploadId,
    pub path: String,
    pub range: Range,

    #[serde(default)]
    pub monikers: Vec<Moniker>,

    #[serde(default)]
    pub references: Vec<RangeFixture>,

    #[serde(default)]
    pub implementations: Vec<RangeFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeFixture {
    pub path: String,
    pub range: Range,
}

/// One row of a moniker location table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonikerLocationFixture {
    pub upload_id: UploadId,
    pub table: MonikerTable,
    pub scheme: String,
    pub identifier: String,
    pub path: String,
    pub range: Range,
}

/// Unified diff of one file between two commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffFixture {
    pub repository: String,
    pub from_commit: String,
    pub to_commit: String,
    pub path: String,
    pub diff: String,
}

struct StoredUpload {
    upload: Upload,
    visible_at: Vec<String>,
    filter: Option<Vec<u8>>,
    schemes: HashSet<String>,
}

type DiffKey = (String, String, String, String);

pub struct InMemoryStore {
    uploads: RwLock<Vec<StoredUpload>>,
    symbols: Vec<SymbolFixture>,
    moniker_locations: Vec<MonikerLocationFixture>,
    diffs: HashMap<DiffKey, Vec<Hunk>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<Option<&'static str>>,
    scanners_closed: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn from_fixture(fixture: Fixture) -> Result<Self, StoreError> {
        let mut uploads = Vec::with_capacity(fixture.uploads.len());
        for entry in fixture.uploads {
            let id = entry.upload.id;
            let rows: Vec<&MonikerLocationFixture> = fixture
                .moniker_locations
                .iter()
                .filter(|row| row.upload_id == id && row.table != MonikerTable::Definitions)
                .collect();

            let identifiers: Vec<String> = match entry.filter_identifiers {
                Some(identifiers) => identifiers,
                None => rows.iter().map(|row| row.identifier.clone()).collect(),
            };

            let filter = if entry.raw_filter.is_some() {
                entry.raw_filter
            } else if identifiers.is_empty() {
                None
            } else {
                let encoded = BloomFilter::from_identifiers(&identifiers)
                    .encode()
                    .map_err(|e| StoreError::Corrupt(format!("filter for upload {id}: {e}")))?;
                Some(encoded)
            };

            uploads.push(StoredUpload {
                upload: entry.upload,
                visible_at: entry.visible_at,
                filter,
                schemes: rows.iter().map(|row| row.scheme.clone()).collect(),
            });
        }

        let mut diffs = HashMap::new();
        for entry in fixture.diffs {
            let hunks = parse_unified_diff(&entry.diff).map_err(|e| {
                StoreError::Corrupt(format!(
                    "diff of {} between {} and {}: {}",
                    entry.path, entry.from_commit, entry.to_commit, e
                ))
            })?;
            diffs.insert((entry.repository, entry.from_commit, entry.to_commit, entry.path), hunks);
        }

        Ok(Self {
            uploads: RwLock::new(uploads),
            symbols: fixture.symbols,
            moniker_locations: fixture.moniker_locations,
            diffs,
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(None),
            scanners_closed: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let fixture: Fixture = serde_json::from_str(json).map_err(|e| StoreError::Corrupt(format!("invalid fixture: {e}")))?;
        Self::from_fixture(fixture)
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Delete an upload, as expiry would.
    pub async fn remove_upload(&self, id: UploadId) {
        self.uploads.write().await.retain(|stored| stored.upload.id != id);
    }

    /// Make every call to `operation` fail until cleared with `None`.
    pub fn fail_operation(&self, operation: Option<&'static str>) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = operation;
    }

    /// Number of times `operation` has been called.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn scanners_closed(&self) -> usize {
        self.scanners_closed.load(Ordering::SeqCst)
    }

    fn enter(&self, operation: &'static str) -> Result<(), StoreError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_insert(0) += 1;

        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) == Some(operation) {
            return Err(StoreError::Unavailable(format!("injected failure in {operation}")));
        }
        Ok(())
    }

    /// Symbols of an upload enclosing the position, innermost first.
    fn enclosing_symbols(&self, upload_id: UploadId, path: &str, position: Position) -> Vec<&SymbolFixture> {
        let mut symbols: Vec<&SymbolFixture> = self
            .symbols
            .iter()
            .filter(|symbol| symbol.upload_id == upload_id && symbol.path == path && symbol.range.contains(position))
            .collect();
        symbols.sort_by_key(|symbol| (Reverse(symbol.range.start), symbol.range.end));
        symbols
    }

    fn graph_edges(
        &self,
        upload_id: UploadId,
        path: &str,
        position: Position,
        limit: usize,
        offset: usize,
        edges: impl Fn(&SymbolFixture) -> &[RangeFixture],
    ) -> (Vec<Location>, usize) {
        let mut seen = HashSet::new();
        let mut locations = Vec::new();
        for symbol in self.enclosing_symbols(upload_id, path, position) {
            for edge in edges(symbol) {
                let location = Location {
                    upload_id,
                    path: edge.path.clone(),
                    range: edge.range,
                };
                if seen.insert(location.clone()) {
                    locations.push(location);
                }
            }
        }
        page(locations, limit, offset)
    }

    fn visible_from(stored: &StoredUpload, repository: &str, commit: &str) -> bool {
        stored.upload.repository == repository
            && (stored.upload.commit == commit || stored.visible_at.iter().any(|c| c == commit))
    }
}

fn page<T>(items: Vec<T>, limit: usize, offset: usize) -> (Vec<T>, usize) {
    let total = items.len();
    let items = items.into_iter().skip(offset).take(limit).collect();
    (items, total)
}

#[async_trait]
impl UploadStore for InMemoryStore {
    async fn find_covering_uploads(&self, repository: &str, commit: &str, path: &str) -> Result<Vec<Upload>, StoreError> {
        self.enter(ops::FIND_COVERING_UPLOADS)?;
        let uploads = self.uploads.read().await;
        Ok(uploads
            .iter()
            .filter(|stored| Self::visible_from(stored, repository, commit) && path.starts_with(stored.upload.root.as_str()))
            .map(|stored| stored.upload.clone())
            .collect())
    }

    async fn get_uploads_by_ids(&self, ids: &[UploadId]) -> Result<Vec<Upload>, StoreError> {
        self.enter(ops::GET_UPLOADS_BY_IDS)?;
        let uploads = self.uploads.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| uploads.iter().find(|stored| stored.upload.id == *id))
            .map(|stored| stored.upload.clone())
            .collect())
    }

    async fn definition_uploads(&self, monikers: &[Moniker]) -> Result<Vec<Upload>, StoreError> {
        self.enter(ops::DEFINITION_UPLOADS)?;

        let mut ids = BTreeSet::new();
        for symbol in &self.symbols {
            let defines = symbol.monikers.iter().any(|attached| {
                attached.kind == MonikerKind::Export && monikers.iter().any(|m| m.same_symbol(attached))
            });
            if defines {
                ids.insert(symbol.upload_id);
            }
        }
        for row in &self.moniker_locations {
            if row.table == MonikerTable::Definitions
                && monikers.iter().any(|m| m.scheme == row.scheme && m.identifier == row.identifier)
            {
                ids.insert(row.upload_id);
            }
        }

        let uploads = self.uploads.read().await;
        Ok(uploads
            .iter()
            .filter(|stored| ids.contains(&stored.upload.id))
            .map(|stored| stored.upload.clone())
            .collect())
    }

    async fn scan_candidate_reference_indexes(
        &self,
        repository: &str,
        commit: &str,
        monikers: &[Moniker],
        limit: usize,
        offset: usize,
    ) -> Result<(Box<dyn CandidateScanner>, usize), StoreError> {
        self.enter(ops::SCAN_CANDIDATES)?;

        let schemes: HashSet<&str> = monikers.iter().map(|m| m.scheme.as_str()).collect();
        let uploads = self.uploads.read().await;

        let mut candidates: Vec<&StoredUpload> = uploads
            .iter()
            .filter(|stored| stored.filter.is_some())
            .filter(|stored| stored.upload.repository != repository || Self::visible_from(stored, repository, commit))
            .filter(|stored| stored.schemes.is_empty() || stored.schemes.iter().any(|s| schemes.contains(s.as_str())))
            .collect();
        candidates.sort_by_key(|stored| stored.upload.id);

        let records: Vec<CandidateRecord> = candidates
            .iter()
            .filter_map(|stored| {
                stored.filter.as_ref().map(|filter| CandidateRecord {
                    upload_id: stored.upload.id,
                    filter: filter.clone(),
                })
            })
            .collect();

        let (records, total) = page(records, limit, offset);
        debug!(offset, limit, total, returned = records.len(), "opened candidate scan");

        let scanner = MemoryScanner {
            records: records.into(),
            store_failing: *self.failing.lock().unwrap_or_else(PoisonError::into_inner),
            closed: Arc::clone(&self.scanners_closed),
        };
        Ok((Box::new(scanner), total))
    }
}

struct MemoryScanner {
    records: VecDeque<CandidateRecord>,
    store_failing: Option<&'static str>,
    closed: Arc<AtomicUsize>,
}

impl MemoryScanner {
    fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.store_failing == Some(operation) {
            return Err(StoreError::Unavailable(format!("injected failure in {operation}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CandidateScanner for MemoryScanner {
    async fn next(&mut self) -> Result<Option<CandidateRecord>, StoreError> {
        self.check(ops::SCAN_CANDIDATES_NEXT)?;
        Ok(self.records.pop_front())
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.check(ops::SCAN_CANDIDATES_CLOSE)
    }
}

#[async_trait]
impl SymbolGraphStore for InMemoryStore {
    async fn references(
        &self,
        upload_id: UploadId,
        path: &str,
        position: Position,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Location>, usize), StoreError> {
        self.enter(ops::REFERENCES)?;
        Ok(self.graph_edges(upload_id, path, position, limit, offset, |s| s.references.as_slice()))
    }

    async fn implementations(
        &self,
        upload_id: UploadId,
        path: &str,
        position: Position,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Location>, usize), StoreError> {
        self.enter(ops::IMPLEMENTATIONS)?;
        Ok(self.graph_edges(upload_id, path, position, limit, offset, |s| s.implementations.as_slice()))
    }

    async fn monikers_by_position(&self, upload_id: UploadId, path: &str, position: Position) -> Result<Vec<Vec<Moniker>>, StoreError> {
        self.enter(ops::MONIKERS_BY_POSITION)?;
        Ok(self
            .enclosing_symbols(upload_id, path, position)
            .into_iter()
            .map(|symbol| symbol.monikers.clone())
            .collect())
    }
}

#[async_trait]
impl MonikerStore for InMemoryStore {
    async fn search_by_monikers(
        &self,
        uploads: &[Upload],
        monikers: &[Moniker],
        table: MonikerTable,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Location>, usize), StoreError> {
        self.enter(ops::SEARCH_BY_MONIKERS)?;

        let ids: HashSet<UploadId> = uploads.iter().map(|u| u.id).collect();
        let mut locations: Vec<Location> = self
            .moniker_locations
            .iter()
            .filter(|row| row.table == table && ids.contains(&row.upload_id))
            .filter(|row| monikers.iter().any(|m| m.scheme == row.scheme && m.identifier == row.identifier))
            .map(|row| Location {
                upload_id: row.upload_id,
                path: row.path.clone(),
                range: row.range,
            })
            .collect();
        locations.sort_by(|a, b| (a.upload_id, &a.path, a.range).cmp(&(b.upload_id, &b.path, b.range)));
        locations.dedup();

        Ok(page(locations, limit, offset))
    }
}

#[async_trait]
impl DiffSource for InMemoryStore {
    async fn diff_hunks(&self, repository: &str, from_commit: &str, to_commit: &str, path: &str) -> Result<Vec<Hunk>, StoreError> {
        self.enter(ops::DIFF_HUNKS)?;

        let key = |from: &str, to: &str| (repository.to_string(), from.to_string(), to.to_string(), path.to_string());
        if let Some(hunks) = self.diffs.get(&key(from_commit, to_commit)) {
            return Ok(hunks.clone());
        }
        if let Some(hunks) = self.diffs.get(&key(to_commit, from_commit)) {
            return Ok(hunks.iter().map(Hunk::invert).collect());
        }
        Ok(Vec::new())
    }
}
