//! Paginated reference resolution across uploads.
//!
//! A request is answered in two phases. The local phase walks the symbol
//! graph of every upload covering the requested file. Once that is drained,
//! the remote phase searches other uploads by moniker, batching candidates
//! that were shortlisted with their bloom filters. All progress lives in the
//! [`crate::cursor::Cursor`] handed back to the caller, so pages can be requested
//! statelessly.
//!
//! A [`QuerySession`] scopes the upload cache to one paginated request.
//! Nothing is shared between sessions.

mod assemble;
mod local;
mod monikers;
mod remote;
mod uploads;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::ResolverConfig;
use crate::cursor::{decode_cursor, encode_cursor, Phase};
use crate::error::{ResolveError, Result, StoreError};
use crate::metrics;
use crate::position::{DiffAdjuster, PositionAdjuster};
use crate::store::{InMemoryStore, MonikerStore, SymbolGraphStore, UploadStore};
use crate::types::{AdjustedLocation, MonikerKind, Position, SearchKind};

pub use uploads::UploadCache;

/// The collaborators a resolver reads from.
#[derive(Clone)]
pub struct Stores {
    pub uploads: Arc<dyn UploadStore>,
    pub graph: Arc<dyn SymbolGraphStore>,
    pub monikers: Arc<dyn MonikerStore>,
    pub adjuster: Arc<dyn PositionAdjuster>,
}

impl Stores {
    /// Serve every collaborator from one in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            uploads: store.clone(),
            graph: store.clone(),
            monikers: store.clone(),
            adjuster: Arc::new(DiffAdjuster::new(store)),
        }
    }
}

/// One page request.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub repository: String,
    pub commit: String,
    pub path: String,
    pub line: u32,
    pub character: u32,
    /// Requested page size; clamped by the resolver configuration
    pub limit: Option<usize>,
    /// Continuation token from the previous page, empty for the first page
    pub cursor: String,
    pub kind: SearchKind,
}

/// One page of results.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPage {
    pub locations: Vec<AdjustedLocation>,
    /// Token for the next page; empty once the result set is complete
    pub next_cursor: String,
}

impl ResolvedPage {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_empty()
    }
}

pub struct Resolver {
    stores: Stores,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(stores: Stores, config: ResolverConfig) -> Self {
        Self { stores, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Open a session for paging through the results at one source file.
    /// Pages requested through the same session share its upload cache.
    pub fn session(
        &self,
        repository: impl Into<String>,
        commit: impl Into<String>,
        path: impl Into<String>,
        kind: SearchKind,
        cancel: CancellationToken,
    ) -> QuerySession<'_> {
        QuerySession {
            resolver: self,
            repository: repository.into(),
            commit: commit.into(),
            path: path.into(),
            kind,
            cache: UploadCache::default(),
            cancel,
        }
    }

    /// Resolve a single page with a fresh session.
    pub async fn resolve(&self, request: &ResolveRequest, cancel: &CancellationToken) -> Result<ResolvedPage> {
        let limit = self.config.page_size(request.limit);
        self.session(
            request.repository.clone(),
            request.commit.clone(),
            request.path.clone(),
            request.kind,
            cancel.clone(),
        )
        .resolve(request.line, request.character, limit, &request.cursor)
        .await
    }
}

/// Request-scoped state for one paginated result set.
pub struct QuerySession<'a> {
    resolver: &'a Resolver,
    repository: String,
    commit: String,
    path: String,
    kind: SearchKind,
    cache: UploadCache,
    cancel: CancellationToken,
}

impl QuerySession<'_> {
    pub fn cache(&self) -> &UploadCache {
        &self.cache
    }

    /// Return the page of locations following `cursor_token`.
    pub async fn resolve(&mut self, line: u32, character: u32, limit: usize, cursor_token: &str) -> Result<ResolvedPage> {
        let span = info_span!(
            "resolve",
            repository = %self.repository,
            commit = %self.commit,
            path = %self.path,
            line,
            character,
            kind = %self.kind,
        );

        let limit = self.resolver.config.page_size(Some(limit));
        let started = Instant::now();
        metrics::RESOLVE_REQUESTS.inc();

        let result = self
            .resolve_page(Position::new(line, character), limit, cursor_token)
            .instrument(span)
            .await;

        let elapsed = started.elapsed();
        metrics::RESOLVE_LATENCY.observe(elapsed.as_secs_f64());
        if elapsed > Duration::from_millis(self.resolver.config.slow_request_threshold_ms) {
            warn!(
                repository = %self.repository,
                path = %self.path,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow references request"
            );
        }

        match &result {
            Ok(page) => metrics::RESOLVE_LOCATIONS.observe(page.locations.len() as f64),
            Err(err) => {
                metrics::RESOLVE_ERRORS.inc();
                debug!(error = %err, kind = err.kind(), "references request failed");
            }
        }
        result
    }

    async fn resolve_page(&mut self, position: Position, limit: usize, cursor_token: &str) -> Result<ResolvedPage> {
        // The cursor is updated in place and becomes the token for the next page.
        let mut cursor = decode_cursor(cursor_token)?;
        if cursor.phase == Phase::Done {
            return Err(ResolveError::MalformedCursor("cursor of a completed result set".to_string()));
        }

        let adjusted_uploads = self
            .adjusted_uploads_from_cursor(position, &mut cursor.adjusted_uploads)
            .await?;

        let ordered_monikers = match cursor.ordered_monikers.take() {
            Some(monikers) => monikers,
            None => self.ordered_monikers(&adjusted_uploads, MonikerKind::Export).await?,
        };
        cursor.ordered_monikers = Some(ordered_monikers.clone());
        debug!(
            num_uploads = adjusted_uploads.len(),
            num_monikers = ordered_monikers.len(),
            "resolved visible uploads and monikers"
        );

        let definition_upload_ids = self
            .definition_upload_ids_from_cursor(&adjusted_uploads, &ordered_monikers, &mut cursor)
            .await?;

        let mut locations = Vec::new();

        if cursor.phase == Phase::Local {
            let (local, has_more) = self.page_local(&adjusted_uploads, &mut cursor, limit).await?;
            locations.extend(local);

            if !has_more {
                cursor.phase = Phase::Remote;
            }
        }

        if cursor.phase == Phase::Remote {
            while locations.len() < limit {
                let (remote, has_more) = self
                    .page_remote(
                        &adjusted_uploads,
                        &ordered_monikers,
                        &definition_upload_ids,
                        &mut cursor,
                        limit - locations.len(),
                    )
                    .await?;
                locations.extend(remote);

                if !has_more {
                    cursor.phase = Phase::Done;
                    break;
                }
            }
        }

        debug!(num_locations = locations.len(), phase = ?cursor.phase, "collected page");

        let locations = self.adjust_locations(locations).await?;

        let next_cursor = if cursor.phase == Phase::Done {
            String::new()
        } else {
            encode_cursor(&cursor)?
        };

        Ok(ResolvedPage {
            locations,
            next_cursor,
        })
    }

    /// Await a store call, aborting if the request is cancelled first.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ResolveError::Cancelled),
            result = fut => result.map_err(|source| ResolveError::store(operation, source)),
        }
    }
}
