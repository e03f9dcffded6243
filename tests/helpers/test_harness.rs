use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use xrefs::config::ResolverConfig;
use xrefs::store::{Fixture, InMemoryStore};
use xrefs::types::{AdjustedLocation, SearchKind};
use xrefs::{ResolveError, ResolveRequest, ResolvedPage, Resolver, Stores};

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub resolver: Resolver,
}

impl TestHarness {
    pub fn new(fixture: Value) -> Self {
        Self::with_config(fixture, ResolverConfig::default())
    }

    pub fn with_config(fixture: Value, config: ResolverConfig) -> Self {
        let fixture: Fixture = serde_json::from_value(fixture).expect("fixture should deserialize");
        let store = Arc::new(InMemoryStore::from_fixture(fixture).expect("fixture should load"));
        let resolver = Resolver::new(Stores::in_memory(store.clone()), config);
        Self { store, resolver }
    }

    /// Resolve one page in a fresh request scope.
    pub async fn page(&self, request: &ResolveRequest) -> Result<ResolvedPage, ResolveError> {
        self.resolver.resolve(request, &CancellationToken::new()).await
    }

    /// Follow continuation tokens until the result set is complete.
    pub async fn all_pages(&self, request: &ResolveRequest) -> Result<Vec<ResolvedPage>, ResolveError> {
        let mut request = request.clone();
        let mut pages = Vec::new();

        loop {
            let page = self.page(&request).await?;
            let done = page.is_last();
            request.cursor = page.next_cursor.clone();
            pages.push(page);

            if done {
                return Ok(pages);
            }
            assert!(pages.len() < 100, "pagination did not terminate");
        }
    }
}

pub fn request(repository: &str, commit: &str, path: &str, line: u32, character: u32, limit: usize) -> ResolveRequest {
    ResolveRequest {
        repository: repository.to_string(),
        commit: commit.to_string(),
        path: path.to_string(),
        line,
        character,
        limit: Some(limit),
        cursor: String::new(),
        kind: SearchKind::References,
    }
}

/// (repository, commit, path, range) of each location, for assertions.
pub fn summarize(locations: &[AdjustedLocation]) -> Vec<(String, String, String, String)> {
    locations
        .iter()
        .map(|location| {
            (
                location.upload.repository.clone(),
                location.adjusted_commit.clone(),
                location.path.clone(),
                location.adjusted_range.to_string(),
            )
        })
        .collect()
}

pub fn flatten(pages: &[ResolvedPage]) -> Vec<AdjustedLocation> {
    pages.iter().flat_map(|page| page.locations.iter().cloned()).collect()
}
