use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use xrefs::config::ResolverConfig;
use xrefs::cursor::{encode_cursor, Cursor, Phase};
use xrefs::store::{ops, CandidateRecord, CandidateScanner, Fixture, InMemoryStore, UploadStore};
use xrefs::types::{Moniker, Upload, UploadId};
use xrefs::{ResolveError, Resolver, StoreError, Stores};

use crate::helpers::fixtures::{self, LIB};
use crate::helpers::test_harness::{request, TestHarness};

/// Upload store whose candidate scanner cancels the request on its first
/// `next` and then never answers.
struct StallingUploads {
    inner: Arc<InMemoryStore>,
    cancel: CancellationToken,
}

#[async_trait]
impl UploadStore for StallingUploads {
    async fn find_covering_uploads(&self, repository: &str, commit: &str, path: &str) -> Result<Vec<Upload>, StoreError> {
        self.inner.find_covering_uploads(repository, commit, path).await
    }

    async fn get_uploads_by_ids(&self, ids: &[UploadId]) -> Result<Vec<Upload>, StoreError> {
        self.inner.get_uploads_by_ids(ids).await
    }

    async fn definition_uploads(&self, monikers: &[Moniker]) -> Result<Vec<Upload>, StoreError> {
        self.inner.definition_uploads(monikers).await
    }

    async fn scan_candidate_reference_indexes(
        &self,
        repository: &str,
        commit: &str,
        monikers: &[Moniker],
        limit: usize,
        offset: usize,
    ) -> Result<(Box<dyn CandidateScanner>, usize), StoreError> {
        let (inner, total) = self
            .inner
            .scan_candidate_reference_indexes(repository, commit, monikers, limit, offset)
            .await?;
        let scanner = StallingScanner {
            inner,
            cancel: self.cancel.clone(),
        };
        Ok((Box::new(scanner), total))
    }
}

struct StallingScanner {
    inner: Box<dyn CandidateScanner>,
    cancel: CancellationToken,
}

#[async_trait]
impl CandidateScanner for StallingScanner {
    async fn next(&mut self) -> Result<Option<CandidateRecord>, StoreError> {
        self.cancel.cancel();
        std::future::pending().await
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.close().await
    }
}

fn failed_operation(err: &ResolveError) -> Option<&'static str> {
    match err {
        ResolveError::StoreUnavailable { operation, .. } => Some(*operation),
        ResolveError::Cleanup { error, .. } => failed_operation(error),
        _ => None,
    }
}

#[tokio::test]
async fn test_store_failure_names_operation() {
    let harness = TestHarness::new(fixtures::library_with_dependents());

    for operation in [
        ops::FIND_COVERING_UPLOADS,
        ops::MONIKERS_BY_POSITION,
        ops::DEFINITION_UPLOADS,
        ops::REFERENCES,
        ops::SCAN_CANDIDATES,
        ops::SEARCH_BY_MONIKERS,
    ] {
        harness.store.fail_operation(Some(operation));

        let err = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap_err();
        assert_eq!(failed_operation(&err), Some(operation));
        assert!(err.to_string().starts_with(operation), "{err}");
    }
}

#[tokio::test]
async fn test_scanner_closed_when_scan_fails() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    harness.store.fail_operation(Some(ops::SCAN_CANDIDATES_NEXT));

    let err = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap_err();

    assert_eq!(failed_operation(&err), Some(ops::SCAN_CANDIDATES_NEXT));
    assert_eq!(harness.store.scanners_closed(), 1);
}

#[tokio::test]
async fn test_close_failure_is_reported() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    harness.store.fail_operation(Some(ops::SCAN_CANDIDATES_CLOSE));

    let err = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap_err();

    assert_eq!(failed_operation(&err), Some(ops::SCAN_CANDIDATES_CLOSE));
    assert_eq!(harness.store.scanners_closed(), 1);
}

#[tokio::test]
async fn test_remote_failure_fails_whole_page() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    harness.store.fail_operation(Some(ops::SEARCH_BY_MONIKERS));

    let result = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await;
    assert!(result.is_err());

    harness.store.fail_operation(None);
    let page = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap();
    assert_eq!(page.locations.len(), 6);
}

#[tokio::test]
async fn test_cancelled_request() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .resolver
        .resolve(&request(LIB, "l1", "foo.go", 4, 6, 100), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Cancelled), "got {err:?}");
    assert_eq!(harness.store.call_count(ops::FIND_COVERING_UPLOADS), 0);
}

#[tokio::test]
async fn test_cancelled_while_scanning_candidates() {
    let fixture: Fixture = serde_json::from_value(fixtures::library_with_dependents()).unwrap();
    let store = Arc::new(InMemoryStore::from_fixture(fixture).unwrap());
    let cancel = CancellationToken::new();

    let mut stores = Stores::in_memory(store.clone());
    stores.uploads = Arc::new(StallingUploads {
        inner: store.clone(),
        cancel: cancel.clone(),
    });
    let resolver = Resolver::new(stores, ResolverConfig::default());

    let err = resolver
        .resolve(&request(LIB, "l1", "foo.go", 4, 6, 100), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Cancelled), "got {err:?}");
    assert_eq!(store.call_count(ops::SCAN_CANDIDATES), 1);
    assert_eq!(store.scanners_closed(), 1);
}

#[tokio::test]
async fn test_undecodable_filter_fails_page() {
    let mut fixture = fixtures::library_with_dependents();
    fixture["uploads"][2]["raw_filter"] = json!([0, 1, 2, 3]);
    let harness = TestHarness::new(fixture);

    let err = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap_err();

    assert!(
        matches!(err, ResolveError::InvalidBloomFilter { upload_id: 20, .. }),
        "got {err:?}"
    );
    assert_eq!(err.kind(), "invalid_bloom_filter");
    assert_eq!(harness.store.scanners_closed(), 1);
}

#[tokio::test]
async fn test_completed_cursor_is_refused() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    let done = Cursor {
        phase: Phase::Done,
        ..Cursor::default()
    };

    let mut request = request(LIB, "l1", "foo.go", 4, 6, 100);
    request.cursor = encode_cursor(&done).unwrap();
    let err = harness.page(&request).await.unwrap_err();

    assert!(matches!(err, ResolveError::MalformedCursor(_)), "got {err:?}");
    assert_eq!(harness.store.call_count(ops::FIND_COVERING_UPLOADS), 0);
}
