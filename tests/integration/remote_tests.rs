use std::collections::HashSet;

use xrefs::config::ResolverConfig;
use xrefs::cursor::{decode_cursor, Phase, ScanOffset};
use xrefs::store::ops;
use xrefs::types::SearchKind;

use crate::helpers::fixtures::{self, FORK, LIB, SVC_A, SVC_B};
use crate::helpers::test_harness::{flatten, request, summarize, TestHarness};

fn located(repository: &str, commit: &str, path: &str, range: &str) -> (String, String, String, String) {
    (repository.to_string(), commit.to_string(), path.to_string(), range.to_string())
}

fn all_references() -> Vec<(String, String, String, String)> {
    vec![
        located(LIB, "l1", "foo.go", "4:5-4:8"),
        located(LIB, "l1", "foo.go", "12:2-12:5"),
        located(FORK, "f1", "foo.go", "30:0-30:3"),
        located(SVC_A, "a1", "main.go", "3:1-3:4"),
        located(SVC_A, "a1", "main.go", "7:1-7:4"),
        located(SVC_B, "b1", "handler.go", "15:8-15:11"),
    ]
}

#[tokio::test]
async fn test_local_then_remote_in_one_page() {
    let harness = TestHarness::new(fixtures::library_with_dependents());

    let page = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap();

    assert_eq!(summarize(&page.locations), all_references());
    assert!(page.is_last());
}

#[tokio::test]
async fn test_remote_locations_keep_upload_commit() {
    let harness = TestHarness::new(fixtures::library_with_dependents());

    let page = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap();

    for location in page.locations.iter().filter(|l| l.upload.repository != LIB) {
        assert_eq!(location.adjusted_commit, location.upload.commit);
    }
}

#[tokio::test]
async fn test_remote_phase_paginates() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    let request = request(LIB, "l1", "foo.go", 4, 6, 2);

    let first = harness.page(&request).await.unwrap();
    assert_eq!(first.locations.len(), 2);
    let cursor = decode_cursor(&first.next_cursor).unwrap();
    assert_eq!(cursor.phase, Phase::Remote);
    assert_eq!(cursor.remote_batch_offset, ScanOffset::Next(0));

    let pages = harness.all_pages(&request).await.unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(summarize(&flatten(&pages)), all_references());
}

#[tokio::test]
async fn test_pages_cover_same_set_at_any_size() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    let expected: HashSet<_> = all_references().into_iter().collect();

    for limit in 1..=7 {
        let pages = harness.all_pages(&request(LIB, "l1", "foo.go", 4, 6, limit)).await.unwrap();
        let locations = summarize(&flatten(&pages));
        let unique: HashSet<_> = locations.iter().cloned().collect();

        assert_eq!(locations.len(), unique.len(), "duplicates at limit {limit}");
        assert_eq!(unique, expected, "limit {limit}");
    }
}

#[tokio::test]
async fn test_small_batches_close_every_scanner() {
    let config = ResolverConfig {
        remote_batch_size: 1,
        ..ResolverConfig::default()
    };
    let harness = TestHarness::with_config(fixtures::library_with_dependents(), config);

    let pages = harness.all_pages(&request(LIB, "l1", "foo.go", 4, 6, 2)).await.unwrap();

    let unique: HashSet<_> = summarize(&flatten(&pages)).into_iter().collect();
    assert_eq!(unique, all_references().into_iter().collect::<HashSet<_>>());

    let opened = harness.store.call_count(ops::SCAN_CANDIDATES);
    assert!(opened > 1);
    assert_eq!(harness.store.scanners_closed(), opened);
}

#[tokio::test]
async fn test_scanner_closed_once_per_batch() {
    let harness = TestHarness::new(fixtures::library_with_dependents());

    harness.page(&request(LIB, "l1", "foo.go", 4, 6, 100)).await.unwrap();

    assert_eq!(harness.store.call_count(ops::SCAN_CANDIDATES), 1);
    assert_eq!(harness.store.scanners_closed(), 1);
}

#[tokio::test]
async fn test_definition_uploads_are_searched() {
    let harness = TestHarness::new(fixtures::library_with_dependents());

    let first = harness.page(&request(LIB, "l1", "foo.go", 4, 6, 2)).await.unwrap();
    let cursor = decode_cursor(&first.next_cursor).unwrap();

    // The library itself is an adjusted upload, so only the fork remains.
    assert_eq!(cursor.definition_upload_ids, Some(vec![11]));
}

#[tokio::test]
async fn test_implementations_use_implementation_edges() {
    let harness = TestHarness::new(fixtures::library_with_dependents());
    let mut request = request(LIB, "l1", "foo.go", 4, 6, 100);
    request.kind = SearchKind::Implementations;

    let page = harness.page(&request).await.unwrap();

    assert_eq!(
        summarize(&page.locations),
        vec![
            located(LIB, "l1", "foo_impl.go", "40:0-40:3"),
            located(SVC_B, "b1", "impl.go", "2:5-2:8"),
        ]
    );
    assert_eq!(harness.store.call_count(ops::REFERENCES), 0);
}
