use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

use xrefs::cursor::{decode_cursor, Phase};
use xrefs::store::ops;
use xrefs::ResolveError;

use crate::helpers::fixtures::{self, APP};
use crate::helpers::test_harness::{flatten, request, summarize, TestHarness};

fn located(repository: &str, commit: &str, path: &str, range: &str) -> (String, String, String, String) {
    (repository.to_string(), commit.to_string(), path.to_string(), range.to_string())
}

#[tokio::test]
async fn test_references_are_adjusted_to_requested_commit() {
    let harness = TestHarness::new(fixtures::shifted_app());

    let page = harness.page(&request(APP, "c2", "main.go", 10, 6, 10)).await.unwrap();

    assert_eq!(
        summarize(&page.locations),
        vec![
            located(APP, "c2", "main.go", "10:5-10:12"),
            located(APP, "c2", "main.go", "21:1-21:8"),
            located(APP, "c2", "util.go", "3:2-3:9"),
        ]
    );
    assert!(page.is_last());
    assert_eq!(page.next_cursor, "");
}

#[tokio::test]
async fn test_position_outside_any_symbol_returns_nothing() {
    let harness = TestHarness::new(fixtures::shifted_app());

    let page = harness.page(&request(APP, "c2", "main.go", 30, 0, 10)).await.unwrap();

    assert!(page.locations.is_empty());
    assert!(page.is_last());
}

#[tokio::test]
async fn test_file_without_uploads_returns_nothing() {
    let harness = TestHarness::new(fixtures::shifted_app());

    let page = harness.page(&request(APP, "unknown", "main.go", 10, 6, 10)).await.unwrap();

    assert!(page.locations.is_empty());
    assert!(page.is_last());
    assert_eq!(harness.store.call_count(ops::MONIKERS_BY_POSITION), 0);
}

#[tokio::test]
async fn test_local_pages_span_uploads() {
    let harness = TestHarness::new(fixtures::two_uploads());
    let request = request(APP, "c1", "main.go", 4, 6, 2);

    let pages = harness.all_pages(&request).await.unwrap();

    let pages: Vec<Vec<(String, String, String, String)>> =
        pages.iter().map(|page| summarize(&page.locations)).collect();
    assert_eq!(
        pages,
        vec![
            vec![
                located(APP, "c1", "main.go", "4:5-4:9"),
                located(APP, "c1", "main.go", "11:2-11:6"),
            ],
            vec![
                located(APP, "c1", "cmd.go", "7:0-7:4"),
                located(APP, "c1", "server.go", "30:8-30:12"),
            ],
            vec![located(APP, "c1", "server.go", "41:8-41:12")],
        ]
    );
}

#[tokio::test]
async fn test_cursor_tracks_local_offsets() {
    let harness = TestHarness::new(fixtures::two_uploads());

    let first = harness.page(&request(APP, "c1", "main.go", 4, 6, 2)).await.unwrap();
    let cursor = decode_cursor(&first.next_cursor).unwrap();
    assert_eq!(cursor.phase, Phase::Local);
    assert_eq!(cursor.local_batch_offset, 0);
    assert_eq!(cursor.local_offset, 2);
    assert_eq!(cursor.adjusted_uploads.as_ref().map(Vec::len), Some(2));

    let mut next = request(APP, "c1", "main.go", 4, 6, 2);
    next.cursor = first.next_cursor;
    let second = harness.page(&next).await.unwrap();
    let cursor = decode_cursor(&second.next_cursor).unwrap();
    assert_eq!(cursor.local_batch_offset, 1);
    assert_eq!(cursor.local_offset, 1);
}

#[tokio::test]
async fn test_resumed_pages_reuse_cursor_state() {
    let harness = TestHarness::new(fixtures::two_uploads());

    harness.all_pages(&request(APP, "c1", "main.go", 4, 6, 2)).await.unwrap();

    assert_eq!(harness.store.call_count(ops::FIND_COVERING_UPLOADS), 1);
    assert_eq!(harness.store.call_count(ops::MONIKERS_BY_POSITION), 2);
    assert_eq!(harness.store.call_count(ops::DEFINITION_UPLOADS), 1);
}

#[tokio::test]
async fn test_session_pages_share_upload_cache() {
    let harness = TestHarness::new(fixtures::two_uploads());
    let mut session = harness
        .resolver
        .session(APP, "c1", "main.go", Default::default(), CancellationToken::new());

    let mut token = String::new();
    let mut total = 0;
    loop {
        let page = session.resolve(4, 6, 2, &token).await.unwrap();
        total += page.locations.len();
        if page.is_last() {
            break;
        }
        token = page.next_cursor;
    }

    assert_eq!(total, 5);
    assert_eq!(session.cache().len(), 2);
    // Every upload was already cached by the first page.
    assert_eq!(harness.store.call_count(ops::GET_UPLOADS_BY_IDS), 0);
}

#[tokio::test]
async fn test_pages_never_repeat_locations() {
    let harness = TestHarness::new(fixtures::two_uploads());

    for limit in 1..=6 {
        let pages = harness.all_pages(&request(APP, "c1", "main.go", 4, 6, limit)).await.unwrap();
        let locations = summarize(&flatten(&pages));
        let unique: HashSet<_> = locations.iter().cloned().collect();

        assert_eq!(locations.len(), 5, "limit {limit}");
        assert_eq!(unique.len(), 5, "limit {limit}");
        for page in &pages {
            assert!(page.locations.len() <= limit);
        }
    }
}

#[tokio::test]
async fn test_vanished_upload_is_concurrent_modification() {
    let harness = TestHarness::new(fixtures::two_uploads());
    let mut next = request(APP, "c1", "main.go", 4, 6, 2);

    let first = harness.page(&next).await.unwrap();
    harness.store.remove_upload(2).await;

    next.cursor = first.next_cursor;
    let err = harness.page(&next).await.unwrap_err();
    assert!(matches!(err, ResolveError::ConcurrentModification), "got {err:?}");
}

#[tokio::test]
async fn test_malformed_cursor_is_rejected() {
    let harness = TestHarness::new(fixtures::two_uploads());
    let mut next = request(APP, "c1", "main.go", 4, 6, 2);
    next.cursor = "definitely not a cursor".to_string();

    let err = harness.page(&next).await.unwrap_err();
    assert!(matches!(err, ResolveError::MalformedCursor(_)), "got {err:?}");
    assert_eq!(harness.store.call_count(ops::FIND_COVERING_UPLOADS), 0);
}

#[tokio::test]
async fn test_page_size_is_clamped() {
    let harness = TestHarness::new(fixtures::two_uploads());
    let mut zero = request(APP, "c1", "main.go", 4, 6, 0);
    zero.limit = Some(0);

    let page = harness.page(&zero).await.unwrap();
    assert_eq!(page.locations.len(), 1);

    zero.limit = None;
    let page = harness.page(&zero).await.unwrap();
    assert_eq!(page.locations.len(), 5);
    assert!(page.is_last());
}
