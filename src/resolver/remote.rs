use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use super::QuerySession;
use crate::bloom;
use crate::cursor::{Cursor, ScanOffset};
use crate::error::{ResolveError, Result};
use crate::metrics;
use crate::store::{ops, CandidateScanner};
use crate::types::{AdjustedUpload, Location, Moniker, UploadId};

/// One batch of candidate uploads selected from the candidate scan.
#[derive(Debug, Default)]
struct CandidateBatch {
    ids: Vec<UploadId>,
    /// Scan records consumed, whether or not they were selected
    scanned: usize,
    /// The scanner ran dry before the batch filled up
    drained: bool,
}

impl QuerySession<'_> {
    /// Pull up to `limit` locations from uploads outside the adjusted set by
    /// searching for the ordered monikers. The flag is false once every
    /// candidate batch has been searched.
    pub(super) async fn page_remote(
        &mut self,
        adjusted_uploads: &[AdjustedUpload],
        monikers: &[Moniker],
        definition_upload_ids: &[UploadId],
        cursor: &mut Cursor,
        limit: usize,
    ) -> Result<(Vec<Location>, bool)> {
        while cursor.batch_ids.is_empty() {
            let ScanOffset::Next(offset) = cursor.remote_batch_offset else {
                return Ok((Vec::new(), false));
            };

            if monikers.is_empty() {
                cursor.remote_batch_offset = ScanOffset::Exhausted;
                return Ok((Vec::new(), false));
            }

            let (batch, total) = self
                .candidate_batch(adjusted_uploads, monikers, definition_upload_ids, offset)
                .await?;

            let next = offset + batch.scanned;
            cursor.remote_batch_offset = if next >= total || (batch.scanned == 0 && batch.drained) {
                ScanOffset::Exhausted
            } else {
                ScanOffset::Next(next)
            };
            cursor.batch_ids = batch.ids;
            cursor.remote_offset = 0;
            metrics::REMOTE_BATCHES.inc();

            debug!(
                offset,
                scanned = batch.scanned,
                total,
                selected = cursor.batch_ids.len(),
                "selected candidate batch"
            );
        }

        let uploads = self.uploads_by_ids(&cursor.batch_ids).await?;

        let (locations, total) = if uploads.is_empty() {
            (Vec::new(), 0)
        } else {
            self.call(
                ops::SEARCH_BY_MONIKERS,
                self.resolver.stores.monikers.search_by_monikers(
                    &uploads,
                    monikers,
                    self.kind.table(),
                    limit,
                    cursor.remote_offset,
                ),
            )
            .await?
        };

        cursor.remote_offset += locations.len();
        if locations.is_empty() || cursor.remote_offset >= total {
            cursor.batch_ids.clear();
            cursor.remote_offset = 0;
        }

        let locations = locations
            .into_iter()
            .filter(|location| !is_source_location(adjusted_uploads, location))
            .collect();

        let has_more = !cursor.batch_ids.is_empty() || !cursor.remote_batch_offset.is_exhausted();
        Ok((locations, has_more))
    }

    /// Open the candidate scan at `offset` and select the next batch. The
    /// scanner is closed on every path.
    async fn candidate_batch(
        &self,
        adjusted_uploads: &[AdjustedUpload],
        monikers: &[Moniker],
        definition_upload_ids: &[UploadId],
        offset: usize,
    ) -> Result<(CandidateBatch, usize)> {
        let batch_size = self.resolver.config.remote_batch_size.max(1);

        let (mut scanner, total) = self
            .call(
                ops::SCAN_CANDIDATES,
                self.resolver.stores.uploads.scan_candidate_reference_indexes(
                    &self.repository,
                    &self.commit,
                    monikers,
                    batch_size,
                    offset,
                ),
            )
            .await?;

        let mut ignore: HashSet<UploadId> = adjusted_uploads.iter().map(|adjusted| adjusted.upload.id).collect();
        ignore.extend(definition_upload_ids.iter().copied());

        // Definition uploads ride along with the first batch.
        let seed: &[UploadId] = if offset == 0 { definition_upload_ids } else { &[] };

        let selected = self
            .select_candidates(scanner.as_mut(), monikers, seed, &ignore, batch_size)
            .await;
        let closed = scanner
            .close()
            .await
            .map_err(|source| ResolveError::store(ops::SCAN_CANDIDATES_CLOSE, source));

        let batch = ResolveError::combine(selected, closed)?;
        Ok((batch, total))
    }

    async fn select_candidates(
        &self,
        scanner: &mut dyn CandidateScanner,
        monikers: &[Moniker],
        seed: &[UploadId],
        ignore: &HashSet<UploadId>,
        batch_size: usize,
    ) -> Result<CandidateBatch> {
        let identifiers: Vec<&str> = monikers.iter().map(|moniker| moniker.identifier.as_str()).collect();

        let mut selected: BTreeSet<UploadId> = seed.iter().copied().collect();
        let mut batch = CandidateBatch::default();
        let mut hits = 0u64;

        // Seeded ids do not count against the batch size.
        while (hits as usize) < batch_size {
            let Some(record) = self.call(ops::SCAN_CANDIDATES_NEXT, scanner.next()).await? else {
                batch.drained = true;
                break;
            };
            batch.scanned += 1;

            if selected.contains(&record.upload_id) || ignore.contains(&record.upload_id) {
                continue;
            }

            let matched = bloom::test_filter(&record.filter, identifiers.iter().copied()).map_err(|source| {
                ResolveError::InvalidBloomFilter {
                    upload_id: record.upload_id,
                    source,
                }
            })?;

            if matched {
                hits += 1;
                selected.insert(record.upload_id);
            }
        }

        metrics::CANDIDATES_SCANNED.inc_by(batch.scanned as f64);
        metrics::FILTER_HITS.inc_by(hits as f64);

        batch.ids = selected.into_iter().collect();
        Ok(batch)
    }
}

/// True if the location is the source symbol itself, as seen from one of the
/// adjusted uploads.
fn is_source_location(adjusted_uploads: &[AdjustedUpload], location: &Location) -> bool {
    adjusted_uploads.iter().any(|adjusted| {
        location.upload_id == adjusted.upload.id
            && location.path == adjusted.adjusted_path_in_bundle
            && location.range.contains(adjusted.adjusted_position)
    })
}
