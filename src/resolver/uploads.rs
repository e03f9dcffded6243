use std::collections::HashMap;
use tracing::{debug, warn};

use super::QuerySession;
use crate::cursor::CursorAdjustedUpload;
use crate::error::{ResolveError, Result};
use crate::store::ops;
use crate::types::{AdjustedUpload, Position, Upload, UploadId};

/// Uploads already fetched during one query session.
#[derive(Debug, Default)]
pub struct UploadCache {
    uploads: HashMap<UploadId, Upload>,
}

impl UploadCache {
    pub fn get(&self, id: UploadId) -> Option<&Upload> {
        self.uploads.get(&id)
    }

    pub fn contains(&self, id: UploadId) -> bool {
        self.uploads.contains_key(&id)
    }

    pub fn insert(&mut self, upload: Upload) {
        self.uploads.insert(upload.id, upload);
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }

    /// Ids not yet cached, in first-seen order without repeats.
    fn missing(&self, ids: &[UploadId]) -> Vec<UploadId> {
        let mut missing: Vec<UploadId> = Vec::new();
        for &id in ids {
            if !self.contains(id) && !missing.contains(&id) {
                missing.push(id);
            }
        }
        missing
    }
}

impl From<&AdjustedUpload> for CursorAdjustedUpload {
    fn from(adjusted: &AdjustedUpload) -> Self {
        Self {
            upload_id: adjusted.upload.id,
            adjusted_path: adjusted.adjusted_path.clone(),
            adjusted_position: adjusted.adjusted_position,
            adjusted_path_in_bundle: adjusted.adjusted_path_in_bundle.clone(),
        }
    }
}

impl QuerySession<'_> {
    /// Uploads visible from the requested file with the position translated
    /// into each upload's commit. On a resumed request the list recorded in
    /// the cursor is rehydrated instead of being recomputed.
    pub(super) async fn adjusted_uploads_from_cursor(
        &mut self,
        position: Position,
        recorded: &mut Option<Vec<CursorAdjustedUpload>>,
    ) -> Result<Vec<AdjustedUpload>> {
        if let Some(recorded) = recorded.as_ref() {
            let ids: Vec<UploadId> = recorded.iter().map(|entry| entry.upload_id).collect();
            self.uploads_by_ids(&ids).await?;

            let mut adjusted = Vec::with_capacity(recorded.len());
            for entry in recorded {
                let Some(upload) = self.cache.get(entry.upload_id) else {
                    warn!(upload_id = entry.upload_id, "upload referenced by cursor no longer exists");
                    return Err(ResolveError::ConcurrentModification);
                };

                adjusted.push(AdjustedUpload {
                    upload: upload.clone(),
                    adjusted_path: entry.adjusted_path.clone(),
                    adjusted_position: entry.adjusted_position,
                    adjusted_path_in_bundle: entry.adjusted_path_in_bundle.clone(),
                });
            }
            return Ok(adjusted);
        }

        let adjusted = self.adjust_uploads(position).await?;
        *recorded = Some(adjusted.iter().map(CursorAdjustedUpload::from).collect());
        Ok(adjusted)
    }

    async fn adjust_uploads(&mut self, position: Position) -> Result<Vec<AdjustedUpload>> {
        let stores = &self.resolver.stores;
        let uploads = self
            .call(
                ops::FIND_COVERING_UPLOADS,
                stores.uploads.find_covering_uploads(&self.repository, &self.commit, &self.path),
            )
            .await?;

        let mut adjusted = Vec::with_capacity(uploads.len());
        for upload in uploads {
            self.cache.insert(upload.clone());

            let translated = self
                .call(
                    ops::ADJUST_POSITION,
                    stores
                        .adjuster
                        .adjust_position(&self.repository, &self.commit, &upload.commit, &self.path, position),
                )
                .await?;

            let Some((adjusted_path, adjusted_position)) = translated else {
                debug!(upload_id = upload.id, commit = %upload.commit, "position does not exist in upload commit");
                continue;
            };

            let adjusted_path_in_bundle = upload.path_in_bundle(&adjusted_path).to_string();
            adjusted.push(AdjustedUpload {
                upload,
                adjusted_path,
                adjusted_position,
                adjusted_path_in_bundle,
            });
        }

        Ok(adjusted)
    }

    /// Uploads with the given ids, served from the session cache where
    /// possible. Ids the store no longer knows are skipped.
    pub(super) async fn uploads_by_ids(&mut self, ids: &[UploadId]) -> Result<Vec<Upload>> {
        let missing = self.cache.missing(ids);
        if !missing.is_empty() {
            let fetched = self
                .call(
                    ops::GET_UPLOADS_BY_IDS,
                    self.resolver.stores.uploads.get_uploads_by_ids(&missing),
                )
                .await?;
            for upload in fetched {
                self.cache.insert(upload);
            }
        }

        Ok(ids.iter().filter_map(|&id| self.cache.get(id).cloned()).collect())
    }
}
