use std::collections::HashSet;

use super::QuerySession;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::store::ops;
use crate::types::{AdjustedUpload, Moniker, MonikerKind, UploadId};

impl QuerySession<'_> {
    /// Monikers of the given kind attached to the ranges enclosing each
    /// adjusted position. Uploads are visited in order and the first
    /// occurrence of a moniker wins.
    pub(super) async fn ordered_monikers(&self, adjusted_uploads: &[AdjustedUpload], kind: MonikerKind) -> Result<Vec<Moniker>> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for adjusted in adjusted_uploads {
            let ranges = self
                .call(
                    ops::MONIKERS_BY_POSITION,
                    self.resolver.stores.graph.monikers_by_position(
                        adjusted.upload.id,
                        &adjusted.adjusted_path_in_bundle,
                        adjusted.adjusted_position,
                    ),
                )
                .await?;

            ordered.extend(
                ranges
                    .into_iter()
                    .flatten()
                    .filter(|moniker| moniker.kind == kind && seen.insert(moniker.clone())),
            );
        }

        Ok(ordered)
    }

    /// Ids of uploads defining any of the monikers, minus the adjusted
    /// uploads. Computed once and then carried by the cursor.
    pub(super) async fn definition_upload_ids_from_cursor(
        &mut self,
        adjusted_uploads: &[AdjustedUpload],
        monikers: &[Moniker],
        cursor: &mut Cursor,
    ) -> Result<Vec<UploadId>> {
        if let Some(ids) = &cursor.definition_upload_ids {
            return Ok(ids.clone());
        }

        let uploads = if monikers.is_empty() {
            Vec::new()
        } else {
            self.call(
                ops::DEFINITION_UPLOADS,
                self.resolver.stores.uploads.definition_uploads(monikers),
            )
            .await?
        };

        let mut ids = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if adjusted_uploads.iter().any(|adjusted| adjusted.upload.id == upload.id) || ids.contains(&upload.id) {
                continue;
            }
            ids.push(upload.id);
            self.cache.insert(upload);
        }

        cursor.definition_upload_ids = Some(ids.clone());
        Ok(ids)
    }
}
