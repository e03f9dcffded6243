use tracing::debug;

use super::QuerySession;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::store::ops;
use crate::types::{AdjustedUpload, Location, SearchKind};

impl QuerySession<'_> {
    /// Pull up to `limit` locations from the symbol graphs of the adjusted
    /// uploads, resuming at the cursor's local offsets. The flag is false
    /// once every adjusted upload has been drained.
    pub(super) async fn page_local(
        &self,
        adjusted_uploads: &[AdjustedUpload],
        cursor: &mut Cursor,
        limit: usize,
    ) -> Result<(Vec<Location>, bool)> {
        let mut locations = Vec::new();

        while cursor.local_batch_offset < adjusted_uploads.len() && locations.len() < limit {
            let adjusted = &adjusted_uploads[cursor.local_batch_offset];
            let remaining = limit - locations.len();

            let (page, total) = self.graph_page(adjusted, remaining, cursor.local_offset).await?;
            let returned = page.len();
            debug!(
                upload_id = adjusted.upload.id,
                offset = cursor.local_offset,
                returned,
                total,
                "fetched local locations"
            );

            locations.extend(page);
            cursor.local_offset += returned;

            if cursor.local_offset >= total {
                cursor.local_batch_offset += 1;
                cursor.local_offset = 0;
            } else if returned < remaining {
                // Short page but the upload is not drained yet.
                break;
            }
        }

        Ok((locations, cursor.local_batch_offset < adjusted_uploads.len()))
    }

    async fn graph_page(&self, adjusted: &AdjustedUpload, limit: usize, offset: usize) -> Result<(Vec<Location>, usize)> {
        let graph = &self.resolver.stores.graph;
        let upload_id = adjusted.upload.id;
        let path = adjusted.adjusted_path_in_bundle.as_str();

        match self.kind {
            SearchKind::References => {
                self.call(
                    ops::REFERENCES,
                    graph.references(upload_id, path, adjusted.adjusted_position, limit, offset),
                )
                .await
            }
            SearchKind::Implementations => {
                self.call(
                    ops::IMPLEMENTATIONS,
                    graph.implementations(upload_id, path, adjusted.adjusted_position, limit, offset),
                )
                .await
            }
        }
    }
}
