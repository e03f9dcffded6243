use std::collections::HashSet;
use tracing::warn;

use super::QuerySession;
use crate::error::Result;
use crate::store::ops;
use crate::types::{AdjustedLocation, Location, Upload, UploadId};

impl QuerySession<'_> {
    /// Translate collected locations into the caller's commit. Locations
    /// whose range no longer exists at the requested commit are dropped, as
    /// are repeats within the page.
    pub(super) async fn adjust_locations(&mut self, locations: Vec<Location>) -> Result<Vec<AdjustedLocation>> {
        let ids: Vec<UploadId> = locations.iter().map(|location| location.upload_id).collect();
        self.uploads_by_ids(&ids).await?;

        let mut seen = HashSet::new();
        let mut adjusted = Vec::with_capacity(locations.len());

        for location in locations {
            if !seen.insert(location.clone()) {
                continue;
            }

            let Some(upload) = self.cache.get(location.upload_id).cloned() else {
                warn!(upload_id = location.upload_id, path = %location.path, "dropping location of unknown upload");
                continue;
            };

            if let Some(location) = self.adjust_location(upload, location).await? {
                adjusted.push(location);
            }
        }

        Ok(adjusted)
    }

    async fn adjust_location(&self, upload: Upload, location: Location) -> Result<Option<AdjustedLocation>> {
        let path = upload.repository_path(&location.path);

        // Other repositories have no diff against the requested commit.
        if upload.repository != self.repository {
            let adjusted_commit = upload.commit.clone();
            return Ok(Some(AdjustedLocation {
                upload,
                path,
                adjusted_commit,
                adjusted_range: location.range,
            }));
        }

        let translated = self
            .call(
                ops::ADJUST_RANGE,
                self.resolver
                    .stores
                    .adjuster
                    .adjust_range(&self.repository, &upload.commit, &self.commit, &path, location.range),
            )
            .await?;

        Ok(translated.map(|(path, adjusted_range)| AdjustedLocation {
            upload,
            path,
            adjusted_commit: self.commit.clone(),
            adjusted_range,
        }))
    }
}
