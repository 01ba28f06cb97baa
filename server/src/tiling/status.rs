//! Tiling status derived from object presence

use std::sync::Arc;

use tracing::debug;

use super::types::{TilingError, TilingStatus};
use crate::storage::ObjectStore;

/// Key of the DZI descriptor written last by the tiling service
pub fn descriptor_key(dataset_id: &str) -> String {
    format!("{}/image.dzi", dataset_id)
}

/// Key of one tile in the pyramid
pub fn tile_key(dataset_id: &str, level: u32, x: u32, y: u32) -> String {
    format!("{}/image_files/{}/{}_{}.jpg", dataset_id, level, x, y)
}

/// Answers "how far along is this image" from storage contents alone.
///
/// A descriptor in the tiles bucket means tiling finished. Without one, any
/// raw object for the image in the uploads bucket means tiling is still
/// pending or running. Both raw layouts are probed: `{id}/...` and the
/// multipart path `uploads/{id}-...`.
pub struct TilingStatusResolver {
    store: Arc<dyn ObjectStore>,
    tiles_bucket: String,
    uploads_bucket: String,
}

impl TilingStatusResolver {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        tiles_bucket: impl Into<String>,
        uploads_bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            tiles_bucket: tiles_bucket.into(),
            uploads_bucket: uploads_bucket.into(),
        }
    }

    pub fn tiles_bucket(&self) -> &str {
        &self.tiles_bucket
    }

    pub async fn status(&self, dataset_id: &str) -> Result<TilingStatus, TilingError> {
        if self
            .store
            .object_exists(&self.tiles_bucket, &descriptor_key(dataset_id))
            .await?
        {
            return Ok(TilingStatus::Completed);
        }

        for prefix in [format!("{}/", dataset_id), format!("uploads/{}-", dataset_id)] {
            if self.store.prefix_exists(&self.uploads_bucket, &prefix).await? {
                debug!("Raw object found for {} under {}", dataset_id, prefix);
                return Ok(TilingStatus::Processing);
            }
        }

        Ok(TilingStatus::NotFound)
    }
}
