//! ObjectStore trait definition

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::types::{ListRequest, ObjectListing, StorageError};
use crate::upload::PartRecord;

/// Operations the upload, listing and status paths need from a storage backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a multipart upload and return its upload id
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError>;

    /// Presign a PUT of a single part
    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    /// Assemble the object from the given parts, which must be sorted ascending
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), StorageError>;

    /// Release all parts held for an incomplete upload
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError>;

    /// Fetch one page of keys
    async fn list_objects(&self, request: &ListRequest) -> Result<ObjectListing, StorageError>;

    /// Read a whole object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Check whether an object exists without reading it
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Check whether any object exists under a prefix
    async fn prefix_exists(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError> {
        let request = ListRequest::new(bucket, 1).with_prefix(prefix);
        let listing = self.list_objects(&request).await?;
        Ok(!listing.objects.is_empty())
    }
}
