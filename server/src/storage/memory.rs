//! In-process object store
//!
//! Behaves like S3 for everything the service relies on: multipart uploads
//! validate part order, etags and minimum part size at completion, listings
//! are lexicographic and paginated with an opaque token, and presigned URLs
//! target exactly one part of one upload.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::service::ObjectStore;
use super::types::{ListRequest, ObjectInfo, ObjectListing, StorageError};
use crate::upload::PartRecord;

const PRESIGN_SCHEME: &str = "memory://upload/";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified_millis: i64,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    /// part number -> (etag, data)
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// Object store held entirely in memory
pub struct MemoryObjectStore {
    buckets: DashMap<String, BTreeMap<String, StoredObject>>,
    uploads: DashMap<String, PendingUpload>,
    min_part_size: u64,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_min_part_size(5 * 1024 * 1024)
    }

    /// Override the minimum size of non-final parts (S3 uses 5 MiB)
    pub fn with_min_part_size(min_part_size: u64) -> Self {
        Self {
            buckets: DashMap::new(),
            uploads: DashMap::new(),
            min_part_size,
        }
    }

    /// Store an object stamped with the current time
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.put_object_with_modified(bucket, key, data, now_millis());
    }

    /// Store an object with an explicit last-modified timestamp
    pub fn put_object_with_modified(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        last_modified_millis: i64,
    ) {
        self.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified_millis,
            },
        );
    }

    /// Number of multipart uploads that are open
    pub fn pending_upload_count(&self) -> usize {
        self.uploads.len()
    }

    /// Part numbers received so far for an open upload
    pub fn received_parts(&self, upload_id: &str) -> Vec<u32> {
        self.uploads
            .get(upload_id)
            .map(|u| u.parts.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Accept the body of a presigned part PUT and return the part's etag
    pub fn put_presigned_part(&self, url: &str, data: Bytes) -> Result<String, StorageError> {
        let (upload_id, part_number) = parse_presigned_url(url).ok_or_else(|| StorageError::Rejected {
            operation: "upload_part",
            message: format!("not a presigned part URL: {}", url),
        })?;

        let mut upload = self
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;

        let etag = format!("{:x}", Sha256::digest(&data));
        upload.parts.insert(part_number, (etag.clone(), data));
        debug!("Stored part {} of upload {}", part_number, upload_id);
        Ok(etag)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn parse_presigned_url(url: &str) -> Option<(&str, u32)> {
    let rest = url.strip_prefix(PRESIGN_SCHEME)?;
    let (upload_id, part) = rest.split_once('/')?;
    let part_number = part.parse().ok()?;
    Some((upload_id, part_number))
}

fn rejected(operation: &'static str, message: String) -> StorageError {
    StorageError::Rejected { operation, message }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let upload_id = uuid::Uuid::new_v4().simple().to_string();
        self.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        _expires_in: Duration,
    ) -> Result<String, StorageError> {
        let upload = self
            .uploads
            .get(upload_id)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;
        if upload.bucket != bucket || upload.key != key {
            return Err(StorageError::NoSuchUpload(upload_id.to_string()));
        }
        Ok(format!("{}{}/{}", PRESIGN_SCHEME, upload_id, part_number))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), StorageError> {
        const OP: &str = "complete_multipart_upload";

        let data = {
            let upload = self
                .uploads
                .get(upload_id)
                .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;
            if upload.bucket != bucket || upload.key != key {
                return Err(StorageError::NoSuchUpload(upload_id.to_string()));
            }
            if parts.is_empty() {
                return Err(rejected(OP, "MalformedXML: no parts given".to_string()));
            }

            let mut assembled = BytesMut::new();
            let mut previous = 0;
            for (index, part) in parts.iter().enumerate() {
                if part.part_number <= previous {
                    return Err(rejected(
                        OP,
                        format!("InvalidPartOrder: part {} after {}", part.part_number, previous),
                    ));
                }
                previous = part.part_number;

                let (etag, bytes) = upload.parts.get(&part.part_number).ok_or_else(|| {
                    rejected(OP, format!("InvalidPart: part {} was never uploaded", part.part_number))
                })?;
                if etag.as_str() != part.etag.trim_matches('"') {
                    return Err(rejected(
                        OP,
                        format!("InvalidPart: stale etag for part {}", part.part_number),
                    ));
                }
                let is_last = index + 1 == parts.len();
                if !is_last && (bytes.len() as u64) < self.min_part_size {
                    return Err(rejected(
                        OP,
                        format!("EntityTooSmall: part {} is {} bytes", part.part_number, bytes.len()),
                    ));
                }
                assembled.extend_from_slice(bytes);
            }
            assembled.freeze()
        };

        self.uploads.remove(upload_id);
        self.put_object(bucket, key, data);
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))
    }

    async fn list_objects(&self, request: &ListRequest) -> Result<ObjectListing, StorageError> {
        let Some(bucket) = self.buckets.get(&request.bucket) else {
            return Ok(ObjectListing::default());
        };

        let start = match &request.continuation_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Unbounded,
        };
        let prefix = request.prefix.as_deref().unwrap_or("");
        let max_keys = request.max_keys.max(1) as usize;

        let mut matching = bucket
            .range((start, Bound::Unbounded))
            .filter(|(key, _)| key.starts_with(prefix));

        let objects: Vec<ObjectInfo> = matching
            .by_ref()
            .take(max_keys)
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified_millis: object.last_modified_millis,
            })
            .collect();
        let is_truncated = matching.next().is_some();
        let next_continuation_token = if is_truncated {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectListing {
            objects,
            next_continuation_token,
            is_truncated,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        self.buckets
            .get(bucket)
            .and_then(|objects| objects.get(key).map(|o| o.data.clone()))
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }
}
