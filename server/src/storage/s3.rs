//! S3-compatible object store

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use tracing::{debug, info};

use super::service::ObjectStore;
use super::types::{ListRequest, ObjectInfo, ObjectListing, StorageError};
use crate::config::StorageConfig;
use crate::upload::PartRecord;

/// Object store backed by the AWS SDK
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from storage configuration.
    ///
    /// Static credentials are used when both keys are configured, otherwise the
    /// SDK's default provider chain applies. An endpoint override switches to
    /// path-style addressing, which MinIO requires.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let creds = Credentials::new(access_key, secret_key, None, None, "histoflow-env");
            loader = loader.credentials_provider(creds);
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            info!("Using S3 endpoint override: {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()))
    }
}

/// Translate an SDK failure into the storage taxonomy by error code
fn map_sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error() {
        Some(service) => {
            let code = service.code().unwrap_or("Unknown");
            let message = service.message().unwrap_or("no message");
            match code {
                "NoSuchUpload" => StorageError::NoSuchUpload(message.to_string()),
                _ => StorageError::Rejected {
                    operation,
                    message: format!("{}: {}", code, message),
                },
            }
        }
        None => StorageError::Transport {
            operation,
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| map_sdk_error("create_multipart_upload", e))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StorageError::Rejected {
                operation: "create_multipart_upload",
                message: "response carried no upload id".to_string(),
            })
    }

    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number as i32)
            .presigned(presigning)
            .await
            .map_err(|e| map_sdk_error("upload_part", e))?;

        Ok(request.uri().to_string())
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), StorageError> {
        let completed: Vec<CompletedPart> = parts
            .iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.part_number as i32)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error("complete_multipart_upload", e))?;

        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error("abort_multipart_upload", e))?;
        Ok(())
    }

    async fn list_objects(&self, request: &ListRequest) -> Result<ObjectListing, StorageError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .set_prefix(request.prefix.clone())
            .set_continuation_token(request.continuation_token.clone())
            .max_keys(request.max_keys)
            .send()
            .await
            .map_err(|e| map_sdk_error("list_objects_v2", e))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified_millis: object
                        .last_modified()
                        .and_then(|t| t.to_millis().ok())
                        .unwrap_or(0),
                })
            })
            .collect::<Vec<_>>();

        debug!(
            "Listed {} objects from {} (prefix={:?})",
            objects.len(),
            request.bucket,
            request.prefix
        );

        Ok(ObjectListing {
            objects,
            next_continuation_token: output.next_continuation_token().map(str::to_string),
            is_truncated: output.is_truncated().unwrap_or(false),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    StorageError::not_found(bucket, key)
                } else {
                    map_sdk_error("get_object", e)
                }
            })?;

        let body = output.body.collect().await.map_err(|e| StorageError::Transport {
            operation: "get_object",
            message: e.to_string(),
        })?;
        Ok(body.into_bytes())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(map_sdk_error("head_object", e)),
        }
    }
}
