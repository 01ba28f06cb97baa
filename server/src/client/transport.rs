//! Part PUT transport

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ETAG;

use super::types::TransportError;
use crate::storage::{MemoryObjectStore, StorageError};

/// Sends one part's bytes to its presigned URL and returns the etag
#[async_trait]
pub trait PartTransport: Send + Sync {
    async fn put_part(&self, url: &str, body: Bytes) -> Result<String, TransportError>;
}

/// PUTs parts over HTTP
#[derive(Clone, Default)]
pub struct HttpPartTransport {
    client: reqwest::Client,
}

impl HttpPartTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Etags arrive quoted; completion wants them bare
fn normalize_etag(raw: &str) -> String {
    raw.replace('"', "")
}

#[async_trait]
impl PartTransport for HttpPartTransport {
    async fn put_part(&self, url: &str, body: Bytes) -> Result<String, TransportError> {
        let response = self
            .client
            .put(url)
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 408 || status.as_u16() == 429 {
            return Err(TransportError::Transient(format!("status {}", status)));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(normalize_etag)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| TransportError::InvalidResponse("missing ETag header".to_string()))?;
        Ok(etag)
    }
}

#[async_trait]
impl PartTransport for MemoryObjectStore {
    async fn put_part(&self, url: &str, body: Bytes) -> Result<String, TransportError> {
        self.put_presigned_part(url, body).map_err(|e| match e {
            StorageError::NoSuchUpload(id) => TransportError::Rejected {
                status: 404,
                message: format!("upload {} does not exist", id),
            },
            other => TransportError::Rejected {
                status: 400,
                message: other.to_string(),
            },
        })
    }
}
