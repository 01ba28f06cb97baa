//! Control-plane API used by the upload client

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::ApiError;
use crate::upload::{
    AbortOutcome, AbortRequest, AbortResponse, CompleteRequest, CompleteResponse, InitiateRequest,
    InitiateResponse, MultipartLifecycleService, PresignRequest, PresignResponse,
    UploadErrorResponse,
};

/// The four lifecycle calls a client makes
#[async_trait]
pub trait UploadApi: Send + Sync {
    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, ApiError>;

    async fn presign(&self, req: &PresignRequest) -> Result<PresignResponse, ApiError>;

    async fn complete(&self, req: &CompleteRequest) -> Result<CompleteResponse, ApiError>;

    async fn abort(&self, req: &AbortRequest) -> Result<AbortOutcome, ApiError>;
}

/// Talks to a running service over HTTP
#[derive(Clone)]
pub struct HttpUploadApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploadApi {
    /// `base_url` is the service root, e.g. `http://localhost:8080`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, action: &str) -> String {
        format!("{}/api/v1/uploads/{}", self.base_url, action)
    }

    async fn post<Req, Resp>(&self, action: &str, body: &Req) -> Result<Resp, ApiError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.url(action);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<UploadErrorResponse>(&text) {
                Ok(body) => (body.code, body.error),
                Err(_) => (format!("http_{}", status.as_u16()), text),
            };
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ApiError::Unavailable(format!("invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl UploadApi for HttpUploadApi {
    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, ApiError> {
        self.post("initiate", req).await
    }

    async fn presign(&self, req: &PresignRequest) -> Result<PresignResponse, ApiError> {
        self.post("presign", req).await
    }

    async fn complete(&self, req: &CompleteRequest) -> Result<CompleteResponse, ApiError> {
        self.post("complete", req).await
    }

    async fn abort(&self, req: &AbortRequest) -> Result<AbortOutcome, ApiError> {
        self.post::<_, AbortResponse>("abort", req)
            .await
            .map(|r| r.outcome)
    }
}

fn rejected(response: UploadErrorResponse) -> ApiError {
    ApiError::Rejected {
        status: response.status_code().as_u16(),
        code: response.code,
        message: response.error,
    }
}

/// Drives the lifecycle service directly, without HTTP in between
#[async_trait]
impl UploadApi for MultipartLifecycleService {
    async fn initiate(&self, req: &InitiateRequest) -> Result<InitiateResponse, ApiError> {
        MultipartLifecycleService::initiate(
            self,
            &req.filename,
            req.content_type.as_deref(),
            req.part_size_hint,
        )
        .await
        .map_err(|e| rejected(e.into()))
    }

    async fn presign(&self, req: &PresignRequest) -> Result<PresignResponse, ApiError> {
        let urls = self
            .presign_parts(&req.upload_id, &req.key, &req.part_numbers)
            .await
            .map_err(|e| rejected(e.into()))?;
        Ok(PresignResponse { urls })
    }

    async fn complete(&self, req: &CompleteRequest) -> Result<CompleteResponse, ApiError> {
        MultipartLifecycleService::complete(
            self,
            &req.upload_id,
            &req.key,
            &req.parts,
            req.dataset_name.as_deref(),
        )
        .await
        .map_err(|e| rejected(e.into()))
    }

    async fn abort(&self, req: &AbortRequest) -> Result<AbortOutcome, ApiError> {
        MultipartLifecycleService::abort(self, &req.upload_id, &req.key)
            .await
            .map_err(|e| rejected(e.into()))
    }
}
