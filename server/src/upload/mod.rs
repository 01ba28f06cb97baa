//! Server-side multipart upload module
//!
//! This module provides:
//! - Wire types shared by the HTTP surface and the upload client
//! - `MultipartLifecycleService` which opens, presigns, completes and aborts
//!   multipart uploads against an `ObjectStore`
//! - HTTP routes under `/uploads`

mod lifecycle;
pub mod routes;
mod types;

pub use lifecycle::{MAX_PART_NUMBER, MultipartLifecycleService, parse_upload_key};
pub use routes::{UploadAppState, UploadErrorResponse, upload_routes};
pub use types::{
    AbortOutcome, AbortRequest, AbortResponse, CompleteRequest, CompleteResponse,
    InitiateRequest, InitiateResponse, PartRecord, PartUrl, PresignRequest, PresignResponse,
    UploadError,
};
