//! Resumable multipart upload client
//!
//! This module provides:
//! - `ChunkPlan` and `Fingerprint` for splitting a source into parts
//! - `UploadStateStore` with in-memory and file-backed implementations
//! - `UploadApi` (HTTP or in-process) and `PartTransport` seams
//! - `PresignBatcher`, `PartUploadWorkerPool` and the
//!   `UploadSessionCoordinator` that composes them

mod api;
mod coordinator;
mod plan;
mod pool;
mod presign;
mod source;
mod state;
mod transport;
mod types;

pub use api::{HttpUploadApi, UploadApi};
pub use coordinator::{ProgressFn, UploadOptions, UploadOutcome, UploadSessionCoordinator};
pub use plan::{ChunkPlan, Fingerprint, MAX_PARTS};
pub use pool::{PartUploadWorkerPool, RetryPolicy, upload_with_retry};
pub use presign::{PRESIGN_BATCH_SIZE, PresignBatcher};
pub use source::{BytesSource, FileSource, PartSource};
pub use state::{FileStateStore, MemoryStateStore, UploadSession, UploadStateStore};
pub use transport::{HttpPartTransport, PartTransport};
pub use types::{ApiError, ClientError, StateError, TransportError};
