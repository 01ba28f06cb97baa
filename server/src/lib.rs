//! HistoFlow Server Library
//!
//! Resumable multipart uploads of slide images into object storage, dataset
//! listing over the tiles bucket and tiling status derived from storage
//! contents. The upload client engine lives here too so the CLI and tests
//! share it.

pub mod client;
pub mod config;
pub mod datasets;
pub mod server;
pub mod storage;
pub mod tiling;
pub mod upload;

// Re-export commonly used types
pub use client::{UploadOptions, UploadSessionCoordinator};
pub use config::Config;
pub use datasets::DatasetAggregator;
pub use server::{AppState, build_router};
pub use storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};
pub use tiling::TilingStatusResolver;
pub use upload::MultipartLifecycleService;
