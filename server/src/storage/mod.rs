//! Object storage module
//!
//! This module provides:
//! - `ObjectStore` trait covering multipart uploads, listing and reads
//! - `S3ObjectStore` backed by any S3-compatible service
//! - `MemoryObjectStore` for local development and tests

mod memory;
mod s3;
mod service;
mod types;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use service::ObjectStore;
pub use types::{ListRequest, ObjectInfo, ObjectListing, StorageError};
