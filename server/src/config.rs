//! Server configuration
//!
//! Configuration is loaded from environment variables. Every value has a
//! default suitable for a local MinIO setup.

use std::env;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Hard ceiling on datasets returned per listing page
pub const MAX_DATASET_PAGE_LIMIT: usize = 50;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Object storage configuration
    pub storage: StorageConfig,

    /// Multipart upload configuration
    pub upload: UploadConfig,

    /// Dataset listing configuration
    pub datasets: DatasetConfig,

    /// Tiling job trigger configuration
    pub tiling: TilingConfig,
}

/// Which object store implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible storage (AWS, MinIO, R2)
    S3,
    /// Process-local store, for development and tests
    Memory,
}

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Endpoint override for S3-compatible services
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Bucket holding tile pyramids and dataset metadata
    pub tiles_bucket: String,
    /// Bucket receiving raw multipart uploads
    pub uploads_bucket: String,
}

/// Multipart upload configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Part size used when the client sends no hint
    pub default_part_size: u64,
    /// Smallest part size the backend accepts for non-final parts
    pub min_part_size: u64,
    /// Validity window of presigned part URLs
    pub presign_expiry: Duration,
}

/// Dataset listing configuration
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Upper bound for the `limit` query parameter
    pub max_page_limit: usize,
    /// Raw keys requested per backend listing page
    pub raw_page_size: i32,
}

/// Tiling job trigger configuration
#[derive(Debug, Clone)]
pub struct TilingConfig {
    /// Trigger strategy name, validated at startup
    pub strategy: String,
    /// Base URL of the tiling service
    pub base_url: String,
    /// Timeout for the trigger request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            datasets: DatasetConfig::default(),
            tiling: TilingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            tiles_bucket: "histoflow-tiles".to_string(),
            uploads_bucket: "unprocessed-slides".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_part_size: 16 * MIB,
            min_part_size: 5 * MIB,
            presign_expiry: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_page_limit: MAX_DATASET_PAGE_LIMIT,
            raw_page_size: 1000,
        }
    }
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            strategy: "direct-http".to_string(),
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "s3" | "minio" => Some(Self::S3),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Storage config
        if let Ok(val) = env::var("STORAGE_BACKEND")
            && let Some(backend) = StorageBackend::parse(&val)
        {
            config.storage.backend = backend;
        }
        if let Ok(url) = env::var("S3_ENDPOINT")
            && !url.is_empty()
        {
            config.storage.endpoint = Some(url);
        }
        if let Ok(region) = env::var("S3_REGION")
            && !region.is_empty()
        {
            config.storage.region = region;
        }
        if let Ok(key) = env::var("S3_ACCESS_KEY")
            && !key.is_empty()
        {
            config.storage.access_key = Some(key);
        }
        if let Ok(secret) = env::var("S3_SECRET_KEY")
            && !secret.is_empty()
        {
            config.storage.secret_key = Some(secret);
        }
        if let Ok(bucket) = env::var("TILES_BUCKET")
            && !bucket.is_empty()
        {
            config.storage.tiles_bucket = bucket;
        }
        if let Ok(bucket) = env::var("UPLOADS_BUCKET")
            && !bucket.is_empty()
        {
            config.storage.uploads_bucket = bucket;
        }

        // Upload config
        if let Ok(val) = env::var("UPLOAD_DEFAULT_PART_SIZE_MB")
            && let Ok(mb) = val.parse::<u64>()
        {
            config.upload.default_part_size = mb * MIB;
        }
        if let Ok(val) = env::var("UPLOAD_MIN_PART_SIZE_MB")
            && let Ok(mb) = val.parse::<u64>()
        {
            config.upload.min_part_size = mb * MIB;
        }
        if let Ok(val) = env::var("PRESIGN_EXPIRY_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.upload.presign_expiry = Duration::from_secs(secs);
        }

        // Dataset config
        if let Ok(val) = env::var("DATASETS_MAX_LIMIT")
            && let Some(limit) = parse_page_limit(&val)
        {
            config.datasets.max_page_limit = limit;
        }
        if let Ok(val) = env::var("DATASETS_RAW_PAGE_SIZE")
            && let Ok(size) = val.parse::<i32>()
            && size > 0
        {
            config.datasets.raw_page_size = size;
        }

        // Tiling config
        if let Ok(strategy) = env::var("TILING_STRATEGY")
            && !strategy.is_empty()
        {
            config.tiling.strategy = strategy;
        }
        if let Ok(url) = env::var("TILING_BASE_URL")
            && !url.is_empty()
        {
            config.tiling.base_url = url;
        }
        if let Ok(val) = env::var("TILING_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.tiling.request_timeout = Duration::from_secs(secs);
        }

        config
    }
}

/// Positive page limits, capped at [`MAX_DATASET_PAGE_LIMIT`]
fn parse_page_limit(value: &str) -> Option<usize> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|limit| *limit > 0)
        .map(|limit| limit.min(MAX_DATASET_PAGE_LIMIT))
}
