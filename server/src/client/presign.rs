//! Batched presigned URL retrieval

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use metrics::counter;
use tokio::sync::Mutex;
use tracing::debug;

use super::api::UploadApi;
use super::types::ClientError;
use crate::upload::PresignRequest;

/// Parts requested per presign round trip
pub const PRESIGN_BATCH_SIZE: u32 = 8;

/// Cached URLs older than this are dropped; the server signs for one hour
const DEFAULT_MAX_URL_AGE: Duration = Duration::from_secs(50 * 60);

struct CachedUrl {
    url: String,
    issued_at: Instant,
}

/// Fetches presigned part URLs for one upload, several parts per request.
///
/// A miss for part `n` requests every still-pending part in
/// `n..n + batch_size` and caches the extra URLs for the workers that claim
/// those parts next. Each URL is handed out once. Misses are fetched one at
/// a time, so workers that start together share a single request.
pub struct PresignBatcher {
    api: Arc<dyn UploadApi>,
    upload_id: String,
    key: String,
    pending: BTreeSet<u32>,
    cache: DashMap<u32, CachedUrl>,
    /// Parts whose URL has already been handed to a worker
    issued: DashSet<u32>,
    fetch_lock: Mutex<()>,
    batch_size: u32,
    max_age: Duration,
}

impl PresignBatcher {
    /// `pending` are the part numbers that still need uploading
    pub fn new(
        api: Arc<dyn UploadApi>,
        upload_id: impl Into<String>,
        key: impl Into<String>,
        pending: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            api,
            upload_id: upload_id.into(),
            key: key.into(),
            pending: pending.into_iter().collect(),
            cache: DashMap::new(),
            issued: DashSet::new(),
            fetch_lock: Mutex::new(()),
            batch_size: PRESIGN_BATCH_SIZE,
            max_age: DEFAULT_MAX_URL_AGE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Presign exactly `part_numbers`; fails unless every number gets a URL
    pub async fn get_urls(
        &self,
        part_numbers: &BTreeSet<u32>,
    ) -> Result<HashMap<u32, String>, ClientError> {
        if part_numbers.is_empty() {
            return Ok(HashMap::new());
        }

        let request = PresignRequest {
            upload_id: self.upload_id.clone(),
            key: self.key.clone(),
            part_numbers: part_numbers.iter().copied().collect(),
        };
        let response = self
            .api
            .presign(&request)
            .await
            .map_err(|e| ClientError::Presign(e.to_string()))?;

        let urls: HashMap<u32, String> = response
            .urls
            .into_iter()
            .filter(|u| part_numbers.contains(&u.part_number))
            .map(|u| (u.part_number, u.url))
            .collect();
        if let Some(missing) = part_numbers.iter().find(|n| !urls.contains_key(n)) {
            return Err(ClientError::Presign(format!(
                "no URL returned for part {}",
                missing
            )));
        }

        counter!("histoflow_client_presign_requests_total").increment(1);
        debug!(
            "Presigned {} parts for upload {}",
            urls.len(),
            self.upload_id
        );
        Ok(urls)
    }

    fn take_cached(&self, part_number: u32) -> Option<String> {
        let (_, cached) = self.cache.remove(&part_number)?;
        if cached.issued_at.elapsed() >= self.max_age {
            return None;
        }
        self.issued.insert(part_number);
        Some(cached.url)
    }

    fn is_cached(&self, part_number: u32) -> bool {
        self.cache
            .get(&part_number)
            .is_some_and(|c| c.issued_at.elapsed() < self.max_age)
    }

    /// URL for one part, from the cache or from a fresh batch
    pub async fn url_for(&self, part_number: u32) -> Result<String, ClientError> {
        if let Some(url) = self.take_cached(part_number) {
            return Ok(url);
        }

        let _fetch = self.fetch_lock.lock().await;
        // Another worker's batch may have covered this part while we waited
        if let Some(url) = self.take_cached(part_number) {
            return Ok(url);
        }

        let window_end = part_number.saturating_add(self.batch_size);
        let mut batch: BTreeSet<u32> = self
            .pending
            .range(part_number..window_end)
            .copied()
            .filter(|n| !self.issued.contains(n) && !self.is_cached(*n))
            .collect();
        batch.insert(part_number);

        let mut urls = self.get_urls(&batch).await?;
        let issued_at = Instant::now();
        let url = urls.remove(&part_number).ok_or_else(|| {
            ClientError::Presign(format!("no URL returned for part {}", part_number))
        })?;
        self.issued.insert(part_number);
        for (number, url) in urls {
            self.cache.insert(number, CachedUrl { url, issued_at });
        }
        Ok(url)
    }
}
