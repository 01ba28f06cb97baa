//! Aggregation of flat object listings into dataset summaries

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::debug;

use super::types::{DatasetError, DatasetPage, DatasetQuery, DatasetSummary};
use crate::config::{DatasetConfig, MAX_DATASET_PAGE_LIMIT};
use crate::storage::{ListRequest, ObjectStore};

const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Deserialize)]
struct DatasetMetadata {
    #[serde(alias = "datasetName")]
    dataset_name: Option<String>,
}

/// Running totals for one dataset while raw pages are scanned
struct Accumulator {
    display_name: String,
    total_objects: u64,
    total_size_bytes: u64,
    last_modified_epoch_millis: i64,
}

impl Accumulator {
    fn matches(&self, dataset_id: &str, needle: &str) -> bool {
        dataset_id.to_lowercase().contains(needle)
            || self.display_name.to_lowercase().contains(needle)
    }
}

/// Builds `DatasetPage`s from the tiles bucket.
///
/// Every call re-aggregates from the supplied raw continuation token; nothing
/// is cached between calls. Raw pages are fetched only while the backend has
/// more keys and fewer than `limit` datasets qualify, so a dataset straddling
/// the stopping point is summarised from the keys seen so far.
pub struct DatasetAggregator {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    config: DatasetConfig,
}

impl DatasetAggregator {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, config: DatasetConfig) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            config,
        }
    }

    /// Clamp a requested page size into `1..=max_page_limit`
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        let max = self.config.max_page_limit.clamp(1, MAX_DATASET_PAGE_LIMIT);
        requested.unwrap_or(max).clamp(1, max)
    }

    pub async fn list(&self, query: &DatasetQuery) -> Result<DatasetPage, DatasetError> {
        let limit = self.effective_limit(query.limit);
        let applied = query
            .search
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        let needle = (!applied.is_empty()).then(|| applied.to_lowercase());

        let mut aggregated: HashMap<String, Accumulator> = HashMap::new();
        let mut token = query
            .continuation_token
            .clone()
            .filter(|t| !t.trim().is_empty());
        let mut pages = 0u32;

        let next_continuation_token = loop {
            let request = ListRequest::new(&self.bucket, self.config.raw_page_size)
                .with_continuation_token(token.take());
            let listing = self.store.list_objects(&request).await?;
            pages += 1;

            for object in listing.objects {
                // Root-level objects belong to no dataset
                let Some(dataset_id) = object
                    .key
                    .split_once('/')
                    .map(|(id, _)| id)
                    .filter(|id| !id.trim().is_empty())
                else {
                    continue;
                };

                if !aggregated.contains_key(dataset_id) {
                    let display_name = self.resolve_display_name(dataset_id).await;
                    aggregated.insert(
                        dataset_id.to_string(),
                        Accumulator {
                            display_name,
                            total_objects: 0,
                            total_size_bytes: 0,
                            last_modified_epoch_millis: 0,
                        },
                    );
                }
                if let Some(entry) = aggregated.get_mut(dataset_id) {
                    entry.total_objects += 1;
                    entry.total_size_bytes += object.size;
                    entry.last_modified_epoch_millis =
                        entry.last_modified_epoch_millis.max(object.last_modified_millis);
                }
            }

            let qualifying = match &needle {
                Some(needle) => aggregated
                    .iter()
                    .filter(|(id, acc)| acc.matches(id, needle))
                    .count(),
                None => aggregated.len(),
            };

            let candidate_next = listing
                .next_continuation_token
                .filter(|_| listing.is_truncated);
            match candidate_next {
                Some(next) if qualifying < limit => token = Some(next),
                other => break other,
            }
        };

        let mut datasets: Vec<DatasetSummary> = aggregated
            .into_iter()
            .filter(|(id, acc)| needle.as_deref().is_none_or(|n| acc.matches(id, n)))
            .map(|(dataset_id, acc)| DatasetSummary {
                dataset_id,
                display_name: acc.display_name,
                total_objects: acc.total_objects,
                total_size_bytes: acc.total_size_bytes,
                last_modified_epoch_millis: acc.last_modified_epoch_millis,
            })
            .collect();
        datasets.sort_by(|a, b| {
            b.last_modified_epoch_millis
                .cmp(&a.last_modified_epoch_millis)
                .then_with(|| a.dataset_id.cmp(&b.dataset_id))
        });
        datasets.truncate(limit);

        counter!("histoflow_dataset_listings_total").increment(1);
        histogram!("histoflow_dataset_raw_pages").record(pages as f64);
        debug!(
            "Listed {} datasets from {} raw pages (search={:?}, more={})",
            datasets.len(),
            pages,
            needle,
            next_continuation_token.is_some()
        );

        Ok(DatasetPage {
            datasets,
            next_continuation_token,
            applied_search_term: applied,
        })
    }

    /// Read `{id}/metadata.json`, falling back to the id on any failure
    async fn resolve_display_name(&self, dataset_id: &str) -> String {
        let key = format!("{}/{}", dataset_id, METADATA_FILE);
        match self.store.get_object(&self.bucket, &key).await {
            Ok(bytes) => match serde_json::from_slice::<DatasetMetadata>(&bytes) {
                Ok(meta) => meta
                    .dataset_name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| dataset_id.to_string()),
                Err(e) => {
                    debug!("Unreadable metadata for {}: {}", dataset_id, e);
                    dataset_id.to_string()
                }
            },
            Err(e) => {
                if !e.is_not_found() {
                    debug!("Failed to read metadata for {}: {}", dataset_id, e);
                }
                dataset_id.to_string()
            }
        }
    }
}
