//! Dataset types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Aggregate view of every object under one top-level prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub dataset_id: String,
    pub display_name: String,
    pub total_objects: u64,
    pub total_size_bytes: u64,
    pub last_modified_epoch_millis: i64,
}

/// One page of datasets, most recently modified first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetPage {
    pub datasets: Vec<DatasetSummary>,
    /// Raw backend token to continue scanning from, if the scan stopped early
    pub next_continuation_token: Option<String>,
    #[serde(rename = "appliedPrefix")]
    pub applied_search_term: String,
}

/// Parameters of a listing call
#[derive(Debug, Clone, Default)]
pub struct DatasetQuery {
    pub limit: Option<usize>,
    pub continuation_token: Option<String>,
    pub search: Option<String>,
}
