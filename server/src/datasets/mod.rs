//! Dataset listing module
//!
//! Datasets are not stored as records. They are derived on every request by
//! grouping the tiles bucket's flat keys on their first path segment.

mod aggregator;
pub mod routes;
mod types;

pub use aggregator::DatasetAggregator;
pub use routes::{DatasetAppState, dataset_routes};
pub use types::{DatasetError, DatasetPage, DatasetQuery, DatasetSummary};
