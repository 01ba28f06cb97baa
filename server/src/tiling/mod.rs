//! Tiling module
//!
//! This module provides:
//! - `TilingTrigger` trait and `HttpTilingTrigger` for starting tiling jobs
//! - `TilingStatusResolver` deriving job status from object presence
//! - HTTP routes for job status, DZI descriptors and tiles

pub mod routes;
mod status;
mod trigger;
mod types;

pub use routes::{TilingAppState, tiling_routes};
pub use status::{TilingStatusResolver, descriptor_key, tile_key};
pub use trigger::{HttpTilingTrigger, TilingTrigger, build_trigger};
pub use types::{
    TilingError, TilingJobRequest, TilingStatus, TilingStatusResponse, TriggerStrategy,
};
