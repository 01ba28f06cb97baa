//! Tiling job trigger

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{error, info};

use super::types::{TilingError, TilingJobRequest, TriggerStrategy};
use crate::config::TilingConfig;

/// Starts a tiling job for a freshly completed upload
#[async_trait]
pub trait TilingTrigger: Send + Sync {
    async fn trigger(&self, job: &TilingJobRequest) -> Result<(), TilingError>;
}

/// Posts jobs to the tiling service's `/jobs/tile-image` endpoint
pub struct HttpTilingTrigger {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTilingTrigger {
    pub fn new(config: &TilingConfig) -> Result<Self, TilingError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TilingError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/jobs/tile-image", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TilingTrigger for HttpTilingTrigger {
    async fn trigger(&self, job: &TilingJobRequest) -> Result<(), TilingError> {
        info!(
            "Triggering tiling job: image_id={}, object={}",
            job.image_id, job.source_object_name
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(job)
            .send()
            .await
            .map_err(|e| {
                error!("Tiling service call failed for {}: {}", job.image_id, e);
                counter!("histoflow_tiling_trigger_errors_total").increment(1);
                TilingError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                "Tiling service rejected job {}: status={}, body={}",
                job.image_id, status, body
            );
            counter!("histoflow_tiling_trigger_errors_total").increment(1);
            return Err(TilingError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        counter!("histoflow_tiling_jobs_triggered_total").increment(1);
        Ok(())
    }
}

/// Build the trigger for the configured strategy.
///
/// Returns `Ok(None)` when triggering is disabled and a configuration error
/// for unknown strategies.
pub fn build_trigger(config: &TilingConfig) -> Result<Option<Arc<dyn TilingTrigger>>, TilingError> {
    match TriggerStrategy::parse(&config.strategy)? {
        TriggerStrategy::DirectHttp => Ok(Some(Arc::new(HttpTilingTrigger::new(config)?))),
        TriggerStrategy::Disabled => Ok(None),
    }
}
