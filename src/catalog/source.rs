use crate::catalog::models::{FarmCatalogResponse, FarmDescriptor};
use crate::runtime::telemetry::Telemetry;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Fetches the remote farm catalog on explicit demand. The source never polls;
/// the orchestrator calls [`DescriptorSource::refresh`] when its refresh input
/// fires, and on failure it keeps the previously committed descriptor set.
pub struct DescriptorSource {
    url: String,
    http: reqwest::Client,
    telemetry: Arc<Telemetry>,
}

impl DescriptorSource {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        telemetry: Arc<Telemetry>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build catalog HTTP client")?;

        Ok(Self {
            url: url.into(),
            http,
            telemetry,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches and decodes the catalog, returning the ordered descriptor
    /// sequence (official entries before unofficial ones). Errors here are
    /// non-fatal to the pipeline: the caller reports them and retains the
    /// previous set.
    pub async fn refresh(&self) -> Result<Vec<FarmDescriptor>> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("catalog request failed")?
            .error_for_status()
            .context("catalog responded with an error status")?;

        let catalog: FarmCatalogResponse = response
            .json()
            .await
            .context("catalog response is not valid JSON")?;

        let descriptors = catalog.into_descriptors();
        self.telemetry.record_catalog_refresh();
        tracing::info!(
            farms = descriptors.len(),
            url = %self.url,
            "farm catalog refreshed"
        );

        Ok(descriptors)
    }
}
