use crate::rpc::options::{RpcClientOptions, ACCOUNT_BATCH_HARD_LIMIT};
use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::time::Duration;

const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 15;
const DEFAULT_HYDRATE_CONCURRENCY: usize = 8;
const DEFAULT_SLOT_ESTIMATE_FRESHNESS_SECS: u64 = 60;
const DEFAULT_SLOT_DURATION_FALLBACK: f64 = 2.0;

/// Runtime configuration for the farm synchronization pipeline.
///
/// All instances must be constructed via [`PipelineConfig::builder`] or [`PipelineConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    catalog_url: String,
    catalog_timeout: Duration,
    hydrate_concurrency: usize,
    slot_estimate_freshness: Duration,
    slot_duration_fallback: f64,
    metrics_interval: Duration,
    rpc: RpcClientOptions,
}

pub struct PipelineConfigParams {
    pub catalog_url: String,
    pub catalog_timeout: Duration,
    pub hydrate_concurrency: usize,
    pub slot_estimate_freshness: Duration,
    pub slot_duration_fallback: f64,
    pub metrics_interval: Duration,
    pub rpc: RpcClientOptions,
}

impl PipelineConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`PipelineConfig::builder`] for ergonomics when many values use defaults.
    pub fn new(params: PipelineConfigParams) -> Result<Self> {
        let PipelineConfigParams {
            catalog_url,
            catalog_timeout,
            hydrate_concurrency,
            slot_estimate_freshness,
            slot_duration_fallback,
            metrics_interval,
            rpc,
        } = params;

        let config = Self {
            catalog_url: catalog_url.trim().to_owned(),
            catalog_timeout,
            hydrate_concurrency,
            slot_estimate_freshness,
            slot_duration_fallback,
            metrics_interval,
            rpc,
        };

        config.validate()?;
        Ok(config)
    }

    /// Full catalog URL (including scheme) the descriptor source fetches from.
    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }

    /// HTTP timeout applied to catalog fetches.
    pub fn catalog_timeout(&self) -> Duration {
        self.catalog_timeout
    }

    /// Upper bound on concurrently hydrating farms.
    pub fn hydrate_concurrency(&self) -> usize {
        self.hydrate_concurrency
    }

    /// How long a cached slot-duration estimate stays valid.
    pub fn slot_estimate_freshness(&self) -> Duration {
        self.slot_estimate_freshness
    }

    /// Seconds-per-slot figure used when no estimate can be computed.
    pub fn slot_duration_fallback(&self) -> f64 {
        self.slot_duration_fallback
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Maximum keys sent per `getMultipleAccounts` request.
    pub fn max_accounts_per_request(&self) -> usize {
        self.rpc.max_keys_per_request
    }

    /// RPC client knobs (timeouts, retries, body limits).
    pub fn rpc_options(&self) -> &RpcClientOptions {
        &self.rpc
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        let url = self.catalog_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("catalog_url must start with http:// or https://");
        }

        if self.catalog_timeout.is_zero() {
            bail!("catalog_timeout must be greater than 0");
        }

        if self.hydrate_concurrency == 0 {
            bail!("hydrate_concurrency must be greater than 0");
        }

        if self.slot_estimate_freshness.is_zero() {
            bail!("slot_estimate_freshness must be greater than 0");
        }

        if !(self.slot_duration_fallback > 0.0) {
            bail!("slot_duration_fallback must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        self.rpc.validate()?;

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PipelineConfigBuilder {
    catalog_url: Option<String>,
    catalog_timeout: Option<Duration>,
    hydrate_concurrency: Option<usize>,
    slot_estimate_freshness: Option<Duration>,
    slot_duration_fallback: Option<f64>,
    metrics_interval: Option<Duration>,
    max_accounts_per_request: Option<usize>,
    rpc: Option<RpcClientOptions>,
}

impl PipelineConfigBuilder {
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = Some(url.into());
        self
    }

    pub fn catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = Some(timeout);
        self
    }

    pub fn hydrate_concurrency(mut self, bound: usize) -> Self {
        self.hydrate_concurrency = Some(bound);
        self
    }

    pub fn slot_estimate_freshness(mut self, freshness: Duration) -> Self {
        self.slot_estimate_freshness = Some(freshness);
        self
    }

    pub fn slot_duration_fallback(mut self, seconds_per_slot: f64) -> Self {
        self.slot_duration_fallback = Some(seconds_per_slot);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn max_accounts_per_request(mut self, keys: usize) -> Self {
        self.max_accounts_per_request = Some(keys);
        self
    }

    pub fn rpc_options(mut self, options: RpcClientOptions) -> Self {
        self.rpc = Some(options);
        self
    }

    pub fn build(self) -> Result<PipelineConfig> {
        let mut rpc = self.rpc.unwrap_or_default();
        if let Some(keys) = self.max_accounts_per_request {
            rpc.max_keys_per_request = keys;
        }

        let params = PipelineConfigParams {
            catalog_url: self.catalog_url.context("catalog_url is required")?,
            catalog_timeout: self
                .catalog_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_CATALOG_TIMEOUT_SECS)),
            hydrate_concurrency: self
                .hydrate_concurrency
                .unwrap_or(DEFAULT_HYDRATE_CONCURRENCY),
            slot_estimate_freshness: self
                .slot_estimate_freshness
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_SLOT_ESTIMATE_FRESHNESS_SECS)),
            slot_duration_fallback: self
                .slot_duration_fallback
                .unwrap_or(DEFAULT_SLOT_DURATION_FALLBACK),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
            rpc,
        };

        PipelineConfig::new(params)
    }
}
