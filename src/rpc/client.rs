//! RPC client implementation and reusable abstractions for querying Solana
//! account state via JSON-RPC. Houses the `SolanaRpcClient`, error types, and
//! the `AccountFetcher`/`SampleSource` traits consumed by the pipeline stages.

use crate::rpc::accounts::{
    AccountBatch, AccountBatchResponse, AccountQueryConfig, PerformanceSample,
};
use crate::rpc::circuit_breaker::{CircuitBreakerError, CircuitBreakerSnapshot, RpcCircuitBreaker};
use crate::rpc::options::RpcClientOptions;
use crate::rpc::retry::{RetryContext, GET_ACCOUNTS_RETRY, GET_PERF_SAMPLES_RETRY};
use crate::runtime::telemetry::Telemetry;
use anyhow::{anyhow, bail, Result};
use futures::future::BoxFuture;
use jsonrpsee::core::{
    client::{ClientT, Error as JsonRpcError},
    http_helpers::HttpError,
};
use jsonrpsee::http_client::transport::Error as HttpTransportError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use solana_sdk::pubkey::Pubkey;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::{sleep, timeout};

#[derive(Debug)]
pub enum RpcError {
    Timeout { method: &'static str },
    CircuitOpen,
    ResponseTooLarge { method: &'static str },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
            RpcError::CircuitOpen => write!(f, "rpc circuit breaker is open"),
            RpcError::ResponseTooLarge { method } => {
                write!(f, "rpc {method} response exceeded HTTP size limits")
            }
        }
    }
}

impl std::error::Error for RpcError {}

/// Seam used by the chain-state parser so account queries can be mocked in
/// tests without a live endpoint.
pub trait AccountFetcher: Send + Sync {
    fn fetch_accounts<'a>(
        &'a self,
        keys: &'a [Pubkey],
        query: &'a AccountQueryConfig,
    ) -> BoxFuture<'a, Result<AccountBatch>>;
}

/// Seam used by the slot-rate estimator. `endpoint` identifies the cluster the
/// samples describe so cached estimates are never reused across endpoints.
pub trait SampleSource: Send + Sync {
    fn endpoint(&self) -> &str;
    fn fetch_samples(&self, limit: usize) -> BoxFuture<'_, Result<Vec<PerformanceSample>>>;
}

#[derive(Debug, Clone)]
pub struct SolanaRpcClient {
    endpoint: Arc<String>,
    client: HttpClient,
    options: RpcClientOptions,
    telemetry: Arc<Telemetry>,
    breaker: Arc<RpcCircuitBreaker>,
}

impl AccountFetcher for SolanaRpcClient {
    fn fetch_accounts<'a>(
        &'a self,
        keys: &'a [Pubkey],
        query: &'a AccountQueryConfig,
    ) -> BoxFuture<'a, Result<AccountBatch>> {
        Box::pin(self.get_multiple_accounts(keys, query))
    }
}

impl SampleSource for SolanaRpcClient {
    fn endpoint(&self) -> &str {
        self.endpoint()
    }

    fn fetch_samples(&self, limit: usize) -> BoxFuture<'_, Result<Vec<PerformanceSample>>> {
        Box::pin(self.get_recent_performance_samples(limit))
    }
}

impl SolanaRpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, RpcClientOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: RpcClientOptions) -> Result<Self> {
        Self::with_options_and_breaker(url, options, Arc::new(RpcCircuitBreaker::default()))
    }

    pub fn with_options_and_breaker(
        url: impl Into<String>,
        options: RpcClientOptions,
        breaker: Arc<RpcCircuitBreaker>,
    ) -> Result<Self> {
        Self::with_telemetry(url, options, breaker, Arc::new(Telemetry::default()))
    }

    /// Builds a client that records RPC failures into a shared [`Telemetry`],
    /// so pipeline-level counters include transport problems.
    pub fn with_telemetry(
        url: impl Into<String>,
        options: RpcClientOptions,
        breaker: Arc<RpcCircuitBreaker>,
        telemetry: Arc<Telemetry>,
    ) -> Result<Self> {
        options.validate()?;

        let endpoint = url.into();
        let max_request_body_size = options.max_request_body_bytes.min(u32::MAX as usize) as u32;
        let max_response_body_size = options.max_response_body_bytes.min(u32::MAX as usize) as u32;

        let client = HttpClientBuilder::default()
            .request_timeout(options.request_timeout)
            .max_concurrent_requests(options.max_concurrent_requests)
            .max_request_size(max_request_body_size)
            .max_response_size(max_response_body_size)
            .build(&endpoint)
            .map_err(|err| anyhow!("failed to build RPC client: {err}"))?;

        Ok(Self {
            endpoint: Arc::new(endpoint),
            client,
            options,
            telemetry,
            breaker,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    pub fn circuit_snapshot(&self) -> CircuitBreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Fetches the accounts behind `keys`, preserving request order. Key lists
    /// above `max_keys_per_request` are split into sequential chunks; the
    /// reported context slot is the earliest slot any chunk was answered at.
    pub async fn get_multiple_accounts(
        &self,
        keys: &[Pubkey],
        query: &AccountQueryConfig,
    ) -> Result<AccountBatch> {
        if keys.is_empty() {
            return Ok(AccountBatch {
                context_slot: 0,
                accounts: Vec::new(),
            });
        }

        let mut accounts = Vec::with_capacity(keys.len());
        let mut context_slot = u64::MAX;

        for chunk in keys.chunks(self.options.max_keys_per_request) {
            let context = RetryContext::with_keys(&GET_ACCOUNTS_RETRY, chunk.len());
            let response = self
                .retry_with_breaker(
                    context,
                    || async { self.fetch_account_chunk(chunk, query).await },
                    |attempt, response: &AccountBatchResponse| {
                        tracing::debug!(
                            attempt,
                            keys = response.value.len(),
                            context_slot = response.context.slot,
                            "account batch completed successfully"
                        );
                    },
                )
                .await?;

            context_slot = context_slot.min(response.context.slot);
            accounts.extend(response.value);
        }

        Ok(AccountBatch {
            context_slot,
            accounts,
        })
    }

    pub async fn get_recent_performance_samples(
        &self,
        limit: usize,
    ) -> Result<Vec<PerformanceSample>> {
        const METHOD: &str = "getRecentPerformanceSamples";

        self.retry_with_breaker(
            RetryContext::new(&GET_PERF_SAMPLES_RETRY),
            || async {
                timeout(
                    self.options.request_timeout,
                    self.client.request(METHOD, rpc_params![limit]),
                )
                .await
                .map_err(|_| RpcError::Timeout { method: METHOD })?
                .map_err(|err| map_rpc_error(METHOD, err))
            },
            |attempt, samples: &Vec<PerformanceSample>| {
                tracing::debug!(
                    attempt,
                    samples = samples.len(),
                    "fetched recent performance samples"
                );
            },
        )
        .await
    }

    async fn fetch_account_chunk(
        &self,
        keys: &[Pubkey],
        query: &AccountQueryConfig,
    ) -> Result<AccountBatchResponse> {
        const METHOD: &str = "getMultipleAccounts";

        let encoded: Vec<String> = keys.iter().map(Pubkey::to_string).collect();
        let response: AccountBatchResponse = timeout(
            self.options.request_timeout,
            self.client
                .request(METHOD, rpc_params![encoded, query.to_wire()]),
        )
        .await
        .map_err(|_| RpcError::Timeout { method: METHOD })?
        .map_err(|err| map_rpc_error(METHOD, err))?;

        if response.value.len() != keys.len() {
            bail!(
                "RPC returned mismatched account count (expected {}, got {})",
                keys.len(),
                response.value.len()
            );
        }

        Ok(response)
    }

    /// Shared retry/backoff loop that wraps RPC operations with breaker
    /// gating, telemetry, exponential backoff, and consistent logging.
    async fn retry_with_breaker<T, F, Fut, S>(
        &self,
        context: RetryContext<'_>,
        mut operation: F,
        mut on_success: S,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        S: FnMut(usize, &T),
    {
        let mut attempt = 0;

        loop {
            match self.breaker.try_acquire() {
                Ok(state) => context.log_permit(state),
                Err(CircuitBreakerError::CircuitOpen) => {
                    context.log_circuit_open();
                    return Err(RpcError::CircuitOpen.into());
                }
            }

            attempt += 1;

            match operation().await {
                Ok(value) => {
                    self.breaker.record_success();
                    on_success(attempt, &value);
                    return Ok(value);
                }
                Err(err) => {
                    if let Some(rpc_error) = err.downcast_ref::<RpcError>() {
                        match rpc_error {
                            RpcError::Timeout { method } => {
                                self.telemetry.record_rpc_timeout();
                                self.breaker.record_failure();
                                let backoff = self.backoff_delay(attempt);
                                context.log_timeout(attempt, method, backoff);
                                if attempt >= self.options.max_attempts {
                                    context.log_exhausted(attempt, &err);
                                    return Err(err);
                                }
                                sleep(backoff).await;
                                continue;
                            }
                            RpcError::ResponseTooLarge { method } => {
                                // Deterministic for a given key set; retrying cannot help.
                                self.telemetry.record_rpc_error();
                                self.breaker.record_failure();
                                context.log_oversized(attempt, method);
                                return Err(err);
                            }
                            RpcError::CircuitOpen => {}
                        }
                    }

                    self.telemetry.record_rpc_error();
                    self.breaker.record_failure();

                    if attempt >= self.options.max_attempts {
                        context.log_exhausted(attempt, &err);
                        return Err(err);
                    }

                    let backoff = self.backoff_delay(attempt);
                    context.log_retry(attempt, backoff, &err);
                    sleep(backoff).await;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return self.options.initial_backoff;
        }

        let exponent = attempt.saturating_sub(1) as u32;
        let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        let mut delay = self.options.initial_backoff.saturating_mul(multiplier);

        if delay > self.options.max_backoff {
            delay = self.options.max_backoff;
        }

        delay
    }
}

fn map_rpc_error(label: &'static str, err: JsonRpcError) -> anyhow::Error {
    if matches!(err, JsonRpcError::RequestTimeout) {
        return RpcError::Timeout { method: label }.into();
    }
    if response_too_large(&err) {
        return RpcError::ResponseTooLarge { method: label }.into();
    }
    anyhow!("rpc {label} call failed: {err}")
}

fn response_too_large(err: &JsonRpcError) -> bool {
    match err {
        JsonRpcError::Transport(inner) => {
            if let Some(transport_err) = inner.downcast_ref::<HttpTransportError>() {
                match transport_err {
                    HttpTransportError::Http(http_err) => matches!(http_err, HttpError::TooLarge),
                    HttpTransportError::RequestTooLarge => true,
                    _ => false,
                }
            } else {
                false
            }
        }
        _ => false,
    }
}
