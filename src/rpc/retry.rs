//! Shared retry context, logging helpers, and canned message templates used by
//! the RPC client to keep instrumentation consistent across operations.

use crate::rpc::circuit_breaker::CircuitState;
use anyhow::Error;
use std::time::Duration;

macro_rules! log_with_retry_ctx {
    ($level:ident, $ctx:expr, $($rest:tt)*) => {{
        if let Some(keys) = $ctx.keys {
            tracing::$level!(keys = keys, $($rest)*);
        } else {
            tracing::$level!($($rest)*);
        }
    }};
}

pub(crate) use log_with_retry_ctx;

/// Logging labels that describe how a particular RPC operation reports
/// circuit-breaker state, retry attempts, and exhaustion.
#[derive(Clone, Copy)]
pub(crate) struct RetryMessages {
    pub(crate) permit: &'static str,
    pub(crate) circuit_open: &'static str,
    pub(crate) timeout: &'static str,
    pub(crate) retry: &'static str,
    pub(crate) exhausted: &'static str,
    pub(crate) oversized: Option<&'static str>,
}

/// Context passed into the retry loop so callers can attach the number of
/// account keys in flight and reuse consistent log messaging.
#[derive(Clone, Copy)]
pub(crate) struct RetryContext<'a> {
    keys: Option<usize>,
    messages: &'a RetryMessages,
}

impl<'a> RetryContext<'a> {
    pub(crate) fn new(messages: &'a RetryMessages) -> Self {
        Self {
            keys: None,
            messages,
        }
    }

    pub(crate) fn with_keys(messages: &'a RetryMessages, keys: usize) -> Self {
        Self {
            keys: Some(keys),
            messages,
        }
    }

    pub(crate) fn log_permit(&self, state: CircuitState) {
        log_with_retry_ctx!(
            trace,
            self,
            breaker_state = ?state,
            "{}",
            self.messages.permit
        );
    }

    pub(crate) fn log_circuit_open(&self) {
        log_with_retry_ctx!(warn, self, "{}", self.messages.circuit_open);
    }

    pub(crate) fn log_timeout(&self, attempt: usize, method: &str, backoff: Duration) {
        log_with_retry_ctx!(
            warn,
            self,
            attempt,
            method = method,
            backoff_ms = Self::duration_to_millis(backoff),
            "{}",
            self.messages.timeout
        );
    }

    pub(crate) fn log_retry(&self, attempt: usize, backoff: Duration, err: &Error) {
        log_with_retry_ctx!(
            warn,
            self,
            attempt,
            backoff_ms = Self::duration_to_millis(backoff),
            error = %err,
            "{}",
            self.messages.retry
        );
    }

    pub(crate) fn log_exhausted(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(error, self, attempt, error = %err, "{}", self.messages.exhausted);
    }

    pub(crate) fn log_oversized(&self, attempt: usize, method: &str) {
        if let Some(message) = self.messages.oversized {
            log_with_retry_ctx!(warn, self, attempt, method = method, "{}", message);
        }
    }

    fn duration_to_millis(backoff: Duration) -> u64 {
        backoff.as_millis().min(u128::from(u64::MAX)) as u64
    }
}

pub(crate) const GET_ACCOUNTS_RETRY: RetryMessages = RetryMessages {
    permit: "circuit breaker permit acquired for getMultipleAccounts",
    circuit_open: "RPC circuit breaker open; rejecting account batch",
    timeout: "getMultipleAccounts timed out; will retry",
    retry: "getMultipleAccounts failed; retrying",
    exhausted: "getMultipleAccounts exhausted retries",
    oversized: Some("getMultipleAccounts response exceeded HTTP size limit; lower max_keys_per_request"),
};

pub(crate) const GET_PERF_SAMPLES_RETRY: RetryMessages = RetryMessages {
    permit: "circuit breaker permit acquired for getRecentPerformanceSamples",
    circuit_open: "RPC circuit breaker open; rejecting performance sample request",
    timeout: "getRecentPerformanceSamples timed out; will retry",
    retry: "getRecentPerformanceSamples failed; retrying",
    exhausted: "getRecentPerformanceSamples exhausted retries",
    oversized: None,
};
