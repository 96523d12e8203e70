//! Solana JSON-RPC client plumbing: circuit breaker, account batching,
//! retry policy, and client options.

pub mod accounts;
pub mod circuit_breaker;
pub mod client;
pub mod options;
pub mod retry;

pub use accounts::{
    AccountBatch, AccountQueryConfig, CommitmentLevel, PerformanceSample, RawAccountInfo,
};
pub use circuit_breaker::{
    CircuitBreakerError, CircuitBreakerSnapshot, CircuitState, RpcCircuitBreaker,
};
pub use client::{AccountFetcher, RpcError, SampleSource, SolanaRpcClient};
pub use options::RpcClientOptions;
