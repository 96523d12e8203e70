//! Wire types for Solana account and performance-sample RPC responses, plus
//! helpers for decoding base64 account payloads into raw bytes.

use anyhow::{anyhow, bail, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Commitment level attached to account queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl CommitmentLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitmentLevel::Processed => "processed",
            CommitmentLevel::Confirmed => "confirmed",
            CommitmentLevel::Finalized => "finalized",
        }
    }
}

/// Explicit query parameters for account fetches. Every field is enumerated
/// here; the wire encoding is always base64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountQueryConfig {
    pub commitment: CommitmentLevel,
    pub min_context_slot: Option<u64>,
}

impl AccountQueryConfig {
    pub(crate) fn to_wire(self) -> WireQueryConfig {
        WireQueryConfig {
            encoding: "base64",
            commitment: self.commitment.as_str(),
            min_context_slot: self.min_context_slot,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireQueryConfig {
    encoding: &'static str,
    commitment: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_context_slot: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcContext {
    pub(crate) slot: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountBatchResponse {
    pub(crate) context: RpcContext,
    pub(crate) value: Vec<Option<RawAccountInfo>>,
}

/// Raw account payload as returned by the RPC endpoint. `data` is the
/// `[payload, encoding]` pair Solana uses for encoded account bodies.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawAccountInfo {
    pub data: (String, String),
    pub owner: String,
    pub lamports: u64,
    #[serde(default)]
    pub executable: bool,
    #[serde(default)]
    pub rent_epoch: u64,
}

/// One account-batch result: the context slot the cluster answered at plus
/// one entry per requested key, in request order (`None` for absent accounts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBatch {
    pub context_slot: u64,
    pub accounts: Vec<Option<RawAccountInfo>>,
}

/// Single record from `getRecentPerformanceSamples`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub slot: u64,
    pub num_slots: u64,
    pub num_transactions: u64,
    pub sample_period_secs: u64,
}

/// Decodes the `[payload, encoding]` pair of an account into raw bytes.
pub fn decode_account_data(account: &RawAccountInfo) -> Result<Vec<u8>> {
    let (payload, encoding) = (&account.data.0, &account.data.1);
    if encoding != "base64" {
        bail!("unexpected account data encoding {encoding:?}");
    }
    STANDARD
        .decode(payload)
        .map_err(|err| anyhow!("account data is not valid base64: {err}"))
}
