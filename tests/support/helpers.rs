use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use farmhand::parser::{FARM_ACCOUNT_DISCRIMINATOR, LEDGER_ACCOUNT_DISCRIMINATOR};
use farmhand::{
    FarmPipeline, LiquidityDescriptor, LiquidityIndex, LpTokenMeta, LpTokenResolver, PriceIndex,
    RpcClientOptions, Stage, Telemetry, TokenMeta, TokenResolver,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Builds farm account bytes in the on-chain layout. Each reward is
/// `(mint, per_slot_emission, open_slot, end_slot)`.
pub fn farm_account_bytes(total_staked: u64, rewards: &[(Pubkey, u64, u64, u64)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&FARM_ACCOUNT_DISCRIMINATOR);
    data.extend_from_slice(&total_staked.to_le_bytes());
    data.push(rewards.len() as u8);
    for (mint, emission, open_slot, end_slot) in rewards {
        data.extend_from_slice(mint.as_ref());
        data.extend_from_slice(&emission.to_le_bytes());
        data.extend_from_slice(&open_slot.to_le_bytes());
        data.extend_from_slice(&end_slot.to_le_bytes());
    }
    data
}

pub fn ledger_account_bytes(deposited: u64) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&LEDGER_ACCOUNT_DISCRIMINATOR);
    data.extend_from_slice(&deposited.to_le_bytes());
    data
}

/// One catalog record in wire form.
pub fn catalog_entry(
    id: &Pubkey,
    lp_mint: &Pubkey,
    pool_id: &Pubkey,
    program_id: &Pubkey,
    reward_mint: &Pubkey,
    upcoming: bool,
) -> Value {
    json!({
        "id": id.to_string(),
        "lpMint": lp_mint.to_string(),
        "poolId": pool_id.to_string(),
        "programId": program_id.to_string(),
        "rewardMints": [reward_mint.to_string()],
        "version": 5,
        "upcoming": upcoming,
    })
}

pub fn catalog_body(official: Vec<Value>, unofficial: Vec<Value>) -> Value {
    json!({
        "name": "test farms",
        "version": "2026.08.0",
        "official": official,
        "unofficial": unofficial,
    })
}

/// Token and LP lookups backed by plain maps.
#[derive(Default)]
pub struct StaticResolver {
    tokens: HashMap<Pubkey, TokenMeta>,
    lp_tokens: HashMap<Pubkey, LpTokenMeta>,
}

impl StaticResolver {
    pub fn with_token(mut self, mint: Pubkey, symbol: &str, decimals: u8) -> Self {
        self.tokens.insert(
            mint,
            TokenMeta {
                symbol: symbol.to_string(),
                decimals,
            },
        );
        self
    }

    pub fn with_lp_token(mut self, lp_mint: Pubkey, name: &str, decimals: u8) -> Self {
        self.lp_tokens.insert(
            lp_mint,
            LpTokenMeta {
                name: name.to_string(),
                decimals,
            },
        );
        self
    }
}

impl TokenResolver for StaticResolver {
    fn token(&self, mint: &Pubkey) -> Option<TokenMeta> {
        self.tokens.get(mint).cloned()
    }
}

impl LpTokenResolver for StaticResolver {
    fn lp_token(&self, lp_mint: &Pubkey) -> Option<LpTokenMeta> {
        self.lp_tokens.get(lp_mint).cloned()
    }
}

pub fn price_index(prices: &[(Pubkey, f64)]) -> PriceIndex {
    PriceIndex::new(prices.iter().copied().collect())
}

pub fn liquidity_index(pools: &[(Pubkey, Pubkey, u8, &str)]) -> LiquidityIndex {
    LiquidityIndex::new(
        pools
            .iter()
            .map(|(pool_id, lp_mint, lp_decimals, name)| {
                (
                    *pool_id,
                    LiquidityDescriptor {
                        lp_mint: *lp_mint,
                        lp_decimals: *lp_decimals,
                        name: name.to_string(),
                    },
                )
            })
            .collect(),
    )
}

/// RPC options with short timeouts and a single attempt so failure tests
/// finish quickly.
pub fn fast_rpc_options() -> RpcClientOptions {
    RpcClientOptions {
        request_timeout: Duration::from_secs(2),
        max_attempts: 1,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        ..RpcClientOptions::default()
    }
}

pub async fn wait_for_hydrated_count(
    pipeline: &FarmPipeline,
    target: usize,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = pipeline.hydrated_views().len();
        if current == target && !pipeline.is_loading() {
            return Ok(());
        }
        if current == target && target == 0 && pipeline.telemetry().stage_commits(Stage::HydratedViews) > 0 {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!(
                "pipeline did not hydrate {target} farms within {:?} (currently {current})",
                timeout
            );
        }
        sleep(Duration::from_millis(25)).await;
    }
}

pub async fn wait_for_descriptor_count(
    pipeline: &FarmPipeline,
    target: usize,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = pipeline.descriptors().len();
        if current == target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!(
                "pipeline did not commit {target} descriptors within {:?} (currently {current})",
                timeout
            );
        }
        sleep(Duration::from_millis(25)).await;
    }
}

pub async fn wait_for_stage_commits(
    telemetry: &Arc<Telemetry>,
    stage: Stage,
    target: u64,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = telemetry.stage_commits(stage);
        if current >= target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!(
                "stage {} did not reach {target} commits within {:?} (currently {current})",
                stage.as_str(),
                timeout
            );
        }
        sleep(Duration::from_millis(25)).await;
    }
}

pub async fn wait_for_catalog_failures(
    telemetry: &Arc<Telemetry>,
    target: u64,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if telemetry.catalog_failures() >= target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!(
                "catalog failure count did not reach {target} within {:?} (currently {})",
                timeout,
                telemetry.catalog_failures()
            );
        }
        sleep(Duration::from_millis(25)).await;
    }
}
