//! Immutable per-run hydration context: resolver seams and read-only market
//! index snapshots. Everything here is captured once at run start so a run
//! never mixes inputs from different moments.

use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;

/// Token metadata resolved by mint. A collaborator concern; the pipeline only
/// consumes the lookup.
pub trait TokenResolver: Send + Sync {
    fn token(&self, mint: &Pubkey) -> Option<TokenMeta>;
}

/// LP token metadata resolved by the staked pool's LP mint.
pub trait LpTokenResolver: Send + Sync {
    fn lp_token(&self, lp_mint: &Pubkey) -> Option<LpTokenMeta>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LpTokenMeta {
    pub name: String,
    pub decimals: u8,
}

/// USD prices keyed by mint.
#[derive(Debug, Clone, Default)]
pub struct PriceIndex {
    prices: HashMap<Pubkey, f64>,
}

impl PriceIndex {
    pub fn new(prices: HashMap<Pubkey, f64>) -> Self {
        Self { prices }
    }

    pub fn price(&self, mint: &Pubkey) -> Option<f64> {
        self.prices.get(mint).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Liquidity pool descriptors keyed by pool identifier.
#[derive(Debug, Clone, Default)]
pub struct LiquidityIndex {
    pools: HashMap<Pubkey, LiquidityDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityDescriptor {
    pub lp_mint: Pubkey,
    pub lp_decimals: u8,
    pub name: String,
}

impl LiquidityIndex {
    pub fn new(pools: HashMap<Pubkey, LiquidityDescriptor>) -> Self {
        Self { pools }
    }

    pub fn pool(&self, pool_id: &Pubkey) -> Option<&LiquidityDescriptor> {
        self.pools.get(pool_id)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// APR breakdown over the trailing 24h/7d/30d windows. Absence of an entry
/// means "no data yet", which is distinct from zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AprBreakdown {
    pub apr_24h: f64,
    pub apr_7d: f64,
    pub apr_30d: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AprIndex {
    aprs: HashMap<Pubkey, AprBreakdown>,
}

impl AprIndex {
    pub fn new(aprs: HashMap<Pubkey, AprBreakdown>) -> Self {
        Self { aprs }
    }

    pub fn apr(&self, pool_id: &Pubkey) -> Option<AprBreakdown> {
        self.aprs.get(pool_id).copied()
    }

    pub fn len(&self) -> usize {
        self.aprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aprs.is_empty()
    }
}

/// Snapshot of every hydration dependency, assembled once per run. Item
/// hydration is a pure function of (parsed state, context); the context is
/// never mutated after capture.
#[derive(Clone)]
pub struct HydrationContext {
    pub tokens: Arc<dyn TokenResolver>,
    pub lp_tokens: Arc<dyn LpTokenResolver>,
    pub prices: PriceIndex,
    pub liquidity: LiquidityIndex,
    pub aprs: AprIndex,
    /// Estimated seconds per slot, from the block-time estimator.
    pub seconds_per_slot: f64,
    /// Chain-adjusted "now" anchoring all derived dates in this run.
    pub chain_now: DateTime<Utc>,
    /// Raw chain/local clock offset the anchor was derived from.
    pub time_offset_ms: i64,
}

/// Resolver that knows no tokens. Default pipeline input until a catalog
/// collaborator is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl TokenResolver for EmptyResolver {
    fn token(&self, _mint: &Pubkey) -> Option<TokenMeta> {
        None
    }
}

impl LpTokenResolver for EmptyResolver {
    fn lp_token(&self, _lp_mint: &Pubkey) -> Option<LpTokenMeta> {
        None
    }
}
