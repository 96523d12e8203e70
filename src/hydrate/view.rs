use crate::hydrate::context::{AprBreakdown, HydrationContext};
use crate::parser::parse::{ParsedFarmState, RewardSchedule};
use chrono::{DateTime, Duration, Utc};
use solana_sdk::pubkey::Pubkey;

const SECONDS_PER_WEEK: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// Display-ready record for one farm. Terminal output of the pipeline,
/// replaced as a whole collection on every hydrated commit.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedFarmView {
    pub id: Pubkey,
    pub pool_id: Pubkey,
    pub lp_mint: Pubkey,
    pub version: u8,
    pub upcoming: bool,
    pub name: Option<String>,
    pub staked_lp: Option<f64>,
    pub tvl_usd: Option<f64>,
    pub user_staked_lp: Option<f64>,
    /// `None` means the APR index has no entry for the pool yet; never
    /// conflated with zero.
    pub aprs: Option<AprBreakdown>,
    pub rewards: Vec<HydratedReward>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HydratedReward {
    pub mint: Pubkey,
    pub symbol: Option<String>,
    pub weekly_emission: Option<f64>,
    pub weekly_emission_usd: Option<f64>,
    pub opens_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub time_remaining: Option<Duration>,
    pub is_emitting: bool,
    pub has_ended: bool,
}

/// Hydrates one parsed farm against the run's context snapshot. Returns
/// `None` when no usable LP metadata exists in either the LP resolver or the
/// liquidity index, since the view cannot be scaled for display.
pub fn hydrate_farm(state: &ParsedFarmState, ctx: &HydrationContext) -> Option<HydratedFarmView> {
    let (name, lp_decimals) = resolve_lp_meta(state, ctx)?;

    let staked_lp = ui_amount(state.total_staked, lp_decimals);
    let lp_price = ctx.prices.price(&state.lp_mint);
    let tvl_usd = lp_price.map(|price| staked_lp * price);
    let user_staked_lp = state
        .user_staked
        .map(|amount| ui_amount(amount, lp_decimals));

    let rewards = state
        .rewards
        .iter()
        .map(|reward| hydrate_reward(reward, state.context_slot, ctx))
        .collect();

    Some(HydratedFarmView {
        id: state.id,
        pool_id: state.pool_id,
        lp_mint: state.lp_mint,
        version: state.version,
        upcoming: state.upcoming,
        name: Some(name),
        staked_lp: Some(staked_lp),
        tvl_usd,
        user_staked_lp,
        aprs: ctx.aprs.apr(&state.pool_id),
        rewards,
    })
}

fn resolve_lp_meta(state: &ParsedFarmState, ctx: &HydrationContext) -> Option<(String, u8)> {
    if let Some(meta) = ctx.lp_tokens.lp_token(&state.lp_mint) {
        return Some((meta.name, meta.decimals));
    }
    if let Some(pool) = ctx.liquidity.pool(&state.pool_id) {
        return Some((pool.name.clone(), pool.lp_decimals));
    }
    None
}

fn hydrate_reward(
    reward: &RewardSchedule,
    context_slot: u64,
    ctx: &HydrationContext,
) -> HydratedReward {
    let token = ctx.tokens.token(&reward.mint);
    let symbol = token.as_ref().map(|meta| meta.symbol.clone());

    let slots_per_week = SECONDS_PER_WEEK / ctx.seconds_per_slot;
    let weekly_emission = token
        .as_ref()
        .map(|meta| ui_amount(reward.per_slot_emission, meta.decimals) * slots_per_week);
    let weekly_emission_usd = weekly_emission.and_then(|emission| {
        ctx.prices
            .price(&reward.mint)
            .map(|price| emission * price)
    });

    let opens_at = slot_to_date(reward.open_slot, context_slot, ctx);
    let ends_at = slot_to_date(reward.end_slot, context_slot, ctx);

    let is_emitting = reward.open_slot <= context_slot
        && (reward.end_slot == 0 || context_slot < reward.end_slot);
    let has_ended = reward.end_slot != 0 && context_slot >= reward.end_slot;
    let time_remaining = if has_ended {
        None
    } else {
        ends_at.map(|date| date - ctx.chain_now)
    };

    HydratedReward {
        mint: reward.mint,
        symbol,
        weekly_emission,
        weekly_emission_usd,
        opens_at,
        ends_at,
        time_remaining,
        is_emitting,
        has_ended,
    }
}

/// Converts a slot marker into a chain-adjusted date by offsetting the run's
/// anchor: `seconds = (slot - context_slot) * seconds_per_slot`. A zero slot
/// marker means "unset" and maps to `None`.
fn slot_to_date(slot: u64, context_slot: u64, ctx: &HydrationContext) -> Option<DateTime<Utc>> {
    if slot == 0 {
        return None;
    }
    let delta_slots = slot as i64 - context_slot as i64;
    let delta_ms = (delta_slots as f64 * ctx.seconds_per_slot * 1_000.0) as i64;
    Some(ctx.chain_now + Duration::milliseconds(delta_ms))
}

fn ui_amount(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}
