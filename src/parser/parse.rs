use crate::catalog::FarmDescriptor;
use crate::parser::layout::{
    decode_farm_account, decode_ledger_account, derive_ledger_address, ParseFailure,
};
use crate::rpc::accounts::{decode_account_data, AccountQueryConfig, RawAccountInfo};
use crate::rpc::AccountFetcher;
use crate::runtime::telemetry::Telemetry;
use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

/// Decoded on-chain state for one farm, created per parse run and replaced
/// wholesale; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFarmState {
    pub id: Pubkey,
    pub pool_id: Pubkey,
    pub lp_mint: Pubkey,
    pub version: u8,
    pub upcoming: bool,
    pub total_staked: u64,
    pub rewards: Vec<RewardSchedule>,
    pub user_staked: Option<u64>,
    pub context_slot: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSchedule {
    pub mint: Pubkey,
    pub per_slot_emission: u64,
    pub open_slot: u64,
    pub end_slot: u64,
}

/// Turns catalog descriptors into [`ParsedFarmState`] by querying and decoding
/// the underlying accounts. Deterministic for identical inputs and identical
/// chain responses.
pub struct ChainStateParser {
    query: AccountQueryConfig,
    telemetry: Arc<Telemetry>,
}

impl ChainStateParser {
    pub fn new(query: AccountQueryConfig, telemetry: Arc<Telemetry>) -> Self {
        Self { query, telemetry }
    }

    /// Fetches and decodes the farm account behind every descriptor, plus the
    /// identity's ledger accounts when an identity is supplied.
    ///
    /// Guards (not errors): an empty descriptor list yields an empty result
    /// without touching the network. Per-descriptor decode problems drop only
    /// that descriptor; a whole-batch transport failure is returned as an
    /// error so the caller can retain the previous output.
    pub async fn parse(
        &self,
        descriptors: &[FarmDescriptor],
        fetcher: &dyn AccountFetcher,
        identity: Option<&Pubkey>,
    ) -> Result<Vec<ParsedFarmState>> {
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }

        self.telemetry.record_parse_run();

        let farm_keys: Vec<Pubkey> = descriptors.iter().map(|descriptor| descriptor.id).collect();
        let farm_batch = fetcher
            .fetch_accounts(&farm_keys, &self.query)
            .await
            .context("farm account batch failed")?;

        let ledger_accounts = match identity {
            Some(identity) => {
                let ledger_keys: Vec<Pubkey> = descriptors
                    .iter()
                    .map(|descriptor| {
                        derive_ledger_address(&descriptor.id, identity, &descriptor.program_id)
                    })
                    .collect();
                let batch = fetcher
                    .fetch_accounts(&ledger_keys, &self.query)
                    .await
                    .context("ledger account batch failed")?;
                Some(batch.accounts)
            }
            None => None,
        };

        let mut parsed = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            let account = farm_batch.accounts.get(index).and_then(Option::as_ref);
            let farm = match decode_farm(account) {
                Ok(farm) => farm,
                Err(failure) => {
                    self.telemetry.record_parse_item_drop();
                    tracing::warn!(
                        farm = %descriptor.id,
                        reason = failure.kind(),
                        error = %failure,
                        "dropping farm from parse output"
                    );
                    continue;
                }
            };

            let user_staked = ledger_accounts
                .as_ref()
                .and_then(|accounts| accounts.get(index).and_then(Option::as_ref))
                .and_then(|account| match decode_ledger(account) {
                    Ok(amount) => Some(amount),
                    Err(failure) => {
                        // A malformed ledger only loses the user figure; the
                        // farm itself survives.
                        tracing::debug!(
                            farm = %descriptor.id,
                            reason = failure.kind(),
                            "ignoring undecodable ledger account"
                        );
                        None
                    }
                });

            parsed.push(ParsedFarmState {
                id: descriptor.id,
                pool_id: descriptor.pool_id,
                lp_mint: descriptor.lp_mint,
                version: descriptor.version,
                upcoming: descriptor.upcoming,
                total_staked: farm.total_staked,
                rewards: farm
                    .rewards
                    .into_iter()
                    .map(|reward| RewardSchedule {
                        mint: reward.mint,
                        per_slot_emission: reward.per_slot_emission,
                        open_slot: reward.open_slot,
                        end_slot: reward.end_slot,
                    })
                    .collect(),
                user_staked,
                context_slot: farm_batch.context_slot,
            });
        }

        tracing::debug!(
            requested = descriptors.len(),
            parsed = parsed.len(),
            context_slot = farm_batch.context_slot,
            "parse run completed"
        );

        Ok(parsed)
    }
}

fn decode_farm(
    account: Option<&RawAccountInfo>,
) -> Result<crate::parser::layout::DecodedFarm, ParseFailure> {
    let account = account.ok_or(ParseFailure::MissingAccount)?;
    let data = decode_account_data(account).map_err(|_| ParseFailure::BadEncoding)?;
    decode_farm_account(&data)
}

fn decode_ledger(account: &RawAccountInfo) -> Result<u64, ParseFailure> {
    let data = decode_account_data(account).map_err(|_| ParseFailure::BadEncoding)?;
    decode_ledger_account(&data)
}
