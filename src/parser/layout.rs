//! Binary layout of farm and ledger accounts.
//!
//! Farm account:
//! ```text
//! offset 0   [u8; 8]  discriminator (FARM_ACCOUNT_DISCRIMINATOR)
//! offset 8   u64 LE   total staked LP amount (raw units)
//! offset 16  u8       reward schedule count (1..=MAX_REWARD_SCHEDULES)
//! offset 17  repeated reward schedule, 56 bytes each:
//!              [u8; 32] reward mint
//!              u64 LE   per-slot emission (raw units)
//!              u64 LE   open slot
//!              u64 LE   end slot
//! ```
//!
//! Ledger account:
//! ```text
//! offset 0   [u8; 8]  discriminator (LEDGER_ACCOUNT_DISCRIMINATOR)
//! offset 8   u64 LE   deposited LP amount (raw units)
//! ```

use solana_sdk::pubkey::Pubkey;
use std::fmt;

pub const FARM_ACCOUNT_DISCRIMINATOR: [u8; 8] = *b"farmacct";
pub const LEDGER_ACCOUNT_DISCRIMINATOR: [u8; 8] = *b"farmuser";
pub const MAX_REWARD_SCHEDULES: usize = 5;

/// Seed prefix for the per-user ledger PDA.
pub const LEDGER_SEED: &[u8] = b"farmer";

const FARM_HEADER_LEN: usize = 8 + 8 + 1;
const REWARD_SCHEDULE_LEN: usize = 32 + 8 + 8 + 8;
const LEDGER_LEN: usize = 8 + 8;

/// Reason a single descriptor was dropped from a parse run. Only ever recorded
/// for observability; it never aborts the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    MissingAccount,
    BadEncoding,
    ShortBuffer { len: usize },
    BadDiscriminator,
    RewardCountOutOfRange { count: u8 },
}

impl ParseFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            ParseFailure::MissingAccount => "missing_account",
            ParseFailure::BadEncoding => "bad_encoding",
            ParseFailure::ShortBuffer { .. } => "short_buffer",
            ParseFailure::BadDiscriminator => "bad_discriminator",
            ParseFailure::RewardCountOutOfRange { .. } => "reward_count_out_of_range",
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::MissingAccount => write!(f, "account does not exist on chain"),
            ParseFailure::BadEncoding => write!(f, "account payload could not be decoded"),
            ParseFailure::ShortBuffer { len } => {
                write!(f, "account data too short ({len} bytes)")
            }
            ParseFailure::BadDiscriminator => write!(f, "account discriminator mismatch"),
            ParseFailure::RewardCountOutOfRange { count } => {
                write!(
                    f,
                    "reward schedule count {count} outside 1..={MAX_REWARD_SCHEDULES}"
                )
            }
        }
    }
}

impl std::error::Error for ParseFailure {}

/// Farm account fields consumed by hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFarm {
    pub total_staked: u64,
    pub rewards: Vec<DecodedReward>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedReward {
    pub mint: Pubkey,
    pub per_slot_emission: u64,
    pub open_slot: u64,
    pub end_slot: u64,
}

/// Derives the identity's ledger address for a farm:
/// `PDA(["farmer", farm_id, identity], program_id)`.
pub fn derive_ledger_address(farm_id: &Pubkey, identity: &Pubkey, program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[LEDGER_SEED, farm_id.as_ref(), identity.as_ref()],
        program_id,
    )
    .0
}

pub fn decode_farm_account(data: &[u8]) -> Result<DecodedFarm, ParseFailure> {
    if data.len() < FARM_HEADER_LEN {
        return Err(ParseFailure::ShortBuffer { len: data.len() });
    }
    if data[..8] != FARM_ACCOUNT_DISCRIMINATOR {
        return Err(ParseFailure::BadDiscriminator);
    }

    let total_staked = read_u64(data, 8);
    let count = data[16];
    if count == 0 || count as usize > MAX_REWARD_SCHEDULES {
        return Err(ParseFailure::RewardCountOutOfRange { count });
    }

    let needed = FARM_HEADER_LEN + count as usize * REWARD_SCHEDULE_LEN;
    if data.len() < needed {
        return Err(ParseFailure::ShortBuffer { len: data.len() });
    }

    let mut rewards = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let base = FARM_HEADER_LEN + index * REWARD_SCHEDULE_LEN;
        let mut mint_bytes = [0u8; 32];
        mint_bytes.copy_from_slice(&data[base..base + 32]);
        rewards.push(DecodedReward {
            mint: Pubkey::new_from_array(mint_bytes),
            per_slot_emission: read_u64(data, base + 32),
            open_slot: read_u64(data, base + 40),
            end_slot: read_u64(data, base + 48),
        });
    }

    Ok(DecodedFarm {
        total_staked,
        rewards,
    })
}

/// Decodes the identity's deposited amount out of a ledger account.
pub fn decode_ledger_account(data: &[u8]) -> Result<u64, ParseFailure> {
    if data.len() < LEDGER_LEN {
        return Err(ParseFailure::ShortBuffer { len: data.len() });
    }
    if data[..8] != LEDGER_ACCOUNT_DISCRIMINATOR {
        return Err(ParseFailure::BadDiscriminator);
    }
    Ok(read_u64(data, 8))
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
