//! Chain state parser: decodes farm and ledger accounts fetched over RPC into
//! typed parsed farm states, isolating per-descriptor failures.

pub mod layout;
pub mod parse;

pub use layout::{
    derive_ledger_address, DecodedFarm, ParseFailure, FARM_ACCOUNT_DISCRIMINATOR,
    LEDGER_ACCOUNT_DISCRIMINATOR, MAX_REWARD_SCHEDULES,
};
pub use parse::{ChainStateParser, ParsedFarmState, RewardSchedule};
