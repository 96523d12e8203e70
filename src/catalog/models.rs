//! Serde models for the remote farm catalog. The catalog is a camelCase JSON
//! document with `official` and `unofficial` descriptor sections; descriptors
//! are consumed in document order, official entries first.

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Static catalog entry for one farm. Immutable once fetched; the whole
/// descriptor set is replaced on every refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmDescriptor {
    pub id: Pubkey,
    pub lp_mint: Pubkey,
    pub pool_id: Pubkey,
    pub program_id: Pubkey,
    pub reward_mints: Vec<Pubkey>,
    pub version: u8,
    pub upcoming: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmCatalogResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub official: Vec<RawFarmDescriptor>,
    #[serde(default)]
    pub unofficial: Vec<RawFarmDescriptor>,
}

/// One catalog record as it appears on the wire. Pubkeys arrive as base58
/// strings; fields beyond the consumed set are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFarmDescriptor {
    pub id: String,
    pub lp_mint: String,
    pub pool_id: String,
    pub program_id: String,
    #[serde(default)]
    pub reward_mints: Vec<String>,
    pub version: u8,
    #[serde(default)]
    pub upcoming: bool,
}

impl FarmCatalogResponse {
    /// Flattens the catalog into an ordered descriptor list: official entries
    /// followed by unofficial ones, preserving JSON order. Records with a
    /// malformed pubkey are dropped individually with a warning.
    pub fn into_descriptors(self) -> Vec<FarmDescriptor> {
        self.official
            .into_iter()
            .chain(self.unofficial)
            .filter_map(|raw| {
                let id = raw.id.clone();
                match raw.try_into() {
                    Ok(descriptor) => Some(descriptor),
                    Err(err) => {
                        tracing::warn!(farm = %id, error = %err, "skipping malformed catalog entry");
                        None
                    }
                }
            })
            .collect()
    }
}

impl TryFrom<RawFarmDescriptor> for FarmDescriptor {
    type Error = anyhow::Error;

    fn try_from(raw: RawFarmDescriptor) -> anyhow::Result<Self> {
        let reward_mints = raw
            .reward_mints
            .iter()
            .map(|mint| parse_pubkey(mint, "rewardMints"))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            id: parse_pubkey(&raw.id, "id")?,
            lp_mint: parse_pubkey(&raw.lp_mint, "lpMint")?,
            pool_id: parse_pubkey(&raw.pool_id, "poolId")?,
            program_id: parse_pubkey(&raw.program_id, "programId")?,
            reward_mints,
            version: raw.version,
            upcoming: raw.upcoming,
        })
    }
}

fn parse_pubkey(value: &str, field: &str) -> anyhow::Result<Pubkey> {
    Pubkey::from_str(value).map_err(|err| anyhow::anyhow!("invalid {field} pubkey: {err}"))
}
