//! Response shapes shared by every network client implementation.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    ids::{Hash, Lamports, Pubkey, Signature},
};

/// Finality level requested when querying or confirming state. Ordered from
/// weakest to strongest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" | "recent" => Ok(Self::Processed),
            "confirmed" | "single" | "singleGossip" => Ok(Self::Confirmed),
            "finalized" | "max" | "root" => Ok(Self::Finalized),
            other => Err(ValidationError::Message(format!(
                "unknown commitment level `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCheckpoint {
    pub checkpoint: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResult {
    pub slot: u64,
    pub err: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub fee: Lamports,
    pub pre_balances: Vec<Lamports>,
    pub post_balances: Vec<Lamports>,
    pub err: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedTransaction {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub signatures: Vec<Signature>,
    pub account_keys: Vec<Pubkey>,
    pub recent_checkpoint: Hash,
    pub meta: Option<TransactionMeta>,
}
