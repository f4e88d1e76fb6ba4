//! Typed rows of the derived tables and their mapping to store records.

mod banking;
mod campaign;
mod interaction;
mod stats;
mod token;

use std::str::FromStr;

use alloy::primitives::U256;

use crate::db::{DbError, DbValue, Record};

pub use banking::BankingContract;
pub use campaign::{is_affiliation_type, Campaign, CampaignMetadata, AFFILIATION_CAMPAIGN_TYPES};
pub use interaction::{InteractionContract, InteractionEvent, InteractionKind};
pub use stats::{AffiliationCampaignStats, StatsCounter, StatsIncrements};
pub use token::Token;

/// Placeholder for addresses that have not been resolved yet.
pub const ZERO_ADDRESS: [u8; 20] = [0u8; 20];

pub(crate) fn numeric(value: U256) -> DbValue {
    DbValue::Numeric(value.to_string())
}

pub(crate) fn read_numeric(record: &Record, column: &str) -> Result<U256, DbError> {
    let raw = record.numeric(column)?;
    U256::from_str(raw).map_err(|e| {
        DbError::decode(record.table(), column, format!("invalid numeric '{}': {}", raw, e))
    })
}

/// Block numbers and unix timestamps as BIGINT.
pub(crate) fn int64(value: u64) -> DbValue {
    DbValue::Int64(i64::try_from(value).unwrap_or(i64::MAX))
}

pub(crate) fn read_u64(record: &Record, column: &str) -> Result<u64, DbError> {
    let raw = record.int64(column)?;
    u64::try_from(raw)
        .map_err(|_| DbError::decode(record.table(), column, format!("negative value {}", raw)))
}

pub(crate) fn read_opt_u64(record: &Record, column: &str) -> Result<Option<u64>, DbError> {
    record
        .opt_int64(column)?
        .map(|raw| {
            u64::try_from(raw).map_err(|_| {
                DbError::decode(record.table(), column, format!("negative value {}", raw))
            })
        })
        .transpose()
}
