use alloy::primitives::U256;

use super::{int64, numeric, read_numeric, read_opt_u64, read_u64, ZERO_ADDRESS};
use crate::db::{ColumnKind, DbError, DbValue, Entity, Patch, Record};

/// Campaign types that accrue per-interaction statistics.
pub const AFFILIATION_CAMPAIGN_TYPES: [&str; 3] = [
    "frak.campaign.affiliation-fixed",
    "frak.campaign.affiliation-range",
    "frak.campaign.referral",
];

/// Type recorded on a campaign before its metadata has been read.
const SHELL_TYPE: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub address: [u8; 20],
    pub campaign_type: String,
    pub name: String,
    pub version: String,
    pub product_id: U256,
    pub interaction_contract: [u8; 20],
    pub banking_contract: Option<[u8; 20]>,
    pub is_authorised_on_banking: bool,
    pub attached: bool,
    pub attach_timestamp: u64,
    pub detach_timestamp: Option<u64>,
    pub last_update_block: u64,
}

/// On-chain metadata read during enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignMetadata {
    pub campaign_type: String,
    pub version: String,
    pub name: String,
    pub product_id: U256,
    pub interaction_contract: [u8; 20],
    pub banking_contract: Option<[u8; 20]>,
}

impl CampaignMetadata {
    /// Decode a right-padded `bytes32` name into a trimmed string.
    pub fn decode_name(raw: [u8; 32]) -> Result<String, std::str::Utf8Error> {
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        Ok(std::str::from_utf8(&raw[..end])?.trim().to_string())
    }
}

impl Campaign {
    pub const TYPE: &'static str = "type";
    pub const PRODUCT_ID: &'static str = "product_id";
    pub const ATTACHED: &'static str = "attached";
    pub const LAST_UPDATE_BLOCK: &'static str = "last_update_block";

    /// Placeholder row written as soon as a campaign is created.
    pub fn shell(address: [u8; 20], block_number: u64) -> Self {
        Self {
            address,
            campaign_type: SHELL_TYPE.to_string(),
            name: String::new(),
            version: String::new(),
            product_id: U256::ZERO,
            interaction_contract: ZERO_ADDRESS,
            banking_contract: None,
            is_authorised_on_banking: false,
            attached: false,
            attach_timestamp: 0,
            detach_timestamp: None,
            last_update_block: block_number,
        }
    }

    /// Whether the on-chain metadata has been recorded.
    pub fn is_enriched(&self) -> bool {
        self.interaction_contract != ZERO_ADDRESS
    }

    pub fn enrichment_patch(metadata: &CampaignMetadata, block_number: u64) -> Patch {
        let patch = Patch::new()
            .set(Self::TYPE, DbValue::Text(metadata.campaign_type.clone()))
            .set("name", DbValue::Text(metadata.name.clone()))
            .set("version", DbValue::Text(metadata.version.clone()))
            .set(Self::PRODUCT_ID, numeric(metadata.product_id))
            .set(
                "interaction_contract_id",
                DbValue::Address(metadata.interaction_contract),
            )
            .set(Self::LAST_UPDATE_BLOCK, int64(block_number));

        match metadata.banking_contract {
            Some(bank) => patch.set("banking_contract_id", DbValue::Address(bank)),
            None => patch,
        }
    }

    pub fn authorisation_patch(is_allowed: bool, block_number: u64) -> Patch {
        Patch::new()
            .set("is_authorised_on_banking", DbValue::Bool(is_allowed))
            .set(Self::LAST_UPDATE_BLOCK, int64(block_number))
    }

    pub fn attach_patch(timestamp: u64, block_number: u64) -> Patch {
        Patch::new()
            .set(Self::ATTACHED, DbValue::Bool(true))
            .set("attach_timestamp", int64(timestamp))
            .set(Self::LAST_UPDATE_BLOCK, int64(block_number))
    }

    pub fn detach_patch(timestamp: u64, block_number: u64) -> Patch {
        Patch::new()
            .set(Self::ATTACHED, DbValue::Bool(false))
            .set("detach_timestamp", int64(timestamp))
            .set(Self::LAST_UPDATE_BLOCK, int64(block_number))
    }
}

pub fn is_affiliation_type(campaign_type: &str) -> bool {
    AFFILIATION_CAMPAIGN_TYPES.contains(&campaign_type)
}

impl Entity for Campaign {
    const TABLE: &'static str = "campaigns";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("id", ColumnKind::Address),
        ("type", ColumnKind::Text),
        ("name", ColumnKind::Text),
        ("version", ColumnKind::Text),
        ("product_id", ColumnKind::Numeric),
        ("interaction_contract_id", ColumnKind::Address),
        ("banking_contract_id", ColumnKind::Address),
        ("is_authorised_on_banking", ColumnKind::Bool),
        ("attached", ColumnKind::Bool),
        ("attach_timestamp", ColumnKind::Int64),
        ("detach_timestamp", ColumnKind::Int64),
        ("last_update_block", ColumnKind::Int64),
    ];

    fn key_value(&self) -> DbValue {
        DbValue::Address(self.address)
    }

    fn to_record(&self) -> Record {
        Record::new(Self::TABLE)
            .with("id", DbValue::Address(self.address))
            .with(Self::TYPE, DbValue::Text(self.campaign_type.clone()))
            .with("name", DbValue::Text(self.name.clone()))
            .with("version", DbValue::Text(self.version.clone()))
            .with(Self::PRODUCT_ID, numeric(self.product_id))
            .with(
                "interaction_contract_id",
                DbValue::Address(self.interaction_contract),
            )
            .with(
                "banking_contract_id",
                DbValue::opt_address(self.banking_contract),
            )
            .with(
                "is_authorised_on_banking",
                DbValue::Bool(self.is_authorised_on_banking),
            )
            .with(Self::ATTACHED, DbValue::Bool(self.attached))
            .with("attach_timestamp", int64(self.attach_timestamp))
            .with(
                "detach_timestamp",
                self.detach_timestamp.map(int64).unwrap_or(DbValue::Null),
            )
            .with(Self::LAST_UPDATE_BLOCK, int64(self.last_update_block))
    }

    fn from_record(record: &Record) -> Result<Self, DbError> {
        Ok(Self {
            address: record.address("id")?,
            campaign_type: record.text(Self::TYPE)?.to_string(),
            name: record.text("name")?.to_string(),
            version: record.text("version")?.to_string(),
            product_id: read_numeric(record, Self::PRODUCT_ID)?,
            interaction_contract: record.address("interaction_contract_id")?,
            banking_contract: record.opt_address("banking_contract_id")?,
            is_authorised_on_banking: record.bool("is_authorised_on_banking")?,
            attached: record.bool(Self::ATTACHED)?,
            attach_timestamp: read_u64(record, "attach_timestamp")?,
            detach_timestamp: read_opt_u64(record, "detach_timestamp")?,
            last_update_block: read_u64(record, Self::LAST_UPDATE_BLOCK)?,
        })
    }
}
