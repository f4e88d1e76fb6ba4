use alloy::primitives::U256;
use serde_json::Value as JsonValue;

use super::stats::StatsCounter;
use super::{int64, numeric, read_numeric, read_u64};
use crate::db::{ColumnKind, DbError, DbValue, Entity, Record};

/// A product interaction contract. The latest deployed one per product is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionContract {
    pub address: [u8; 20],
    pub product_id: U256,
    pub created_timestamp: u64,
}

impl InteractionContract {
    pub const PRODUCT_ID: &'static str = "product_id";
    pub const CREATED_TIMESTAMP: &'static str = "created_timestamp";
}

impl Entity for InteractionContract {
    const TABLE: &'static str = "interaction_contracts";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("id", ColumnKind::Address),
        ("product_id", ColumnKind::Numeric),
        ("created_timestamp", ColumnKind::Int64),
    ];

    fn key_value(&self) -> DbValue {
        DbValue::Address(self.address)
    }

    fn to_record(&self) -> Record {
        Record::new(Self::TABLE)
            .with("id", DbValue::Address(self.address))
            .with(Self::PRODUCT_ID, numeric(self.product_id))
            .with(Self::CREATED_TIMESTAMP, int64(self.created_timestamp))
    }

    fn from_record(record: &Record) -> Result<Self, DbError> {
        Ok(Self {
            address: record.address("id")?,
            product_id: read_numeric(record, Self::PRODUCT_ID)?,
            created_timestamp: read_u64(record, Self::CREATED_TIMESTAMP)?,
        })
    }
}

/// User interactions recorded by product interaction contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    OpenArticle,
    ReadArticle,
    Referred,
    CreateReferralLink,
    PurchaseStarted,
    PurchaseCompleted,
    CustomerMeeting,
    WebshopOpenned,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 8] = [
        InteractionKind::OpenArticle,
        InteractionKind::ReadArticle,
        InteractionKind::Referred,
        InteractionKind::CreateReferralLink,
        InteractionKind::PurchaseStarted,
        InteractionKind::PurchaseCompleted,
        InteractionKind::CustomerMeeting,
        InteractionKind::WebshopOpenned,
    ];

    pub fn from_event_name(event_name: &str) -> Option<Self> {
        Some(match event_name {
            "ArticleOpened" => InteractionKind::OpenArticle,
            "ArticleRead" => InteractionKind::ReadArticle,
            "UserReferred" => InteractionKind::Referred,
            "ReferralLinkCreation" => InteractionKind::CreateReferralLink,
            "PurchaseStarted" => InteractionKind::PurchaseStarted,
            "PurchaseCompleted" => InteractionKind::PurchaseCompleted,
            "CustomerMeeting" => InteractionKind::CustomerMeeting,
            "WebShopOpenned" => InteractionKind::WebshopOpenned,
            _ => return None,
        })
    }

    /// Value stored in `interaction_events.type`.
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::OpenArticle => "OPEN_ARTICLE",
            InteractionKind::ReadArticle => "READ_ARTICLE",
            InteractionKind::Referred => "REFERRED",
            InteractionKind::CreateReferralLink => "CREATE_REFERRAL_LINK",
            InteractionKind::PurchaseStarted => "PURCHASE_STARTED",
            InteractionKind::PurchaseCompleted => "PURCHASE_COMPLETED",
            InteractionKind::CustomerMeeting => "CUSTOMER_MEETING",
            InteractionKind::WebshopOpenned => "WEBSHOP_OPENNED",
        }
    }

    /// The stats counter this interaction bumps.
    pub fn counter(self) -> StatsCounter {
        match self {
            InteractionKind::OpenArticle => StatsCounter::OpenInteractions,
            InteractionKind::ReadArticle => StatsCounter::ReadInteractions,
            InteractionKind::Referred => StatsCounter::ReferredInteractions,
            InteractionKind::CreateReferralLink => StatsCounter::CreateReferredLinkInteractions,
            InteractionKind::PurchaseStarted => StatsCounter::PurchaseStartedInteractions,
            InteractionKind::PurchaseCompleted => StatsCounter::PurchaseCompletedInteractions,
            InteractionKind::CustomerMeeting => StatsCounter::CustomerMeetingInteractions,
            InteractionKind::WebshopOpenned => StatsCounter::WebshopOpenned,
        }
    }
}

/// Append-only log of user interactions, keyed by `<txhash>-<logIndex>`.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    pub id: String,
    pub interaction_contract: [u8; 20],
    pub user: [u8; 20],
    pub kind: InteractionKind,
    pub timestamp: u64,
    pub data: Option<JsonValue>,
}

impl InteractionEvent {
    pub fn event_id(transaction_hash: &[u8; 32], log_index: u32) -> String {
        format!("0x{}-{}", hex::encode(transaction_hash), log_index)
    }
}

impl Entity for InteractionEvent {
    const TABLE: &'static str = "interaction_events";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("id", ColumnKind::Text),
        ("interaction_id", ColumnKind::Address),
        ("user_id", ColumnKind::Address),
        ("type", ColumnKind::Text),
        ("timestamp", ColumnKind::Int64),
        ("data", ColumnKind::JsonB),
    ];

    fn key_value(&self) -> DbValue {
        DbValue::Text(self.id.clone())
    }

    fn to_record(&self) -> Record {
        Record::new(Self::TABLE)
            .with("id", DbValue::Text(self.id.clone()))
            .with("interaction_id", DbValue::Address(self.interaction_contract))
            .with("user_id", DbValue::Address(self.user))
            .with("type", DbValue::Text(self.kind.as_str().to_string()))
            .with("timestamp", int64(self.timestamp))
            .with(
                "data",
                self.data.clone().map(DbValue::JsonB).unwrap_or(DbValue::Null),
            )
    }

    fn from_record(record: &Record) -> Result<Self, DbError> {
        let raw_kind = record.text("type")?;
        let kind = InteractionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == raw_kind)
            .ok_or_else(|| {
                DbError::decode(Self::TABLE, "type", format!("unknown interaction '{}'", raw_kind))
            })?;

        let data = match record.get("data") {
            None | Some(DbValue::Null) => None,
            Some(_) => Some(record.jsonb("data")?.clone()),
        };

        Ok(Self {
            id: record.text("id")?.to_string(),
            interaction_contract: record.address("interaction_id")?,
            user: record.address("user_id")?,
            kind,
            timestamp: read_u64(record, "timestamp")?,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_mapping() {
        let kind = InteractionKind::from_event_name("CustomerMeeting").unwrap();
        assert_eq!(kind.as_str(), "CUSTOMER_MEETING");
        assert_eq!(kind.counter(), StatsCounter::CustomerMeetingInteractions);

        assert_eq!(
            InteractionKind::from_event_name("WebShopOpenned").map(|k| k.counter()),
            Some(StatsCounter::WebshopOpenned)
        );
        assert!(InteractionKind::from_event_name("CampaignAttached").is_none());
    }

    #[test]
    fn test_event_id_format() {
        let id = InteractionEvent::event_id(&[0xab; 32], 7);
        assert!(id.starts_with("0xabab"));
        assert!(id.ends_with("-7"));
    }

    #[test]
    fn test_record_round_trip() {
        let event = InteractionEvent {
            id: InteractionEvent::event_id(&[1u8; 32], 0),
            interaction_contract: [2u8; 20],
            user: [3u8; 20],
            kind: InteractionKind::PurchaseStarted,
            timestamp: 1_700_000_000,
            data: Some(serde_json::json!({ "purchaseId": "12" })),
        };
        let decoded = InteractionEvent::from_record(&event.to_record()).unwrap();
        assert_eq!(decoded, event);
    }
}
