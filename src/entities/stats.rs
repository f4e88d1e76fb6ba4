use std::collections::BTreeMap;

use alloy::primitives::U256;

use super::{numeric, read_numeric};
use crate::db::{ColumnKind, ConflictAction, DbError, DbValue, Entity, Record};

/// One counter column of [`AffiliationCampaignStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatsCounter {
    TotalInteractions,
    OpenInteractions,
    ReadInteractions,
    ReferredInteractions,
    CreateReferredLinkInteractions,
    PurchaseStartedInteractions,
    PurchaseCompletedInteractions,
    CustomerMeetingInteractions,
    WebshopOpenned,
    TotalRewards,
    RewardCount,
}

impl StatsCounter {
    pub const ALL: [StatsCounter; 11] = [
        StatsCounter::TotalInteractions,
        StatsCounter::OpenInteractions,
        StatsCounter::ReadInteractions,
        StatsCounter::ReferredInteractions,
        StatsCounter::CreateReferredLinkInteractions,
        StatsCounter::PurchaseStartedInteractions,
        StatsCounter::PurchaseCompletedInteractions,
        StatsCounter::CustomerMeetingInteractions,
        StatsCounter::WebshopOpenned,
        StatsCounter::TotalRewards,
        StatsCounter::RewardCount,
    ];

    pub fn column(self) -> &'static str {
        match self {
            StatsCounter::TotalInteractions => "total_interactions",
            StatsCounter::OpenInteractions => "open_interactions",
            StatsCounter::ReadInteractions => "read_interactions",
            StatsCounter::ReferredInteractions => "referred_interactions",
            StatsCounter::CreateReferredLinkInteractions => "create_referred_link_interactions",
            StatsCounter::PurchaseStartedInteractions => "purchase_started_interactions",
            StatsCounter::PurchaseCompletedInteractions => "purchase_completed_interactions",
            StatsCounter::CustomerMeetingInteractions => "customer_meeting_interactions",
            StatsCounter::WebshopOpenned => "webshop_openned",
            StatsCounter::TotalRewards => "total_rewards",
            StatsCounter::RewardCount => "reward_count",
        }
    }
}

/// Named counter deltas applied on top of the implicit `total_interactions + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsIncrements {
    deltas: BTreeMap<StatsCounter, U256>,
}

impl StatsIncrements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one(counter: StatsCounter) -> Self {
        Self::new().with(counter, U256::from(1u64))
    }

    pub fn with(mut self, counter: StatsCounter, amount: U256) -> Self {
        let entry = self.deltas.entry(counter).or_insert(U256::ZERO);
        *entry = entry.saturating_add(amount);
        self
    }

    pub fn get(&self, counter: StatsCounter) -> U256 {
        self.deltas.get(&counter).copied().unwrap_or(U256::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Per-campaign interaction counters, 1:1 with an affiliation campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliationCampaignStats {
    pub campaign_id: [u8; 20],
    counters: BTreeMap<StatsCounter, U256>,
}

impl AffiliationCampaignStats {
    /// All counters at zero.
    pub fn empty(campaign_id: [u8; 20]) -> Self {
        Self {
            campaign_id,
            counters: StatsCounter::ALL
                .iter()
                .map(|counter| (*counter, U256::ZERO))
                .collect(),
        }
    }

    pub fn get(&self, counter: StatsCounter) -> U256 {
        self.counters.get(&counter).copied().unwrap_or(U256::ZERO)
    }

    /// The row after one interaction: `total_interactions + 1` plus every delta.
    ///
    /// Counters saturate at `U256::MAX`.
    pub fn merged(&self, increments: &StatsIncrements) -> Self {
        let mut next = self.clone();
        for counter in StatsCounter::ALL {
            let mut delta = increments.get(counter);
            if counter == StatsCounter::TotalInteractions {
                delta = delta.saturating_add(U256::from(1u64));
            }
            let current = self.get(counter);
            next.counters.insert(counter, current.saturating_add(delta));
        }
        next
    }

    /// Server-side merge matching [`Self::merged`] when the row is seeded
    /// with `empty(..).merged(increments)`.
    pub fn increment_conflict() -> ConflictAction {
        ConflictAction::Increment(
            StatsCounter::ALL
                .iter()
                .map(|counter| counter.column().to_string())
                .collect(),
        )
    }
}

impl Entity for AffiliationCampaignStats {
    const TABLE: &'static str = "affiliation_campaign_stats";
    const KEY: &'static str = "campaign_id";
    const COLUMNS: &'static [(&'static str, ColumnKind)] = &[
        ("campaign_id", ColumnKind::Address),
        ("total_interactions", ColumnKind::Numeric),
        ("open_interactions", ColumnKind::Numeric),
        ("read_interactions", ColumnKind::Numeric),
        ("referred_interactions", ColumnKind::Numeric),
        ("create_referred_link_interactions", ColumnKind::Numeric),
        ("purchase_started_interactions", ColumnKind::Numeric),
        ("purchase_completed_interactions", ColumnKind::Numeric),
        ("customer_meeting_interactions", ColumnKind::Numeric),
        ("webshop_openned", ColumnKind::Numeric),
        ("total_rewards", ColumnKind::Numeric),
        ("reward_count", ColumnKind::Numeric),
    ];

    fn key_value(&self) -> DbValue {
        DbValue::Address(self.campaign_id)
    }

    fn to_record(&self) -> Record {
        StatsCounter::ALL.iter().fold(
            Record::new(Self::TABLE).with("campaign_id", DbValue::Address(self.campaign_id)),
            |record, counter| record.with(counter.column(), numeric(self.get(*counter))),
        )
    }

    fn from_record(record: &Record) -> Result<Self, DbError> {
        let mut counters = BTreeMap::new();
        for counter in StatsCounter::ALL {
            counters.insert(counter, read_numeric(record, counter.column())?);
        }
        Ok(Self {
            campaign_id: record.address("campaign_id")?,
            counters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_match_counters() {
        let columns: Vec<_> = AffiliationCampaignStats::COLUMNS[1..]
            .iter()
            .map(|(name, _)| *name)
            .collect();
        let counters: Vec<_> = StatsCounter::ALL.iter().map(|c| c.column()).collect();
        assert_eq!(columns, counters);
    }

    #[test]
    fn test_merge_adds_total_and_named_field() {
        let inc = StatsIncrements::one(StatsCounter::OpenInteractions);
        let stats = AffiliationCampaignStats::empty([1u8; 20])
            .merged(&inc)
            .merged(&inc);

        assert_eq!(stats.get(StatsCounter::TotalInteractions), U256::from(2u64));
        assert_eq!(stats.get(StatsCounter::OpenInteractions), U256::from(2u64));
        assert_eq!(stats.get(StatsCounter::ReadInteractions), U256::ZERO);
    }

    #[test]
    fn test_merge_with_no_named_field_still_counts() {
        let stats = AffiliationCampaignStats::empty([1u8; 20]).merged(&StatsIncrements::new());
        assert_eq!(stats.get(StatsCounter::TotalInteractions), U256::from(1u64));
    }

    #[test]
    fn test_merge_saturates() {
        let inc = StatsIncrements::new().with(StatsCounter::TotalRewards, U256::MAX);
        let stats = AffiliationCampaignStats::empty([1u8; 20])
            .merged(&inc)
            .merged(&inc);
        assert_eq!(stats.get(StatsCounter::TotalRewards), U256::MAX);
    }

    #[test]
    fn test_record_round_trip() {
        let stats = AffiliationCampaignStats::empty([3u8; 20])
            .merged(&StatsIncrements::one(StatsCounter::CustomerMeetingInteractions));
        let decoded = AffiliationCampaignStats::from_record(&stats.to_record()).unwrap();
        assert_eq!(decoded, stats);
    }
}
