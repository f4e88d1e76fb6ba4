//! Campaign Statistics Aggregator.
//!
//! Interactions count towards every affiliation campaign of the product that
//! is attached and was active at the block of the interaction.

use alloy::primitives::U256;

use super::context::HandlerContext;
use super::error::TransformationError;
use crate::db::{DbValue, Entity, EntityStoreExt, Order, WhereClause};
use crate::entities::{
    AffiliationCampaignStats, Campaign, InteractionContract, StatsIncrements,
    AFFILIATION_CAMPAIGN_TYPES,
};
use crate::rpc::ContractCall;

const IS_ACTIVE: &str = "isActive()(bool)";

/// How the interaction contract of an increment is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionSelector {
    /// The emitting interaction contract.
    Contract([u8; 20]),
    /// The latest interaction contract deployed for a product.
    Product(U256),
}

impl std::fmt::Display for InteractionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionSelector::Contract(address) => {
                write!(f, "contract 0x{}", hex::encode(address))
            }
            InteractionSelector::Product(product_id) => write!(f, "product {}", product_id),
        }
    }
}

async fn resolve_interaction_contract(
    ctx: &HandlerContext,
    selector: InteractionSelector,
) -> Result<Option<InteractionContract>, TransformationError> {
    match selector {
        InteractionSelector::Contract(address) => Ok(ctx
            .store
            .find::<InteractionContract>(DbValue::Address(address))
            .await?),
        InteractionSelector::Product(product_id) => {
            let latest = ctx
                .store
                .select::<InteractionContract>(
                    WhereClause::Eq(
                        InteractionContract::PRODUCT_ID.to_string(),
                        DbValue::Numeric(product_id.to_string()),
                    ),
                    Some((InteractionContract::CREATED_TIMESTAMP, Order::Desc)),
                    Some(1),
                )
                .await?;
            Ok(latest.into_iter().next())
        }
    }
}

/// Add `increments` (and one interaction) to the stats of every campaign
/// active at `block_number`. Returns the number of campaigns updated.
///
/// The activity reads are a single batch: if any of them fails nothing is
/// written.
pub async fn apply_increments(
    ctx: &HandlerContext,
    selector: InteractionSelector,
    block_number: u64,
    increments: &StatsIncrements,
) -> Result<usize, TransformationError> {
    let Some(interaction_contract) = resolve_interaction_contract(ctx, selector).await? else {
        tracing::warn!(
            "No interaction contract for {} at block {}, stats not updated",
            selector,
            block_number
        );
        return Ok(0);
    };

    let candidates = ctx
        .store
        .select::<Campaign>(
            WhereClause::All(vec![
                WhereClause::Eq(
                    Campaign::PRODUCT_ID.to_string(),
                    DbValue::Numeric(interaction_contract.product_id.to_string()),
                ),
                WhereClause::In(
                    Campaign::TYPE.to_string(),
                    AFFILIATION_CAMPAIGN_TYPES
                        .iter()
                        .map(|t| DbValue::Text(t.to_string()))
                        .collect(),
                ),
                WhereClause::Eq(Campaign::ATTACHED.to_string(), DbValue::Bool(true)),
            ]),
            None,
            None,
        )
        .await?;

    if candidates.is_empty() {
        tracing::debug!(
            "No attached affiliation campaign for product {}",
            interaction_contract.product_id
        );
        return Ok(0);
    }

    let calls = candidates
        .iter()
        .map(|campaign| ContractCall::new(campaign.address, IS_ACTIVE))
        .collect();
    // The reader may split this into several aggregate3 calls of at most
    // `multicall_batch_size`; any failed chunk aborts before the commit below.
    let results = match ctx.multicall(calls, block_number, false).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(
                "Failed to read campaign activity for product {} at block {}: {}",
                interaction_contract.product_id,
                block_number,
                e
            );
            return Err(e);
        }
    };

    let mut operations = Vec::new();
    for (campaign, result) in candidates.iter().zip(results) {
        if result?.bool(0)? {
            let seeded = AffiliationCampaignStats::empty(campaign.address).merged(increments);
            operations.push(seeded.upsert(AffiliationCampaignStats::increment_conflict()));
        }
    }

    let updated = operations.len();
    if updated > 0 {
        ctx.store.execute_transaction(operations).await?;
    }

    tracing::debug!(
        "Updated stats of {}/{} campaigns for product {} at block {}",
        updated,
        candidates.len(),
        interaction_contract.product_id,
        block_number
    );

    Ok(updated)
}

/// [`apply_increments`] for callers that must not fail on stats errors.
pub async fn safe_apply_increments(
    ctx: &HandlerContext,
    selector: InteractionSelector,
    block_number: u64,
    increments: &StatsIncrements,
) -> usize {
    match apply_increments(ctx, selector, block_number, increments).await {
        Ok(updated) => updated,
        Err(e) => {
            tracing::error!(
                "Stats increment for {} at block {} dropped: {}",
                selector,
                block_number,
                e
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::dyn_abi::DynSolValue;

    use super::*;
    use crate::db::MemoryStore;
    use crate::entities::StatsCounter;
    use crate::test_utils::{addr, context, single, MockChainReader};

    async fn attached_campaign(store: &MemoryStore, address: [u8; 20], product_id: u64) {
        let mut campaign = Campaign::shell(address, 1);
        campaign.campaign_type = "frak.campaign.referral".to_string();
        campaign.product_id = U256::from(product_id);
        campaign.interaction_contract = addr(0xc0);
        campaign.attached = true;
        store.insert_if_absent(&campaign).await.unwrap();
    }

    async fn interaction_contract(
        store: &MemoryStore,
        address: [u8; 20],
        product_id: u64,
        created_timestamp: u64,
    ) {
        store
            .insert_if_absent(&InteractionContract {
                address,
                product_id: U256::from(product_id),
                created_timestamp,
            })
            .await
            .unwrap();
    }

    async fn stats(store: &MemoryStore, campaign: [u8; 20]) -> Option<AffiliationCampaignStats> {
        store
            .find::<AffiliationCampaignStats>(DbValue::Address(campaign))
            .await
            .unwrap()
    }

    fn active(reader: &MockChainReader, campaign: [u8; 20], from: u64, to: Option<u64>) {
        reader.respond_between(campaign, "isActive", from, to, single(DynSolValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_activity_is_checked_at_event_block() {
        let reader = Arc::new(MockChainReader::new());
        active(&reader, addr(0xa), 100, Some(150));
        reader.respond_between(addr(0xa), "isActive", 150, None, single(DynSolValue::Bool(false)));
        let (ctx, store) = context(reader);
        interaction_contract(&store, addr(0xc0), 1, 10).await;
        attached_campaign(&store, addr(0xa), 1).await;

        let inc = StatsIncrements::one(StatsCounter::OpenInteractions);
        let selector = InteractionSelector::Contract(addr(0xc0));

        assert_eq!(apply_increments(&ctx, selector, 120, &inc).await.unwrap(), 1);
        assert_eq!(apply_increments(&ctx, selector, 160, &inc).await.unwrap(), 0);

        let stats = stats(&store, addr(0xa)).await.unwrap();
        assert_eq!(stats.get(StatsCounter::TotalInteractions), U256::from(1u64));
        assert_eq!(stats.get(StatsCounter::OpenInteractions), U256::from(1u64));
    }

    #[tokio::test]
    async fn test_latest_interaction_contract_wins() {
        let reader = Arc::new(MockChainReader::new());
        let (ctx, store) = context(reader);
        interaction_contract(&store, addr(0xc2), 7, 20).await;
        interaction_contract(&store, addr(0xc1), 7, 10).await;
        interaction_contract(&store, addr(0xc3), 8, 30).await;

        let resolved =
            resolve_interaction_contract(&ctx, InteractionSelector::Product(U256::from(7u64)))
                .await
                .unwrap()
                .unwrap();
        assert_eq!(resolved.address, addr(0xc2));
        assert_eq!(resolved.created_timestamp, 20);
    }

    #[tokio::test]
    async fn test_product_selector_updates_product_campaigns() {
        let reader = Arc::new(MockChainReader::new());
        active(&reader, addr(0xa), 0, None);
        let (ctx, store) = context(reader);
        interaction_contract(&store, addr(0xc1), 5, 10).await;
        interaction_contract(&store, addr(0xc2), 5, 20).await;
        attached_campaign(&store, addr(0xa), 5).await;

        let inc = StatsIncrements::new()
            .with(StatsCounter::TotalRewards, U256::from(40u64))
            .with(StatsCounter::RewardCount, U256::from(1u64));
        let updated = apply_increments(&ctx, InteractionSelector::Product(U256::from(5u64)), 50, &inc)
            .await
            .unwrap();

        assert_eq!(updated, 1);
        let stats = stats(&store, addr(0xa)).await.unwrap();
        assert_eq!(stats.get(StatsCounter::TotalRewards), U256::from(40u64));
        assert_eq!(stats.get(StatsCounter::TotalInteractions), U256::from(1u64));
    }

    #[tokio::test]
    async fn test_unknown_interaction_contract_is_a_no_op() {
        let reader = Arc::new(MockChainReader::new());
        let (ctx, store) = context(reader.clone());

        let inc = StatsIncrements::one(StatsCounter::ReadInteractions);
        let updated = apply_increments(&ctx, InteractionSelector::Contract(addr(0xc9)), 10, &inc)
            .await
            .unwrap();

        assert_eq!(updated, 0);
        assert_eq!(reader.call_count(), 0);
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_outage_aborts_without_writes() {
        let reader = Arc::new(MockChainReader::new());
        active(&reader, addr(0xa), 0, None);
        reader.set_offline(true);
        let (ctx, store) = context(reader);
        interaction_contract(&store, addr(0xc0), 1, 10).await;
        attached_campaign(&store, addr(0xa), 1).await;
        attached_campaign(&store, addr(0xb), 1).await;
        let writes = store.transaction_count();

        let inc = StatsIncrements::one(StatsCounter::OpenInteractions);
        let selector = InteractionSelector::Contract(addr(0xc0));
        assert!(apply_increments(&ctx, selector, 10, &inc).await.is_err());
        assert_eq!(safe_apply_increments(&ctx, selector, 10, &inc).await, 0);

        assert_eq!(store.transaction_count(), writes);
        assert!(store.rows("affiliation_campaign_stats").await.is_empty());
    }

    #[tokio::test]
    async fn test_one_failing_read_aborts_the_batch() {
        let reader = Arc::new(MockChainReader::new());
        active(&reader, addr(0xa), 0, None);
        reader.revert(addr(0xb), "isActive");
        let (ctx, store) = context(reader);
        interaction_contract(&store, addr(0xc0), 1, 10).await;
        attached_campaign(&store, addr(0xa), 1).await;
        attached_campaign(&store, addr(0xb), 1).await;

        let inc = StatsIncrements::one(StatsCounter::OpenInteractions);
        let result = apply_increments(&ctx, InteractionSelector::Contract(addr(0xc0)), 10, &inc).await;

        assert!(result.is_err());
        assert!(stats(&store, addr(0xa)).await.is_none());
    }

    #[tokio::test]
    async fn test_increments_add_up_on_existing_row() {
        let reader = Arc::new(MockChainReader::new());
        active(&reader, addr(0xa), 0, None);
        let (ctx, store) = context(reader);
        interaction_contract(&store, addr(0xc0), 1, 10).await;
        attached_campaign(&store, addr(0xa), 1).await;

        let inc = StatsIncrements::one(StatsCounter::OpenInteractions);
        for block in [10, 11] {
            apply_increments(&ctx, InteractionSelector::Contract(addr(0xc0)), block, &inc)
                .await
                .unwrap();
        }

        let stats = stats(&store, addr(0xa)).await.unwrap();
        assert_eq!(stats.get(StatsCounter::TotalInteractions), U256::from(2u64));
        assert_eq!(stats.get(StatsCounter::OpenInteractions), U256::from(2u64));
        assert_eq!(stats.get(StatsCounter::ReadInteractions), U256::ZERO);
    }

    #[tokio::test]
    async fn test_detached_and_other_campaigns_are_ignored() {
        let reader = Arc::new(MockChainReader::new());
        let (ctx, store) = context(reader.clone());
        interaction_contract(&store, addr(0xc0), 1, 10).await;
        let mut detached = Campaign::shell(addr(0xd), 1);
        detached.campaign_type = "frak.campaign.referral".to_string();
        detached.product_id = U256::from(1u64);
        store.insert_if_absent(&detached).await.unwrap();
        attached_campaign(&store, addr(0xe), 2).await;

        let inc = StatsIncrements::one(StatsCounter::OpenInteractions);
        let updated = apply_increments(&ctx, InteractionSelector::Contract(addr(0xc0)), 10, &inc)
            .await
            .unwrap();

        assert_eq!(updated, 0);
        assert_eq!(reader.call_count(), 0);
    }
}
