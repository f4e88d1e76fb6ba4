use alloy::primitives::U256;
use async_trait::async_trait;

use crate::db::{DbValue, EntityStoreExt};
use crate::entities::{BankingContract, StatsCounter, StatsIncrements};
use crate::transformations::banking::ensure_banking_contract;
use crate::transformations::context::{DecodedEvent, HandlerContext};
use crate::transformations::error::TransformationError;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::stats::{safe_apply_increments, InteractionSelector};
use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};

/// Rewards pushed to a user by a bank. Also counted in the product's campaign stats.
pub struct RewardAddedHandler;

#[async_trait]
impl TransformationHandler for RewardAddedHandler {
    fn name(&self) -> &'static str {
        "RewardAddedHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let amount = event.uint256("amount")?;
        let bank_address = event.contract_address;

        ensure_banking_contract(
            ctx,
            bank_address,
            event.block_number,
            BankingContract::distributed_patch(amount),
        )
        .await?;

        let bank = ctx
            .store
            .find::<BankingContract>(DbValue::Address(bank_address))
            .await?
            .ok_or_else(|| {
                TransformationError::MissingData(format!(
                    "banking contract 0x{}",
                    hex::encode(bank_address)
                ))
            })?;

        let increments = StatsIncrements::new()
            .with(StatsCounter::TotalRewards, amount)
            .with(StatsCounter::RewardCount, U256::from(1u64));
        safe_apply_increments(
            ctx,
            InteractionSelector::Product(bank.product_id),
            event.block_number,
            &increments,
        )
        .await;

        Ok(())
    }
}

impl EventHandler for RewardAddedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            "CampaignBanks",
            "RewardAdded(address,address,uint256)",
        )]
    }
}

pub struct RewardClaimedHandler;

#[async_trait]
impl TransformationHandler for RewardClaimedHandler {
    fn name(&self) -> &'static str {
        "RewardClaimedHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let amount = event.uint256("amount")?;
        ensure_banking_contract(
            ctx,
            event.contract_address,
            event.block_number,
            BankingContract::claimed_patch(amount),
        )
        .await
    }
}

impl EventHandler for RewardClaimedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            "CampaignBanks",
            "RewardClaimed(address,uint256)",
        )]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(RewardAddedHandler);
    registry.register_event_handler(RewardClaimedHandler);
}
