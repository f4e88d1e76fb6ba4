use async_trait::async_trait;

use crate::db::{DbValue, EntityStoreExt, Patch};
use crate::entities::{BankingContract, Campaign};
use crate::transformations::banking::ensure_banking_contract;
use crate::transformations::campaign::ensure_campaign;
use crate::transformations::context::{DecodedEvent, HandlerContext};
use crate::transformations::error::TransformationError;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};

pub struct CampaignBankCreatedHandler;

#[async_trait]
impl TransformationHandler for CampaignBankCreatedHandler {
    fn name(&self) -> &'static str {
        "CampaignBankCreatedHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let bank = event.address("campaignBank")?;
        ensure_banking_contract(ctx, bank, event.block_number, Patch::new()).await
    }
}

impl EventHandler for CampaignBankCreatedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            "CampaignBanksFactory",
            "CampaignBankCreated(address)",
        )]
    }
}

/// Authorisation of a campaign on the bank that emitted the event.
pub struct CampaignAuthorisationHandler;

#[async_trait]
impl TransformationHandler for CampaignAuthorisationHandler {
    fn name(&self) -> &'static str {
        "CampaignAuthorisationHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let address = event.address("campaign")?;
        let is_allowed = event.bool("isAllowed")?;

        let campaign = ensure_campaign(ctx, address, event.block_number).await?;
        if campaign.banking_contract != Some(event.contract_address) {
            tracing::warn!(
                "Banking contract mismatch for campaign 0x{}: event from 0x{}, recorded {}",
                hex::encode(address),
                hex::encode(event.contract_address),
                campaign
                    .banking_contract
                    .map(|bank| format!("0x{}", hex::encode(bank)))
                    .unwrap_or_else(|| "none".to_string())
            );
            return Ok(());
        }

        ctx.store
            .update::<Campaign>(
                DbValue::Address(address),
                Campaign::authorisation_patch(is_allowed, event.block_number),
            )
            .await?;

        tracing::debug!(
            "Campaign 0x{} authorised on bank: {}",
            hex::encode(address),
            is_allowed
        );
        Ok(())
    }
}

impl EventHandler for CampaignAuthorisationHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            "CampaignBanks",
            "CampaignAuthorisationUpdated(address,bool)",
        )]
    }
}

pub struct DistributionStateHandler;

#[async_trait]
impl TransformationHandler for DistributionStateHandler {
    fn name(&self) -> &'static str {
        "DistributionStateHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let is_distributing = event.bool("isDistributing")?;
        ensure_banking_contract(
            ctx,
            event.contract_address,
            event.block_number,
            BankingContract::distribution_state_patch(is_distributing),
        )
        .await
    }
}

impl EventHandler for DistributionStateHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            "CampaignBanks",
            "DistributionStateUpdated(bool)",
        )]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(CampaignBankCreatedHandler);
    registry.register_event_handler(CampaignAuthorisationHandler);
    registry.register_event_handler(DistributionStateHandler);
}
