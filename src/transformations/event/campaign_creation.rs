use async_trait::async_trait;

use crate::transformations::campaign::ensure_campaign;
use crate::transformations::context::{DecodedEvent, HandlerContext};
use crate::transformations::error::TransformationError;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};

pub struct CampaignCreatedHandler;

#[async_trait]
impl TransformationHandler for CampaignCreatedHandler {
    fn name(&self) -> &'static str {
        "CampaignCreatedHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let campaign = event.address("campaign")?;
        ensure_campaign(ctx, campaign, event.block_number).await?;
        Ok(())
    }
}

impl EventHandler for CampaignCreatedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new("CampaignsFactory", "CampaignCreated(address)")]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(CampaignCreatedHandler);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{DbValue, EntityStoreExt};
    use crate::entities::Campaign;
    use crate::test_utils::{addr, context, script_campaign, MockChainReader};
    use crate::transformations::context::DecodedValue;

    fn created(campaign: [u8; 20], block: u64) -> DecodedEvent {
        DecodedEvent::new("CampaignsFactory", "CampaignCreated", addr(0xfa), block, 1_000 + block)
            .with_param("campaign", DecodedValue::Address(campaign))
    }

    #[tokio::test]
    async fn test_creation_enriches_when_readable() {
        let reader = Arc::new(MockChainReader::new());
        script_campaign(&reader, addr(0xa), "frak.campaign.referral", 1, addr(0xc), addr(0xb));
        let (ctx, store) = context(reader);

        CampaignCreatedHandler.handle(&created(addr(0xa), 10), &ctx).await.unwrap();
        CampaignCreatedHandler.handle(&created(addr(0xa), 10), &ctx).await.unwrap();

        assert_eq!(store.rows("campaigns").await.len(), 1);
        let campaign = ctx
            .store
            .find::<Campaign>(DbValue::Address(addr(0xa)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(campaign.campaign_type, "frak.campaign.referral");
        assert!(!campaign.attached);
    }

    #[tokio::test]
    async fn test_missing_param_is_an_error() {
        let reader = Arc::new(MockChainReader::new());
        let (ctx, store) = context(reader);
        let event = DecodedEvent::new("CampaignsFactory", "CampaignCreated", addr(0xfa), 10, 1_010);

        let result = CampaignCreatedHandler.handle(&event, &ctx).await;
        assert!(matches!(result, Err(TransformationError::MissingField(_))));
        assert!(store.rows("campaigns").await.is_empty());
    }
}
