use async_trait::async_trait;

use crate::db::EntityStoreExt;
use crate::entities::InteractionContract;
use crate::transformations::context::{DecodedEvent, HandlerContext};
use crate::transformations::error::TransformationError;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};

pub struct InteractionContractDeployedHandler;

#[async_trait]
impl TransformationHandler for InteractionContractDeployedHandler {
    fn name(&self) -> &'static str {
        "InteractionContractDeployedHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let contract = InteractionContract {
            address: event.address("interactionContract")?,
            product_id: event.uint256("productId")?,
            created_timestamp: event.block_timestamp,
        };

        if ctx.store.insert_if_absent(&contract).await? {
            tracing::info!(
                "Interaction contract 0x{} deployed for product {}",
                hex::encode(contract.address),
                contract.product_id
            );
        }
        Ok(())
    }
}

impl EventHandler for InteractionContractDeployedHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![EventTrigger::new(
            "ProductInteractionManager",
            "InteractionContractDeployed(uint256,address)",
        )]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(InteractionContractDeployedHandler);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::U256;

    use super::*;
    use crate::db::DbValue;
    use crate::test_utils::{addr, context, MockChainReader};
    use crate::transformations::context::DecodedValue;

    #[tokio::test]
    async fn test_deployment_is_recorded_once() {
        let (ctx, store) = context(Arc::new(MockChainReader::new()));
        let deployed = |timestamp| {
            DecodedEvent::new("ProductInteractionManager", "InteractionContractDeployed", addr(0xfe), 10, timestamp)
                .with_param("productId", DecodedValue::Uint256(U256::from(3u64)))
                .with_param("interactionContract", DecodedValue::Address(addr(0xc)))
        };

        InteractionContractDeployedHandler.handle(&deployed(1_000), &ctx).await.unwrap();
        InteractionContractDeployedHandler.handle(&deployed(2_000), &ctx).await.unwrap();

        assert_eq!(store.rows("interaction_contracts").await.len(), 1);
        let contract = ctx
            .store
            .find::<InteractionContract>(DbValue::Address(addr(0xc)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contract.product_id, U256::from(3u64));
        assert_eq!(contract.created_timestamp, 1_000);
    }
}
