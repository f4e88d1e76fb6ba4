//! Handlers for events emitted by product interaction contracts.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::db::{DbValue, EntityStoreExt};
use crate::entities::{Campaign, InteractionEvent, InteractionKind, StatsIncrements};
use crate::transformations::campaign::ensure_campaign;
use crate::transformations::context::{DecodedEvent, HandlerContext};
use crate::transformations::error::TransformationError;
use crate::transformations::registry::TransformationRegistry;
use crate::transformations::stats::{safe_apply_increments, InteractionSelector};
use crate::transformations::traits::{EventHandler, EventTrigger, TransformationHandler};

const SOURCE: &str = "ProductInteraction";

/// Attach and detach of a campaign on a product interaction contract.
pub struct CampaignLinkHandler;

#[async_trait]
impl TransformationHandler for CampaignLinkHandler {
    fn name(&self) -> &'static str {
        "CampaignLinkHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let address = event.address("campaign")?;
        let patch = match event.event_name.as_str() {
            "CampaignAttached" => Campaign::attach_patch(event.block_timestamp, event.block_number),
            "CampaignDetached" => Campaign::detach_patch(event.block_timestamp, event.block_number),
            other => {
                return Err(TransformationError::handler(
                    self.name(),
                    format!("unexpected event {}", other),
                ))
            }
        };

        let campaign = ensure_campaign(ctx, address, event.block_number).await?;
        if campaign.is_enriched() && campaign.interaction_contract != event.contract_address {
            tracing::warn!(
                "Interaction contract mismatch for campaign 0x{}: event from 0x{}, recorded 0x{}",
                hex::encode(address),
                hex::encode(event.contract_address),
                hex::encode(campaign.interaction_contract)
            );
            return Ok(());
        }

        ctx.store
            .update::<Campaign>(DbValue::Address(address), patch)
            .await?;

        tracing::debug!(
            "{} 0x{} at block {}",
            event.event_name,
            hex::encode(address),
            event.block_number
        );
        Ok(())
    }
}

impl EventHandler for CampaignLinkHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![
            EventTrigger::new(SOURCE, "CampaignAttached(address)"),
            EventTrigger::new(SOURCE, "CampaignDetached(address)"),
        ]
    }
}

/// User interactions: appended to the interaction log, then counted in the
/// stats of the product's active campaigns.
pub struct InteractionHandler;

/// Event parameters copied into the interaction log payload.
fn payload_fields(kind: InteractionKind) -> &'static [&'static str] {
    match kind {
        InteractionKind::OpenArticle | InteractionKind::ReadArticle => &["articleId"],
        InteractionKind::Referred => &["referrer"],
        InteractionKind::PurchaseStarted | InteractionKind::PurchaseCompleted => &["purchaseId"],
        InteractionKind::CustomerMeeting => &["agencyId"],
        InteractionKind::CreateReferralLink | InteractionKind::WebshopOpenned => &[],
    }
}

fn payload(event: &DecodedEvent, kind: InteractionKind) -> Option<JsonValue> {
    let data: Map<String, JsonValue> = payload_fields(kind)
        .iter()
        .filter_map(|field| {
            event
                .try_get(field)
                .map(|value| (field.to_string(), value.to_json()))
        })
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(JsonValue::Object(data))
    }
}

#[async_trait]
impl TransformationHandler for InteractionHandler {
    fn name(&self) -> &'static str {
        "InteractionHandler"
    }

    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError> {
        let kind = InteractionKind::from_event_name(&event.event_name).ok_or_else(|| {
            TransformationError::handler(
                self.name(),
                format!("unknown interaction {}", event.event_name),
            )
        })?;

        let interaction = InteractionEvent {
            id: InteractionEvent::event_id(&event.transaction_hash, event.log_index),
            interaction_contract: event.contract_address,
            user: event.address("user")?,
            kind,
            timestamp: event.block_timestamp,
            data: payload(event, kind),
        };

        if !ctx.store.insert_if_absent(&interaction).await? {
            tracing::debug!(
                "Interaction {} already recorded, stats left unchanged",
                interaction.id
            );
            return Ok(());
        }

        safe_apply_increments(
            ctx,
            InteractionSelector::Contract(event.contract_address),
            event.block_number,
            &StatsIncrements::one(kind.counter()),
        )
        .await;

        Ok(())
    }
}

impl EventHandler for InteractionHandler {
    fn triggers(&self) -> Vec<EventTrigger> {
        vec![
            EventTrigger::new(SOURCE, "ArticleOpened(bytes32,address)"),
            EventTrigger::new(SOURCE, "ArticleRead(bytes32,address)"),
            EventTrigger::new(SOURCE, "UserReferred(address,address)"),
            EventTrigger::new(SOURCE, "ReferralLinkCreation(address)"),
            EventTrigger::new(SOURCE, "PurchaseStarted(uint256,address)"),
            EventTrigger::new(SOURCE, "PurchaseCompleted(uint256,address)"),
            EventTrigger::new(SOURCE, "CustomerMeeting(bytes32,address)"),
            EventTrigger::new(SOURCE, "WebShopOpenned(address)"),
        ]
    }
}

pub fn register_handlers(registry: &mut TransformationRegistry) {
    registry.register_event_handler(CampaignLinkHandler);
    registry.register_event_handler(InteractionHandler);
}
