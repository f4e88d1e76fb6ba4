//! Core traits for transformation handlers.
//!
//! Handlers receive one decoded event at a time and write their derived
//! state through the context's entity store.

use async_trait::async_trait;

use super::context::{DecodedEvent, HandlerContext};
use super::error::TransformationError;

/// Core trait that all transformation handlers must implement.
#[async_trait]
pub trait TransformationHandler: Send + Sync + 'static {
    /// Unique name for this handler (used in logging).
    fn name(&self) -> &'static str;

    /// Process one event.
    ///
    /// Errors are isolated to this event: the engine logs them and moves on.
    async fn handle(
        &self,
        event: &DecodedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), TransformationError>;
}

/// Trigger for event-based handlers.
#[derive(Debug, Clone)]
pub struct EventTrigger {
    /// Contract group name (e.g. "CampaignsFactory").
    pub source: String,
    /// Event signature (e.g., "CampaignCreated(address)").
    pub event_signature: String,
}

impl EventTrigger {
    pub fn new(source: impl Into<String>, event_signature: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            event_signature: event_signature.into(),
        }
    }
}

/// Marker trait for handlers that respond to events.
pub trait EventHandler: TransformationHandler {
    /// Event triggers this handler responds to.
    fn triggers(&self) -> Vec<EventTrigger>;
}
