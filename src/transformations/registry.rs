//! Handler registration system.
//!
//! The registry maps `(source, event name)` to the handlers for that event.
//! It is built once at startup and never mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::EventHandler;

/// Registry of all transformation handlers, built at startup.
pub struct TransformationRegistry {
    /// Event handlers indexed by (source, event_name) for fast lookup
    event_handlers: HashMap<(String, String), Vec<Arc<dyn EventHandler>>>,
    /// All handlers (de-duplicated)
    all_handlers: Vec<Arc<dyn EventHandler>>,
}

impl TransformationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            event_handlers: HashMap::new(),
            all_handlers: Vec::new(),
        }
    }

    /// Register an event handler.
    ///
    /// The handler will be invoked for all events matching its triggers.
    pub fn register_event_handler<H: EventHandler + 'static>(&mut self, handler: H) {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        let triggers = handler.triggers();

        for trigger in triggers {
            let key = (trigger.source.clone(), extract_event_name(&trigger.event_signature));
            self.event_handlers
                .entry(key)
                .or_default()
                .push(handler.clone());
        }

        self.all_handlers.push(handler);
    }

    /// Get handlers for a specific event.
    pub fn handlers_for_event(&self, source: &str, event_name: &str) -> &[Arc<dyn EventHandler>] {
        self.event_handlers
            .get(&(source.to_string(), event_name.to_string()))
            .map(|handlers| handlers.as_slice())
            .unwrap_or(&[])
    }

    /// Get all registered event triggers.
    pub fn all_event_triggers(&self) -> Vec<(String, String)> {
        self.event_handlers.keys().cloned().collect()
    }

    /// Check if any handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.all_handlers.is_empty()
    }

    /// Get count of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.all_handlers.len()
    }
}

impl Default for TransformationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract event name from signature.
/// e.g., "CampaignCreated(address)" -> "CampaignCreated"
pub(crate) fn extract_event_name(signature: &str) -> String {
    signature
        .split('(')
        .next()
        .unwrap_or(signature)
        .to_string()
}

/// Build the transformation registry with all handlers.
pub fn build_registry() -> TransformationRegistry {
    let mut registry = TransformationRegistry::new();

    super::event::register_handlers(&mut registry);

    tracing::info!(
        "Built transformation registry with {} handlers ({} event triggers)",
        registry.handler_count(),
        registry.all_event_triggers().len(),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_event_name() {
        assert_eq!(extract_event_name("CampaignCreated(address)"), "CampaignCreated");
        assert_eq!(extract_event_name("Bare"), "Bare");
    }

    #[test]
    fn test_dispatch_table_covers_all_sources() {
        let registry = build_registry();

        for (source, event) in [
            ("CampaignsFactory", "CampaignCreated"),
            ("CampaignBanksFactory", "CampaignBankCreated"),
            ("CampaignBanks", "CampaignAuthorisationUpdated"),
            ("CampaignBanks", "DistributionStateUpdated"),
            ("CampaignBanks", "RewardAdded"),
            ("CampaignBanks", "RewardClaimed"),
            ("ProductInteraction", "CampaignAttached"),
            ("ProductInteraction", "CampaignDetached"),
            ("ProductInteraction", "ArticleOpened"),
            ("ProductInteraction", "CustomerMeeting"),
            ("ProductInteraction", "WebShopOpenned"),
            ("ProductInteractionManager", "InteractionContractDeployed"),
        ] {
            assert_eq!(
                registry.handlers_for_event(source, event).len(),
                1,
                "{}:{}",
                source,
                event
            );
        }

        assert!(registry.handlers_for_event("Campaigns", "Unknown").is_empty());
    }
}
