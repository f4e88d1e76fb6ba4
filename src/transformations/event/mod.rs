//! Event handlers for transformation.
//!
//! Add new event handler modules here and register them in `register_handlers`.

pub mod campaign_bank;
pub mod campaign_creation;
pub mod interaction_manager;
pub mod interactions;
pub mod rewards;

use super::registry::TransformationRegistry;

/// Register all event handlers with the registry.
pub fn register_handlers(registry: &mut TransformationRegistry) {
    campaign_creation::register_handlers(registry);
    campaign_bank::register_handlers(registry);
    rewards::register_handlers(registry);
    interactions::register_handlers(registry);
    interaction_manager::register_handlers(registry);
}
