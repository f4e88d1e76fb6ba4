//! Transformation system turning decoded campaign events into derived rows.
//!
//! This module provides:
//! - Handler traits and the `(source, event)` dispatch registry
//! - A handler context with chain info, the entity store and block-pinned reads
//! - Resolvers for tokens, banking contracts and campaigns
//! - The campaign statistics aggregator
//! - An engine that feeds events to handlers in order
//!
//! # Architecture
//!
//! ```text
//! Decoded Events ──► TransformationEngine ──► Handlers ──► EntityStore
//!                           │                    │
//!                           │                    └─► ChainReader (pinned to the event block)
//!                           └─► TransformationRegistry
//! ```
//!
//! # Example Handler
//!
//! ```ignore
//! use async_trait::async_trait;
//! use campaign_indexer::transformations::{
//!     DecodedEvent, EventHandler, EventTrigger, HandlerContext, TransformationError,
//!     TransformationHandler,
//! };
//!
//! pub struct MyHandler;
//!
//! #[async_trait]
//! impl TransformationHandler for MyHandler {
//!     fn name(&self) -> &'static str { "MyHandler" }
//!
//!     async fn handle(
//!         &self,
//!         event: &DecodedEvent,
//!         ctx: &HandlerContext,
//!     ) -> Result<(), TransformationError> {
//!         let campaign = event.address("campaign")?;
//!         // Read or write derived rows through ctx.store
//!         Ok(())
//!     }
//! }
//!
//! impl EventHandler for MyHandler {
//!     fn triggers(&self) -> Vec<EventTrigger> {
//!         vec![EventTrigger::new("Campaigns", "Something(address)")]
//!     }
//! }
//! ```

pub mod banking;
pub mod campaign;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod registry;
pub mod stats;
pub mod token;
pub mod traits;

// Re-exports for convenience
pub use banking::ensure_banking_contract;
pub use campaign::ensure_campaign;
pub use context::{CallOutput, DecodedEvent, DecodedValue, HandlerContext};
pub use engine::{EngineStats, TransformationEngine};
pub use error::TransformationError;
pub use registry::{build_registry, TransformationRegistry};
pub use stats::{apply_increments, safe_apply_increments, InteractionSelector};
pub use token::ensure_token;
pub use traits::{EventHandler, EventTrigger, TransformationHandler};
