//! Transformation engine that orchestrates handler execution.
//!
//! The engine receives decoded events in chain order and invokes the
//! registered handlers one event at a time. A failing handler is logged and
//! never stops the stream.

use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use super::context::{DecodedEvent, HandlerContext};
use super::registry::TransformationRegistry;

/// Counters reported when the engine stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events: u64,
    pub unhandled: u64,
    pub handler_runs: u64,
    pub handler_failures: u64,
}

/// The transformation engine processes decoded events and invokes handlers.
pub struct TransformationEngine {
    registry: Arc<TransformationRegistry>,
    ctx: HandlerContext,
}

impl TransformationEngine {
    /// Create a new transformation engine.
    pub fn new(registry: Arc<TransformationRegistry>, ctx: HandlerContext) -> Self {
        Self { registry, ctx }
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    /// Consume events until the channel closes.
    ///
    /// Events are handled strictly in arrival order; the next event is not
    /// started before every handler of the current one has returned.
    pub async fn run(&self, mut events_rx: Receiver<DecodedEvent>) -> EngineStats {
        tracing::info!(
            "Transformation engine started for chain {} ({})",
            self.ctx.chain_name,
            self.ctx.chain_id
        );

        let mut stats = EngineStats::default();
        while let Some(event) = events_rx.recv().await {
            self.process_event(&event, &mut stats).await;
        }

        tracing::info!(
            "Transformation engine completed for chain {}: {} events, {} handler runs, {} failures, {} unhandled",
            self.ctx.chain_name,
            stats.events,
            stats.handler_runs,
            stats.handler_failures,
            stats.unhandled
        );
        stats
    }

    /// Run every handler registered for `event`.
    pub async fn process_event(&self, event: &DecodedEvent, stats: &mut EngineStats) {
        stats.events += 1;

        let handlers = self
            .registry
            .handlers_for_event(&event.source_name, &event.event_name);

        if handlers.is_empty() {
            tracing::debug!(
                "No handler for event {}/{} at block {}",
                event.source_name,
                event.event_name,
                event.block_number
            );
            stats.unhandled += 1;
            return;
        }

        for handler in handlers {
            tracing::debug!(
                "Invoking handler {} for event {}/{} at block {}",
                handler.name(),
                event.source_name,
                event.event_name,
                event.block_number
            );

            stats.handler_runs += 1;
            if let Err(e) = handler.handle(event, &self.ctx).await {
                stats.handler_failures += 1;
                tracing::error!(
                    "Handler {} failed for event {}/{} at block {} (log {}, transient: {}): {}",
                    handler.name(),
                    event.source_name,
                    event.event_name,
                    event.block_number,
                    event.log_index,
                    e.is_transient(),
                    e
                );
                // Continue with other handlers
                continue;
            }
        }
    }
}
