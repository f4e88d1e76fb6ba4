//! Derived-state indexer for Frak campaigns.
//!
//! Decoded chain events flow through [`transformations::TransformationEngine`],
//! whose handlers maintain campaigns, banking contracts, tokens, the
//! interaction log and per-campaign statistics in an [`db::EntityStore`].

pub mod db;
pub mod entities;
pub mod replay;
pub mod rpc;
pub mod transformations;
pub mod types;

#[cfg(test)]
mod test_utils;
