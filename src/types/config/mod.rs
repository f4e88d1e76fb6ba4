pub mod chain;
pub mod indexer;
