pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod store;
pub mod types;

pub use error::DbError;
pub use memory::MemoryStore;
pub use pool::DbPool;
pub use store::{Entity, EntityStore, EntityStoreExt};
pub use types::{
    Assignment, ColumnKind, ConflictAction, DbOperation, DbValue, Order, Patch, Record, Select,
    WhereClause,
};
