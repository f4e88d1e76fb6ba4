//! Narrow entity-store interface used by the aggregation handlers.
//!
//! Backends only implement [`EntityStore::query`] and
//! [`EntityStore::execute_transaction`]; the typed entity operations
//! (`find`, `insert_if_absent`, `insert_or_merge`, `update`, `select`) are
//! provided by [`EntityStoreExt`] on top of them.

use async_trait::async_trait;

use super::error::DbError;
use super::types::{
    ColumnKind, ConflictAction, DbOperation, DbValue, Order, Patch, Record, Select, WhereClause,
};

/// A storage backend able to run selects and transactional writes.
///
/// Implementations must serialize conflicting writes to the same key
/// (unique constraint + conflict clause) and be safe to call concurrently
/// for distinct keys.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Run a select and return the matching rows.
    async fn query(&self, select: &Select) -> Result<Vec<Record>, DbError>;

    /// Execute all operations atomically. Returns the number of affected rows.
    async fn execute_transaction(&self, operations: Vec<DbOperation>) -> Result<u64, DbError>;
}

/// A typed row living in one table with a single-column primary key.
pub trait Entity: Sized + Send + Sync {
    const TABLE: &'static str;
    const KEY: &'static str;
    const COLUMNS: &'static [(&'static str, ColumnKind)];

    fn key_value(&self) -> DbValue;

    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> Result<Self, DbError>;

    /// A select over every column of this entity's table.
    fn select() -> Select {
        Select::new(Self::TABLE, Self::COLUMNS)
    }

    /// Build an upsert of this row keyed on the primary key.
    fn upsert(&self, on_conflict: ConflictAction) -> DbOperation {
        let record = self.to_record();
        let (columns, values) = record
            .columns()
            .map(|(c, v)| (c.clone(), v.clone()))
            .unzip();
        DbOperation::Upsert {
            table: Self::TABLE.to_string(),
            columns,
            values,
            conflict_columns: vec![Self::KEY.to_string()],
            on_conflict,
        }
    }

    /// Build an update of the row identified by `key`.
    fn update(key: DbValue, patch: Patch) -> DbOperation {
        DbOperation::Update {
            table: Self::TABLE.to_string(),
            assignments: patch.into_assignments(),
            where_clause: WhereClause::Eq(Self::KEY.to_string(), key),
        }
    }
}

/// Typed operations over any [`EntityStore`].
#[async_trait]
pub trait EntityStoreExt: EntityStore {
    /// Point lookup by primary key.
    async fn find<E: Entity>(&self, key: DbValue) -> Result<Option<E>, DbError> {
        let select = E::select()
            .filter(WhereClause::Eq(E::KEY.to_string(), key))
            .limit(1);
        match self.query(&select).await?.first() {
            Some(record) => Ok(Some(E::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Insert the row unless one with the same key exists.
    /// Returns whether a row was inserted; a conflict is not an error.
    async fn insert_if_absent<E: Entity>(&self, entity: &E) -> Result<bool, DbError> {
        let affected = self
            .execute_transaction(vec![entity.upsert(ConflictAction::DoNothing)])
            .await?;
        Ok(affected > 0)
    }

    /// Insert the row, or merge it into the existing one with `on_conflict`.
    async fn insert_or_merge<E: Entity>(
        &self,
        entity: &E,
        on_conflict: ConflictAction,
    ) -> Result<(), DbError> {
        self.execute_transaction(vec![entity.upsert(on_conflict)])
            .await?;
        Ok(())
    }

    /// Apply `patch` to the row identified by `key`. Returns affected rows.
    async fn update<E: Entity>(&self, key: DbValue, patch: Patch) -> Result<u64, DbError> {
        if patch.is_empty() {
            return Ok(0);
        }
        self.execute_transaction(vec![E::update(key, patch)]).await
    }

    /// Bulk select with a filter, optional ordering and limit.
    async fn select<E: Entity>(
        &self,
        filter: WhereClause,
        order_by: Option<(&str, Order)>,
        limit: Option<usize>,
    ) -> Result<Vec<E>, DbError> {
        let mut select = E::select().filter(filter);
        if let Some((column, order)) = order_by {
            select = select.order_by(column, order);
        }
        if let Some(limit) = limit {
            select = select.limit(limit);
        }
        self.query(&select)
            .await?
            .iter()
            .map(E::from_record)
            .collect()
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}
