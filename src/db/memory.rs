//! In-process [`EntityStore`] used when no database is configured and in tests.
//!
//! Conflict and update semantics mirror the SQL produced by [`super::DbPool`]:
//! upserts resolve on their conflict columns, increments add decimal-string
//! NUMERIC values, and a transaction either applies fully or not at all.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::DbError;
use super::store::EntityStore;
use super::types::{
    Assignment, ConflictAction, DbOperation, DbValue, Order, Record, Select, WhereClause,
};

type Tables = HashMap<String, Vec<Record>>;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    transactions: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows currently stored in `table`.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of non-empty transactions executed so far.
    pub fn transaction_count(&self) -> usize {
        self.transactions.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn query(&self, select: &Select) -> Result<Vec<Record>, DbError> {
        let tables = self.tables.lock().await;
        let Some(rows) = tables.get(&select.table) else {
            return Ok(Vec::new());
        };

        let mut matching: Vec<&Record> = Vec::new();
        for row in rows {
            let keep = match &select.where_clause {
                Some(clause) => matches(row, clause),
                None => true,
            };
            if keep {
                matching.push(row);
            }
        }

        if !select.order_by.is_empty() {
            matching.sort_by(|a, b| {
                for (column, order) in &select.order_by {
                    let ord = compare(a.get(column), b.get(column));
                    let ord = match order {
                        Order::Asc => ord,
                        Order::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = select.limit {
            matching.truncate(limit);
        }

        Ok(matching
            .into_iter()
            .map(|row| {
                let mut projected = Record::new(select.table.clone());
                for (column, _) in &select.columns {
                    projected.set(
                        column.clone(),
                        row.get(column).cloned().unwrap_or(DbValue::Null),
                    );
                }
                projected
            })
            .collect())
    }

    async fn execute_transaction(&self, operations: Vec<DbOperation>) -> Result<u64, DbError> {
        if operations.is_empty() {
            return Ok(0);
        }

        let mut tables = self.tables.lock().await;
        let mut staged = tables.clone();
        let mut affected = 0;

        for op in operations {
            affected += match op {
                DbOperation::Upsert {
                    table,
                    columns,
                    values,
                    conflict_columns,
                    on_conflict,
                } => apply_upsert(
                    &mut staged,
                    &table,
                    columns.into_iter().zip(values).collect(),
                    &conflict_columns,
                    &on_conflict,
                )?,
                DbOperation::Update {
                    table,
                    assignments,
                    where_clause,
                } => apply_update(&mut staged, &table, &assignments, &where_clause)?,
            };
        }

        *tables = staged;
        self.transactions.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(affected)
    }
}

fn apply_upsert(
    tables: &mut Tables,
    table: &str,
    values: Vec<(String, DbValue)>,
    conflict_columns: &[String],
    on_conflict: &ConflictAction,
) -> Result<u64, DbError> {
    let rows = tables.entry(table.to_string()).or_default();

    let mut incoming = Record::new(table);
    for (column, value) in values {
        incoming.set(column, value);
    }

    let position = rows.iter().position(|row| {
        conflict_columns
            .iter()
            .all(|c| values_equal(row.get(c), incoming.get(c)))
    });

    let Some(position) = position else {
        rows.push(incoming);
        return Ok(1);
    };
    let existing = &mut rows[position];

    match on_conflict {
        ConflictAction::DoNothing => Ok(0),
        ConflictAction::Overwrite(columns) if columns.is_empty() => Ok(0),
        ConflictAction::Increment(columns) if columns.is_empty() => Ok(0),
        ConflictAction::Overwrite(columns) => {
            for column in columns {
                let value = incoming.get(column).cloned().unwrap_or(DbValue::Null);
                existing.set(column.clone(), value);
            }
            Ok(1)
        }
        ConflictAction::Increment(columns) => {
            for column in columns {
                let sum = add_numeric(table, column, existing.get(column), incoming.get(column))?;
                existing.set(column.clone(), sum);
            }
            Ok(1)
        }
    }
}

fn apply_update(
    tables: &mut Tables,
    table: &str,
    assignments: &[(String, Assignment)],
    where_clause: &WhereClause,
) -> Result<u64, DbError> {
    let Some(rows) = tables.get_mut(table) else {
        return Ok(0);
    };

    let mut affected = 0;
    for row in rows.iter_mut() {
        if !matches(row, where_clause) {
            continue;
        }
        for (column, assignment) in assignments {
            let value = match assignment {
                Assignment::Set(value) => value.clone(),
                Assignment::Add(delta) => add_numeric(table, column, row.get(column), Some(delta))?,
            };
            row.set(column.clone(), value);
        }
        affected += 1;
    }

    Ok(affected)
}

fn matches(row: &Record, clause: &WhereClause) -> bool {
    match clause {
        WhereClause::Eq(column, value) => values_equal(row.get(column), Some(value)),
        WhereClause::In(column, values) => values
            .iter()
            .any(|value| values_equal(row.get(column), Some(value))),
        WhereClause::All(clauses) => clauses.iter().all(|clause| matches(row, clause)),
    }
}

/// SQL equality: NULL never matches, NUMERIC compares by value.
fn values_equal(left: Option<&DbValue>, right: Option<&DbValue>) -> bool {
    match (left, right) {
        (Some(DbValue::Numeric(a)), Some(DbValue::Numeric(b))) => {
            match (U256::from_str(a), U256::from_str(b)) {
                (Ok(a), Ok(b)) => a == b,
                _ => a == b,
            }
        }
        (Some(DbValue::Null), _) | (_, Some(DbValue::Null)) | (None, _) | (_, None) => false,
        (Some(a), Some(b)) => a == b,
    }
}

/// Ordering used for ORDER BY. NULLs sort last in ascending order, as in PostgreSQL.
fn compare(left: Option<&DbValue>, right: Option<&DbValue>) -> Ordering {
    let left = left.filter(|v| !v.is_null());
    let right = right.filter(|v| !v.is_null());
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (DbValue::Int64(a), DbValue::Int64(b)) => a.cmp(b),
            (DbValue::Int2(a), DbValue::Int2(b)) => a.cmp(b),
            (DbValue::Bool(a), DbValue::Bool(b)) => a.cmp(b),
            (DbValue::Text(a), DbValue::Text(b)) => a.cmp(b),
            (DbValue::Address(a), DbValue::Address(b)) => a.cmp(b),
            (DbValue::Numeric(a), DbValue::Numeric(b)) => {
                match (U256::from_str(a), U256::from_str(b)) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    _ => a.cmp(b),
                }
            }
            _ => Ordering::Equal,
        },
    }
}

fn parse_numeric(table: &str, column: &str, value: Option<&DbValue>) -> Result<U256, DbError> {
    match value {
        None | Some(DbValue::Null) => Ok(U256::ZERO),
        Some(DbValue::Numeric(s)) => U256::from_str(s)
            .map_err(|e| DbError::decode(table, column, format!("invalid numeric '{}': {}", s, e))),
        Some(other) => Err(DbError::decode(
            table,
            column,
            format!("expected numeric but got {:?}", other),
        )),
    }
}

fn add_numeric(
    table: &str,
    column: &str,
    current: Option<&DbValue>,
    delta: Option<&DbValue>,
) -> Result<DbValue, DbError> {
    let current = parse_numeric(table, column, current)?;
    let delta = parse_numeric(table, column, delta)?;
    let sum = current
        .checked_add(delta)
        .ok_or_else(|| DbError::Overflow(column.to_string()))?;
    Ok(DbValue::Numeric(sum.to_string()))
}
