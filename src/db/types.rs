use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use super::error::DbError;

/// A value that can be stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 64-bit integer (block numbers, unix timestamps)
    Int64(i64),
    /// Unsigned 8-bit integer (stored as SMALLINT/INT2)
    Int2(u8),
    /// Text (unlimited length)
    Text(String),
    /// Ethereum address (20 bytes, stored as BYTEA)
    Address([u8; 20]),
    /// Decimal string for uint256 amounts and counters (stored as NUMERIC)
    Numeric(String),
    /// JSONB value
    JsonB(JsonValue),
}

impl DbValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Address column that may be unset.
    pub fn opt_address(address: Option<[u8; 20]>) -> Self {
        address.map(DbValue::Address).unwrap_or(DbValue::Null)
    }
}

/// How a column is decoded when read back from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Int64,
    Int2,
    Text,
    Address,
    Numeric,
    JsonB,
}

/// A single row read from (or written to) a table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    table: String,
    values: BTreeMap<String, DbValue>,
}

impl Record {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: DbValue) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: DbValue) {
        self.values.insert(column.into(), value);
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self, column: &str) -> Option<&DbValue> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &DbValue)> {
        self.values.iter()
    }

    fn required(&self, column: &str) -> Result<&DbValue, DbError> {
        self.values
            .get(column)
            .ok_or_else(|| DbError::decode(&self.table, column, "missing column"))
    }

    fn mismatch(&self, column: &str, expected: &str, got: &DbValue) -> DbError {
        DbError::decode(
            &self.table,
            column,
            format!("expected {} but got {:?}", expected, got),
        )
    }

    pub fn bool(&self, column: &str) -> Result<bool, DbError> {
        match self.required(column)? {
            DbValue::Bool(v) => Ok(*v),
            other => Err(self.mismatch(column, "bool", other)),
        }
    }

    pub fn int64(&self, column: &str) -> Result<i64, DbError> {
        match self.required(column)? {
            DbValue::Int64(v) => Ok(*v),
            other => Err(self.mismatch(column, "int64", other)),
        }
    }

    pub fn opt_int64(&self, column: &str) -> Result<Option<i64>, DbError> {
        match self.required(column)? {
            DbValue::Null => Ok(None),
            DbValue::Int64(v) => Ok(Some(*v)),
            other => Err(self.mismatch(column, "int64 or null", other)),
        }
    }

    pub fn int2(&self, column: &str) -> Result<u8, DbError> {
        match self.required(column)? {
            DbValue::Int2(v) => Ok(*v),
            other => Err(self.mismatch(column, "int2", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<&str, DbError> {
        match self.required(column)? {
            DbValue::Text(v) => Ok(v),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn address(&self, column: &str) -> Result<[u8; 20], DbError> {
        match self.required(column)? {
            DbValue::Address(v) => Ok(*v),
            other => Err(self.mismatch(column, "address", other)),
        }
    }

    pub fn opt_address(&self, column: &str) -> Result<Option<[u8; 20]>, DbError> {
        match self.required(column)? {
            DbValue::Null => Ok(None),
            DbValue::Address(v) => Ok(Some(*v)),
            other => Err(self.mismatch(column, "address or null", other)),
        }
    }

    pub fn numeric(&self, column: &str) -> Result<&str, DbError> {
        match self.required(column)? {
            DbValue::Numeric(v) => Ok(v),
            other => Err(self.mismatch(column, "numeric", other)),
        }
    }

    pub fn jsonb(&self, column: &str) -> Result<&JsonValue, DbError> {
        match self.required(column)? {
            DbValue::JsonB(v) => Ok(v),
            other => Err(self.mismatch(column, "jsonb", other)),
        }
    }
}

/// What to do when an upsert hits an existing row on its conflict columns.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    /// Keep the existing row untouched.
    DoNothing,
    /// `col = EXCLUDED.col` for each listed column.
    Overwrite(Vec<String>),
    /// `col = table.col + EXCLUDED.col` for each listed column.
    Increment(Vec<String>),
}

/// Right-hand side of a column assignment in an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `col = value`
    Set(DbValue),
    /// `col = col + value` (numeric columns only)
    Add(DbValue),
}

/// An immutable set of column assignments applied to one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    assignments: Vec<(String, Assignment)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: DbValue) -> Self {
        self.assignments.push((column.into(), Assignment::Set(value)));
        self
    }

    pub fn add(mut self, column: impl Into<String>, value: DbValue) -> Self {
        self.assignments.push((column.into(), Assignment::Add(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignments(&self) -> &[(String, Assignment)] {
        &self.assignments
    }

    /// Plain `Set` assignments, used to seed a freshly inserted row.
    pub fn set_values(&self) -> impl Iterator<Item = (&String, &DbValue)> {
        self.assignments.iter().filter_map(|(col, a)| match a {
            Assignment::Set(v) => Some((col, v)),
            Assignment::Add(_) => None,
        })
    }

    pub fn into_assignments(self) -> Vec<(String, Assignment)> {
        self.assignments
    }
}

/// Database operation executed by the store.
///
/// Creates are always upserts keyed on the entity's unique columns.
#[derive(Debug, Clone)]
pub enum DbOperation {
    /// INSERT ... ON CONFLICT (conflict_columns) <on_conflict>
    Upsert {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
        /// Columns that form the unique constraint
        conflict_columns: Vec<String>,
        on_conflict: ConflictAction,
    },
    /// UPDATE with WHERE clause
    Update {
        table: String,
        assignments: Vec<(String, Assignment)>,
        where_clause: WhereClause,
    },
}

/// WHERE clause for SELECT and UPDATE operations.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// column = value
    Eq(String, DbValue),
    /// column IN (values...)
    In(String, Vec<DbValue>),
    /// clause1 AND clause2 AND ...
    All(Vec<WhereClause>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A read against a single table.
#[derive(Debug, Clone)]
pub struct Select {
    pub table: String,
    pub columns: Vec<(String, ColumnKind)>,
    pub where_clause: Option<WhereClause>,
    pub order_by: Vec<(String, Order)>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn new(table: impl Into<String>, columns: &[(&str, ColumnKind)]) -> Self {
        Self {
            table: table.into(),
            columns: columns
                .iter()
                .map(|(name, kind)| (name.to_string(), *kind))
                .collect(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            None => clause,
            Some(WhereClause::All(mut clauses)) => {
                clauses.push(clause);
                WhereClause::All(clauses)
            }
            Some(existing) => WhereClause::All(vec![existing, clause]),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
