use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use super::error::DbError;
use super::store::EntityStore;
use super::types::{
    Assignment, ColumnKind, ConflictAction, DbOperation, DbValue, Order, Record, Select,
    WhereClause,
};

pub struct DbPool {
    pool: Pool,
}

impl DbPool {
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let config = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| DbError::InvalidConnectionString(e.to_string()))?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_config(config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(16)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(DbError::BuildError)?;

        let _conn = pool.get().await?;
        tracing::info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), DbError> {
        super::migrations::run(&self.pool).await
    }
}

#[async_trait]
impl EntityStore for DbPool {
    async fn query(&self, select: &Select) -> Result<Vec<Record>, DbError> {
        let (sql, params) = build_select_sql(select);
        let params_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let client = self.pool.get().await?;
        let rows = client.query(&sql, &params_refs[..]).await.map_err(|e| {
            let db_err: DbError = e.into();
            tracing::error!("SQL query failed\n  SQL: {}\n  Error: {}", sql, db_err);
            db_err
        })?;

        rows.iter()
            .map(|row| decode_row(&select.table, &select.columns, row))
            .collect()
    }

    async fn execute_transaction(&self, operations: Vec<DbOperation>) -> Result<u64, DbError> {
        if operations.is_empty() {
            return Ok(0);
        }

        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        let mut affected = 0;

        for op in operations {
            let (sql, params) = match op {
                DbOperation::Upsert {
                    table,
                    columns,
                    values,
                    conflict_columns,
                    on_conflict,
                } => build_upsert_sql(&table, &columns, &values, &conflict_columns, &on_conflict),
                DbOperation::Update {
                    table,
                    assignments,
                    where_clause,
                } => build_update_sql(&table, &assignments, &where_clause),
            };

            let params_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            match transaction.execute(&sql, &params_refs[..]).await {
                Ok(n) => affected += n,
                Err(e) => {
                    let db_err: DbError = e.into();
                    tracing::error!("SQL execution failed\n  SQL: {}\n  Error: {}", sql, db_err);
                    return Err(db_err);
                }
            }
        }

        transaction.commit().await?;
        Ok(affected)
    }
}

#[derive(Debug)]
enum SqlParam {
    Null,
    Bool(bool),
    Int64(i64),
    Int16(i16),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &tokio_postgres::types::Type,
        out: &mut BytesMut,
    ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlParam::Null => Ok(tokio_postgres::types::IsNull::Yes),
            SqlParam::Bool(v) => v.to_sql(ty, out),
            SqlParam::Int64(v) => v.to_sql(ty, out),
            SqlParam::Int16(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => v.to_sql(ty, out),
            SqlParam::Bytes(v) => v.to_sql(ty, out),
            SqlParam::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &tokio_postgres::types::Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <i16 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <Vec<u8> as ToSql>::accepts(ty)
            || <serde_json::Value as ToSql>::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

fn convert_db_value(value: &DbValue) -> SqlParam {
    match value {
        DbValue::Null => SqlParam::Null,
        DbValue::Bool(v) => SqlParam::Bool(*v),
        DbValue::Int64(v) => SqlParam::Int64(*v),
        DbValue::Int2(v) => SqlParam::Int16(*v as i16),
        DbValue::Text(v) => SqlParam::Text(v.clone()),
        DbValue::Address(v) => SqlParam::Bytes(v.to_vec()),
        DbValue::Numeric(v) => SqlParam::Text(v.clone()),
        DbValue::JsonB(v) => SqlParam::Json(v.clone()),
    }
}

fn convert_values_to_params(values: &[DbValue]) -> Vec<SqlParam> {
    values.iter().map(convert_db_value).collect()
}

/// Generate the SQL placeholder for a value at the given parameter index.
/// Numeric values are sent as text and cast by PostgreSQL.
fn placeholder_for(value: &DbValue, param_idx: usize) -> String {
    match value {
        DbValue::Numeric(_) => format!("${}::text::numeric", param_idx),
        _ => format!("${}", param_idx),
    }
}

/// Wrap a column name in double quotes to handle reserved keywords.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

fn quote_cols(columns: &[String]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

fn build_upsert_sql(
    table: &str,
    columns: &[String],
    values: &[DbValue],
    conflict_columns: &[String],
    on_conflict: &ConflictAction,
) -> (String, Vec<SqlParam>) {
    let cols = quote_cols(columns);
    let placeholders: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| placeholder_for(v, i + 1))
        .collect();
    let placeholders_str = placeholders.join(", ");
    let conflict_cols = quote_cols(conflict_columns);

    let action = match on_conflict {
        ConflictAction::DoNothing => "DO NOTHING".to_string(),
        ConflictAction::Overwrite(update_columns) if update_columns.is_empty() => {
            "DO NOTHING".to_string()
        }
        ConflictAction::Overwrite(update_columns) => {
            let updates: Vec<String> = update_columns
                .iter()
                .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
                .collect();
            format!("DO UPDATE SET {}", updates.join(", "))
        }
        ConflictAction::Increment(update_columns) if update_columns.is_empty() => {
            "DO NOTHING".to_string()
        }
        ConflictAction::Increment(update_columns) => {
            let updates: Vec<String> = update_columns
                .iter()
                .map(|c| {
                    format!(
                        "{col} = {table}.{col} + EXCLUDED.{col}",
                        col = quote_ident(c),
                        table = table
                    )
                })
                .collect();
            format!("DO UPDATE SET {}", updates.join(", "))
        }
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        table, cols, placeholders_str, conflict_cols, action
    );

    let params = convert_values_to_params(values);
    (sql, params)
}

fn build_update_sql(
    table: &str,
    assignments: &[(String, Assignment)],
    where_clause: &WhereClause,
) -> (String, Vec<SqlParam>) {
    let mut params = Vec::new();
    let mut param_idx = 1;

    let sets: Vec<String> = assignments
        .iter()
        .map(|(col, assignment)| {
            let (val, additive) = match assignment {
                Assignment::Set(v) => (v, false),
                Assignment::Add(v) => (v, true),
            };
            let ph = placeholder_for(val, param_idx);
            params.push(convert_db_value(val));
            param_idx += 1;
            if additive {
                format!("{} = {} + {}", quote_ident(col), quote_ident(col), ph)
            } else {
                format!("{} = {}", quote_ident(col), ph)
            }
        })
        .collect();
    let sets_str = sets.join(", ");

    let where_str = build_where_sql(where_clause, &mut params, &mut param_idx);

    let sql = format!("UPDATE {} SET {} WHERE {}", table, sets_str, where_str);
    (sql, params)
}

fn build_select_sql(select: &Select) -> (String, Vec<SqlParam>) {
    let mut params = Vec::new();
    let mut param_idx = 1;

    // NUMERIC has no native text decoding in tokio-postgres, read it back as text.
    let cols: Vec<String> = select
        .columns
        .iter()
        .map(|(name, kind)| match kind {
            ColumnKind::Numeric => format!("{}::text AS {}", quote_ident(name), quote_ident(name)),
            _ => quote_ident(name),
        })
        .collect();

    let mut sql = format!("SELECT {} FROM {}", cols.join(", "), select.table);

    if let Some(where_clause) = &select.where_clause {
        let where_str = build_where_sql(where_clause, &mut params, &mut param_idx);
        sql.push_str(&format!(" WHERE {}", where_str));
    }

    if !select.order_by.is_empty() {
        let orders: Vec<String> = select
            .order_by
            .iter()
            .map(|(col, order)| {
                let dir = match order {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                format!("{} {}", quote_ident(col), dir)
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
    }

    if let Some(limit) = select.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    (sql, params)
}

fn build_where_sql(
    where_clause: &WhereClause,
    params: &mut Vec<SqlParam>,
    param_idx: &mut usize,
) -> String {
    let mut eq = |col: &str, val: &DbValue, params: &mut Vec<SqlParam>| {
        let ph = placeholder_for(val, *param_idx);
        params.push(convert_db_value(val));
        *param_idx += 1;
        format!("{} = {}", quote_ident(col), ph)
    };

    match where_clause {
        WhereClause::Eq(col, val) => eq(col, val, params),
        WhereClause::In(col, vals) => {
            if vals.is_empty() {
                return "FALSE".to_string();
            }
            let placeholders: Vec<String> = vals
                .iter()
                .map(|val| {
                    let ph = placeholder_for(val, *param_idx);
                    params.push(convert_db_value(val));
                    *param_idx += 1;
                    ph
                })
                .collect();
            format!("{} IN ({})", quote_ident(col), placeholders.join(", "))
        }
        WhereClause::All(clauses) => {
            let parts: Vec<String> = clauses
                .iter()
                .map(|clause| format!("({})", build_where_sql(clause, params, param_idx)))
                .collect();
            parts.join(" AND ")
        }
    }
}

fn decode_row(
    table: &str,
    columns: &[(String, ColumnKind)],
    row: &tokio_postgres::Row,
) -> Result<Record, DbError> {
    let mut record = Record::new(table);

    for (idx, (name, kind)) in columns.iter().enumerate() {
        let value = match kind {
            ColumnKind::Bool => row
                .try_get::<_, Option<bool>>(idx)?
                .map(DbValue::Bool),
            ColumnKind::Int64 => row
                .try_get::<_, Option<i64>>(idx)?
                .map(DbValue::Int64),
            ColumnKind::Int2 => match row.try_get::<_, Option<i16>>(idx)? {
                Some(v) => Some(DbValue::Int2(u8::try_from(v).map_err(|_| {
                    DbError::decode(table, name, format!("{} does not fit in u8", v))
                })?)),
                None => None,
            },
            ColumnKind::Text => row
                .try_get::<_, Option<String>>(idx)?
                .map(DbValue::Text),
            ColumnKind::Numeric => row
                .try_get::<_, Option<String>>(idx)?
                .map(DbValue::Numeric),
            ColumnKind::JsonB => row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map(DbValue::JsonB),
            ColumnKind::Address => match row.try_get::<_, Option<Vec<u8>>>(idx)? {
                Some(bytes) => {
                    let address: [u8; 20] = bytes.as_slice().try_into().map_err(|_| {
                        DbError::decode(table, name, format!("expected 20 bytes, got {}", bytes.len()))
                    })?;
                    Some(DbValue::Address(address))
                }
                None => None,
            },
        };
        record.set(name.clone(), value.unwrap_or(DbValue::Null));
    }

    Ok(record)
}
