use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::{Executor, Row as _};

use super::manager::DatabaseError;
use super::store::Row;
use crate::filter::SqlResult;

/// Build a query with every JSON parameter bound in order
pub fn bind_params(sql: &SqlResult) -> Query<'_, Postgres, PgArguments> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param(q, p);
    }
    q
}

fn bind_param<'q>(q: Query<'q, Postgres, PgArguments>, v: &'q Value) -> Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays are expanded by FilterWhere; anything structured goes in as JSON
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

/// Run a SELECT and read each row back as a JSON object via `row_to_json`
pub async fn fetch_rows<'c, E>(executor: E, sql: &SqlResult) -> Result<Vec<Row>, DatabaseError>
where
    E: Executor<'c, Database = Postgres>,
{
    let wrapped = SqlResult {
        query: format!("SELECT row_to_json(t) AS row FROM ({}) t", sql.query),
        params: sql.params.clone(),
    };
    let rows = bind_params(&wrapped).fetch_all(executor).await.map_err(map_sqlx_error)?;
    rows.iter().map(|r| json_row(r.try_get("row").map_err(map_sqlx_error)?)).collect()
}

/// Run a statement whose result set is a single `row` JSON column
pub async fn fetch_json<'c, E>(executor: E, sql: &SqlResult) -> Result<Option<Row>, DatabaseError>
where
    E: Executor<'c, Database = Postgres>,
{
    let row = bind_params(sql).fetch_optional(executor).await.map_err(map_sqlx_error)?;
    match row {
        Some(r) => Ok(Some(json_row(r.try_get("row").map_err(map_sqlx_error)?)?)),
        None => Ok(None),
    }
}

pub async fn execute<'c, E>(executor: E, sql: &SqlResult) -> Result<u64, DatabaseError>
where
    E: Executor<'c, Database = Postgres>,
{
    let result = bind_params(sql).execute(executor).await.map_err(map_sqlx_error)?;
    Ok(result.rows_affected())
}

fn json_row(value: Value) -> Result<Row, DatabaseError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::QueryError(format!("expected JSON object row, got {}", other))),
    }
}

/// Classify driver errors; unique violations carry the offending column
pub fn map_sqlx_error(err: sqlx::Error) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let column = db_err
                .constraint()
                .and_then(|c| c.strip_suffix("_key"))
                .and_then(|c| c.split_once("__").map(|(_, col)| col.to_string()))
                .unwrap_or_else(|| "value".to_string());
            DatabaseError::UniqueViolation(column)
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DatabaseError::Unavailable(err.to_string())
        }
        _ => DatabaseError::Sqlx(err),
    }
}
