use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use super::manager::DatabaseError;
use super::query_builder::{execute, fetch_json, fetch_rows, map_sqlx_error};
use super::schema::{FieldType, TableSchema};
use super::store::{Cascade, DeleteMode, DeletePlan, Row, Store};
use crate::filter::{Filter, FilterData, SqlResult};

/// PostgreSQL store backed by a sqlx pool
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn filter_for(schema: &TableSchema, data: FilterData) -> Result<Filter, DatabaseError> {
        let mut filter = Filter::new(schema.table)?;
        filter.casts(schema.casts()).assign(data)?;
        Ok(filter)
    }

    fn check_columns(schema: &TableSchema, values: &Row) -> Result<(), DatabaseError> {
        for key in values.keys() {
            if schema.column(key).is_none() {
                return Err(DatabaseError::UnknownColumn { table: schema.table.to_string(), column: key.clone() });
            }
        }
        Ok(())
    }

    fn cast(schema: &TableSchema, column: &str) -> &'static str {
        schema.column(column).map(|c| c.field_type.sql_type()).unwrap_or("text")
    }

    fn foreign_key_filter(table: &'static str, foreign_key: &'static str, ids: &[i64]) -> Result<Filter, DatabaseError> {
        let mut filter = Filter::new(table)?;
        filter
            .casts([(foreign_key.to_string(), FieldType::Reference.sql_type())].into_iter().collect())
            .where_clause(json!({ foreign_key: { "$in": ids } }))?;
        Ok(filter)
    }

    /// Walk the cascade graph collecting `(cascade, parent ids)` steps, parents first
    async fn collect_steps(
        tx: &mut Transaction<'_, Postgres>,
        root_id: i64,
        cascade: &[Cascade],
    ) -> Result<Vec<(Cascade, Vec<i64>)>, DatabaseError> {
        let mut steps = Vec::new();
        let mut pending: Vec<(Cascade, Vec<i64>)> = cascade.iter().map(|c| (c.clone(), vec![root_id])).collect();

        while let Some((step, parent_ids)) = pending.pop() {
            let filter = Self::foreign_key_filter(step.table, step.foreign_key, &parent_ids)?;
            let sql = filter.to_sql()?;
            let child_ids: Vec<i64> = fetch_rows(&mut **tx, &sql)
                .await?
                .iter()
                .filter_map(|row| row.get("id").and_then(Value::as_i64))
                .collect();

            if !child_ids.is_empty() {
                for child in (step.children)() {
                    pending.push((child, child_ids.clone()));
                }
            }
            steps.push((step, parent_ids));
        }
        Ok(steps)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn migrate(&self, schema: &TableSchema) -> Result<(), DatabaseError> {
        let table = schema.table;
        Filter::new(table)?;

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\
             \"id\" BIGSERIAL PRIMARY KEY, \
             \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             \"deleted_at\" TIMESTAMPTZ NULL)"
        )];
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS \"{table}__deleted_at_idx\" ON \"{table}\" (\"deleted_at\")"
        ));

        for column in &schema.columns {
            Filter::validate_column(column.name)?;
            statements.push(format!(
                "ALTER TABLE \"{table}\" ADD COLUMN IF NOT EXISTS \"{}\" {}",
                column.name,
                column.field_type.sql_type()
            ));
            if column.unique {
                // Soft-deleted rows must not block reuse of the value
                statements.push(format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS \"{table}__{col}_key\" ON \"{table}\" (\"{col}\") WHERE \"deleted_at\" IS NULL",
                    col = column.name
                ));
            } else if column.field_type == FieldType::Reference {
                statements.push(format!(
                    "CREATE INDEX IF NOT EXISTS \"{table}__{col}_idx\" ON \"{table}\" (\"{col}\")",
                    col = column.name
                ));
            }
        }

        for statement in &statements {
            debug!(sql = %statement, "migrate");
            sqlx::query(statement).execute(&self.pool).await.map_err(map_sqlx_error)?;
        }
        info!(table, columns = schema.columns.len(), "Table ready");
        Ok(())
    }

    async fn insert(&self, schema: &TableSchema, values: Row) -> Result<Row, DatabaseError> {
        Self::check_columns(schema, &values)?;
        let table = schema.table;

        let sql = if values.is_empty() {
            SqlResult {
                query: format!("WITH ins AS (INSERT INTO \"{table}\" DEFAULT VALUES RETURNING *) SELECT row_to_json(ins) AS row FROM ins"),
                params: vec![],
            }
        } else {
            let mut columns = Vec::with_capacity(values.len());
            let mut placeholders = Vec::with_capacity(values.len());
            let mut params = Vec::with_capacity(values.len());
            for (i, (column, value)) in values.into_iter().enumerate() {
                placeholders.push(format!("${}::{}", i + 1, Self::cast(schema, &column)));
                columns.push(format!("\"{}\"", column));
                params.push(value);
            }
            SqlResult {
                query: format!(
                    "WITH ins AS (INSERT INTO \"{table}\" ({}) VALUES ({}) RETURNING *) SELECT row_to_json(ins) AS row FROM ins",
                    columns.join(", "),
                    placeholders.join(", ")
                ),
                params,
            }
        };

        fetch_json(&self.pool, &sql)
            .await?
            .ok_or_else(|| DatabaseError::QueryError(format!("insert into {table} returned no row")))
    }

    async fn select(&self, schema: &TableSchema, filter: FilterData) -> Result<Vec<Row>, DatabaseError> {
        let sql = Self::filter_for(schema, filter)?.to_sql()?;
        debug!(sql = %sql.query, "select");
        fetch_rows(&self.pool, &sql).await
    }

    async fn count(&self, schema: &TableSchema, mut filter: FilterData) -> Result<i64, DatabaseError> {
        filter.limit = None;
        filter.offset = None;
        filter.order = None;
        let sql = Self::filter_for(schema, filter)?.to_count_sql()?;
        let wrapped = SqlResult {
            query: format!("SELECT json_build_object('count', c.count) AS row FROM ({}) c", sql.query),
            params: sql.params,
        };
        let row = fetch_json(&self.pool, &wrapped).await?;
        Ok(row.and_then(|r| r.get("count").and_then(Value::as_i64)).unwrap_or(0))
    }

    async fn update(&self, schema: &TableSchema, id: i64, changes: Row) -> Result<u64, DatabaseError> {
        Self::check_columns(schema, &changes)?;

        let mut assignments = Vec::with_capacity(changes.len() + 1);
        let mut params = Vec::with_capacity(changes.len() + 1);
        for (i, (column, value)) in changes.into_iter().enumerate() {
            assignments.push(format!("\"{}\" = ${}::{}", column, i + 1, Self::cast(schema, &column)));
            params.push(value);
        }
        assignments.push("\"updated_at\" = NOW()".to_string());
        params.push(json!(id));

        let sql = SqlResult {
            query: format!(
                "UPDATE \"{}\" SET {} WHERE \"id\" = ${}::bigint AND \"deleted_at\" IS NULL",
                schema.table,
                assignments.join(", "),
                params.len()
            ),
            params,
        };
        execute(&self.pool, &sql).await
    }

    async fn delete(&self, plan: &DeletePlan) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let root = Self::foreign_key_filter(plan.table, "id", &[plan.id])?;
        let root_sql = match plan.mode {
            DeleteMode::Soft => root.to_soft_delete_sql()?,
            DeleteMode::Hard => root.to_hard_delete_sql()?,
        };
        let affected = execute(&mut *tx, &root_sql).await?;
        if affected == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(0);
        }

        let steps = Self::collect_steps(&mut tx, plan.id, &plan.cascade).await?;
        // Deepest dependents first
        for (step, parent_ids) in steps.iter().rev() {
            let filter = Self::foreign_key_filter(step.table, step.foreign_key, parent_ids)?;
            let sql = match step.mode {
                DeleteMode::Soft => filter.to_soft_delete_sql()?,
                DeleteMode::Hard => filter.to_hard_delete_sql()?,
            };
            let removed = execute(&mut *tx, &sql).await?;
            debug!(table = step.table, foreign_key = step.foreign_key, removed, "cascade");
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(affected)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
