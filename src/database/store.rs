use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::manager::DatabaseError;
use super::schema::TableSchema;
use crate::filter::FilterData;

/// A stored row as a JSON object keyed by column name
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Stamp `deleted_at`; the row stays but is invisible
    Soft,
    /// Physically remove the row
    Hard,
}

/// Dependent rows removed together with their parent. `children` describes
/// the dependent's own cascade so deletes recurse through the graph.
#[derive(Clone, Serialize)]
pub struct Cascade {
    pub table: &'static str,
    pub foreign_key: &'static str,
    pub mode: DeleteMode,
    #[serde(skip)]
    pub children: fn() -> Vec<Cascade>,
}

impl std::fmt::Debug for Cascade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cascade")
            .field("table", &self.table)
            .field("foreign_key", &self.foreign_key)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Everything one delete must touch, executed all-or-nothing
#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub table: &'static str,
    pub id: i64,
    pub mode: DeleteMode,
    pub cascade: Vec<Cascade>,
}

/// Persistence seam used by the registry, the CRUD engine and the bespoke handlers
#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Create the table if missing and add any missing columns and indexes
    async fn migrate(&self, schema: &TableSchema) -> Result<(), DatabaseError>;

    /// Insert one row and return it as stored, including system columns
    async fn insert(&self, schema: &TableSchema, values: Row) -> Result<Row, DatabaseError>;

    /// Rows that are not soft-deleted and match the filter
    async fn select(&self, schema: &TableSchema, filter: FilterData) -> Result<Vec<Row>, DatabaseError>;

    /// Count of matching rows, ignoring limit and offset
    async fn count(&self, schema: &TableSchema, filter: FilterData) -> Result<i64, DatabaseError>;

    /// Apply changes to a live row, returning the number of rows affected
    async fn update(&self, schema: &TableSchema, id: i64, changes: Row) -> Result<u64, DatabaseError>;

    /// Run a cascading delete in one transaction, returning rows affected at the root
    async fn delete(&self, plan: &DeletePlan) -> Result<u64, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn select_one(&self, schema: &TableSchema, where_clause: Value) -> Result<Option<Row>, DatabaseError> {
        let mut filter = FilterData::where_eq(where_clause);
        filter.limit = Some(1);
        Ok(self.select(schema, filter).await?.into_iter().next())
    }

    async fn select_by_id(&self, schema: &TableSchema, id: i64) -> Result<Option<Row>, DatabaseError> {
        self.select_one(schema, json!({ "id": id })).await
    }
}

/// Read the numeric `id` column of a stored row
pub fn row_id(row: &Row) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}
