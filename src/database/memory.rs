use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::manager::DatabaseError;
use super::schema::TableSchema;
use super::store::{Cascade, DeleteMode, DeletePlan, Row, Store};
use crate::filter::{FilterData, FilterOp, FilterOrder, FilterWhere, FilterWhereInfo, SortDirection};

#[derive(Debug, Clone)]
struct MemTable {
    schema: TableSchema,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl MemTable {
    fn live(&self) -> impl Iterator<Item = &Row> {
        self.rows.values().filter(|row| row.get("deleted_at").map_or(true, Value::is_null))
    }

    fn check_unique(&self, candidate: &Row, skip_id: Option<i64>) -> Result<(), DatabaseError> {
        for column in self.schema.unique_columns() {
            let value = match candidate.get(column.name) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let taken = self.live().any(|row| {
                row.get("id").and_then(Value::as_i64) != skip_id
                    && row.get(column.name).map_or(false, |existing| values_equal(existing, value))
            });
            if taken {
                return Err(DatabaseError::UniqueViolation(column.name.to_string()));
            }
        }
        Ok(())
    }

    fn matching(&self, conditions: &[FilterWhereInfo]) -> Vec<&Row> {
        self.live().filter(|row| conditions.iter().all(|c| condition_matches(row, c))).collect()
    }
}

/// In-process store with the same visibility, uniqueness and cascade rules as
/// the PostgreSQL backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, MemTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<&'static str, MemTable>>, DatabaseError> {
        self.tables
            .lock()
            .map_err(|_| DatabaseError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn now() -> Value {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    fn check_columns(schema: &TableSchema, values: &Row) -> Result<(), DatabaseError> {
        for key in values.keys() {
            if schema.column(key).is_none() {
                return Err(DatabaseError::UnknownColumn { table: schema.table.to_string(), column: key.clone() });
            }
        }
        Ok(())
    }

    fn table<'a>(tables: &'a HashMap<&'static str, MemTable>, name: &str) -> Result<&'a MemTable, DatabaseError> {
        tables.get(name).ok_or_else(|| DatabaseError::UnknownTable(name.to_string()))
    }

    fn table_mut<'a>(tables: &'a mut HashMap<&'static str, MemTable>, name: &str) -> Result<&'a mut MemTable, DatabaseError> {
        tables.get_mut(name).ok_or_else(|| DatabaseError::UnknownTable(name.to_string()))
    }

    fn remove_where(
        tables: &mut HashMap<&'static str, MemTable>,
        table: &str,
        column: &str,
        ids: &[i64],
        mode: DeleteMode,
    ) -> Result<Vec<i64>, DatabaseError> {
        let now = Self::now();
        let target = Self::table_mut(tables, table)?;
        let hits: Vec<i64> = target
            .live()
            .filter(|row| row.get(column).and_then(Value::as_i64).map_or(false, |v| ids.contains(&v)))
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .collect();
        for id in &hits {
            match mode {
                DeleteMode::Hard => {
                    target.rows.remove(id);
                }
                DeleteMode::Soft => {
                    if let Some(row) = target.rows.get_mut(id) {
                        row.insert("deleted_at".to_string(), now.clone());
                        row.insert("updated_at".to_string(), now.clone());
                    }
                }
            }
        }
        Ok(hits)
    }

    fn cascade(
        tables: &mut HashMap<&'static str, MemTable>,
        steps: &[Cascade],
        parent_ids: &[i64],
    ) -> Result<(), DatabaseError> {
        for step in steps {
            let removed = Self::remove_where(tables, step.table, step.foreign_key, parent_ids, step.mode)?;
            if !removed.is_empty() {
                Self::cascade(tables, &(step.children)(), &removed)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn migrate(&self, schema: &TableSchema) -> Result<(), DatabaseError> {
        let mut tables = self.lock()?;
        let table = tables.entry(schema.table).or_insert_with(|| MemTable {
            schema: schema.clone(),
            rows: BTreeMap::new(),
            next_id: 1,
        });
        for column in &schema.columns {
            for row in table.rows.values_mut() {
                row.entry(column.name.to_string()).or_insert(Value::Null);
            }
        }
        table.schema = schema.clone();
        Ok(())
    }

    async fn insert(&self, schema: &TableSchema, values: Row) -> Result<Row, DatabaseError> {
        Self::check_columns(schema, &values)?;
        let mut tables = self.lock()?;
        let table = Self::table_mut(&mut tables, schema.table)?;

        let mut row = Row::new();
        for column in &table.schema.columns {
            row.insert(column.name.to_string(), values.get(column.name).cloned().unwrap_or(Value::Null));
        }
        table.check_unique(&row, None)?;

        let id = table.next_id;
        table.next_id += 1;
        let now = Self::now();
        row.insert("id".to_string(), Value::from(id));
        row.insert("created_at".to_string(), now.clone());
        row.insert("updated_at".to_string(), now);
        row.insert("deleted_at".to_string(), Value::Null);

        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn select(&self, schema: &TableSchema, filter: FilterData) -> Result<Vec<Row>, DatabaseError> {
        let conditions = match &filter.where_clause {
            Some(w) => FilterWhere::parse(w)?,
            None => vec![],
        };
        let order = match &filter.order {
            Some(o) => FilterOrder::validate_and_parse(o)?,
            None => vec![],
        };

        let tables = self.lock()?;
        let table = Self::table(&tables, schema.table)?;
        let mut rows: Vec<Row> = table.matching(&conditions).into_iter().cloned().collect();

        if !order.is_empty() {
            rows.sort_by(|a, b| {
                for info in &order {
                    let left = a.get(&info.column).unwrap_or(&Value::Null);
                    let right = b.get(&info.column).unwrap_or(&Value::Null);
                    let ord = compare_values(left, right);
                    let ord = if info.sort == SortDirection::Desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, schema: &TableSchema, filter: FilterData) -> Result<i64, DatabaseError> {
        let conditions = match &filter.where_clause {
            Some(w) => FilterWhere::parse(w)?,
            None => vec![],
        };
        let tables = self.lock()?;
        let table = Self::table(&tables, schema.table)?;
        Ok(table.matching(&conditions).len() as i64)
    }

    async fn update(&self, schema: &TableSchema, id: i64, changes: Row) -> Result<u64, DatabaseError> {
        Self::check_columns(schema, &changes)?;
        let mut tables = self.lock()?;
        let table = Self::table_mut(&mut tables, schema.table)?;

        let mut updated = match table.rows.get(&id) {
            Some(row) if row.get("deleted_at").map_or(true, Value::is_null) => row.clone(),
            _ => return Ok(0),
        };
        for (column, value) in changes {
            updated.insert(column, value);
        }
        table.check_unique(&updated, Some(id))?;
        updated.insert("updated_at".to_string(), Self::now());
        table.rows.insert(id, updated);
        Ok(1)
    }

    async fn delete(&self, plan: &DeletePlan) -> Result<u64, DatabaseError> {
        let mut tables = self.lock()?;
        // Work on a copy so a failing step leaves nothing behind
        let mut staged = tables.clone();

        let removed = Self::remove_where(&mut staged, plan.table, "id", &[plan.id], plan.mode)?;
        if removed.is_empty() {
            return Ok(0);
        }
        Self::cascade(&mut staged, &plan.cascade, &removed)?;

        *tables = staged;
        Ok(removed.len() as u64)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.lock().map(|_| ())
    }
}

fn condition_matches(row: &Row, condition: &FilterWhereInfo) -> bool {
    let actual = row.get(&condition.column).unwrap_or(&Value::Null);
    match condition.operator {
        FilterOp::Eq => {
            if condition.data.is_null() { actual.is_null() } else { values_equal(actual, &condition.data) }
        }
        FilterOp::Neq => {
            if condition.data.is_null() { !actual.is_null() } else { !actual.is_null() && !values_equal(actual, &condition.data) }
        }
        FilterOp::In => match &condition.data {
            Value::Array(values) => values.iter().any(|v| values_equal(actual, v)),
            other => values_equal(actual, other),
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Null, _) | (_, Value::Null) => false,
        _ => a == b,
    }
}

// NULLs sort last, matching PostgreSQL's ascending default
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::{ColumnSchema, FieldType};
    use serde_json::json;

    fn parents() -> TableSchema {
        TableSchema {
            table: "parents",
            columns: vec![ColumnSchema { name: "email", field_type: FieldType::String, unique: true }],
        }
    }

    fn kids() -> TableSchema {
        TableSchema {
            table: "kids",
            columns: vec![ColumnSchema { name: "parent_id", field_type: FieldType::Reference, unique: false }],
        }
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_system_columns() {
        let store = MemoryStore::new();
        store.migrate(&parents()).await.unwrap();
        let first = store.insert(&parents(), row(json!({"email": "a@x.io"}))).await.unwrap();
        let second = store.insert(&parents(), row(json!({"email": "b@x.io"}))).await.unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        assert!(first["created_at"].is_string());
        assert!(first["deleted_at"].is_null());
    }

    #[tokio::test]
    async fn unique_columns_conflict_until_soft_deleted() {
        let store = MemoryStore::new();
        store.migrate(&parents()).await.unwrap();
        store.insert(&parents(), row(json!({"email": "a@x.io"}))).await.unwrap();
        let dup = store.insert(&parents(), row(json!({"email": "a@x.io"}))).await;
        assert!(matches!(dup, Err(DatabaseError::UniqueViolation(ref c)) if c == "email"));

        let plan = DeletePlan { table: "parents", id: 1, mode: DeleteMode::Soft, cascade: vec![] };
        assert_eq!(store.delete(&plan).await.unwrap(), 1);
        assert_eq!(store.delete(&plan).await.unwrap(), 0);
        store.insert(&parents(), row(json!({"email": "a@x.io"}))).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_columns_are_rejected() {
        let store = MemoryStore::new();
        store.migrate(&parents()).await.unwrap();
        let result = store.insert(&parents(), row(json!({"nope": 1}))).await;
        assert!(matches!(result, Err(DatabaseError::UnknownColumn { .. })));
    }

    #[tokio::test]
    async fn select_filters_orders_and_windows() {
        let store = MemoryStore::new();
        store.migrate(&kids()).await.unwrap();
        for parent in [1, 2, 1, 1] {
            store.insert(&kids(), row(json!({"parent_id": parent}))).await.unwrap();
        }
        let filter = FilterData {
            where_clause: Some(json!({"parent_id": 1})),
            order: Some(json!("id desc")),
            limit: Some(2),
            offset: Some(0),
        };
        let rows = store.select(&kids(), filter.clone()).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![4, 3]);
        assert_eq!(store.count(&kids(), filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn cascade_runs_against_children() {
        fn none() -> Vec<Cascade> {
            vec![]
        }
        let store = MemoryStore::new();
        store.migrate(&parents()).await.unwrap();
        store.migrate(&kids()).await.unwrap();
        store.insert(&parents(), row(json!({"email": "p@x.io"}))).await.unwrap();
        store.insert(&kids(), row(json!({"parent_id": 1}))).await.unwrap();
        store.insert(&kids(), row(json!({"parent_id": 1}))).await.unwrap();

        let plan = DeletePlan {
            table: "parents",
            id: 1,
            mode: DeleteMode::Soft,
            cascade: vec![Cascade { table: "kids", foreign_key: "parent_id", mode: DeleteMode::Hard, children: none }],
        };
        store.delete(&plan).await.unwrap();
        assert_eq!(store.count(&kids(), FilterData::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_cascade_leaves_rows_untouched() {
        fn none() -> Vec<Cascade> {
            vec![]
        }
        let store = MemoryStore::new();
        store.migrate(&parents()).await.unwrap();
        store.insert(&parents(), row(json!({"email": "p@x.io"}))).await.unwrap();

        let plan = DeletePlan {
            table: "parents",
            id: 1,
            mode: DeleteMode::Soft,
            cascade: vec![Cascade { table: "missing", foreign_key: "parent_id", mode: DeleteMode::Soft, children: none }],
        };
        assert!(store.delete(&plan).await.is_err());
        assert!(store.select_by_id(&parents(), 1).await.unwrap().is_some());
    }
}
