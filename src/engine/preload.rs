use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

use crate::database::{row_id, Row, Store};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::models::{Relation, RelationKind};
use crate::registry::ModelDefinition;

/// Render stored rows, attaching every configured eager-load relation.
/// Each relation costs one batched query regardless of row count.
pub async fn render_rows(store: &dyn Store, model: &ModelDefinition, rows: Vec<Row>) -> Result<Vec<Value>, ApiError> {
    let mut attached: Vec<Row> = rows.iter().map(|_| Row::new()).collect();

    for name in &model.preload {
        let Some(relation) = model.relation(name) else { continue };
        let mut values = load_relation(store, relation, &rows).await?;

        // Companion rows are guaranteed to exist; create any that are missing
        if let Some(companion) = model.companions.iter().find(|c| c.relation == relation.name) {
            for (row, value) in rows.iter().zip(values.iter_mut()) {
                if let (true, Some(id)) = (value.is_null(), row_id(row)) {
                    *value = (relation.render)(companion.ensure(store, id).await?)?;
                }
            }
        }
        for (extra, value) in attached.iter_mut().zip(values) {
            extra.insert(relation.name.to_string(), value);
        }
    }

    let mut rendered = Vec::with_capacity(rows.len());
    for (row, extra) in rows.into_iter().zip(attached) {
        let mut value = (model.render)(row)?;
        if let Value::Object(map) = &mut value {
            map.extend(extra);
        }
        rendered.push(value);
    }
    Ok(rendered)
}

pub async fn render_row(store: &dyn Store, model: &ModelDefinition, row: Row) -> Result<Value, ApiError> {
    render_rows(store, model, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ApiError::internal_server_error("Failed to render record"))
}

async fn load_relation(store: &dyn Store, relation: &Relation, rows: &[Row]) -> Result<Vec<Value>, ApiError> {
    let target = (relation.target_schema)();

    match relation.kind {
        RelationKind::BelongsTo => {
            let keys: BTreeSet<i64> = rows
                .iter()
                .filter_map(|r| r.get(relation.foreign_key).and_then(Value::as_i64))
                .collect();
            let mut by_id: HashMap<i64, Value> = HashMap::new();
            if !keys.is_empty() {
                let related = store
                    .select(&target, FilterData::where_eq(json!({ "id": { "$in": keys } })))
                    .await?;
                for row in related {
                    if let Some(id) = row_id(&row) {
                        by_id.insert(id, (relation.render)(row)?);
                    }
                }
            }
            Ok(rows
                .iter()
                .map(|r| {
                    r.get(relation.foreign_key)
                        .and_then(Value::as_i64)
                        .and_then(|k| by_id.get(&k).cloned())
                        .unwrap_or(Value::Null)
                })
                .collect())
        }
        RelationKind::HasOne | RelationKind::HasMany => {
            let keys: BTreeSet<i64> = rows.iter().filter_map(row_id).collect();
            let mut grouped: HashMap<i64, Vec<Value>> = HashMap::new();
            if !keys.is_empty() {
                let mut filter = FilterData::where_eq(json!({ relation.foreign_key: { "$in": keys } }));
                filter.order = Some(json!("id asc"));
                for row in store.select(&target, filter).await? {
                    if let Some(parent) = row.get(relation.foreign_key).and_then(Value::as_i64) {
                        grouped.entry(parent).or_default().push((relation.render)(row)?);
                    }
                }
            }
            Ok(rows
                .iter()
                .map(|r| {
                    let children = row_id(r).and_then(|id| grouped.remove(&id)).unwrap_or_default();
                    if relation.kind == RelationKind::HasOne {
                        children.into_iter().next().unwrap_or(Value::Null)
                    } else {
                        Value::Array(children)
                    }
                })
                .collect())
        }
    }
}
