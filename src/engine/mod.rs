//! Generic create/list/get/update/delete over any registered model.

pub mod pagination;
pub mod preload;
pub mod record;

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::{row_id, DeleteMode, DeletePlan, Row};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::AuthUser;
use crate::models::RelationKind;
use crate::registry::ModelDefinition;
use crate::state::AppState;
use crate::types::Operation;

pub use pagination::{PageMeta, Pagination};
pub use preload::{render_row, render_rows};
pub use record::{Record, RecordError};

/// Parse a path identifier; only positive integers are valid
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::invalid_id(raw)),
    }
}

/// CRUD operations bound to one model definition
#[derive(Clone)]
pub struct CrudEngine {
    model: Arc<ModelDefinition>,
}

impl CrudEngine {
    pub fn new(model: ModelDefinition) -> Self {
        Self { model: Arc::new(model) }
    }

    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }

    /// Model name with a leading capital, for messages
    pub fn display_name(&self) -> String {
        let mut name = self.model.name.to_string();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        name
    }

    fn not_found(&self) -> ApiError {
        ApiError::not_found(format!("{} not found", self.display_name()))
    }

    /// `{id}` plus the owner restriction for non-admin actors
    fn scoped(&self, actor: Option<&AuthUser>, mut conditions: Map<String, Value>) -> Value {
        if let (Some(owner), Some(actor)) = (self.model.owner_field, actor) {
            if !actor.is_admin() {
                conditions.insert(owner.to_string(), json!(actor.user_id));
            }
        }
        Value::Object(conditions)
    }

    async fn load_scoped(&self, state: &AppState, actor: Option<&AuthUser>, id: i64) -> Result<Row, ApiError> {
        let mut conditions = Map::new();
        conditions.insert("id".to_string(), json!(id));
        state
            .store
            .select_one(&self.model.schema, self.scoped(actor, conditions))
            .await?
            .ok_or_else(|| self.not_found())
    }

    /// Referenced rows must exist and, for non-admins, belong to the actor
    async fn check_references(&self, state: &AppState, actor: Option<&AuthUser>, values: &Row) -> Result<(), ApiError> {
        for relation in &self.model.relations {
            if relation.kind != RelationKind::BelongsTo || Some(relation.foreign_key) == self.model.owner_field {
                continue;
            }
            let Some(target_id) = values.get(relation.foreign_key).and_then(Value::as_i64) else { continue };

            let target = (relation.target_schema)();
            let row = state
                .store
                .select_by_id(&target, target_id)
                .await?
                .ok_or_else(|| ApiError::bad_request(format!("Referenced {} not found", relation.target)))?;

            if let (Some(actor), Some(owner)) = (actor, relation.target_owner) {
                let owned = row.get(owner).and_then(Value::as_i64) == Some(actor.user_id);
                if !actor.is_admin() && !owned {
                    return Err(ApiError::forbidden(format!(
                        "Referenced {} belongs to another user",
                        relation.target
                    )));
                }
            }
        }
        Ok(())
    }

    pub async fn create(&self, state: &AppState, actor: Option<&AuthUser>, body: Value) -> Result<Value, ApiError> {
        let mut record = Record::bind(&self.model.fields, self.model.owner_field, body, Operation::Create)?;

        // The owner is always the authenticated actor, admins included
        if let (Some(owner), Some(actor)) = (self.model.owner_field, actor) {
            record.set(owner, json!(actor.user_id));
        }
        self.check_references(state, actor, record.values()).await?;
        (self.model.prepare)(record.values_mut(), Operation::Create)?;

        let row = state.store.insert(&self.model.schema, record.into_values()).await?;
        tracing::info!(model = self.model.name, id = ?row.get("id"), "Created record");

        if let Some(id) = row_id(&row) {
            for companion in &self.model.companions {
                companion.ensure(state.store.as_ref(), id).await?;
            }
        }
        render_row(state.store.as_ref(), &self.model, row).await
    }

    pub async fn list(
        &self,
        state: &AppState,
        actor: Option<&AuthUser>,
        params: &HashMap<String, String>,
    ) -> Result<(Vec<Value>, PageMeta), ApiError> {
        let pagination = Pagination::from_params(
            params,
            state.config.api.default_page_limit,
            state.config.api.max_page_limit,
        );

        let mut conditions = Map::new();
        let mut errors = HashMap::new();
        for name in &self.model.allowed_filters {
            let (Some(raw), Some(field)) = (params.get(*name), self.model.field(name)) else { continue };
            match field.parse_param(raw) {
                Ok(value) => {
                    conditions.insert(name.to_string(), value);
                }
                Err(message) => {
                    errors.insert(name.to_string(), message);
                }
            }
        }
        if !errors.is_empty() {
            return Err(ApiError::validation_error("Invalid filter value", Some(errors)));
        }
        let where_clause = self.scoped(actor, conditions);

        let total = state
            .store
            .count(&self.model.schema, FilterData::where_eq(where_clause.clone()))
            .await?;
        let rows = state
            .store
            .select(
                &self.model.schema,
                FilterData {
                    where_clause: Some(where_clause),
                    order: Some(json!("id asc")),
                    limit: Some(pagination.limit),
                    offset: Some(pagination.offset()),
                },
            )
            .await?;

        let data = render_rows(state.store.as_ref(), &self.model, rows).await?;
        Ok((data, pagination.meta(total)))
    }

    pub async fn get(&self, state: &AppState, actor: Option<&AuthUser>, raw_id: &str) -> Result<Value, ApiError> {
        let id = parse_id(raw_id)?;
        let row = self.load_scoped(state, actor, id).await?;
        render_row(state.store.as_ref(), &self.model, row).await
    }

    pub async fn update(
        &self,
        state: &AppState,
        actor: Option<&AuthUser>,
        raw_id: &str,
        body: Value,
    ) -> Result<Value, ApiError> {
        let id = parse_id(raw_id)?;
        self.load_scoped(state, actor, id).await?;

        let mut record = Record::bind(&self.model.fields, self.model.owner_field, body, Operation::Update)?;
        self.check_references(state, actor, record.values()).await?;
        (self.model.prepare)(record.values_mut(), Operation::Update)?;

        let affected = state.store.update(&self.model.schema, id, record.into_values()).await?;
        if affected == 0 {
            return Err(self.not_found());
        }

        let row = self.load_scoped(state, actor, id).await?;
        render_row(state.store.as_ref(), &self.model, row).await
    }

    pub async fn delete(&self, state: &AppState, actor: Option<&AuthUser>, raw_id: &str) -> Result<(), ApiError> {
        let id = parse_id(raw_id)?;
        self.load_scoped(state, actor, id).await?;
        if let Some(actor) = actor {
            (self.model.guard_delete)(actor.user_id, id)?;
        }

        let plan = DeletePlan {
            table: self.model.table,
            id,
            mode: DeleteMode::Soft,
            cascade: self.model.cascade.clone(),
        };
        // Zero rows here means a concurrent delete won the race
        if state.store.delete(&plan).await? == 0 {
            return Err(self.not_found());
        }
        tracing::info!(model = self.model.name, id, "Deleted record");
        Ok(())
    }
}
