pub mod defaults;

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{on, MethodFilter, MethodRouter};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::info;

use crate::database::{Cascade, DatabaseError, Row, Store, TableSchema};
use crate::engine::record::RecordError;
use crate::models::{Companion, Entity, FieldDefinition, Relation, RelationKind};
use crate::state::AppState;
use crate::types::Operation;

pub use defaults::register_default_models;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("model '{0}' is not registered")]
    UnknownModel(String),

    #[error("invalid descriptor for '{model}': {reason}")]
    InvalidDescriptor { model: String, reason: String },

    #[error("failed to initialize table for '{model}': {source}")]
    Schema {
        model: String,
        #[source]
        source: DatabaseError,
    },
}

/// Per-model policy supplied at registration
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub preload: Vec<&'static str>,
    pub allowed_filters: Vec<&'static str>,
    pub requires_auth: bool,
    pub requires_admin: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            preload: vec![],
            allowed_filters: vec![],
            requires_auth: true,
            requires_admin: false,
        }
    }
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preload(mut self, relations: &[&'static str]) -> Self {
        self.preload = relations.to_vec();
        self
    }

    pub fn filters(mut self, fields: &[&'static str]) -> Self {
        self.allowed_filters = fields.to_vec();
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.requires_admin = true;
        self
    }

    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}

/// A non-CRUD route mounted under a model's base path
#[derive(Clone, Serialize)]
pub struct CustomEndpoint {
    pub path: String,
    pub method: String,
    pub description: String,
    #[serde(skip)]
    pub handler: MethodRouter<AppState>,
}

impl std::fmt::Debug for CustomEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomEndpoint")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("description", &self.description)
            .finish()
    }
}

/// Everything the CRUD engine and router binder need to serve one entity
#[derive(Clone, Serialize)]
pub struct ModelDefinition {
    pub name: &'static str,
    pub table: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_field: Option<&'static str>,
    pub fields: Vec<FieldDefinition>,
    pub relations: Vec<Relation>,
    pub preload: Vec<&'static str>,
    pub allowed_filters: Vec<&'static str>,
    pub requires_auth: bool,
    pub requires_admin: bool,
    pub cascade: Vec<Cascade>,
    #[serde(skip)]
    pub companions: Vec<Companion>,
    pub custom_endpoints: Vec<CustomEndpoint>,
    #[serde(skip)]
    pub schema: TableSchema,
    #[serde(skip)]
    pub render: fn(Row) -> Result<Value, serde_json::Error>,
    #[serde(skip)]
    pub prepare: fn(&mut Row, Operation) -> Result<(), RecordError>,
    #[serde(skip)]
    pub guard_delete: fn(i64, i64) -> Result<(), RecordError>,
}

impl std::fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("requires_auth", &self.requires_auth)
            .field("requires_admin", &self.requires_admin)
            .finish()
    }
}

impl ModelDefinition {
    pub fn from_entity<E: Entity>(options: ModelOptions) -> Result<Self, RegistryError> {
        let definition = Self {
            name: E::NAME,
            table: E::TABLE,
            owner_field: E::OWNER_FIELD,
            fields: E::fields(),
            relations: E::relations(),
            preload: options.preload,
            allowed_filters: options.allowed_filters,
            requires_auth: options.requires_auth,
            requires_admin: options.requires_admin,
            cascade: E::cascade(),
            companions: E::companions(),
            custom_endpoints: vec![],
            schema: E::schema(),
            render: E::render,
            prepare: E::prepare,
            guard_delete: E::guard_delete,
        };
        definition.check()?;
        Ok(definition)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    fn invalid(&self, reason: impl Into<String>) -> RegistryError {
        RegistryError::InvalidDescriptor { model: self.name.to_string(), reason: reason.into() }
    }

    fn check(&self) -> Result<(), RegistryError> {
        if !is_route_segment(self.name) {
            return Err(self.invalid("name must be a lowercase identifier"));
        }
        if !is_route_segment(self.table) {
            return Err(self.invalid("table must be a lowercase identifier"));
        }
        if self.fields.is_empty() {
            return Err(self.invalid("entity declares no fields"));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if !is_route_segment(field.name) {
                return Err(self.invalid(format!("field '{}' is not a valid column name", field.name)));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(self.invalid(format!("field '{}' is declared twice", field.name)));
            }
        }
        if let Some(owner) = self.owner_field {
            if self.field(owner).is_none() {
                return Err(self.invalid(format!("owner field '{}' is not a declared field", owner)));
            }
            if !self.requires_auth {
                return Err(self.invalid("owned entities must require authentication"));
            }
        }
        for filter in &self.allowed_filters {
            if self.field(filter).is_none() {
                return Err(self.invalid(format!("filter '{}' is not a declared field", filter)));
            }
        }
        for preload in &self.preload {
            if self.relation(preload).is_none() {
                return Err(self.invalid(format!("preload '{}' is not a declared relation", preload)));
            }
        }
        for companion in &self.companions {
            match self.relation(companion.relation) {
                Some(r) if r.kind == RelationKind::HasOne && r.foreign_key == companion.foreign_key => {}
                _ => {
                    return Err(self.invalid(format!(
                        "companion '{}' must match a has_one relation on '{}'",
                        companion.relation, companion.foreign_key
                    )))
                }
            }
        }
        if self.requires_admin && !self.requires_auth {
            return Err(self.invalid("admin-only models must require authentication"));
        }
        Ok(())
    }
}

fn is_route_segment(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[derive(Default)]
struct Catalog {
    models: HashMap<&'static str, ModelDefinition>,
    order: Vec<&'static str>,
}

/// Catalog of served entities. Written during startup, read concurrently
/// afterwards; readers always get copies.
#[derive(Default)]
pub struct ModelRegistry {
    catalog: RwLock<Catalog>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register<E: Entity>(&self, options: ModelOptions) -> Result<(), RegistryError> {
        let definition = ModelDefinition::from_entity::<E>(options)?;

        let mut catalog = self.write();
        if catalog.models.contains_key(definition.name) {
            return Err(RegistryError::DuplicateRegistration(definition.name.to_string()));
        }
        if catalog.models.values().any(|m| m.table == definition.table) {
            return Err(definition.invalid(format!("table '{}' is already used by another model", definition.table)));
        }

        info!(
            model = definition.name,
            table = definition.table,
            fields = definition.fields.len(),
            requires_admin = definition.requires_admin,
            "Registered model"
        );
        catalog.order.push(definition.name);
        catalog.models.insert(definition.name, definition);
        Ok(())
    }

    pub fn register_custom_endpoint<H, T>(
        &self,
        model: &str,
        path: &str,
        method: Method,
        description: &str,
        handler: H,
    ) -> Result<(), RegistryError>
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let invalid = |reason: String| RegistryError::InvalidDescriptor { model: model.to_string(), reason };

        if !path.starts_with('/') || path.len() < 2 {
            return Err(invalid(format!("custom path '{}' must start with '/'", path)));
        }
        // Shares the `:id` slot with the standard item routes
        let first = path[1..].split('/').next().unwrap_or_default();
        if first.starts_with(':') && first != ":id" {
            return Err(invalid(format!("custom path '{}' must name its leading parameter ':id'", path)));
        }
        if path.contains('*') {
            return Err(invalid(format!("custom path '{}' may not use wildcards", path)));
        }
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| invalid(format!("unsupported method {}", method)))?;

        let mut catalog = self.write();
        let definition = catalog
            .models
            .get_mut(model)
            .ok_or_else(|| RegistryError::UnknownModel(model.to_string()))?;

        if definition.custom_endpoints.iter().any(|e| e.path == path && e.method == method.as_str()) {
            tracing::warn!(model, path, method = %method, "Custom endpoint registered twice");
        }
        definition.custom_endpoints.push(CustomEndpoint {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
            handler: on(filter, handler),
        });
        info!(model, path, method = %method, "Registered custom endpoint");
        Ok(())
    }

    pub fn get_model(&self, name: &str) -> Option<ModelDefinition> {
        self.read().models.get(name).cloned()
    }

    /// Copies of every definition in registration order
    pub fn get_models(&self) -> Vec<ModelDefinition> {
        let catalog = self.read();
        catalog.order.iter().filter_map(|name| catalog.models.get(name).cloned()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create or update every model's table, stopping at the first failure
    pub async fn initialize_tables(&self, store: &dyn Store) -> Result<(), RegistryError> {
        let schemas: Vec<(&'static str, TableSchema)> =
            self.get_models().into_iter().map(|m| (m.name, m.schema)).collect();

        for (model, schema) in schemas {
            store
                .migrate(&schema)
                .await
                .map_err(|source| RegistryError::Schema { model: model.to_string(), source })?;
        }
        info!(backend = store.backend(), "Initialized tables");
        Ok(())
    }
}
