pub mod contact;
pub mod deal;
pub mod field;
pub mod note;
pub mod settings;
pub mod task;
pub mod user;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::{Cascade, ColumnSchema, DatabaseError, DeleteMode, Row, Store, TableSchema};
use crate::engine::record::RecordError;
use crate::types::Operation;

pub use contact::Contact;
pub use deal::Deal;
pub use field::FieldDefinition;
pub use note::Note;
pub use settings::Settings;
pub use task::Task;
pub use user::User;

/// Columns every entity carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
}

/// A named link to another entity, usable for eager loading.
///
/// For `BelongsTo` the foreign key lives on this entity; for `HasOne` and
/// `HasMany` it lives on the target.
#[derive(Clone, Serialize)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub target: &'static str,
    pub foreign_key: &'static str,
    #[serde(skip)]
    pub target_owner: Option<&'static str>,
    #[serde(skip)]
    pub target_schema: fn() -> TableSchema,
    #[serde(skip)]
    pub render: fn(Row) -> Result<Value, serde_json::Error>,
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("foreign_key", &self.foreign_key)
            .finish()
    }
}

impl Relation {
    fn of<T: Entity>(name: &'static str, kind: RelationKind, foreign_key: &'static str) -> Self {
        Self {
            name,
            kind,
            target: T::NAME,
            foreign_key,
            target_owner: T::OWNER_FIELD,
            target_schema: T::schema,
            render: T::render,
        }
    }

    pub fn belongs_to<T: Entity>(name: &'static str, foreign_key: &'static str) -> Self {
        Self::of::<T>(name, RelationKind::BelongsTo, foreign_key)
    }

    pub fn has_one<T: Entity>(name: &'static str, foreign_key: &'static str) -> Self {
        Self::of::<T>(name, RelationKind::HasOne, foreign_key)
    }

    pub fn has_many<T: Entity>(name: &'static str, foreign_key: &'static str) -> Self {
        Self::of::<T>(name, RelationKind::HasMany, foreign_key)
    }
}

/// Rows of `T` referencing the parent through `foreign_key`, removed with it
pub fn dependents<T: Entity>(foreign_key: &'static str, mode: DeleteMode) -> Cascade {
    Cascade {
        table: T::TABLE,
        foreign_key,
        mode,
        children: T::cascade,
    }
}

/// A dependent row every parent must have, e.g. a user's settings. Created
/// from field defaults right after the parent and again on demand if missing.
#[derive(Clone, Copy)]
pub struct Companion {
    /// `HasOne` relation on the parent that renders this row
    pub relation: &'static str,
    pub foreign_key: &'static str,
    pub schema: fn() -> TableSchema,
    pub defaults: fn() -> Row,
}

impl std::fmt::Debug for Companion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Companion")
            .field("relation", &self.relation)
            .field("foreign_key", &self.foreign_key)
            .finish()
    }
}

fn default_row<T: Entity>() -> Row {
    T::fields()
        .into_iter()
        .filter_map(|f| f.default.map(|value| (f.name.to_string(), value)))
        .collect()
}

impl Companion {
    pub fn of<T: Entity>(relation: &'static str, foreign_key: &'static str) -> Self {
        Self {
            relation,
            foreign_key,
            schema: T::schema,
            defaults: default_row::<T>,
        }
    }

    /// The companion row of `parent_id`, inserted with defaults when missing.
    /// A concurrent insert losing on the unique index re-reads the winner.
    pub async fn ensure(&self, store: &dyn Store, parent_id: i64) -> Result<Row, DatabaseError> {
        let schema = (self.schema)();
        let lookup = json!({ self.foreign_key: parent_id });
        if let Some(existing) = store.select_one(&schema, lookup.clone()).await? {
            return Ok(existing);
        }

        let mut values = (self.defaults)();
        values.insert(self.foreign_key.to_string(), json!(parent_id));
        match store.insert(&schema, values).await {
            Ok(row) => Ok(row),
            Err(DatabaseError::UniqueViolation(_)) => store
                .select_one(&schema, lookup)
                .await?
                .ok_or_else(|| DatabaseError::NotFound(format!("{} for #{}", schema.table, parent_id))),
            Err(e) => Err(e),
        }
    }
}

/// A record type served by the generic CRUD engine
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Lowercase route segment and registry key
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Field holding the owning user's id, if the entity is tenant scoped
    const OWNER_FIELD: Option<&'static str> = None;

    fn fields() -> Vec<FieldDefinition>;

    fn relations() -> Vec<Relation> {
        Vec::new()
    }

    /// Dependents removed when a row of this entity is deleted
    fn cascade() -> Vec<Cascade> {
        Vec::new()
    }

    /// Rows created alongside every new record of this entity
    fn companions() -> Vec<Companion> {
        Vec::new()
    }

    /// Veto a delete requested by `actor_id` before anything is removed
    fn guard_delete(_actor_id: i64, _id: i64) -> Result<(), RecordError> {
        Ok(())
    }

    /// Hook run on validated values before they are written
    fn prepare(_values: &mut Row, _operation: Operation) -> Result<(), RecordError> {
        Ok(())
    }

    fn schema() -> TableSchema {
        TableSchema {
            table: Self::TABLE,
            columns: Self::fields()
                .into_iter()
                .map(|f| ColumnSchema { name: f.name, field_type: f.field_type, unique: f.unique })
                .collect(),
        }
    }

    /// Round-trip a stored row through the typed record, dropping anything
    /// the type does not serialize
    fn render(row: Row) -> Result<Value, serde_json::Error> {
        let record: Self = serde_json::from_value(Value::Object(row))?;
        serde_json::to_value(record)
    }

    fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(row))
    }
}
