use serde_json::{json, Value};
use std::sync::Arc;

use crate::database::{row_id, DatabaseError, DeleteMode, DeletePlan, Row, Store};
use crate::engine::record::{Record, RecordError};
use crate::filter::FilterData;
use crate::models::{Entity, User};
use crate::types::{Operation, Role};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Invalid user data: {0}")]
    Record(#[from] RecordError),
    #[error("Email already registered")]
    EmailTaken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("User not found: {0}")]
    NotFound(i64),
}

/// Account lookups and the multi-table writes behind registration and
/// account removal
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Row>, UserError> {
        Ok(self.store.select_by_id(&User::schema(), id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Row>, UserError> {
        let email = email.trim().to_lowercase();
        Ok(self.store.select_one(&User::schema(), json!({ "email": email })).await?)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Row>, UserError> {
        Ok(self
            .store
            .select_one(&User::schema(), json!({ "username": username.trim() }))
            .await?)
    }

    pub async fn count(&self) -> Result<i64, UserError> {
        Ok(self.store.count(&User::schema(), FilterData::default()).await?)
    }

    /// Validate, hash and insert a user together with default settings.
    ///
    /// The pre-checks give friendly messages; the unique indexes still decide
    /// races between concurrent registrations.
    pub async fn create_user(&self, username: &str, email: &str, password: &str, role: Role) -> Result<Row, UserError> {
        let body = json!({
            "username": username,
            "email": email.trim().to_lowercase(),
            "password": password,
            "role": role.as_str(),
        });
        let mut record = Record::bind_entity::<User>(body, Operation::Create)?;

        if let Some(Value::String(email)) = record.get("email") {
            if self.find_by_email(email).await?.is_some() {
                return Err(UserError::EmailTaken);
            }
        }
        if let Some(Value::String(username)) = record.get("username") {
            if self.find_by_username(username).await?.is_some() {
                return Err(UserError::UsernameTaken);
            }
        }

        User::prepare(record.values_mut(), Operation::Create)?;
        let user = self.store.insert(&User::schema(), record.into_values()).await?;
        let user_id = row_id(&user).ok_or(DatabaseError::QueryError("insert returned no id".to_string()))?;

        self.ensure_settings(user_id).await?;
        tracing::info!(user_id, role = %role, "Created user");
        Ok(user)
    }

    /// Self-service profile change. Only username, email and password may
    /// change; `role` is dropped.
    pub async fn update_profile(&self, user_id: i64, body: Value) -> Result<Row, UserError> {
        let mut record = Record::bind_entity::<User>(body, Operation::Update)?;
        record.values_mut().remove("role");

        if let Some(Value::String(email)) = record.get("email") {
            let owner = self.find_by_email(email).await?.as_ref().and_then(row_id);
            if owner.is_some_and(|id| id != user_id) {
                return Err(UserError::EmailTaken);
            }
        }
        if let Some(Value::String(username)) = record.get("username") {
            let owner = self.find_by_username(username).await?.as_ref().and_then(row_id);
            if owner.is_some_and(|id| id != user_id) {
                return Err(UserError::UsernameTaken);
            }
        }

        User::prepare(record.values_mut(), Operation::Update)?;
        if self.store.update(&User::schema(), user_id, record.into_values()).await? == 0 {
            return Err(UserError::NotFound(user_id));
        }
        tracing::info!(user_id, "Updated profile");
        self.find_by_id(user_id).await?.ok_or(UserError::NotFound(user_id))
    }

    /// The user's settings row, created with defaults when missing
    pub async fn ensure_settings(&self, user_id: i64) -> Result<Row, UserError> {
        Ok(User::settings_companion().ensure(self.store.as_ref(), user_id).await?)
    }

    /// Soft-delete the account and everything it owns in one transaction
    pub async fn delete_user(&self, user_id: i64) -> Result<(), UserError> {
        let plan = DeletePlan {
            table: User::TABLE,
            id: user_id,
            mode: DeleteMode::Soft,
            cascade: User::cascade(),
        };
        if self.store.delete(&plan).await? == 0 {
            return Err(UserError::NotFound(user_id));
        }
        tracing::info!(user_id, "Deleted user account");
        Ok(())
    }
}
