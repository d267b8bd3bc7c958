use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{dependents, Companion, Contact, Deal, Entity, FieldDefinition, Model, Note, Relation, Settings, Task};
use crate::auth::hash_password;
use crate::database::{Cascade, DeleteMode, Row};
use crate::engine::record::RecordError;
use crate::types::{Operation, Role};

/// An account. The password hash lives only in storage and is never part of
/// this type, so it cannot be rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub model: Model,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Every user owns exactly one settings row
    pub fn settings_companion() -> Companion {
        Companion::of::<Settings>("settings", "user_id")
    }
}

impl Entity for User {
    const NAME: &'static str = "user";
    const TABLE: &'static str = "users";

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("username").required().unique().min(3.0).max(50.0).label("Username"),
            FieldDefinition::string("email").required().unique().email().label("Email"),
            FieldDefinition::string("password")
                .required()
                .min(6.0)
                .write_only()
                .label("Password")
                .help("Stored as an Argon2id hash"),
            FieldDefinition::string("role")
                .options(&["user", "admin"])
                .default_value("user")
                .label("Role"),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::has_one::<Settings>("settings", "user_id"),
            Relation::has_many::<Contact>("contacts", "user_id"),
            Relation::has_many::<Deal>("deals", "user_id"),
            Relation::has_many::<Task>("tasks", "user_id"),
            Relation::has_many::<Note>("notes", "user_id"),
        ]
    }

    fn cascade() -> Vec<Cascade> {
        vec![
            dependents::<Settings>("user_id", DeleteMode::Hard),
            dependents::<Contact>("user_id", DeleteMode::Soft),
            dependents::<Deal>("user_id", DeleteMode::Soft),
            dependents::<Task>("user_id", DeleteMode::Soft),
            dependents::<Note>("user_id", DeleteMode::Soft),
        ]
    }

    fn companions() -> Vec<Companion> {
        vec![Self::settings_companion()]
    }

    fn guard_delete(actor_id: i64, id: i64) -> Result<(), RecordError> {
        if actor_id == id {
            return Err(RecordError::Forbidden("You cannot delete your own account"));
        }
        Ok(())
    }

    fn prepare(values: &mut Row, _operation: Operation) -> Result<(), RecordError> {
        if let Some(Value::String(email)) = values.get("email") {
            let normalized = email.trim().to_lowercase();
            values.insert("email".to_string(), Value::String(normalized));
        }
        if let Some(Value::String(plain)) = values.get("password") {
            let hashed = hash_password(plain).map_err(|e| RecordError::Hashing(e.to_string()))?;
            values.insert("password".to_string(), Value::String(hashed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_never_includes_password() {
        let row = json!({
            "id": 1, "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z",
            "deleted_at": null, "username": "ann", "email": "ann@example.com",
            "password": "$argon2id$v=19$...", "role": "admin"
        });
        let rendered = User::render(row.as_object().cloned().unwrap()).unwrap();
        assert!(rendered.get("password").is_none());
        assert_eq!(rendered["role"], "admin");
        assert_eq!(rendered["id"], 1);
    }

    #[test]
    fn users_cannot_delete_themselves() {
        assert!(matches!(User::guard_delete(4, 4), Err(RecordError::Forbidden(_))));
        assert!(User::guard_delete(4, 5).is_ok());
    }

    #[test]
    fn settings_companion_starts_from_defaults() {
        let defaults = (User::settings_companion().defaults)();
        assert_eq!(defaults["theme"], "light");
        assert_eq!(defaults["language"], "en");
        assert!(!defaults.contains_key("user_id"));
    }

    #[test]
    fn prepare_lowercases_email() {
        let mut values = json!({"email": " Ann@Example.COM"}).as_object().cloned().unwrap();
        User::prepare(&mut values, Operation::Update).unwrap();
        assert_eq!(values["email"], "ann@example.com");
    }

    #[test]
    fn prepare_hashes_password() {
        let mut values = json!({"password": "secret1"}).as_object().cloned().unwrap();
        User::prepare(&mut values, Operation::Create).unwrap();
        let stored = values["password"].as_str().unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(crate::auth::verify_password("secret1", stored).unwrap());
    }
}
