use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{dependents, Contact, Entity, FieldDefinition, Model, Note, Relation, Task, User};
use crate::database::{Cascade, DeleteMode, FieldType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    #[serde(flatten)]
    pub model: Model,
    pub title: String,
    pub description: Option<String>,
    pub value: f64,
    pub status: String,
    pub expected_date: Option<DateTime<Utc>>,
    pub contact_id: Option<i64>,
    pub user_id: i64,
}

impl Entity for Deal {
    const NAME: &'static str = "deal";
    const TABLE: &'static str = "deals";
    const OWNER_FIELD: Option<&'static str> = Some("user_id");

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("title").required().max(200.0).label("Title"),
            FieldDefinition::string("description").label("Description"),
            FieldDefinition::new("value", FieldType::Number).min(0.0).default_value(0.0).label("Value"),
            FieldDefinition::string("status")
                .options(&["open", "won", "lost"])
                .default_value("open")
                .label("Status"),
            FieldDefinition::new("expected_date", FieldType::DateTime).label("Expected close"),
            FieldDefinition::reference("contact_id").label("Contact"),
            FieldDefinition::reference("user_id").label("Owner"),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<User>("user", "user_id"),
            Relation::belongs_to::<Contact>("contact", "contact_id"),
            Relation::has_many::<Task>("tasks", "deal_id"),
            Relation::has_many::<Note>("notes", "deal_id"),
        ]
    }

    fn cascade() -> Vec<Cascade> {
        vec![
            dependents::<Task>("deal_id", DeleteMode::Soft),
            dependents::<Note>("deal_id", DeleteMode::Soft),
        ]
    }
}
