use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Deal, Entity, FieldDefinition, Model, Relation, User};
use crate::database::FieldType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub model: Model,
    pub title: String,
    pub details: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub deal_id: Option<i64>,
    pub user_id: i64,
}

impl Entity for Task {
    const NAME: &'static str = "task";
    const TABLE: &'static str = "tasks";
    const OWNER_FIELD: Option<&'static str> = Some("user_id");

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("title").required().max(200.0).label("Title"),
            FieldDefinition::string("details").label("Details"),
            FieldDefinition::new("due_date", FieldType::DateTime).label("Due date"),
            FieldDefinition::new("completed", FieldType::Boolean).default_value(false).label("Completed"),
            FieldDefinition::reference("deal_id").label("Deal"),
            FieldDefinition::reference("user_id").label("Owner"),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<User>("user", "user_id"),
            Relation::belongs_to::<Deal>("deal", "deal_id"),
        ]
    }
}
