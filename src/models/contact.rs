use serde::{Deserialize, Serialize};

use super::{dependents, Deal, Entity, FieldDefinition, Model, Note, Relation, User};
use crate::database::{Cascade, DeleteMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    #[serde(flatten)]
    pub model: Model,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub contact_stage: String,
    pub user_id: i64,
}

impl Entity for Contact {
    const NAME: &'static str = "contact";
    const TABLE: &'static str = "contacts";
    const OWNER_FIELD: Option<&'static str> = Some("user_id");

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("first_name").required().max(100.0).label("First name"),
            FieldDefinition::string("last_name").max(100.0).label("Last name"),
            FieldDefinition::string("email").email().label("Email"),
            FieldDefinition::string("phone").max(50.0).label("Phone"),
            FieldDefinition::string("company").label("Company"),
            FieldDefinition::string("position").label("Position"),
            FieldDefinition::string("contact_stage")
                .options(&["Lead", "Customer", "Prospect"])
                .default_value("Lead")
                .label("Stage"),
            FieldDefinition::reference("user_id").label("Owner"),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<User>("user", "user_id"),
            Relation::has_many::<Note>("notes", "contact_id"),
            Relation::has_many::<Deal>("deals", "contact_id"),
        ]
    }

    fn cascade() -> Vec<Cascade> {
        vec![
            dependents::<Note>("contact_id", DeleteMode::Soft),
            dependents::<Deal>("contact_id", DeleteMode::Soft),
        ]
    }
}
