use serde::{Deserialize, Serialize};

use super::{Contact, Deal, Entity, FieldDefinition, Model, Relation, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    #[serde(flatten)]
    pub model: Model,
    pub content: String,
    pub contact_id: Option<i64>,
    pub deal_id: Option<i64>,
    pub user_id: i64,
}

impl Entity for Note {
    const NAME: &'static str = "note";
    const TABLE: &'static str = "notes";
    const OWNER_FIELD: Option<&'static str> = Some("user_id");

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("content").required().label("Content"),
            FieldDefinition::reference("contact_id").label("Contact"),
            FieldDefinition::reference("deal_id").label("Deal"),
            FieldDefinition::reference("user_id").label("Owner"),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<User>("user", "user_id"),
            Relation::belongs_to::<Contact>("contact", "contact_id"),
            Relation::belongs_to::<Deal>("deal", "deal_id"),
        ]
    }
}
