use serde::{Deserialize, Serialize};

use super::{Entity, FieldDefinition, Model, Relation, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub model: Model,
    pub theme: String,
    pub language: String,
    pub user_id: i64,
}

impl Settings {
    pub const DEFAULT_THEME: &'static str = "light";
    pub const DEFAULT_LANGUAGE: &'static str = "en";
}

impl Entity for Settings {
    const NAME: &'static str = "settings";
    const TABLE: &'static str = "settings";
    const OWNER_FIELD: Option<&'static str> = Some("user_id");

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("theme")
                .options(&["light", "dark"])
                .default_value(Self::DEFAULT_THEME)
                .label("Theme"),
            FieldDefinition::string("language")
                .min(2.0)
                .max(5.0)
                .default_value(Self::DEFAULT_LANGUAGE)
                .label("Language")
                .help("Language tag such as en or de-CH"),
            FieldDefinition::reference("user_id").unique().label("User"),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![Relation::belongs_to::<User>("user", "user_id")]
    }
}
