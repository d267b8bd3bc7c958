use serde::Serialize;
use std::collections::HashMap;

/// Semantic column type shared by field metadata and storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    #[serde(rename = "datetime")]
    DateTime,
    /// Identifier of a row in another table
    Reference,
}

impl FieldType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::String => "text",
            FieldType::Integer | FieldType::Reference => "bigint",
            FieldType::Number => "double precision",
            FieldType::Boolean => "boolean",
            FieldType::DateTime => "timestamptz",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub field_type: FieldType,
    pub unique: bool,
}

/// Physical shape of one entity table. Every table also carries the
/// `id`, `created_at`, `updated_at` and `deleted_at` system columns.
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: Vec<ColumnSchema>,
}

pub const SYSTEM_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn unique_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|c| c.unique)
    }

    /// Placeholder casts for every known column
    pub fn casts(&self) -> HashMap<String, &'static str> {
        let mut casts: HashMap<String, &'static str> = self
            .columns
            .iter()
            .map(|c| (c.name.to_string(), c.field_type.sql_type()))
            .collect();
        casts.insert("id".to_string(), "bigint");
        for ts in ["created_at", "updated_at", "deleted_at"] {
            casts.insert(ts.to_string(), "timestamptz");
        }
        casts
    }
}
