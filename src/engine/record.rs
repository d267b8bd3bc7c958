use serde_json::Value;
use std::collections::HashMap;

use crate::database::schema::SYSTEM_COLUMNS;
use crate::database::Row;
use crate::models::{Entity, FieldDefinition};
use crate::types::Operation;

/// Errors that can occur while binding a payload to a record
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("validation failed for {} field(s)", .0.len())]
    Invalid(HashMap<String, String>),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("{0}")]
    Forbidden(&'static str),
}

/// Validated, normalized values bound from an API payload for one write.
///
/// System columns and the owner field are never taken from input; unknown
/// keys are ignored.
#[derive(Debug, Clone)]
pub struct Record {
    values: Row,
    operation: Operation,
}

impl Record {
    pub fn bind(
        fields: &[FieldDefinition],
        owner_field: Option<&str>,
        body: Value,
        operation: Operation,
    ) -> Result<Self, RecordError> {
        let input = match body {
            Value::Object(map) => map,
            _ => return Err(RecordError::NotAnObject),
        };

        let mut values = Row::new();
        let mut errors = HashMap::new();

        for field in fields {
            if SYSTEM_COLUMNS.contains(&field.name) || Some(field.name) == owner_field {
                continue;
            }
            match input.get(field.name) {
                Some(value) => match field.validate(value) {
                    Ok(normalized) => {
                        values.insert(field.name.to_string(), normalized);
                    }
                    Err(message) => {
                        errors.insert(field.name.to_string(), message);
                    }
                },
                None if operation == Operation::Create => {
                    if let Some(default) = &field.default {
                        values.insert(field.name.to_string(), default.clone());
                    } else if field.required {
                        errors.insert(field.name.to_string(), "This field is required".to_string());
                    }
                }
                None => {}
            }
        }

        if !errors.is_empty() {
            return Err(RecordError::Invalid(errors));
        }
        Ok(Self { values, operation })
    }

    pub fn bind_entity<E: Entity>(body: Value, operation: Operation) -> Result<Self, RecordError> {
        Self::bind(&E::fields(), E::OWNER_FIELD, body, operation)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
    }

    pub fn values(&self) -> &Row {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Row {
        &mut self.values
    }

    pub fn into_values(self) -> Row {
        self.values
    }
}
