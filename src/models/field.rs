use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::database::FieldType;

/// Metadata for one persisted field of an entity
#[derive(Debug, Clone, Serialize)]
pub struct FieldDefinition {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
    /// Length bound for strings, value bound for numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
    /// Accepted on input, never rendered
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub write_only: bool,
}

impl FieldDefinition {
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
            unique: false,
            label: name,
            help: None,
            options: vec![],
            min: None,
            max: None,
            default: None,
            format: None,
            write_only: false,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn reference(name: &'static str) -> Self {
        Self::new(name, FieldType::Reference)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    pub fn options(mut self, options: &[&'static str]) -> Self {
        self.options = options.to_vec();
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn email(mut self) -> Self {
        self.format = Some("email");
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Fields that may hold NULL: optional and without a default
    pub fn nullable(&self) -> bool {
        !self.required && self.default.is_none()
    }

    /// Check a JSON input value and return its normalized form
    pub fn validate(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return if self.nullable() {
                Ok(Value::Null)
            } else if self.required {
                Err("This field is required".to_string())
            } else {
                Err("Must not be null".to_string())
            };
        }

        let normalized = match self.field_type {
            FieldType::String => {
                let s = value.as_str().ok_or("Must be a string")?;
                if self.required && s.trim().is_empty() {
                    return Err("This field is required".to_string());
                }
                let len = s.chars().count() as f64;
                if let Some(min) = self.min {
                    if len < min {
                        return Err(format!("Must be at least {} characters", min));
                    }
                }
                if let Some(max) = self.max {
                    if len > max {
                        return Err(format!("Must be at most {} characters", max));
                    }
                }
                if self.format == Some("email") && !looks_like_email(s) {
                    return Err("Must be a valid email address".to_string());
                }
                Value::String(s.to_string())
            }
            FieldType::Integer | FieldType::Reference => {
                let n = value.as_i64().ok_or("Must be an integer")?;
                if self.field_type == FieldType::Reference && n <= 0 {
                    return Err("Must be a positive identifier".to_string());
                }
                self.check_range(n as f64)?;
                Value::from(n)
            }
            FieldType::Number => {
                let n = value.as_f64().ok_or("Must be a number")?;
                self.check_range(n)?;
                value.clone()
            }
            FieldType::Boolean => Value::Bool(value.as_bool().ok_or("Must be a boolean")?),
            FieldType::DateTime => {
                let s = value.as_str().ok_or("Must be a date string")?;
                Value::String(parse_datetime(s).ok_or("Must be an RFC 3339 timestamp or YYYY-MM-DD date")?)
            }
        };

        if !self.options.is_empty() {
            let matches = normalized.as_str().map_or(false, |s| self.options.contains(&s));
            if !matches {
                return Err(format!("Must be one of: {}", self.options.join(", ")));
            }
        }
        Ok(normalized)
    }

    /// Convert a query-string value into a typed filter value
    pub fn parse_param(&self, raw: &str) -> Result<Value, String> {
        match self.field_type {
            FieldType::String => Ok(Value::String(raw.to_string())),
            FieldType::Integer | FieldType::Reference => {
                raw.parse::<i64>().map(Value::from).map_err(|_| format!("{} must be an integer", self.name))
            }
            FieldType::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("{} must be a number", self.name)),
            FieldType::Boolean => match raw {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("{} must be true or false", self.name)),
            },
            FieldType::DateTime => parse_datetime(raw)
                .map(Value::String)
                .ok_or_else(|| format!("{} must be a date", self.name)),
        }
    }

    fn check_range(&self, n: f64) -> Result<(), String> {
        if let Some(min) = self.min {
            if n < min {
                return Err(format!("Must be at least {}", min));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return Err(format!("Must be at most {}", max));
            }
        }
        Ok(())
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn parse_datetime(s: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let dt = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
