use serde_json::Value;
use std::collections::HashMap;

use super::error::FilterError;
use super::filter::Filter;
use super::types::{FilterOp, FilterWhereInfo, FilterWhereOptions};

pub struct FilterWhere<'a> {
    param_values: Vec<Value>,
    param_index: usize,
    casts: &'a HashMap<String, &'static str>,
}

impl<'a> FilterWhere<'a> {
    pub fn new(starting_param_index: usize, casts: &'a HashMap<String, &'static str>) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            casts,
        }
    }

    pub fn generate(
        where_data: Option<&Value>,
        starting_param_index: usize,
        casts: &HashMap<String, &'static str>,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = FilterWhere::new(starting_param_index, casts);
        filter_where.build(where_data, options)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Flatten `{col: value}` and `{col: {"$op": value}}` into conditions.
    pub fn parse(where_data: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        let mut conditions = vec![];
        let obj = match where_data {
            Value::Null => return Ok(conditions),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        for (field, value) in obj {
            Filter::validate_column(field)?;
            match value {
                Value::Object(ops) => {
                    for (op_key, op_val) in ops {
                        let operator = Self::map_operator(op_key)?;
                        conditions.push(FilterWhereInfo { column: field.clone(), operator, data: op_val.clone() });
                    }
                }
                // Implicit equality: { field: value }
                _ => conditions.push(FilterWhereInfo { column: field.clone(), operator: FilterOp::Eq, data: value.clone() }),
            }
        }
        Ok(conditions)
    }

    fn build(&mut self, where_data: Option<&Value>, options: &FilterWhereOptions) -> Result<(String, Vec<Value>), FilterError> {
        let mut sql_conditions = vec![];
        if !options.include_deleted {
            sql_conditions.push("\"deleted_at\" IS NULL".to_string());
        }
        if let Some(where_data) = where_data {
            for condition in Self::parse(where_data)? {
                sql_conditions.push(self.build_sql_condition(&condition)?);
            }
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Neq,
            "$in" => FilterOp::In,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let column = &condition.column;
        let quoted_column = format!("\"{}\"", column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() { Ok(format!("{} IS NULL", quoted_column)) }
                else { Ok(format!("{} = {}", quoted_column, self.param(column, condition.data.clone()))) }
            }
            FilterOp::Neq => {
                if condition.data.is_null() { Ok(format!("{} IS NOT NULL", quoted_column)) }
                else { Ok(format!("{} <> {}", quoted_column, self.param(column, condition.data.clone()))) }
            }
            FilterOp::In => {
                if let Value::Array(values) = &condition.data {
                    if values.is_empty() { return Ok("1=0".to_string()); }
                    let params: Vec<String> = values.iter().map(|v| self.param(column, v.clone())).collect();
                    Ok(format!("{} IN ({})", quoted_column, params.join(", ")))
                } else {
                    Ok(format!("{} = {}", quoted_column, self.param(column, condition.data.clone())))
                }
            }
        }
    }

    fn param(&mut self, column: &str, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        match self.casts.get(column) {
            Some(sql_type) => format!("${}::{}", self.param_index, sql_type),
            None => format!("${}", self.param_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_and_in_with_casts() {
        let mut casts = HashMap::new();
        casts.insert("user_id".to_string(), "bigint");
        let (sql, params) = FilterWhere::generate(
            Some(&json!({"user_id": 4, "status": {"$in": ["open", "won"]}})),
            0,
            &casts,
            &FilterWhereOptions::default(),
        )
        .unwrap();
        assert!(sql.starts_with("\"deleted_at\" IS NULL"));
        assert_eq!(params.len(), 3);

        // Placeholder numbering follows key order; check each one binds its own value
        let placeholder = |after: &str| -> usize {
            let rest = &sql[sql.find(after).unwrap() + after.len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap()
        };
        let user_id = placeholder("\"user_id\" = $");
        assert!(sql.contains(&format!("\"user_id\" = ${}::bigint", user_id)));
        assert_eq!(params[user_id - 1], json!(4));

        let first_status = placeholder("\"status\" IN ($");
        assert!(sql.contains(&format!("\"status\" IN (${}, ${})", first_status, first_status + 1)));
        assert_eq!(params[first_status - 1], json!("open"));
        assert_eq!(params[first_status], json!("won"));
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let casts = HashMap::new();
        let (sql, params) = FilterWhere::generate(Some(&json!({"deal_id": null})), 0, &casts, &FilterWhereOptions::default()).unwrap();
        assert!(sql.ends_with("\"deal_id\" IS NULL"));
        assert!(params.is_empty());
    }

    #[test]
    fn empty_in_matches_nothing() {
        let casts = HashMap::new();
        let (sql, _) = FilterWhere::generate(Some(&json!({"id": {"$in": []}})), 0, &casts, &FilterWhereOptions::default()).unwrap();
        assert!(sql.ends_with("1=0"));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        assert!(matches!(
            FilterWhere::parse(&json!({"title": {"$regex": "x"}})),
            Err(FilterError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn hostile_column_is_rejected() {
        assert!(matches!(
            FilterWhere::parse(&json!({"id\" OR 1=1 --": 1})),
            Err(FilterError::InvalidColumn(_))
        ));
    }
}
