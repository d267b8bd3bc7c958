use serde_json::Value;
use std::collections::HashMap;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, FilterWhereOptions, SqlResult};

pub struct Filter {
    table_name: String,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
    options: FilterWhereOptions,
    casts: HashMap<String, &'static str>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            options: FilterWhereOptions::default(),
            casts: HashMap::new(),
        })
    }

    /// Placeholder casts per column, e.g. `user_id -> bigint`.
    pub fn casts(&mut self, casts: HashMap<String, &'static str>) -> &mut Self {
        self.casts = casts;
        self
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT *".to_string(),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_result.query),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = FilterWhere::generate(self.where_data.as_ref(), 0, &self.casts, &self.options)?;
        Ok(SqlResult { query: where_clause, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_result.query);
        Ok(SqlResult { query, params: where_result.params })
    }

    /// Soft delete of every row matching the where clause, starting params at `$1`.
    pub fn to_soft_delete_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!(
            "UPDATE \"{}\" SET \"deleted_at\" = NOW(), \"updated_at\" = NOW() WHERE {}",
            self.table_name, where_result.query
        );
        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_hard_delete_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!("DELETE FROM \"{}\" WHERE {}", self.table_name, where_result.query);
        Ok(SqlResult { query, params: where_result.params })
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    pub fn validate_column(column: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(column) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    fn is_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_with_order_and_window() {
        let mut filter = Filter::new("contacts").unwrap();
        filter
            .assign(FilterData {
                where_clause: Some(json!({"user_id": 2})),
                order: Some(json!("id asc")),
                limit: Some(10),
                offset: Some(10),
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"contacts\" WHERE \"deleted_at\" IS NULL AND \"user_id\" = $1 ORDER BY \"id\" ASC LIMIT 10 OFFSET 10"
        );
        assert_eq!(sql.params, vec![json!(2)]);
    }

    #[test]
    fn count_ignores_window() {
        let mut filter = Filter::new("deals").unwrap();
        filter.limit(5, Some(5)).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM \"deals\" WHERE \"deleted_at\" IS NULL");
    }

    #[test]
    fn rejects_bad_table_names() {
        assert!(Filter::new("users; drop").is_err());
        assert!(Filter::new("").is_err());
        assert!(Filter::new("1users").is_err());
    }

    #[test]
    fn negative_window_is_rejected() {
        let mut filter = Filter::new("tasks").unwrap();
        assert!(matches!(filter.limit(-1, None), Err(FilterError::InvalidLimit(_))));
        assert!(matches!(filter.limit(10, Some(-1)), Err(FilterError::InvalidOffset(_))));
        assert!(matches!(
            Filter::new("bad name"),
            Err(FilterError::InvalidTableName(_))
        ));
        assert!(matches!(
            filter.where_clause(json!(["status"])),
            Err(FilterError::InvalidWhereClause(_))
        ));
    }

    #[test]
    fn assign_reports_bad_offsets() {
        let mut filter = Filter::new("notes").unwrap();
        let result = filter.assign(FilterData {
            where_clause: None,
            order: None,
            limit: Some(5),
            offset: Some(-5),
        });
        assert!(matches!(result, Err(FilterError::InvalidOffset(_))));
    }
}
