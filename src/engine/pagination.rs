use serde::Serialize;
use std::collections::HashMap;

/// Page window parsed from `page` and `limit` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Unparseable values fall back to the defaults; `page` floors at 1 and
    /// `limit` is clamped to `1..=max_limit`.
    pub fn from_params(params: &HashMap<String, String>, default_limit: u32, max_limit: u32) -> Self {
        let page = params
            .get("page")
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);
        let max_limit = i64::from(max_limit.max(1));
        let limit = params
            .get("limit")
            .and_then(|l| l.trim().parse::<i64>().ok())
            .unwrap_or(i64::from(default_limit))
            .clamp(1, max_limit);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta {
            page: self.page,
            limit: self.limit,
            total,
            pages: (total + self.limit - 1) / self.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}
