//! Fluent query builder for the remote table API: filter, project, order, paginate.

use crate::error::StorageError;
use crate::record::{check_ident, check_select, Conditions, OrderBy, QueryOptions};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub select: String,
    pub filters: Vec<(String, Value)>,
    pub order: Option<OrderBy>,
    pub limit: Option<u32>,
    /// Inclusive row range, overrides `limit` when set.
    pub range: Option<(u64, u64)>,
}

impl TableQuery {
    pub fn from(table: &str) -> Result<Self, StorageError> {
        Ok(TableQuery {
            table: check_ident(table)?.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
            range: None,
        })
    }

    pub fn select(mut self, select: &str) -> Result<Self, StorageError> {
        self.select = check_select(select)?;
        Ok(self)
    }

    pub fn eq(mut self, field: &str, value: Value) -> Result<Self, StorageError> {
        self.filters.push((check_ident(field)?.to_string(), value));
        Ok(self)
    }

    /// One `eq` per active (non-null) condition.
    pub fn filter(mut self, conditions: &Conditions) -> Result<Self, StorageError> {
        for (k, v) in conditions.active() {
            self = self.eq(k, v.clone())?;
        }
        Ok(self)
    }

    pub fn order(mut self, order: &OrderBy) -> Result<Self, StorageError> {
        check_ident(&order.field)?;
        self.order = Some(order.clone());
        Ok(self)
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some((from, to));
        self
    }

    /// Apply select, order and the limit/offset window from `options`.
    pub fn options(mut self, options: &QueryOptions) -> Result<Self, StorageError> {
        self = self.select(&options.projection()?)?;
        if let Some(order) = &options.order {
            self = self.order(order)?;
        }
        match options.window() {
            (Some(limit), Some(offset)) => {
                let from = u64::from(offset);
                Ok(self.range(from, from + u64::from(limit) - 1))
            }
            (Some(limit), None) => Ok(self.limit(limit)),
            _ => Ok(self),
        }
    }

    /// URL query pairs in PostgREST syntax.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select.clone())];
        for (field, value) in &self.filters {
            pairs.push((field.clone(), format!("eq.{}", filter_literal(value))));
        }
        if let Some(o) = &self.order {
            let dir = if o.descending { "desc" } else { "asc" };
            pairs.push(("order".to_string(), format!("{}.{}", o.field, dir)));
        }
        match (self.range, self.limit) {
            (Some((from, to)), _) => {
                pairs.push(("offset".to_string(), from.to_string()));
                pairs.push(("limit".to_string(), (to.saturating_sub(from) + 1).to_string()));
            }
            (None, Some(n)) => pairs.push(("limit".to_string(), n.to_string())),
            (None, None) => {}
        }
        pairs
    }

    /// Filter pairs only; used for PATCH, DELETE and HEAD where projection and paging do not apply.
    pub fn filter_pairs(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|(f, v)| (f.clone(), format!("eq.{}", filter_literal(v))))
            .collect()
    }
}

fn filter_literal(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
