// List filters in the remote API's `col:rule:"value"` grammar

use super::JobError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterRule {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Nlike,
    In,
    Nin,
    Isnull,
    Isnotnull,
}

impl FilterRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterRule::Eq => "eq",
            FilterRule::Neq => "neq",
            FilterRule::Gt => "gt",
            FilterRule::Gte => "gte",
            FilterRule::Lt => "lt",
            FilterRule::Lte => "lte",
            FilterRule::Like => "like",
            FilterRule::Nlike => "nlike",
            FilterRule::In => "in",
            FilterRule::Nin => "nin",
            FilterRule::Isnull => "isnull",
            FilterRule::Isnotnull => "isnotnull",
        }
    }

    /// Null checks carry no value
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterRule::Isnull | FilterRule::Isnotnull)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub rule: FilterRule,
    #[serde(default)]
    pub value: Option<String>,
}

impl Filter {
    pub fn new(column: impl Into<String>, rule: FilterRule, value: Option<String>) -> Self {
        Self {
            column: column.into(),
            rule,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(column, FilterRule::Eq, Some(value.into()))
    }

    fn render(&self) -> Result<String, JobError> {
        if !self.rule.takes_value() {
            return Ok(format!("{}:{}:", self.column, self.rule.as_str()));
        }
        match &self.value {
            Some(value) => Ok(format!("{}:{}:\"{}\"", self.column, self.rule.as_str(), value)),
            None => Err(JobError::InvalidArguments(format!(
                "filter on '{}' with rule '{}' needs a value",
                self.column,
                self.rule.as_str()
            ))),
        }
    }
}

/// Join filters into the `filter` query parameter; `None` when empty
pub fn render(filters: &[Filter]) -> Result<Option<String>, JobError> {
    if filters.is_empty() {
        return Ok(None);
    }
    let parts = filters
        .iter()
        .map(Filter::render)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(parts.join(",")))
}
