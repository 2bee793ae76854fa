//! FILENAME: grid-engine/src/filter.rs
//! PURPOSE: Per-column filter models and the row filter that applies them.
//! CONTEXT: A row passes when it satisfies every configured column filter
//! (implicit AND across fields). Each text/number/date filter has a primary
//! condition and an optional second one joined by AND/OR. Also hosts the
//! quick filter, a free-text search across all displayed columns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::{find_column, ColumnDef};
use crate::value::{Row, Value};

// ============================================================================
// CONDITIONS
// ============================================================================

/// Operator for combining condition and condition2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinOperator {
    #[default]
    And,
    Or,
}

/// A single test against one cell value.
pub trait Condition {
    fn matches(&self, value: &Value) -> bool;
}

/// A primary condition plus an optional second one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combined<C> {
    pub condition: C,
    pub condition2: Option<C>,
    #[serde(default, rename = "operator")]
    pub join: JoinOperator,
}

impl<C: Condition> Combined<C> {
    pub fn single(condition: C) -> Self {
        Combined {
            condition,
            condition2: None,
            join: JoinOperator::And,
        }
    }

    pub fn and(condition: C, condition2: C) -> Self {
        Combined {
            condition,
            condition2: Some(condition2),
            join: JoinOperator::And,
        }
    }

    pub fn or(condition: C, condition2: C) -> Self {
        Combined {
            condition,
            condition2: Some(condition2),
            join: JoinOperator::Or,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        let first = self.condition.matches(value);
        match &self.condition2 {
            None => first,
            Some(second) => match self.join {
                JoinOperator::And => first && second.matches(value),
                JoinOperator::Or => first || second.matches(value),
            },
        }
    }
}

/// Text filter operators. All comparisons are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextOperator {
    Contains,
    NotContains,
    Equals,
    NotEqual,
    StartsWith,
    EndsWith,
    Blank,
    NotBlank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextCondition {
    #[serde(rename = "type")]
    pub operator: TextOperator,
    #[serde(default)]
    pub filter: Option<String>,
}

impl TextCondition {
    pub fn new(operator: TextOperator, filter: impl Into<String>) -> Self {
        TextCondition {
            operator,
            filter: Some(filter.into()),
        }
    }
}

impl Condition for TextCondition {
    fn matches(&self, value: &Value) -> bool {
        let needle = match self.operator {
            TextOperator::Blank => return value.is_blank(),
            TextOperator::NotBlank => return !value.is_blank(),
            // Missing filter text constrains nothing
            _ => match &self.filter {
                Some(filter) => filter.to_lowercase(),
                None => return true,
            },
        };
        let haystack = value.to_display_string().to_lowercase();

        match self.operator {
            TextOperator::Contains => haystack.contains(&needle),
            TextOperator::NotContains => !haystack.contains(&needle),
            TextOperator::Equals => haystack == needle,
            TextOperator::NotEqual => haystack != needle,
            TextOperator::StartsWith => haystack.starts_with(&needle),
            TextOperator::EndsWith => haystack.ends_with(&needle),
            TextOperator::Blank => haystack.is_empty(),
            TextOperator::NotBlank => !haystack.is_empty(),
        }
    }
}

/// Comparison operators shared by number and date filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    Equals,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    InRange,
    Blank,
    NotBlank,
}

/// Shared comparison logic; `InRange` is inclusive on both ends.
fn compare_with(
    operator: ComparisonOperator,
    actual: Option<f64>,
    from: Option<f64>,
    to: Option<f64>,
    blank: bool,
) -> bool {
    let from = match operator {
        ComparisonOperator::Blank => return blank,
        ComparisonOperator::NotBlank => return !blank,
        _ => match from {
            Some(from) => from,
            None => return true,
        },
    };
    let Some(actual) = actual else {
        return false;
    };
    match operator {
        ComparisonOperator::Equals => actual == from,
        ComparisonOperator::NotEqual => actual != from,
        ComparisonOperator::LessThan => actual < from,
        ComparisonOperator::LessThanOrEqual => actual <= from,
        ComparisonOperator::GreaterThan => actual > from,
        ComparisonOperator::GreaterThanOrEqual => actual >= from,
        ComparisonOperator::InRange => match to {
            Some(to) => actual >= from && actual <= to,
            None => actual >= from,
        },
        ComparisonOperator::Blank => blank,
        ComparisonOperator::NotBlank => !blank,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberCondition {
    #[serde(rename = "type")]
    pub operator: ComparisonOperator,
    #[serde(default)]
    pub filter: Option<f64>,
    #[serde(default)]
    pub filter_to: Option<f64>,
}

impl NumberCondition {
    pub fn new(operator: ComparisonOperator, filter: f64) -> Self {
        NumberCondition {
            operator,
            filter: Some(filter),
            filter_to: None,
        }
    }

    pub fn in_range(from: f64, to: f64) -> Self {
        NumberCondition {
            operator: ComparisonOperator::InRange,
            filter: Some(from),
            filter_to: Some(to),
        }
    }
}

impl Condition for NumberCondition {
    fn matches(&self, value: &Value) -> bool {
        compare_with(
            self.operator,
            value.to_f64_lenient(),
            self.filter,
            self.filter_to,
            value.is_blank(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCondition {
    #[serde(rename = "type")]
    pub operator: ComparisonOperator,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
}

impl DateCondition {
    pub fn new(operator: ComparisonOperator, date: impl Into<String>) -> Self {
        DateCondition {
            operator,
            date_from: Some(date.into()),
            date_to: None,
        }
    }

    pub fn in_range(from: impl Into<String>, to: impl Into<String>) -> Self {
        DateCondition {
            operator: ComparisonOperator::InRange,
            date_from: Some(from.into()),
            date_to: Some(to.into()),
        }
    }
}

impl Condition for DateCondition {
    fn matches(&self, value: &Value) -> bool {
        let parse = |text: &Option<String>| {
            text.as_ref()
                .and_then(|t| Value::Text(t.clone()).as_timestamp())
        };
        compare_with(
            self.operator,
            value.as_timestamp(),
            parse(&self.date_from),
            parse(&self.date_to),
            value.is_blank(),
        )
    }
}

/// Membership test. An empty value list admits nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFilter {
    pub values: Vec<Value>,
}

impl SetFilter {
    pub fn new(values: Vec<Value>) -> Self {
        SetFilter { values }
    }

    pub fn matches(&self, value: &Value) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Several filters on the same field, all of which must pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFilter {
    pub filters: Vec<ColumnFilter>,
}

// ============================================================================
// FILTER MODEL
// ============================================================================

/// One column's filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filterType", rename_all = "camelCase")]
pub enum ColumnFilter {
    Text(Combined<TextCondition>),
    Number(Combined<NumberCondition>),
    Date(Combined<DateCondition>),
    Set(SetFilter),
    Multi(MultiFilter),
}

impl ColumnFilter {
    pub fn text(operator: TextOperator, filter: impl Into<String>) -> Self {
        ColumnFilter::Text(Combined::single(TextCondition::new(operator, filter)))
    }

    pub fn number(operator: ComparisonOperator, filter: f64) -> Self {
        ColumnFilter::Number(Combined::single(NumberCondition::new(operator, filter)))
    }

    pub fn date(operator: ComparisonOperator, date: impl Into<String>) -> Self {
        ColumnFilter::Date(Combined::single(DateCondition::new(operator, date)))
    }

    pub fn set(values: Vec<Value>) -> Self {
        ColumnFilter::Set(SetFilter::new(values))
    }

    pub fn multi(filters: Vec<ColumnFilter>) -> Self {
        ColumnFilter::Multi(MultiFilter { filters })
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ColumnFilter::Text(f) => f.matches(value),
            ColumnFilter::Number(f) => f.matches(value),
            ColumnFilter::Date(f) => f.matches(value),
            ColumnFilter::Set(f) => f.matches(value),
            ColumnFilter::Multi(f) => f.filters.iter().all(|sub| sub.matches(value)),
        }
    }
}

/// Field name -> that field's filter.
pub type FilterModel = BTreeMap<String, ColumnFilter>;

/// True when the row satisfies every active filter in the model.
pub fn row_passes(row: &Row, filter_model: &FilterModel, columns: &[ColumnDef]) -> bool {
    filter_model.iter().all(|(field, filter)| {
        // Filters on non-filterable columns are inert
        if find_column(columns, field).is_some_and(|c| !c.filterable) {
            return true;
        }
        filter.matches(row.value(field))
    })
}

/// Returns the rows passing every field filter, in input order.
pub fn filter_rows(rows: &[Row], filter_model: &FilterModel, columns: &[ColumnDef]) -> Vec<Row> {
    if filter_model.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| row_passes(row, filter_model, columns))
        .cloned()
        .collect()
}

// ============================================================================
// QUICK FILTER
// ============================================================================

/// Free-text filter across columns.
///
/// Every whitespace-separated term must occur (case-insensitive) somewhere
/// in the row's displayed text. With no columns, every row field is searched.
pub fn quick_filter(rows: &[Row], text: &str, columns: &[ColumnDef]) -> Vec<Row> {
    let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return rows.to_vec();
    }

    rows.iter()
        .filter(|row| {
            let haystack = quick_filter_text(row, columns);
            terms.iter().all(|term| haystack.contains(term.as_str()))
        })
        .cloned()
        .collect()
}

fn quick_filter_text(row: &Row, columns: &[ColumnDef]) -> String {
    let parts: Vec<String> = if columns.is_empty() {
        row.fields().map(|(_, v)| v.to_display_string()).collect()
    } else {
        columns
            .iter()
            .filter(|c| !c.hide)
            .map(|c| row.value(&c.field).to_display_string())
            .collect()
    };
    parts.join("\n").to_lowercase()
}
