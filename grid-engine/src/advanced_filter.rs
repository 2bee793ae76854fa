//! FILENAME: grid-engine/src/advanced_filter.rs
//! PURPOSE: Boolean expression-tree filtering.
//! CONTEXT: An expression is a condition, an AND/OR group of expressions, or
//! a NOT. Expressions are built with the factory helpers, checked with
//! `AdvancedFilter::validate` and evaluated per row. An `AdvancedFilter`
//! instance may also carry an external predicate; a row must pass both.
//!
//! Equality is type-aware: the number 1 never equals the text "1". String
//! operators (contains, startsWith, endsWith) are case-insensitive.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{Row, Value};

/// Operators available to a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvancedOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    InRange,
    Blank,
    NotBlank,
    InSet,
}

/// Joins the children of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    And,
    Or,
}

/// A leaf test on one field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionExpr {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: Option<AdvancedOperator>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub value_to: Option<Value>,
    #[serde(default)]
    pub values: Option<Vec<Value>>,
}

/// Boolean combination of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FilterExpression {
    Condition(ConditionExpr),
    Group {
        operator: GroupOperator,
        children: Vec<FilterExpression>,
    },
    Not {
        child: Box<FilterExpression>,
    },
}

// ============================================================================
// FACTORY HELPERS
// ============================================================================

impl FilterExpression {
    pub fn condition(field: impl Into<String>, operator: AdvancedOperator, value: impl Into<Value>) -> Self {
        FilterExpression::Condition(ConditionExpr {
            field: field.into(),
            operator: Some(operator),
            value: Some(value.into()),
            ..ConditionExpr::default()
        })
    }

    pub fn in_range(field: impl Into<String>, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        FilterExpression::Condition(ConditionExpr {
            field: field.into(),
            operator: Some(AdvancedOperator::InRange),
            value: Some(from.into()),
            value_to: Some(to.into()),
            values: None,
        })
    }

    pub fn in_set(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpression::Condition(ConditionExpr {
            field: field.into(),
            operator: Some(AdvancedOperator::InSet),
            values: Some(values),
            ..ConditionExpr::default()
        })
    }

    pub fn blank(field: impl Into<String>) -> Self {
        FilterExpression::Condition(ConditionExpr {
            field: field.into(),
            operator: Some(AdvancedOperator::Blank),
            ..ConditionExpr::default()
        })
    }

    pub fn not_blank(field: impl Into<String>) -> Self {
        FilterExpression::Condition(ConditionExpr {
            field: field.into(),
            operator: Some(AdvancedOperator::NotBlank),
            ..ConditionExpr::default()
        })
    }

    pub fn and(children: Vec<FilterExpression>) -> Self {
        FilterExpression::Group {
            operator: GroupOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterExpression>) -> Self {
        FilterExpression::Group {
            operator: GroupOperator::Or,
            children,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: FilterExpression) -> Self {
        FilterExpression::Not {
            child: Box::new(child),
        }
    }

    /// Evaluates the expression against one row.
    pub fn evaluate(&self, row: &Row) -> bool {
        match self {
            FilterExpression::Condition(condition) => evaluate_condition(condition, row),
            FilterExpression::Group { operator, children } => match operator {
                GroupOperator::And => children.iter().all(|c| c.evaluate(row)),
                GroupOperator::Or => children.iter().any(|c| c.evaluate(row)),
            },
            FilterExpression::Not { child } => !child.evaluate(row),
        }
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        _ => a == b,
    }
}

/// Orders numbers with numbers and text with text; anything else is incomparable.
fn compare_ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn evaluate_condition(condition: &ConditionExpr, row: &Row) -> bool {
    let Some(operator) = condition.operator else {
        return false;
    };
    let actual = row.value(&condition.field);
    let expected = condition.value.as_ref().unwrap_or(&Value::Null);

    let text_test = |test: fn(&str, &str) -> bool| {
        if actual.is_null() {
            return false;
        }
        test(
            &actual.to_display_string().to_lowercase(),
            &expected.to_display_string().to_lowercase(),
        )
    };

    match operator {
        AdvancedOperator::Equals => values_equal(actual, expected),
        AdvancedOperator::NotEquals => !values_equal(actual, expected),
        AdvancedOperator::Contains => text_test(|a, e| a.contains(e)),
        AdvancedOperator::NotContains => !text_test(|a, e| a.contains(e)),
        AdvancedOperator::StartsWith => text_test(|a, e| a.starts_with(e)),
        AdvancedOperator::EndsWith => text_test(|a, e| a.ends_with(e)),
        AdvancedOperator::GreaterThan => compare_ordered(actual, expected) == Some(Ordering::Greater),
        AdvancedOperator::GreaterThanOrEqual => matches!(
            compare_ordered(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        AdvancedOperator::LessThan => compare_ordered(actual, expected) == Some(Ordering::Less),
        AdvancedOperator::LessThanOrEqual => matches!(
            compare_ordered(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        AdvancedOperator::InRange => {
            let Some(to) = condition.value_to.as_ref() else {
                return false;
            };
            matches!(
                compare_ordered(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ) && matches!(compare_ordered(actual, to), Some(Ordering::Less | Ordering::Equal))
        }
        AdvancedOperator::Blank => actual.is_blank(),
        AdvancedOperator::NotBlank => !actual.is_blank(),
        AdvancedOperator::InSet => condition
            .values
            .as_ref()
            .is_some_and(|values| values.iter().any(|v| values_equal(actual, v))),
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_into(expr: &FilterExpression, path: &str, errors: &mut Vec<String>) {
    match expr {
        FilterExpression::Condition(condition) => {
            if condition.field.trim().is_empty() {
                errors.push(format!("{}: condition is missing a field", path));
            }
            match condition.operator {
                None => errors.push(format!("{}: condition is missing an operator", path)),
                Some(AdvancedOperator::InRange) if condition.value_to.is_none() => {
                    errors.push(format!("{}: inRange condition requires valueTo", path));
                }
                Some(AdvancedOperator::InSet) if condition.values.is_none() => {
                    errors.push(format!("{}: inSet condition requires values", path));
                }
                Some(_) => {}
            }
        }
        FilterExpression::Group { children, .. } => {
            if children.is_empty() {
                errors.push(format!("{}: group has no children", path));
            }
            for (i, child) in children.iter().enumerate() {
                validate_into(child, &format!("{}.children[{}]", path, i), errors);
            }
        }
        FilterExpression::Not { child } => {
            validate_into(child, &format!("{}.child", path), errors);
        }
    }
}

// ============================================================================
// ADVANCED FILTER
// ============================================================================

/// Caller-supplied row predicate combined with the expression.
#[derive(Clone)]
pub struct ExternalFilter(Arc<dyn Fn(&Row) -> bool + Send + Sync>);

impl ExternalFilter {
    pub fn new(f: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        ExternalFilter(Arc::new(f))
    }

    pub fn test(&self, row: &Row) -> bool {
        (self.0)(row)
    }
}

impl fmt::Debug for ExternalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExternalFilter(..)")
    }
}

/// One optional expression plus one optional external predicate.
#[derive(Debug, Clone, Default)]
pub struct AdvancedFilter {
    expression: Option<FilterExpression>,
    external: Option<ExternalFilter>,
}

impl AdvancedFilter {
    pub fn new() -> Self {
        AdvancedFilter::default()
    }

    /// Structural problems in an expression, without looking at any data.
    pub fn validate(expr: &FilterExpression) -> Vec<String> {
        let mut errors = Vec::new();
        validate_into(expr, "root", &mut errors);
        errors
    }

    pub fn set_expression(&mut self, expression: Option<FilterExpression>) {
        self.expression = expression;
    }

    pub fn expression(&self) -> Option<&FilterExpression> {
        self.expression.as_ref()
    }

    pub fn set_external_filter(&mut self, external: Option<ExternalFilter>) {
        self.external = external;
    }

    pub fn is_active(&self) -> bool {
        self.expression.is_some() || self.external.is_some()
    }

    /// Expression AND external predicate; absent parts pass.
    pub fn test_row(&self, row: &Row) -> bool {
        let expression_ok = self.expression.as_ref().map_or(true, |e| e.evaluate(row));
        expression_ok && self.external.as_ref().map_or(true, |f| f.test(row))
    }

    pub fn filter(&self, rows: &[Row]) -> Vec<Row> {
        if !self.is_active() {
            return rows.to_vec();
        }
        rows.iter().filter(|r| self.test_row(r)).cloned().collect()
    }
}
