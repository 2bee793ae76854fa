//! FILENAME: pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains the types needed to DESCRIBE a row pivot:
//! which fields spread into columns and which fields are aggregated.
//! Custom aggregation functions are runtime-only and never serialized.

use serde::{Deserialize, Serialize};

use crate::aggregation::AggregationFn;

/// Label used for a null pivot or group value.
pub const BLANK_KEY: &str = "(blank)";

/// Joins the parts of a compound pivot or group key.
pub const KEY_SEPARATOR: &str = "|";

/// Prefix of every generated pivot column field.
pub const PIVOT_FIELD_PREFIX: &str = "pivot_";

// ============================================================================
// VALUE COLUMNS
// ============================================================================

/// A field to aggregate with its aggregation function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueColumn {
    pub field: String,

    /// Built-in or registered aggregation name ("sum", "avg", ...).
    #[serde(default = "default_agg_func")]
    pub agg_func: String,

    /// Overrides `agg_func` when present.
    #[serde(skip)]
    pub custom: Option<AggregationFn>,
}

fn default_agg_func() -> String {
    "sum".to_string()
}

impl ValueColumn {
    pub fn new(field: impl Into<String>, agg_func: impl Into<String>) -> Self {
        ValueColumn {
            field: field.into(),
            agg_func: agg_func.into(),
            custom: None,
        }
    }

    /// A value column aggregated by its own function; `label` is shown
    /// where the aggregation name would be.
    pub fn with_custom(field: impl Into<String>, label: impl Into<String>, f: AggregationFn) -> Self {
        ValueColumn {
            field: field.into(),
            agg_func: label.into(),
            custom: Some(f),
        }
    }
}

// ============================================================================
// PIVOT CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotConfig {
    /// Fields whose distinct values become columns.
    pub pivot_columns: Vec<String>,
    pub value_columns: Vec<ValueColumn>,
}

impl PivotConfig {
    pub fn new() -> Self {
        PivotConfig::default()
    }

    pub fn with_pivot_column(mut self, field: impl Into<String>) -> Self {
        self.pivot_columns.push(field.into());
        self
    }

    pub fn with_value_column(mut self, value_column: ValueColumn) -> Self {
        self.value_columns.push(value_column);
        self
    }

    /// Pivoting needs at least one pivot field and one value field.
    pub fn is_active(&self) -> bool {
        !self.pivot_columns.is_empty() && !self.value_columns.is_empty()
    }

    /// True if `field` is consumed by the pivot (as pivot or value field).
    pub fn uses_field(&self, field: &str) -> bool {
        self.pivot_columns.iter().any(|f| f == field) || self.value_columns.iter().any(|v| v.field == field)
    }
}

/// Field name of the generated column for one pivot key and value field.
pub fn pivot_field_name(pivot_key: &str, value_field: &str) -> String {
    format!("{}{}_{}", PIVOT_FIELD_PREFIX, pivot_key, value_field)
}

/// Header of the generated column, e.g. `"2024|Q1 (sum sales)"`.
pub fn pivot_header_name(pivot_key: &str, value_column: &ValueColumn) -> String {
    format!("{} ({} {})", pivot_key, value_column.agg_func, value_column.field)
}
