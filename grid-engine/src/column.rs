//! FILENAME: grid-engine/src/column.rs
//! PURPOSE: Declarative column definitions.
//! CONTEXT: A `ColumnDef` is created once by the caller and is read-only to
//! the engine. Live geometry (width, offset, visibility, pin, sort) is kept
//! by the `ColumnController` in its own shadow state.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::transaction::CellEdit;
use crate::value::{Row, Value};

/// Width given to columns that do not declare one.
pub const DEFAULT_COLUMN_WIDTH: f64 = 200.0;

/// Data type of a column, drives default comparison and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
}

/// Which side a column is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pinned {
    Left,
    Right,
}

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Asc,
    Desc,
}

// ============================================================================
// CALLBACKS
// ============================================================================

/// Custom ordering for a column.
///
/// Receives both raw values, both rows and whether the sort is descending.
/// It is solely responsible for the final order, direction included.
#[derive(Clone)]
pub struct Comparator(Arc<dyn Fn(&Value, &Value, &Row, &Row, bool) -> Ordering + Send + Sync>);

impl Comparator {
    pub fn new(f: impl Fn(&Value, &Value, &Row, &Row, bool) -> Ordering + Send + Sync + 'static) -> Self {
        Comparator(Arc::new(f))
    }

    pub fn compare(&self, a: &Value, b: &Value, row_a: &Row, row_b: &Row, descending: bool) -> Ordering {
        (self.0)(a, b, row_a, row_b, descending)
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Comparator(..)")
    }
}

/// What a validator sees for one proposed edit.
#[derive(Debug, Clone)]
pub struct ValidationParams<'a> {
    pub field: &'a str,
    pub old_value: &'a Value,
    pub new_value: &'a Value,
    pub row: &'a Row,
}

/// Edit validator: `Ok(())` accepts, `Err(message)` rejects with a reason.
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&ValidationParams<'_>) -> Result<(), String> + Send + Sync>);

impl Validator {
    pub fn new(f: impl Fn(&ValidationParams<'_>) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Validator(Arc::new(f))
    }

    pub fn validate(&self, params: &ValidationParams<'_>) -> Result<(), String> {
        (self.0)(params)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

// ============================================================================
// COLUMN DEFINITION
// ============================================================================

/// Declarative column definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub field: String,

    /// Header text (defaults to the field name).
    #[serde(default)]
    pub header_name: Option<String>,

    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub min_width: Option<f64>,
    #[serde(default)]
    pub max_width: Option<f64>,
    /// Flex weight used by size-to-fit. Columns without it keep their width.
    #[serde(default)]
    pub flex: Option<f64>,

    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub pinned: Option<Pinned>,
    #[serde(default)]
    pub lock_visible: bool,
    #[serde(default)]
    pub lock_position: bool,

    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default)]
    pub editable: bool,

    #[serde(default, rename = "type")]
    pub column_type: ColumnType,

    /// Aggregation function name used when grouping/pivoting ("sum", "avg", ...).
    #[serde(default)]
    pub agg_func: Option<String>,
    #[serde(default)]
    pub row_group: bool,
    #[serde(default)]
    pub pivot: bool,

    #[serde(skip)]
    pub comparator: Option<Comparator>,
    #[serde(skip)]
    pub validator: Option<Validator>,
}

fn default_true() -> bool {
    true
}

impl ColumnDef {
    pub fn new(field: impl Into<String>) -> Self {
        ColumnDef {
            field: field.into(),
            header_name: None,
            width: None,
            min_width: None,
            max_width: None,
            flex: None,
            hide: false,
            pinned: None,
            lock_visible: false,
            lock_position: false,
            sortable: true,
            filterable: true,
            editable: false,
            column_type: ColumnType::Text,
            agg_func: None,
            row_group: false,
            pivot: false,
            comparator: None,
            validator: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header_name = Some(header.into());
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_min_width(mut self, min_width: f64) -> Self {
        self.min_width = Some(min_width);
        self
    }

    pub fn with_max_width(mut self, max_width: f64) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_flex(mut self, flex: f64) -> Self {
        self.flex = Some(flex);
        self
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn pinned(mut self, pinned: Pinned) -> Self {
        self.pinned = Some(pinned);
        self
    }

    pub fn lock_visible(mut self) -> Self {
        self.lock_visible = true;
        self
    }

    pub fn lock_position(mut self) -> Self {
        self.lock_position = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn with_agg_func(mut self, agg_func: impl Into<String>) -> Self {
        self.agg_func = Some(agg_func.into());
        self
    }

    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Header text shown for this column.
    pub fn header(&self) -> &str {
        self.header_name.as_deref().unwrap_or(&self.field)
    }

    /// Declared width, or the default.
    pub fn declared_width(&self) -> f64 {
        self.width.unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    /// Clamps a width to [min_width, max_width] (default 0..inf).
    pub fn clamp_width(&self, width: f64) -> f64 {
        let min = self.min_width.unwrap_or(0.0);
        let max = self.max_width.unwrap_or(f64::INFINITY).max(min);
        width.max(min).min(max)
    }

    /// Runs the validator for a proposed cell edit on `row`.
    ///
    /// Columns that are not editable reject every edit; editable columns
    /// without a validator accept everything.
    pub fn validate_edit(&self, edit: &CellEdit, row: &Row) -> Result<(), String> {
        if !self.editable {
            return Err(format!("Column '{}' is not editable", self.field));
        }
        match &self.validator {
            Some(validator) => validator.validate(&ValidationParams {
                field: &self.field,
                old_value: &edit.old_value,
                new_value: &edit.new_value,
                row,
            }),
            None => Ok(()),
        }
    }
}

/// Finds the definition for a field.
pub fn find_column<'a>(columns: &'a [ColumnDef], field: &str) -> Option<&'a ColumnDef> {
    columns.iter().find(|c| c.field == field)
}
