//! FILENAME: grid-engine/src/sort.rs
//! PURPOSE: Multi-key row sorting and sort-model click cycling.
//! CONTEXT: `sort_rows` is a pure function: it returns a new vector and
//! never touches its input. The column's comparator, when present, owns the
//! ordering of its key completely (direction included).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::column::{find_column, ColumnDef, ColumnType, SortDirection};
use crate::value::{compare_values, Row, Value};

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortItem {
    pub field: String,
    #[serde(rename = "sort")]
    pub direction: SortDirection,
}

impl SortItem {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        SortItem {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        SortItem::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortItem::new(field, SortDirection::Desc)
    }
}

/// Ordered sort keys, primary first.
pub type SortModel = Vec<SortItem>;

/// Sorts rows by the model. Stable: rows equal on every key keep their order.
pub fn sort_rows(rows: &[Row], sort_model: &[SortItem], columns: &[ColumnDef]) -> Vec<Row> {
    let mut sorted = rows.to_vec();
    if sort_model.is_empty() {
        return sorted;
    }

    let keys: Vec<(&SortItem, Option<&ColumnDef>)> = sort_model
        .iter()
        .map(|item| (item, find_column(columns, &item.field)))
        .collect();

    sorted.sort_by(|a, b| compare_rows_by_keys(a, b, &keys));
    sorted
}

/// Compare two rows by the given sort keys.
fn compare_rows_by_keys(a: &Row, b: &Row, keys: &[(&SortItem, Option<&ColumnDef>)]) -> Ordering {
    for (item, column) in keys {
        let val_a = a.value(&item.field);
        let val_b = b.value(&item.field);
        let descending = item.direction == SortDirection::Desc;

        let ordering = match column.and_then(|c| c.comparator.as_ref()) {
            Some(comparator) => comparator.compare(val_a, val_b, a, b, descending),
            None => {
                let column_type = column.map(|c| c.column_type).unwrap_or_default();
                default_compare(val_a, val_b, column_type, descending)
            }
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Type-aware comparison with nulls always last, whatever the direction.
/// NaN counts as null.
pub fn default_compare(a: &Value, b: &Value, column_type: ColumnType, descending: bool) -> Ordering {
    let (a, b) = match column_type {
        // Unparseable dates behave like nulls
        ColumnType::Date => (
            a.as_timestamp().map(Value::Number).unwrap_or(Value::Null),
            b.as_timestamp().map(Value::Number).unwrap_or(Value::Null),
        ),
        _ => (a.clone(), b.clone()),
    };

    let blank = |v: &Value| v.is_null() || matches!(v, Value::Number(n) if n.is_nan());
    match (blank(&a), blank(&b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = compare_values(&a, &b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

/// Cycles `None -> Asc -> Desc -> None`.
pub fn next_sort_direction(current: Option<SortDirection>) -> Option<SortDirection> {
    match current {
        None => Some(SortDirection::Asc),
        Some(SortDirection::Asc) => Some(SortDirection::Desc),
        Some(SortDirection::Desc) => None,
    }
}

/// Computes the model after a header click on `field`.
///
/// Single-sort: the active field cycles and drops out on the third click;
/// any other field replaces the model. Multi-sort: absent fields append at
/// `Asc`, present fields cycle in place and drop out alone.
pub fn update_sort_model(model: &[SortItem], field: &str, multi_sort: bool) -> SortModel {
    let position = model.iter().position(|s| s.field == field);

    if !multi_sort {
        let current = position.map(|i| model[i].direction);
        return match next_sort_direction(current) {
            Some(direction) => vec![SortItem::new(field, direction)],
            None => Vec::new(),
        };
    }

    let mut next = model.to_vec();
    match position {
        Some(i) => match next_sort_direction(Some(next[i].direction)) {
            Some(direction) => next[i].direction = direction,
            None => {
                next.remove(i);
            }
        },
        None => next.push(SortItem::asc(field)),
    }
    next
}
