//! FILENAME: grid-engine/src/value.rs
//! PURPOSE: Defines the data records the grid works on.
//! CONTEXT: A `Row` is an opaque field -> `Value` mapping owned by the caller.
//! The engine never mutates a row in place; writes produce new rows.
//! `RowKey` is the hashable projection of a row's key field, used by the
//! selection set, the transaction manager and tree node lookup.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Default name of the field that identifies a row.
pub const DEFAULT_KEY_FIELD: &str = "id";

// ============================================================================
// VALUE
// ============================================================================

/// The value held by one field of a row.
///
/// Serialized untagged, so rows read and write as plain JSON objects.
/// Dates have no variant of their own: they travel as `Text` (ISO 8601)
/// or as a `Number` of epoch milliseconds, see [`Value::as_timestamp`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Record(Row),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The numeric value, only for `Number`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value, parsing numeric text as well.
    pub fn to_f64_lenient(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Row> {
        match self {
            Value::Record(row) => Some(row),
            _ => None,
        }
    }

    /// Interprets the value as a point in time, in epoch milliseconds.
    ///
    /// Accepts numbers (already milliseconds), RFC 3339 text,
    /// `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`.
    pub fn as_timestamp(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Text used for display-oriented matching (text filters, pivot keys).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Record(row) => serde_json::to_string(row).unwrap_or_default(),
        }
    }
}

/// Format without unnecessary decimal places
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

fn parse_timestamp(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis() as f64);
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(dt.and_utc().timestamp_millis() as f64);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Row> for Value {
    fn from(row: Row) -> Self {
        Value::Record(row)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// ROW
// ============================================================================

/// One data record: an opaque mapping of field name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

static NULL: Value = Value::Null;

impl Row {
    pub fn new() -> Self {
        Row {
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The field's value, `Null` when the field is absent.
    pub fn value(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Shallow merge: every field of `update` overwrites the same field here.
    pub fn merged(&self, update: &Row) -> Row {
        let mut fields = self.fields.clone();
        for (field, value) in &update.fields {
            fields.insert(field.clone(), value.clone());
        }
        Row { fields }
    }

    /// The row's identity under the given key field, if it has one.
    pub fn key(&self, key_field: &str) -> Option<RowKey> {
        self.fields
            .get(key_field)
            .filter(|v| !v.is_null())
            .map(RowKey::from)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// ROW KEY
// ============================================================================

/// Wrapper around f64 that implements Eq and Hash for use as HashMap keys.
/// NaN values are treated as equal to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            // All NaN values hash to the same thing
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            // 0.0 and -0.0 compare equal, so they must hash alike
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

impl OrderedFloat {
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// A normalized, hashable representation of a row's key value.
///
/// Keys are type-strict: the number `1` and the text `"1"` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowKey {
    Null,
    Bool(bool),
    Number(OrderedFloat),
    Text(String),
}

impl From<&Value> for RowKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RowKey::Null,
            Value::Bool(b) => RowKey::Bool(*b),
            Value::Number(n) => RowKey::Number(OrderedFloat(*n)),
            Value::Text(s) => RowKey::Text(s.clone()),
            // Composite keys are identified by their JSON text
            Value::List(_) | Value::Record(_) => {
                RowKey::Text(serde_json::to_string(value).unwrap_or_default())
            }
        }
    }
}

impl From<RowKey> for Value {
    fn from(key: RowKey) -> Self {
        match key {
            RowKey::Null => Value::Null,
            RowKey::Bool(b) => Value::Bool(b),
            RowKey::Number(n) => Value::Number(n.0),
            RowKey::Text(s) => Value::Text(s),
        }
    }
}

impl From<i32> for RowKey {
    fn from(n: i32) -> Self {
        RowKey::Number(OrderedFloat(n as f64))
    }
}

impl From<f64> for RowKey {
    fn from(n: f64) -> Self {
        RowKey::Number(OrderedFloat(n))
    }
}

impl From<&str> for RowKey {
    fn from(s: &str) -> Self {
        RowKey::Text(s.to_string())
    }
}

impl From<String> for RowKey {
    fn from(s: String) -> Self {
        RowKey::Text(s)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Null => f.write_str("null"),
            RowKey::Bool(b) => write!(f, "{}", b),
            RowKey::Number(n) => f.write_str(&format_number(n.0)),
            RowKey::Text(s) => f.write_str(s),
        }
    }
}

/// Total order used wherever two plain values are compared without a
/// column-specific comparator. Numbers < Text < Booleans < composites.
/// Nulls are not handled here; callers decide where they go.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn type_order(v: &Value) -> u8 {
        match v {
            Value::Number(_) => 0,
            Value::Text(_) => 1,
            Value::Bool(_) => 2,
            Value::List(_) => 3,
            Value::Record(_) => 4,
            Value::Null => 5,
        }
    }

    match (a, b) {
        // NaN sorts above every other number and equal to itself
        (Value::Number(n1), Value::Number(n2)) => match (n1.is_nan(), n2.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => n1.partial_cmp(n2).unwrap_or(Ordering::Equal),
        },
        (Value::Text(s1), Value::Text(s2)) => s1.cmp(s2),
        // FALSE < TRUE
        (Value::Bool(b1), Value::Bool(b2)) => b1.cmp(b2),
        (Value::List(l1), Value::List(l2)) => {
            for (x, y) in l1.iter().zip(l2.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            l1.len().cmp(&l2.len())
        }
        _ => type_order(a).cmp(&type_order(b)),
    }
}
