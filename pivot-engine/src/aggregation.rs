//! FILENAME: pivot-engine/src/aggregation.rs
//! Aggregation functions shared by pivoting and row grouping.
//!
//! Built-ins are computed through an `Accumulator` in one pass. Custom
//! aggregations are registered by name in an `AggregationRegistry`; a custom
//! name shadows the built-in of the same name.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use grid_engine::Value;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// BUILT-IN AGGREGATIONS
// ============================================================================

/// Supported built-in aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    #[default]
    Sum,
    Avg,
    Min,
    Max,
    Count,
    First,
    Last,
}

impl AggregationType {
    pub const ALL: [AggregationType; 7] = [
        AggregationType::Sum,
        AggregationType::Avg,
        AggregationType::Min,
        AggregationType::Max,
        AggregationType::Count,
        AggregationType::First,
        AggregationType::Last,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Avg => "avg",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Count => "count",
            AggregationType::First => "first",
            AggregationType::Last => "last",
        }
    }

    /// Aggregates raw values (one per source row).
    pub fn apply(&self, values: &[Value]) -> Value {
        let mut acc = Accumulator::new();
        for value in values {
            acc.add(value);
        }
        acc.compute(*self)
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregationType::ALL
            .iter()
            .copied()
            .find(|agg| agg.name() == s)
            .ok_or_else(|| format!("Unknown aggregation: {}", s))
    }
}

/// Running totals for one group. Non-numeric values only count towards
/// `count`, `first` and `last`.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    count: usize,
    numeric_count: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    first: Option<Value>,
    last: Option<Value>,
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator::default()
    }

    pub fn add(&mut self, value: &Value) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(value.clone());
        }
        self.last = Some(value.clone());

        if let Value::Number(n) = value {
            if n.is_finite() {
                self.numeric_count += 1;
                self.sum += n;
                self.min = Some(self.min.map_or(*n, |m| m.min(*n)));
                self.max = Some(self.max.map_or(*n, |m| m.max(*n)));
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn compute(&self, aggregation: AggregationType) -> Value {
        match aggregation {
            AggregationType::Sum => Value::Number(self.sum),
            AggregationType::Avg => {
                if self.numeric_count == 0 {
                    Value::Null
                } else {
                    Value::Number(self.sum / self.numeric_count as f64)
                }
            }
            AggregationType::Min => self.min.map(Value::Number).unwrap_or(Value::Null),
            AggregationType::Max => self.max.map(Value::Number).unwrap_or(Value::Null),
            AggregationType::Count => Value::from(self.count),
            AggregationType::First => self.first.clone().unwrap_or(Value::Null),
            AggregationType::Last => self.last.clone().unwrap_or(Value::Null),
        }
    }
}

// ============================================================================
// CUSTOM AGGREGATIONS
// ============================================================================

/// A caller-supplied aggregation over the raw values of one group.
#[derive(Clone)]
pub struct AggregationFn(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl AggregationFn {
    pub fn new(f: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        AggregationFn(Arc::new(f))
    }

    pub fn call(&self, values: &[Value]) -> Value {
        (self.0)(values)
    }
}

impl fmt::Debug for AggregationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AggregationFn(..)")
    }
}

/// Named aggregation table: custom registrations first, then built-ins.
#[derive(Debug, Clone, Default)]
pub struct AggregationRegistry {
    custom: FxHashMap<String, AggregationFn>,
}

impl AggregationRegistry {
    pub fn new() -> Self {
        AggregationRegistry::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: AggregationFn) {
        self.custom.insert(name.into(), f);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.custom.remove(name).is_some()
    }

    /// True when `name` resolves to a custom or built-in aggregation.
    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name) || name.parse::<AggregationType>().is_ok()
    }

    /// Aggregates values under `name`. Unknown names yield `Null`.
    pub fn aggregate(&self, name: &str, values: &[Value]) -> Value {
        if let Some(custom) = self.custom.get(name) {
            return custom.call(values);
        }
        match name.parse::<AggregationType>() {
            Ok(builtin) => builtin.apply(values),
            Err(_) => Value::Null,
        }
    }
}
