//! FILENAME: pivot-engine/src/engine.rs
//! Row Pivot - turns grouped rows into dynamic pivot columns.
//!
//! One pass over the source rows assigns every row a group and a pivot key
//! and feeds its value fields into per-cell buckets. Pivot keys are sorted
//! so the generated column set is deterministic; output rows keep the order
//! in which their group first appears.

use grid_engine::{log_debug, log_info, ColumnDef, ColumnType, Row, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::aggregation::AggregationRegistry;
use crate::definition::{pivot_field_name, pivot_header_name, PivotConfig, BLANK_KEY, KEY_SEPARATOR};

/// Key parts for one row; pivots rarely span more than a few fields.
type KeyParts = SmallVec<[String; 4]>;

/// Output of a pivot run.
#[derive(Debug, Clone)]
pub struct PivotResult {
    /// Distinct pivot keys, sorted.
    pub pivot_keys: Vec<String>,
    /// Group-by columns followed by the generated pivot columns.
    pub columns: Vec<ColumnDef>,
    /// One row per distinct group.
    pub rows: Vec<Row>,
}

/// Renders one field value as a key part.
fn key_part(value: &Value) -> String {
    if value.is_null() {
        BLANK_KEY.to_string()
    } else {
        value.to_display_string()
    }
}

/// Joins the values of `fields` in `row` into a compound key.
pub fn compound_key(row: &Row, fields: &[String]) -> String {
    let parts: KeyParts = fields.iter().map(|f| key_part(row.value(f))).collect();
    parts.join(KEY_SEPARATOR)
}

// ============================================================================
// ROW PIVOT
// ============================================================================

/// Values collected for one (group, pivot key) cell, one list per value column.
struct Bucket {
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct RowPivot {
    config: PivotConfig,
    registry: AggregationRegistry,
}

impl RowPivot {
    pub fn new(config: PivotConfig) -> Self {
        RowPivot {
            config,
            registry: AggregationRegistry::new(),
        }
    }

    pub fn with_registry(mut self, registry: AggregationRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &PivotConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PivotConfig) {
        self.config = config;
    }

    pub fn registry_mut(&mut self) -> &mut AggregationRegistry {
        &mut self.registry
    }

    pub fn is_active(&self) -> bool {
        self.config.is_active()
    }

    /// Pivots `rows` grouped by `group_columns`.
    ///
    /// When pivoting is inactive the input rows and columns pass through.
    pub fn pivot(&self, rows: &[Row], group_columns: &[String], original_columns: &[ColumnDef]) -> PivotResult {
        if !self.is_active() {
            return PivotResult {
                pivot_keys: Vec::new(),
                columns: original_columns.to_vec(),
                rows: rows.to_vec(),
            };
        }

        let value_columns = &self.config.value_columns;

        // 1. Single pass: group index, pivot key index, value buckets
        let mut group_order: Vec<(String, usize)> = Vec::new();
        let mut group_index: FxHashMap<String, usize> = FxHashMap::default();
        let mut key_index: FxHashMap<String, usize> = FxHashMap::default();
        let mut keys: Vec<String> = Vec::new();
        let mut buckets: FxHashMap<(usize, usize), Bucket> = FxHashMap::default();

        for (row_idx, row) in rows.iter().enumerate() {
            let group_key = compound_key(row, group_columns);
            let group = match group_index.get(&group_key) {
                Some(&g) => g,
                None => {
                    let g = group_order.len();
                    group_index.insert(group_key.clone(), g);
                    group_order.push((group_key, row_idx));
                    g
                }
            };

            let pivot_key = compound_key(row, &self.config.pivot_columns);
            let key = match key_index.get(&pivot_key) {
                Some(&k) => k,
                None => {
                    let k = keys.len();
                    key_index.insert(pivot_key.clone(), k);
                    keys.push(pivot_key);
                    k
                }
            };

            let bucket = buckets.entry((group, key)).or_insert_with(|| Bucket {
                values: vec![Vec::new(); value_columns.len()],
            });
            for (i, vc) in value_columns.iter().enumerate() {
                bucket.values[i].push(row.value(&vc.field).clone());
            }
        }

        // 2. Sorted pivot keys
        let mut sorted_keys: Vec<(String, usize)> = keys.into_iter().enumerate().map(|(i, k)| (k, i)).collect();
        sorted_keys.sort_by(|a, b| a.0.cmp(&b.0));

        // 3. Columns
        let mut columns: Vec<ColumnDef> = group_columns
            .iter()
            .filter(|field| !self.config.uses_field(field))
            .map(|field| {
                original_columns
                    .iter()
                    .find(|c| &c.field == field)
                    .cloned()
                    .unwrap_or_else(|| ColumnDef::new(field.clone()))
            })
            .collect();
        let group_fields: Vec<String> = columns.iter().map(|c| c.field.clone()).collect();

        for (key, _) in &sorted_keys {
            for vc in value_columns {
                columns.push(
                    ColumnDef::new(pivot_field_name(key, &vc.field))
                        .with_header(pivot_header_name(key, vc))
                        .with_type(ColumnType::Number)
                        .with_agg_func(vc.agg_func.clone()),
                );
            }
        }

        // 4. Rows
        let mut output = Vec::with_capacity(group_order.len());
        for (group, (_, first_row)) in group_order.iter().enumerate() {
            let source = &rows[*first_row];
            let mut out = Row::new();
            for field in &group_fields {
                out.set(field.clone(), source.value(field).clone());
            }
            for (key, original_idx) in &sorted_keys {
                let bucket = buckets.get(&(group, *original_idx));
                for (i, vc) in value_columns.iter().enumerate() {
                    let values: &[Value] = bucket.map(|b| b.values[i].as_slice()).unwrap_or(&[]);
                    let cell = match &vc.custom {
                        Some(f) => f.call(values),
                        None => self.registry.aggregate(&vc.agg_func, values),
                    };
                    out.set(pivot_field_name(key, &vc.field), cell);
                }
            }
            output.push(out);
        }

        log_info!(
            "PIVOT",
            "pivot: {} rows -> {} groups x {} keys ({} columns)",
            rows.len(),
            output.len(),
            sorted_keys.len(),
            columns.len()
        );
        log_debug!("PIVOT", "pivot keys: {:?}", sorted_keys.iter().map(|(k, _)| k).collect::<Vec<_>>());

        PivotResult {
            pivot_keys: sorted_keys.into_iter().map(|(k, _)| k).collect(),
            columns,
            rows: output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregationFn;
    use crate::definition::ValueColumn;

    fn sales() -> Vec<Row> {
        vec![
            Row::new().with("region", "North").with("year", 2024).with("qtr", "Q1").with("sales", 100),
            Row::new().with("region", "South").with("year", 2023).with("qtr", "Q2").with("sales", 200),
            Row::new().with("region", "North").with("year", 2023).with("qtr", "Q1").with("sales", 50),
            Row::new().with("region", "North").with("year", 2024).with("qtr", "Q1").with("sales", 25),
            Row::new().with("region", "South").with("year", Value::Null).with("qtr", "Q1").with("sales", "bad"),
        ]
    }

    fn year_pivot(agg: &str) -> RowPivot {
        RowPivot::new(
            PivotConfig::new()
                .with_pivot_column("year")
                .with_value_column(ValueColumn::new("sales", agg)),
        )
    }

    fn group_by_region() -> Vec<String> {
        vec!["region".to_string()]
    }

    #[test]
    fn test_basic_pivot() {
        let result = year_pivot("sum").pivot(&sales(), &group_by_region(), &[]);

        assert_eq!(result.pivot_keys, vec!["(blank)", "2023", "2024"]);
        let fields: Vec<&str> = result.columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["region", "pivot_(blank)_sales", "pivot_2023_sales", "pivot_2024_sales"]
        );
        assert_eq!(result.columns[3].header(), "2024 (sum sales)");
        assert_eq!(result.columns[3].column_type, ColumnType::Number);
        assert!(!result.columns[3].editable);

        assert_eq!(result.rows.len(), 2);
        let north = &result.rows[0];
        assert_eq!(north.value("region"), &Value::from("North"));
        assert_eq!(north.value("pivot_2024_sales"), &Value::from(125));
        assert_eq!(north.value("pivot_2023_sales"), &Value::from(50));
        // No North rows without a year
        assert_eq!(north.value("pivot_(blank)_sales"), &Value::from(0));

        let south = &result.rows[1];
        assert_eq!(south.value("pivot_(blank)_sales"), &Value::from(0));
        assert_eq!(south.value("pivot_2023_sales"), &Value::from(200));
    }

    #[test]
    fn test_avg_over_empty_cell_is_null() {
        let result = year_pivot("avg").pivot(&sales(), &group_by_region(), &[]);
        assert_eq!(result.rows[0].value("pivot_2024_sales"), &Value::from(62.5));
        assert_eq!(result.rows[1].value("pivot_2024_sales"), &Value::Null);
    }

    #[test]
    fn test_compound_pivot_key() {
        let pivot = RowPivot::new(
            PivotConfig::new()
                .with_pivot_column("year")
                .with_pivot_column("qtr")
                .with_value_column(ValueColumn::new("sales", "count")),
        );
        let result = pivot.pivot(&sales(), &group_by_region(), &[]);
        assert_eq!(result.pivot_keys, vec!["(blank)|Q1", "2023|Q1", "2023|Q2", "2024|Q1"]);
        assert_eq!(result.rows[0].value("pivot_2024|Q1_sales"), &Value::from(2));
    }

    #[test]
    fn test_pivot_is_deterministic() {
        let pivot = year_pivot("max");
        let a = pivot.pivot(&sales(), &group_by_region(), &[]);
        let mut reversed = sales();
        reversed.reverse();
        let b = pivot.pivot(&reversed, &group_by_region(), &[]);
        assert_eq!(a.pivot_keys, b.pivot_keys);
        let fa: Vec<&String> = a.columns.iter().map(|c| &c.field).collect();
        let fb: Vec<&String> = b.columns.iter().map(|c| &c.field).collect();
        assert_eq!(fa, fb);
        assert_eq!(a.rows, pivot.pivot(&sales(), &group_by_region(), &[]).rows);
    }

    #[test]
    fn test_inactive_pivot_passes_through() {
        let pivot = RowPivot::new(PivotConfig::new().with_pivot_column("year"));
        let columns = vec![ColumnDef::new("region")];
        let result = pivot.pivot(&sales(), &group_by_region(), &columns);
        assert!(result.pivot_keys.is_empty());
        assert_eq!(result.rows, sales());
        assert_eq!(result.columns.len(), 1);
    }

    #[test]
    fn test_group_columns_exclude_pivot_and_value_fields() {
        let groups = vec!["region".to_string(), "year".to_string()];
        let originals = vec![ColumnDef::new("region").with_header("Region").with_width(120.0)];
        let result = year_pivot("sum").pivot(&sales(), &groups, &originals);
        assert_eq!(result.columns[0].header(), "Region");
        assert_eq!(result.columns[1].field, "pivot_(blank)_sales");
        // Grouped by region and year: 4 distinct groups
        assert_eq!(result.rows.len(), 4);
        assert!(!result.rows[0].contains_field("year"));
    }

    #[test]
    fn test_custom_and_registered_aggregations() {
        let spread = AggregationFn::new(|values| Value::from(values.len() * 10));
        let mut pivot = RowPivot::new(
            PivotConfig::new()
                .with_pivot_column("year")
                .with_value_column(ValueColumn::with_custom("sales", "spread", spread))
                .with_value_column(ValueColumn::new("region", "distinct")),
        );
        pivot.registry_mut().register(
            "distinct",
            AggregationFn::new(|values| {
                let mut seen: Vec<String> = values.iter().map(|v| v.to_display_string()).collect();
                seen.sort();
                seen.dedup();
                Value::from(seen.len())
            }),
        );

        let result = pivot.pivot(&sales(), &[], &[]);
        assert_eq!(result.rows.len(), 1);
        let total = &result.rows[0];
        assert_eq!(total.value("pivot_2024_sales"), &Value::from(20));
        assert_eq!(total.value("pivot_2023_region"), &Value::from(2));
        assert_eq!(result.columns[0].header(), "(blank) (spread sales)");
    }

    #[test]
    fn test_unknown_aggregation_yields_null() {
        let result = year_pivot("median").pivot(&sales(), &group_by_region(), &[]);
        assert_eq!(result.rows[0].value("pivot_2024_sales"), &Value::Null);
    }
}
