//! FILENAME: grid-engine/src/transaction.rs
//! PURPOSE: Keyed add/update/remove transactions over a row list, with a
//! bounded log used to build single-step undo.
//! CONTEXT: `apply` never mutates its input. Each applied transaction is
//! recorded as a `TransactionResult`; `build_undo_transaction` inverts the
//! most recent entry without popping it.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::log_debug;
use crate::value::{Row, RowKey, Value, DEFAULT_KEY_FIELD};

/// Maximum number of results kept in the transaction log.
const MAX_LOG_SIZE: usize = 100;

/// A batch of row changes, applied remove -> update -> add.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub add: Vec<Row>,
    /// Insert position for `add`, clamped; appends when absent.
    pub add_index: Option<usize>,
    pub update: Vec<Row>,
    pub remove: Vec<Row>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction::default()
    }

    pub fn with_add(mut self, rows: Vec<Row>) -> Self {
        self.add = rows;
        self
    }

    pub fn with_add_index(mut self, index: usize) -> Self {
        self.add_index = Some(index);
        self
    }

    pub fn with_update(mut self, rows: Vec<Row>) -> Self {
        self.update = rows;
        self
    }

    pub fn with_remove(mut self, rows: Vec<Row>) -> Self {
        self.remove = rows;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    /// Single-row update for a cell edit.
    ///
    /// Returns `None` when the index is out of range or the row has no key.
    pub fn from_cell_edit(rows: &[Row], edit: &CellEdit, key_field: &str) -> Option<Self> {
        let row = rows.get(edit.row_index)?;
        let key = row.get(key_field).filter(|v| !v.is_null())?;
        let update = Row::new()
            .with(key_field, key.clone())
            .with(edit.field.clone(), edit.new_value.clone());
        Some(Transaction::new().with_update(vec![update]))
    }
}

/// One edited cell, as produced by an editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEdit {
    pub row_index: usize,
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

impl CellEdit {
    pub fn new(
        row_index: usize,
        field: impl Into<String>,
        old_value: impl Into<Value>,
        new_value: impl Into<Value>,
    ) -> Self {
        CellEdit {
            row_index,
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

/// Before/after pair for an updated row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    pub old: Row,
    pub new: Row,
}

/// Exactly which rows a transaction touched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionResult {
    pub added: Vec<Row>,
    pub updated: Vec<RowUpdate>,
    pub removed: Vec<Row>,
}

impl TransactionResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Accumulates another step's result into this one.
    pub fn extend(&mut self, other: TransactionResult) {
        self.added.extend(other.added);
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }
}

// ============================================================================
// TRANSACTION MANAGER
// ============================================================================

/// Applies transactions and keeps the bounded result log.
#[derive(Debug)]
pub struct TransactionManager {
    key_field: String,
    /// Applied results, most recent at back.
    log: VecDeque<TransactionResult>,
    max_size: usize,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            log: VecDeque::with_capacity(MAX_LOG_SIZE),
            max_size: MAX_LOG_SIZE,
        }
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    pub fn with_max_log_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        while self.log.len() > self.max_size {
            self.log.pop_front();
        }
        self
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    fn key_of(&self, row: &Row) -> Option<RowKey> {
        row.key(&self.key_field)
    }

    /// Applies one transaction to a copy of `rows`.
    pub fn apply(&mut self, rows: &[Row], tx: &Transaction) -> (Vec<Row>, TransactionResult) {
        let mut result = TransactionResult::default();
        let mut next: Vec<Row> = Vec::with_capacity(rows.len() + tx.add.len());

        // 1. Remove
        let remove_keys: FxHashSet<RowKey> = tx.remove.iter().filter_map(|r| self.key_of(r)).collect();
        for row in rows {
            match self.key_of(row) {
                Some(key) if remove_keys.contains(&key) => result.removed.push(row.clone()),
                _ => next.push(row.clone()),
            }
        }

        // 2. Update (shallow merge). Every row sharing the key is updated.
        if !tx.update.is_empty() {
            let mut positions: FxHashMap<RowKey, Vec<usize>> = FxHashMap::default();
            for (i, row) in next.iter().enumerate() {
                if let Some(key) = self.key_of(row) {
                    positions.entry(key).or_default().push(i);
                }
            }
            for update in &tx.update {
                let Some(found) = self.key_of(update).and_then(|key| positions.get(&key)) else {
                    continue;
                };
                for &i in found {
                    let merged = next[i].merged(update);
                    result.updated.push(RowUpdate {
                        old: std::mem::replace(&mut next[i], merged.clone()),
                        new: merged,
                    });
                }
            }
        }

        // 3. Add
        if !tx.add.is_empty() {
            let index = tx.add_index.unwrap_or(next.len()).min(next.len());
            next.splice(index..index, tx.add.iter().cloned());
            result.added.extend(tx.add.iter().cloned());
        }

        log_debug!(
            "TXN",
            "apply: +{} ~{} -{} -> {} rows",
            result.added.len(),
            result.updated.len(),
            result.removed.len(),
            next.len()
        );

        self.push_result(result.clone());
        (next, result)
    }

    /// Threads transactions through `apply` in order.
    ///
    /// Returns the final rows and one result per step.
    pub fn apply_batch(&mut self, rows: &[Row], txs: &[Transaction]) -> (Vec<Row>, Vec<TransactionResult>) {
        let mut current = rows.to_vec();
        let mut results = Vec::with_capacity(txs.len());
        for tx in txs {
            let (next, result) = self.apply(&current, tx);
            current = next;
            results.push(result);
        }
        (current, results)
    }

    /// Inverse of the most recent logged result, or `None` if the log is empty.
    pub fn build_undo_transaction(&self) -> Option<Transaction> {
        let last = self.log.back()?;
        let mut undo = Transaction::new();

        undo.remove = last
            .added
            .iter()
            .filter_map(|row| self.key_of(row).map(|_| row.clone()))
            .collect();
        undo.add = last.removed.clone();
        // Updates revert in reverse so repeated updates of one row land on the oldest value
        undo.update = last.updated.iter().rev().map(|u| u.old.clone()).collect();

        Some(undo)
    }

    /// Pre-flight check; returns one message per problem, empty when clean.
    pub fn validate(&self, rows: &[Row], tx: &Transaction) -> Vec<String> {
        let mut errors = Vec::new();
        let existing: FxHashSet<RowKey> = rows.iter().filter_map(|r| self.key_of(r)).collect();

        let mut seen: FxHashSet<RowKey> = FxHashSet::default();
        for (i, row) in tx.add.iter().enumerate() {
            match self.key_of(row) {
                None => errors.push(format!("add[{}]: row has no '{}' key", i, self.key_field)),
                Some(key) => {
                    if existing.contains(&key) {
                        errors.push(format!("add[{}]: duplicate key {}", i, key));
                    } else if !seen.insert(key.clone()) {
                        errors.push(format!("add[{}]: key {} appears more than once", i, key));
                    }
                }
            }
        }

        for (label, list) in [("update", &tx.update), ("remove", &tx.remove)] {
            for (i, row) in list.iter().enumerate() {
                match self.key_of(row) {
                    None => errors.push(format!("{}[{}]: row has no '{}' key", label, i, self.key_field)),
                    Some(key) if !existing.contains(&key) => {
                        errors.push(format!("{}[{}]: no row with key {}", label, i, key));
                    }
                    Some(_) => {}
                }
            }
        }

        errors
    }

    // ========================================================================
    // LOG
    // ========================================================================

    fn push_result(&mut self, result: TransactionResult) {
        if self.log.len() >= self.max_size {
            self.log.pop_front();
        }
        self.log.push_back(result);
    }

    /// Logged results, oldest first.
    pub fn log(&self) -> impl Iterator<Item = &TransactionResult> {
        self.log.iter()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn last_result(&self) -> Option<&TransactionResult> {
        self.log.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.log.is_empty()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        vec![
            Row::new().with("id", 1).with("name", "a"),
            Row::new().with("id", 2).with("name", "b"),
            Row::new().with("id", 3).with("name", "c"),
        ]
    }

    fn ids(rows: &[Row]) -> Vec<f64> {
        rows.iter().map(|r| r.value("id").as_f64().unwrap()).collect()
    }

    #[test]
    fn test_add_and_remove_in_one_transaction() {
        let mut tm = TransactionManager::new();
        let tx = Transaction::new()
            .with_add(vec![Row::new().with("id", 4)])
            .with_remove(vec![Row::new().with("id", 1)]);
        let (next, result) = tm.apply(&rows(), &tx);

        assert_eq!(ids(&next), vec![2.0, 3.0, 4.0]);
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.removed, vec![rows()[0].clone()]);
        // Input untouched
        assert_eq!(rows().len(), 3);
    }

    #[test]
    fn test_add_index_is_clamped() {
        let mut tm = TransactionManager::new();
        let (next, _) = tm.apply(
            &rows(),
            &Transaction::new().with_add(vec![Row::new().with("id", 9)]).with_add_index(1),
        );
        assert_eq!(ids(&next), vec![1.0, 9.0, 2.0, 3.0]);

        let (next, _) = tm.apply(
            &rows(),
            &Transaction::new().with_add(vec![Row::new().with("id", 9)]).with_add_index(50),
        );
        assert_eq!(ids(&next), vec![1.0, 2.0, 3.0, 9.0]);
    }

    #[test]
    fn test_update_is_shallow_merge() {
        let mut tm = TransactionManager::new();
        let tx = Transaction::new().with_update(vec![Row::new().with("id", 2).with("extra", true)]);
        let (next, result) = tm.apply(&rows(), &tx);

        assert_eq!(next[1].value("name"), &Value::from("b"));
        assert_eq!(next[1].value("extra"), &Value::Bool(true));
        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.updated[0].old, rows()[1]);
    }

    #[test]
    fn test_many_updates_keep_request_order() {
        let mut tm = TransactionManager::new();
        let base: Vec<Row> = (0..2000).map(|i| Row::new().with("id", i).with("n", 0)).collect();
        let mut updates: Vec<Row> = (0..2000).rev().map(|i| Row::new().with("id", i).with("n", 1)).collect();
        updates.push(Row::new().with("id", 5).with("n", 2));
        updates.push(Row::new().with("id", 99999).with("n", 3));

        let (next, result) = tm.apply(&base, &Transaction::new().with_update(updates));
        assert_eq!(next.len(), 2000);
        assert_eq!(result.updated.len(), 2001);
        assert_eq!(result.updated[0].old, base[1999]);
        assert_eq!(next[0].value("n"), &Value::from(1));
        assert_eq!(next[5].value("n"), &Value::from(2));

        // The second update of row 5 starts from the first one's output
        let last = &result.updated[2000];
        assert_eq!(last.old.value("n"), &Value::from(1));
        assert_eq!(last.new.value("n"), &Value::from(2));

        let undo = tm.build_undo_transaction().unwrap();
        let (restored, _) = tm.apply(&next, &undo);
        assert_eq!(restored, base);
    }

    #[test]
    fn test_remove_runs_before_update() {
        let mut tm = TransactionManager::new();
        let tx = Transaction::new()
            .with_update(vec![Row::new().with("id", 1).with("name", "z")])
            .with_remove(vec![Row::new().with("id", 1)]);
        let (next, result) = tm.apply(&rows(), &tx);
        assert_eq!(ids(&next), vec![2.0, 3.0]);
        assert!(result.updated.is_empty());
    }

    #[test]
    fn test_undo_restores_removed_row() {
        let mut tm = TransactionManager::new();
        let removed = rows()[1].clone();
        let (after, _) = tm.apply(&rows(), &Transaction::new().with_remove(vec![removed.clone()]));

        let undo = tm.build_undo_transaction().unwrap();
        let (restored, _) = tm.apply(&after, &undo);
        assert!(restored.contains(&removed));
    }

    #[test]
    fn test_undo_inverts_add_and_update() {
        let mut tm = TransactionManager::new();
        let tx = Transaction::new()
            .with_add(vec![Row::new().with("id", 7)])
            .with_update(vec![Row::new().with("id", 3).with("name", "changed")]);
        let (after, _) = tm.apply(&rows(), &tx);

        let undo = tm.build_undo_transaction().unwrap();
        // Building does not pop
        assert!(tm.can_undo());
        let (restored, _) = tm.apply(&after, &undo);
        assert_eq!(restored, rows());
    }

    #[test]
    fn test_validate_reports_problems() {
        let tm = TransactionManager::new();
        let tx = Transaction::new()
            .with_add(vec![
                Row::new().with("id", 1),
                Row::new().with("id", 5),
                Row::new().with("id", 5),
                Row::new().with("name", "nokey"),
            ])
            .with_update(vec![Row::new().with("id", 42)])
            .with_remove(vec![Row::new().with("id", 2)]);
        let errors = tm.validate(&rows(), &tx);
        assert_eq!(
            errors,
            vec![
                "add[0]: duplicate key 1",
                "add[2]: key 5 appears more than once",
                "add[3]: row has no 'id' key",
                "update[0]: no row with key 42",
            ]
        );
    }

    #[test]
    fn test_apply_batch_threads_rows() {
        let mut tm = TransactionManager::new();
        let txs = vec![
            Transaction::new().with_add(vec![Row::new().with("id", 4)]),
            Transaction::new().with_remove(vec![Row::new().with("id", 4), Row::new().with("id", 1)]),
        ];
        let (final_rows, results) = tm.apply_batch(&rows(), &txs);
        assert_eq!(ids(&final_rows), vec![2.0, 3.0]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].removed.len(), 2);
        assert_eq!(tm.log_len(), 2);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut tm = TransactionManager::new().with_max_log_size(3);
        for i in 0..5 {
            tm.apply(&[], &Transaction::new().with_add(vec![Row::new().with("id", i)]));
        }
        assert_eq!(tm.log_len(), 3);
        let first = tm.log().next().unwrap();
        assert_eq!(first.added[0].value("id"), &Value::from(2));
        assert_eq!(tm.last_result().unwrap().added[0].value("id"), &Value::from(4));

        tm.clear_log();
        assert!(!tm.can_undo());
        assert!(tm.build_undo_transaction().is_none());
    }

    #[test]
    fn test_transaction_from_cell_edit() {
        let edit = CellEdit::new(2, "name", "c", "C");
        let tx = Transaction::from_cell_edit(&rows(), &edit, "id").unwrap();
        assert_eq!(tx.update, vec![Row::new().with("id", 3).with("name", "C")]);
        assert!(Transaction::from_cell_edit(&rows(), &CellEdit::new(9, "name", "", "x"), "id").is_none());
    }

    #[test]
    fn test_custom_key_field() {
        let mut tm = TransactionManager::new().with_key_field("code");
        let rows = vec![Row::new().with("code", "x"), Row::new().with("code", "y")];
        let (next, _) = tm.apply(&rows, &Transaction::new().with_remove(vec![Row::new().with("code", "x")]));
        assert_eq!(next, vec![Row::new().with("code", "y")]);
    }

    #[test]
    fn test_transaction_json_shape() {
        let tx: Transaction = serde_json::from_str(r#"{"add":[{"id":4}],"addIndex":0}"#).unwrap();
        assert_eq!(tx.add_index, Some(0));
        assert!(tx.remove.is_empty());
    }
}
