//! FILENAME: grid-engine/src/selection.rs
//! PURPOSE: Row selection keyed by row key.
//! CONTEXT: Selection stores keys, never indices, so it survives sorting and
//! filtering. The anchor is the last explicitly clicked index and is only
//! meaningful against the row list the caller passes to `handle_click`.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::value::{Row, RowKey, DEFAULT_KEY_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    #[default]
    None,
    Single,
    Multiple,
}

/// Keys whose state changed in one operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionChange {
    pub selected: Vec<RowKey>,
    pub deselected: Vec<RowKey>,
}

impl SelectionChange {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.deselected.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SelectionManager {
    mode: SelectionMode,
    key_field: String,
    /// Selected keys in insertion order; `lookup` mirrors it.
    selected: Vec<RowKey>,
    lookup: FxHashSet<RowKey>,
    anchor: Option<usize>,
}

impl Default for SelectionManager {
    fn default() -> Self {
        Self::new(SelectionMode::None)
    }
}

impl SelectionManager {
    pub fn new(mode: SelectionMode) -> Self {
        SelectionManager {
            mode,
            key_field: DEFAULT_KEY_FIELD.to_string(),
            selected: Vec::new(),
            lookup: FxHashSet::default(),
            anchor: None,
        }
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Switching to `None` clears the selection; switching to `Single` keeps
    /// at most the first selected key.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
        match mode {
            SelectionMode::None => self.clear(),
            SelectionMode::Single => {
                if self.selected.len() > 1 {
                    let first = self.selected[0].clone();
                    self.replace_with(first);
                }
            }
            SelectionMode::Multiple => {}
        }
    }

    fn insert(&mut self, key: RowKey) -> bool {
        if self.lookup.insert(key.clone()) {
            self.selected.push(key);
            true
        } else {
            false
        }
    }

    fn take(&mut self, key: &RowKey) -> bool {
        if self.lookup.remove(key) {
            self.selected.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    /// Drops every key `lookup` no longer holds in a single pass.
    fn compact(&mut self) {
        let lookup = &self.lookup;
        self.selected.retain(|k| lookup.contains(k));
    }

    /// Replaces the selection with one key, reporting what changed.
    fn replace_with(&mut self, key: RowKey) -> SelectionChange {
        let mut change = SelectionChange::default();
        for existing in std::mem::take(&mut self.selected) {
            if existing != key {
                change.deselected.push(existing);
            }
        }
        let was_selected = self.lookup.contains(&key);
        self.lookup.clear();
        self.lookup.insert(key.clone());
        self.selected.push(key.clone());
        if !was_selected {
            change.selected.push(key);
        }
        change
    }

    // ========================================================================
    // CLICK HANDLING
    // ========================================================================

    /// Applies a user click on `rows[row_index]`.
    pub fn handle_click(
        &mut self,
        row: &Row,
        row_index: usize,
        rows: &[Row],
        shift_key: bool,
        ctrl_key: bool,
    ) -> SelectionChange {
        let Some(key) = row.key(&self.key_field) else {
            return SelectionChange::default();
        };

        match self.mode {
            SelectionMode::None => SelectionChange::default(),
            SelectionMode::Single => {
                self.anchor = Some(row_index);
                if self.lookup.contains(&key) {
                    self.take(&key);
                    SelectionChange {
                        selected: Vec::new(),
                        deselected: vec![key],
                    }
                } else {
                    self.replace_with(key)
                }
            }
            SelectionMode::Multiple => {
                if shift_key {
                    if let Some(anchor) = self.anchor {
                        let change = self.select_range(anchor, row_index, rows);
                        self.anchor = Some(row_index);
                        return change;
                    }
                }
                self.anchor = Some(row_index);
                if ctrl_key {
                    if self.take(&key) {
                        SelectionChange {
                            selected: Vec::new(),
                            deselected: vec![key],
                        }
                    } else {
                        self.insert(key.clone());
                        SelectionChange {
                            selected: vec![key],
                            deselected: Vec::new(),
                        }
                    }
                } else {
                    self.replace_with(key)
                }
            }
        }
    }

    /// Adds every row in the inclusive span between two indices.
    fn select_range(&mut self, from: usize, to: usize, rows: &[Row]) -> SelectionChange {
        let mut change = SelectionChange::default();
        if rows.is_empty() {
            return change;
        }
        let last = rows.len() - 1;
        let (start, end) = (from.min(to).min(last), from.max(to).min(last));
        for row in &rows[start..=end] {
            if let Some(key) = row.key(&self.key_field) {
                if self.insert(key.clone()) {
                    change.selected.push(key);
                }
            }
        }
        change
    }

    // ========================================================================
    // BULK OPERATIONS
    // ========================================================================

    /// Selects every row of the list; returns only the newly selected rows.
    /// Only available in `Multiple` mode.
    pub fn select_all(&mut self, rows: &[Row]) -> Vec<Row> {
        if self.mode != SelectionMode::Multiple {
            return Vec::new();
        }
        let mut changed = Vec::new();
        for row in rows {
            if let Some(key) = row.key(&self.key_field) {
                if self.insert(key) {
                    changed.push(row.clone());
                }
            }
        }
        changed
    }

    /// Deselects every row of the list; returns only the rows that were selected.
    pub fn deselect_all(&mut self, rows: &[Row]) -> Vec<Row> {
        let mut changed = Vec::new();
        for row in rows {
            if let Some(key) = row.key(&self.key_field) {
                if self.lookup.remove(&key) {
                    changed.push(row.clone());
                }
            }
        }
        if !changed.is_empty() {
            self.compact();
        }
        changed
    }

    /// True iff some but not all rows of the list are selected.
    pub fn is_indeterminate(&self, rows: &[Row]) -> bool {
        let count = self.selected_in(rows);
        count > 0 && count < rows.len()
    }

    /// True iff the list is non-empty and every row in it is selected.
    pub fn is_all_selected(&self, rows: &[Row]) -> bool {
        !rows.is_empty() && self.selected_in(rows) == rows.len()
    }

    fn selected_in(&self, rows: &[Row]) -> usize {
        rows.iter()
            .filter(|r| r.key(&self.key_field).is_some_and(|k| self.lookup.contains(&k)))
            .count()
    }

    // ========================================================================
    // PROGRAMMATIC API
    // ========================================================================

    /// Selects one row. In `Single` mode it replaces the selection.
    pub fn select_row(&mut self, row: &Row) -> bool {
        let Some(key) = row.key(&self.key_field) else {
            return false;
        };
        match self.mode {
            SelectionMode::None => false,
            SelectionMode::Single => !self.replace_with(key).selected.is_empty(),
            SelectionMode::Multiple => self.insert(key),
        }
    }

    pub fn deselect_row(&mut self, row: &Row) -> bool {
        row.key(&self.key_field).is_some_and(|key| self.take(&key))
    }

    /// Flips one row; returns whether it is selected afterwards.
    pub fn toggle_row(&mut self, row: &Row) -> bool {
        if self.is_selected(row) {
            self.deselect_row(row);
            false
        } else {
            self.select_row(row)
        }
    }

    /// Selects keys directly, e.g. when restoring saved state.
    pub fn select_keys(&mut self, keys: impl IntoIterator<Item = RowKey>) {
        match self.mode {
            SelectionMode::None => {}
            SelectionMode::Single => {
                if let Some(key) = keys.into_iter().next() {
                    self.replace_with(key);
                }
            }
            SelectionMode::Multiple => {
                for key in keys {
                    self.insert(key);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.lookup.clear();
        self.anchor = None;
    }

    pub fn is_selected(&self, row: &Row) -> bool {
        row.key(&self.key_field).is_some_and(|k| self.lookup.contains(&k))
    }

    pub fn is_key_selected(&self, key: &RowKey) -> bool {
        self.lookup.contains(key)
    }

    pub fn selected_keys(&self) -> &[RowKey] {
        &self.selected
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Selected rows of the list, in list order.
    pub fn selected_rows(&self, rows: &[Row]) -> Vec<Row> {
        rows.iter().filter(|r| self.is_selected(r)).cloned().collect()
    }

    /// Drops keys with no row in the list and returns them.
    pub fn sync_with_rows(&mut self, rows: &[Row]) -> Vec<RowKey> {
        let present: FxHashSet<RowKey> = rows.iter().filter_map(|r| r.key(&self.key_field)).collect();
        let stale: Vec<RowKey> = self
            .selected
            .iter()
            .filter(|k| !present.contains(*k))
            .cloned()
            .collect();
        for key in &stale {
            self.lookup.remove(key);
        }
        if !stale.is_empty() {
            self.compact();
        }
        stale
    }
}
