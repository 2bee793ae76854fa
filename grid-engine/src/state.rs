//! FILENAME: grid-engine/src/state.rs
//! PURPOSE: Persisted grid state (save/restore of the user's view).
//! CONTEXT: `GridState` is a plain JSON snapshot. `capture` reads the live
//! column and selection state, `restore` writes it back; the remaining
//! fields belong to the hosting row model and are carried as-is.

use serde::{Deserialize, Serialize};

use crate::column_controller::{ColumnController, ColumnStateSnapshot};
use crate::error::{GridError, GridResult};
use crate::filter::FilterModel;
use crate::log_debug;
use crate::pagination::{Pagination, DEFAULT_PAGE_SIZE};
use crate::selection::SelectionManager;
use crate::sort::SortModel;
use crate::value::RowKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridState {
    pub sort_model: SortModel,
    pub filter_model: FilterModel,
    pub column_state: Vec<ColumnStateSnapshot>,
    pub selected_row_keys: Vec<RowKey>,
    pub current_page: usize,
    pub page_size: usize,
    pub group_columns: Vec<String>,
    pub expanded_groups: Vec<String>,
    pub expanded_rows: Vec<String>,
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub quick_filter_text: String,
}

impl Default for GridState {
    fn default() -> Self {
        GridState {
            sort_model: Vec::new(),
            filter_model: FilterModel::new(),
            column_state: Vec::new(),
            selected_row_keys: Vec::new(),
            current_page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            group_columns: Vec::new(),
            expanded_groups: Vec::new(),
            expanded_rows: Vec::new(),
            scroll_top: 0.0,
            scroll_left: 0.0,
            quick_filter_text: String::new(),
        }
    }
}

impl GridState {
    /// Snapshot of column layout, sort and selection.
    pub fn capture(columns: &ColumnController, selection: &SelectionManager) -> Self {
        GridState {
            sort_model: columns.sort_model(),
            column_state: columns.column_state(),
            selected_row_keys: selection.selected_keys().to_vec(),
            ..GridState::default()
        }
    }

    /// Writes column layout, sort and selection back into live components.
    pub fn restore(&self, columns: &mut ColumnController, selection: &mut SelectionManager) {
        columns.apply_column_state(&self.column_state);
        columns.apply_sort_model(&self.sort_model);
        selection.clear();
        selection.select_keys(self.selected_row_keys.iter().cloned());
        log_debug!(
            "STATE",
            "restored {} columns, {} sort keys, {} selected",
            self.column_state.len(),
            self.sort_model.len(),
            selection.selected_count()
        );
    }

    pub fn with_filter_model(mut self, filter_model: FilterModel) -> Self {
        self.filter_model = filter_model;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.current_page = pagination.current_page;
        self.page_size = pagination.page_size;
        self
    }

    pub fn with_quick_filter(mut self, text: impl Into<String>) -> Self {
        self.quick_filter_text = text.into();
        self
    }

    pub fn with_scroll(mut self, top: f64, left: f64) -> Self {
        self.scroll_top = top;
        self.scroll_left = left;
        self
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            page_size: self.page_size,
            current_page: self.current_page,
        }
    }

    pub fn to_json(&self) -> GridResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> GridResult<Self> {
        let state: GridState = serde_json::from_str(json)?;
        if state.page_size == 0 {
            return Err(GridError::InvalidState("pageSize must be at least 1".to_string()));
        }
        if !state.scroll_top.is_finite() || !state.scroll_left.is_finite() {
            return Err(GridError::InvalidState("scroll offsets must be finite".to_string()));
        }
        Ok(state)
    }
}
