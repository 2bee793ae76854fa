//! FILENAME: grid-engine/src/column_controller.rs
//! PURPOSE: Live column geometry and state.
//! CONTEXT: Holds an ordered list of `ColumnState` built from `ColumnDef`s.
//! Widths, left offsets, visibility, pinning and sort annotations live here,
//! never on the caller's definitions. Unknown field names are silent no-ops.

use serde::{Deserialize, Serialize};

use crate::column::{ColumnDef, Pinned, SortDirection};
use crate::sort::SortItem;

/// The controller's live view of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnState {
    pub field: String,
    /// Resolved width after clamping.
    pub width: f64,
    /// Running offset from the first visible column.
    pub left: f64,
    pub visible: bool,
    pub pinned: Option<Pinned>,
    pub flex: Option<f64>,
    pub sort_direction: Option<SortDirection>,
    /// Position of this column in the sort model.
    pub sort_index: Option<usize>,
}

/// Serializable per-column snapshot, part of the persisted grid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStateSnapshot {
    pub field: String,
    pub width: f64,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub pinned: Option<Pinned>,
    #[serde(default)]
    pub sort: Option<SortDirection>,
    #[serde(default)]
    pub sort_index: Option<usize>,
    #[serde(default)]
    pub flex: Option<f64>,
}

/// Owns column geometry. Definitions and states are kept index-aligned.
#[derive(Debug, Default)]
pub struct ColumnController {
    defs: Vec<ColumnDef>,
    states: Vec<ColumnState>,
    total_width: f64,
}

impl ColumnController {
    pub fn new() -> Self {
        ColumnController::default()
    }

    pub fn with_columns(columns: Vec<ColumnDef>) -> Self {
        let mut controller = ColumnController::new();
        controller.set_columns(columns);
        controller
    }

    /// Replaces all columns and rebuilds geometry in declared order.
    pub fn set_columns(&mut self, columns: Vec<ColumnDef>) {
        self.states = columns
            .iter()
            .map(|def| ColumnState {
                field: def.field.clone(),
                width: def.clamp_width(def.declared_width()),
                left: 0.0,
                visible: !def.hide,
                pinned: def.pinned,
                flex: def.flex,
                sort_direction: None,
                sort_index: None,
            })
            .collect();
        self.defs = columns;
        self.recompute_offsets();
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.defs
    }

    pub fn column_states(&self) -> &[ColumnState] {
        &self.states
    }

    pub fn visible_columns(&self) -> Vec<&ColumnDef> {
        self.defs
            .iter()
            .zip(self.states.iter())
            .filter(|(_, state)| state.visible)
            .map(|(def, _)| def)
            .collect()
    }

    pub fn get_column(&self, field: &str) -> Option<&ColumnDef> {
        self.index_of(field).map(|i| &self.defs[i])
    }

    pub fn get_state(&self, field: &str) -> Option<&ColumnState> {
        self.index_of(field).map(|i| &self.states[i])
    }

    /// Sum of visible widths.
    pub fn total_width(&self) -> f64 {
        self.total_width
    }

    fn index_of(&self, field: &str) -> Option<usize> {
        self.states.iter().position(|s| s.field == field)
    }

    fn recompute_offsets(&mut self) {
        let mut left = 0.0;
        for state in &mut self.states {
            state.left = left;
            if state.visible {
                left += state.width;
            }
        }
        self.total_width = left;
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Sets a column's width, clamped to its [min_width, max_width].
    pub fn resize_column(&mut self, field: &str, width: f64) {
        let Some(idx) = self.index_of(field) else {
            return;
        };
        self.states[idx].width = self.defs[idx].clamp_width(width);
        self.recompute_offsets();
    }

    /// Shows or hides a column. No-op for `lock_visible` columns.
    pub fn set_column_visible(&mut self, field: &str, visible: bool) {
        let Some(idx) = self.index_of(field) else {
            return;
        };
        if self.defs[idx].lock_visible {
            return;
        }
        self.states[idx].visible = visible;
        self.recompute_offsets();
    }

    pub fn set_column_pinned(&mut self, field: &str, pinned: Option<Pinned>) {
        if let Some(idx) = self.index_of(field) {
            self.states[idx].pinned = pinned;
        }
    }

    /// Moves a column to `to_index` (clamped).
    ///
    /// Refused when the moving column, or the column currently sitting at
    /// the destination, has `lock_position`.
    pub fn move_column(&mut self, field: &str, to_index: usize) {
        let Some(from) = self.index_of(field) else {
            return;
        };
        let to = to_index.min(self.states.len() - 1);
        if from == to {
            return;
        }
        if self.defs[from].lock_position || self.defs[to].lock_position {
            return;
        }

        let def = self.defs.remove(from);
        let state = self.states.remove(from);
        self.defs.insert(to, def);
        self.states.insert(to, state);
        self.recompute_offsets();
    }

    /// Annotates sort direction/index from the model. Does not touch rows.
    pub fn apply_sort_model(&mut self, sort_model: &[SortItem]) {
        for state in &mut self.states {
            let position = sort_model.iter().position(|s| s.field == state.field);
            state.sort_index = position;
            state.sort_direction = position.map(|i| sort_model[i].direction);
        }
    }

    /// Fits visible columns into `total_width`.
    ///
    /// Non-flex columns get their declared width; the remainder is shared
    /// by flex columns in proportion to their weight, each still honoring
    /// its own min width.
    pub fn size_columns_to_fit(&mut self, total_width: f64) {
        let mut fixed_width = 0.0;
        let mut total_flex = 0.0;

        for (def, state) in self.defs.iter().zip(self.states.iter_mut()) {
            if !state.visible {
                continue;
            }
            match state.flex.filter(|f| *f > 0.0) {
                Some(flex) => total_flex += flex,
                None => {
                    state.width = def.clamp_width(def.declared_width());
                    fixed_width += state.width;
                }
            }
        }

        if total_flex > 0.0 {
            let remainder = (total_width - fixed_width).max(0.0);
            for (def, state) in self.defs.iter().zip(self.states.iter_mut()) {
                if !state.visible {
                    continue;
                }
                if let Some(flex) = state.flex.filter(|f| *f > 0.0) {
                    let share = remainder * flex / total_flex;
                    state.width = share.max(def.min_width.unwrap_or(0.0));
                }
            }
        }

        self.recompute_offsets();
    }

    // ========================================================================
    // STATE SNAPSHOTS
    // ========================================================================

    pub fn column_state(&self) -> Vec<ColumnStateSnapshot> {
        self.states
            .iter()
            .map(|state| ColumnStateSnapshot {
                field: state.field.clone(),
                width: state.width,
                hide: !state.visible,
                pinned: state.pinned,
                sort: state.sort_direction,
                sort_index: state.sort_index,
                flex: state.flex,
            })
            .collect()
    }

    /// Restores snapshots: order first, then per-column state.
    ///
    /// Listed columns move to the front in snapshot order; columns the
    /// snapshot does not mention keep their relative order after them.
    /// Unknown fields are ignored. Lock flags are not enforced here since
    /// the snapshot describes a state the grid already had.
    pub fn apply_column_state(&mut self, snapshots: &[ColumnStateSnapshot]) {
        let mut order: Vec<usize> = snapshots
            .iter()
            .filter_map(|snap| self.index_of(&snap.field))
            .collect();
        order.dedup();
        for i in 0..self.states.len() {
            if !order.contains(&i) {
                order.push(i);
            }
        }

        let mut defs: Vec<Option<ColumnDef>> = std::mem::take(&mut self.defs).into_iter().map(Some).collect();
        let mut states: Vec<Option<ColumnState>> =
            std::mem::take(&mut self.states).into_iter().map(Some).collect();
        for i in order {
            if let (Some(def), Some(state)) = (defs[i].take(), states[i].take()) {
                self.defs.push(def);
                self.states.push(state);
            }
        }

        for snap in snapshots {
            let Some(idx) = self.index_of(&snap.field) else {
                continue;
            };
            let width = self.defs[idx].clamp_width(snap.width);
            let state = &mut self.states[idx];
            state.width = width;
            state.visible = !snap.hide;
            state.pinned = snap.pinned;
            state.sort_direction = snap.sort;
            state.sort_index = snap.sort_index;
            state.flex = snap.flex;
        }
        self.recompute_offsets();
    }

    /// Sort model implied by the columns' sort annotations.
    pub fn sort_model(&self) -> Vec<SortItem> {
        let mut sorted: Vec<(usize, SortItem)> = self
            .states
            .iter()
            .filter_map(|s| {
                s.sort_direction.map(|direction| {
                    (
                        s.sort_index.unwrap_or(usize::MAX),
                        SortItem::new(s.field.clone(), direction),
                    )
                })
            })
            .collect();
        sorted.sort_by_key(|(index, _)| *index);
        sorted.into_iter().map(|(_, item)| item).collect()
    }
}
