//! FILENAME: grid-engine/src/lib.rs
//! PURPOSE: Main library entry point for the data-grid engine.
//! CONTEXT: Turns a raw collection of rows into the ordered, filtered,
//! selectable display list a grid renders. Everything here is synchronous;
//! server-backed loading lives in `grid-datasource`, pivoting in
//! `pivot-engine`.

pub mod logging;

pub mod advanced_filter;
pub mod column;
pub mod column_controller;
pub mod error;
pub mod filter;
pub mod pagination;
pub mod selection;
pub mod sort;
pub mod state;
pub mod transaction;
pub mod tree;
pub mod value;

// Re-export commonly used types at the crate root
pub use advanced_filter::{AdvancedFilter, AdvancedOperator, ConditionExpr, ExternalFilter, FilterExpression, GroupOperator};
pub use column::{find_column, ColumnDef, ColumnType, Comparator, Pinned, SortDirection, ValidationParams, Validator, DEFAULT_COLUMN_WIDTH};
pub use column_controller::{ColumnController, ColumnState, ColumnStateSnapshot};
pub use error::{GridError, GridResult};
pub use filter::{
    filter_rows, quick_filter, row_passes, ColumnFilter, Combined, ComparisonOperator, Condition, DateCondition,
    FilterModel, JoinOperator, MultiFilter, NumberCondition, SetFilter, TextCondition, TextOperator,
};
pub use pagination::Pagination;
pub use selection::{SelectionChange, SelectionManager, SelectionMode};
pub use sort::{default_compare, next_sort_direction, sort_rows, update_sort_model, SortItem, SortModel};
pub use state::GridState;
pub use transaction::{CellEdit, RowUpdate, Transaction, TransactionManager, TransactionResult};
pub use tree::{DataPath, TreeConfig, TreeData, TreeNode};
pub use value::{compare_values, OrderedFloat, Row, RowKey, Value, DEFAULT_KEY_FIELD};
