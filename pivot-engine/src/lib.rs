//! FILENAME: pivot-engine/src/lib.rs
//! Row pivot subsystem for the grid engine.
//!
//! This crate provides pivoting and the aggregation table as a standalone
//! module. It depends on `grid-engine` only for shared types (Row, Value,
//! ColumnDef).
//!
//! Layers:
//! - `aggregation`: Built-in and named custom aggregation functions
//! - `definition`: Serializable configuration (what the pivot IS)
//! - `engine`: Pivot calculation (HOW we calculate)

pub mod aggregation;
pub mod definition;
pub mod engine;

pub use aggregation::*;
pub use definition::*;
pub use engine::{compound_key, PivotResult, RowPivot};
