//! FILENAME: grid-datasource/src/block.rs
//! PURPOSE: One fixed-size page of server rows and its load state.

use grid_engine::Row;

use crate::datasource::DatasourceError;

/// `Idle -> Loading -> {Loaded | Failed}`; `Failed -> Idle` only on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Known but waiting for a concurrency slot.
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockState {
    pub index: usize,
    pub start_row: usize,
    /// Exclusive.
    pub end_row: usize,
    pub status: BlockStatus,
    pub rows: Vec<Row>,
    pub error: Option<DatasourceError>,
}

impl BlockState {
    pub fn new(index: usize, block_size: usize) -> Self {
        let start_row = index.saturating_mul(block_size);
        BlockState {
            index,
            start_row,
            end_row: start_row.saturating_add(block_size),
            status: BlockStatus::Idle,
            rows: Vec::new(),
            error: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == BlockStatus::Loaded
    }

    /// Row at an absolute index, if this block holds it.
    pub fn row(&self, row_index: usize) -> Option<&Row> {
        if self.status != BlockStatus::Loaded || row_index < self.start_row {
            return None;
        }
        self.rows.get(row_index - self.start_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_bounds() {
        let block = BlockState::new(3, 25);
        assert_eq!(block.start_row, 75);
        assert_eq!(block.end_row, 100);
        assert_eq!(block.status, BlockStatus::Idle);
    }

    #[test]
    fn test_row_requires_loaded() {
        let mut block = BlockState::new(1, 10);
        block.rows = vec![Row::new().with("id", 10), Row::new().with("id", 11)];
        assert!(block.row(10).is_none());

        block.status = BlockStatus::Loaded;
        assert_eq!(block.row(11), Some(&Row::new().with("id", 11)));
        assert!(block.row(12).is_none());
        assert!(block.row(9).is_none());
    }
}
