//! FILENAME: grid-datasource/src/infinite_scroll.rs
//! PURPOSE: Viewport-driven block loading with a bounded, LRU-evicted cache.
//! CONTEXT: The grid reports the visible row range; the model keeps the
//! covering blocks (plus overscan) loaded and evicts the least recently
//! touched ones once more than `max_blocks_in_cache` are tracked. A block
//! that is still loading is never evicted, so the bound can be exceeded
//! while requests are in flight.

use std::sync::Arc;

use grid_engine::{log_debug, FilterModel, Row, SortModel};
use serde::{Deserialize, Serialize};

use crate::block::{BlockState, BlockStatus};
use crate::cache::{BlockCache, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CONCURRENT_REQUESTS};
use crate::datasource::{Datasource, DatasourceError};

pub const DEFAULT_MAX_BLOCKS_IN_CACHE: usize = 10;
pub const DEFAULT_OVERSCAN_BLOCKS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfiniteScrollConfig {
    pub block_size: usize,
    pub max_concurrent_requests: usize,
    pub max_blocks_in_cache: usize,
    /// Extra blocks kept loaded on each side of the viewport.
    pub overscan_blocks: usize,
}

impl Default for InfiniteScrollConfig {
    fn default() -> Self {
        InfiniteScrollConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_blocks_in_cache: DEFAULT_MAX_BLOCKS_IN_CACHE,
            overscan_blocks: DEFAULT_OVERSCAN_BLOCKS,
        }
    }
}

impl InfiniteScrollConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn with_max_blocks_in_cache(mut self, max: usize) -> Self {
        self.max_blocks_in_cache = max;
        self
    }

    pub fn with_overscan_blocks(mut self, overscan: usize) -> Self {
        self.overscan_blocks = overscan;
        self
    }
}

pub struct InfiniteScroll {
    config: InfiniteScrollConfig,
    cache: BlockCache,
}

impl InfiniteScroll {
    pub fn new(config: InfiniteScrollConfig) -> Self {
        let cache = BlockCache::new(config.block_size, config.max_concurrent_requests);
        InfiniteScroll { config, cache }
    }

    pub fn with_datasource(self, datasource: Arc<dyn Datasource>) -> Self {
        self.cache.set_datasource(Some(datasource));
        self
    }

    pub fn config(&self) -> &InfiniteScrollConfig {
        &self.config
    }

    pub fn set_datasource(&self, datasource: Option<Arc<dyn Datasource>>) {
        self.cache.set_datasource(datasource);
    }

    /// Loads the blocks covering `start_row..end_row` plus overscan, then
    /// evicts down to the cache bound. Returns the evicted block indices.
    pub fn on_viewport_changed(&self, start_row: usize, end_row: usize) -> Vec<usize> {
        let end_row = end_row.max(start_row.saturating_add(1));
        let first = self
            .cache
            .block_of(start_row)
            .saturating_sub(self.config.overscan_blocks);
        let mut last = self
            .cache
            .block_of(end_row.saturating_sub(1))
            .saturating_add(self.config.overscan_blocks);

        if let Some(total) = self.cache.total_row_count() {
            if total == 0 {
                return Vec::new();
            }
            last = last.min(self.cache.block_of(total - 1));
        }
        log_debug!("BLOCK", "viewport {}..{} -> blocks {}..={}", start_row, end_row, first, last);

        for index in first..=last {
            self.cache.request_block(index);
        }
        // Visible blocks become the most recently used
        self.cache.touch_blocks(first, last);
        self.cache.evict_to(self.config.max_blocks_in_cache)
    }

    /// Evicts down to the cache bound without changing the viewport.
    pub fn evict(&self) -> Vec<usize> {
        self.cache.evict_to(self.config.max_blocks_in_cache)
    }

    pub fn request_block(&self, block_index: usize) {
        self.cache.request_block(block_index);
    }

    pub fn retry_block(&self, block_index: usize) -> bool {
        self.cache.retry_block(block_index)
    }

    pub fn purge_cache(&self) {
        self.cache.purge();
    }

    pub fn destroy(&self) {
        self.cache.destroy();
    }

    pub fn set_sort_model(&self, sort_model: SortModel) {
        self.cache.set_sort_model(sort_model);
    }

    pub fn set_filter_model(&self, filter_model: FilterModel) {
        self.cache.set_filter_model(filter_model);
    }

    pub fn on_block_loaded(&self, listener: impl Fn(usize) + Send + Sync + 'static) {
        self.cache.on_block_loaded(listener);
    }

    pub fn on_block_failed(&self, listener: impl Fn(usize, &DatasourceError) + Send + Sync + 'static) {
        self.cache.on_block_failed(listener);
    }

    /// Reading a loaded row touches its block.
    pub fn get_row(&self, row_index: usize) -> Option<Row> {
        self.cache.get_row(row_index)
    }

    pub fn get_rows(&self, start: usize, end: usize) -> Vec<Option<Row>> {
        self.cache.get_rows(start, end)
    }

    pub fn is_row_loaded(&self, row_index: usize) -> bool {
        self.cache.is_row_loaded(row_index)
    }

    pub fn get_block(&self, block_index: usize) -> Option<BlockState> {
        self.cache.get_block(block_index)
    }

    pub fn block_status(&self, block_index: usize) -> Option<BlockStatus> {
        self.cache.block_status(block_index)
    }

    /// Tracked block indices in ascending order.
    pub fn cached_blocks(&self) -> Vec<usize> {
        self.cache.block_indices()
    }

    pub fn total_row_count(&self) -> Option<usize> {
        self.cache.total_row_count()
    }

    pub fn active_requests(&self) -> usize {
        self.cache.active_requests()
    }

    pub fn block_count(&self) -> usize {
        self.cache.block_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = InfiniteScrollConfig::default();
        assert_eq!(config.block_size, 100);
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.max_blocks_in_cache, 10);
        assert_eq!(config.overscan_blocks, 1);
    }

    #[test]
    fn test_config_camel_case() {
        let config: InfiniteScrollConfig =
            serde_json::from_str(r#"{"maxBlocksInCache": 3, "overscanBlocks": 0}"#).unwrap();
        assert_eq!(config.max_blocks_in_cache, 3);
        assert_eq!(config.overscan_blocks, 0);
        assert_eq!(config.block_size, 100);
    }
}
