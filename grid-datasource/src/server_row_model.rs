//! FILENAME: grid-datasource/src/server_row_model.rs
//! PURPOSE: Block-cached row model over a server datasource.
//! CONTEXT: The grid asks for blocks by index; the model owns fetching and
//! caching and forwards the current sort/filter/group/pivot models with each
//! request instead of applying them locally. Blocks are never evicted here;
//! see `InfiniteScroll` for the bounded variant.

use std::sync::Arc;

use grid_engine::{FilterModel, Row, SortModel};
use serde::{Deserialize, Serialize};

use crate::block::{BlockState, BlockStatus};
use crate::cache::{BlockCache, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CONCURRENT_REQUESTS};
use crate::datasource::{Datasource, DatasourceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerRowModelConfig {
    pub block_size: usize,
    pub max_concurrent_requests: usize,
}

impl Default for ServerRowModelConfig {
    fn default() -> Self {
        ServerRowModelConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl ServerRowModelConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }
}

pub struct ServerRowModel {
    config: ServerRowModelConfig,
    cache: BlockCache,
}

impl ServerRowModel {
    pub fn new(config: ServerRowModelConfig) -> Self {
        let cache = BlockCache::new(config.block_size, config.max_concurrent_requests);
        ServerRowModel { config, cache }
    }

    pub fn with_datasource(self, datasource: Arc<dyn Datasource>) -> Self {
        self.cache.set_datasource(Some(datasource));
        self
    }

    pub fn config(&self) -> &ServerRowModelConfig {
        &self.config
    }

    /// Replaces the datasource. The outgoing one is destroyed and the cache
    /// reset; passing the current instance again does nothing.
    pub fn set_datasource(&self, datasource: Option<Arc<dyn Datasource>>) {
        self.cache.set_datasource(datasource);
    }

    pub fn has_datasource(&self) -> bool {
        self.cache.has_datasource()
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Fetches a block unless it is already loading, loaded, queued or failed.
    pub fn request_block(&self, block_index: usize) {
        self.cache.request_block(block_index);
    }

    /// Re-fetches a failed block. Returns false for any other state.
    pub fn retry_block(&self, block_index: usize) -> bool {
        self.cache.retry_block(block_index)
    }

    /// Requests every block covering rows `start..end`.
    pub fn ensure_rows(&self, start: usize, end: usize) {
        self.cache.ensure_rows(start, end);
    }

    pub fn purge_cache(&self) {
        self.cache.purge();
    }

    pub fn destroy(&self) {
        self.cache.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.cache.is_destroyed()
    }

    // ========================================================================
    // REQUEST MODELS
    // ========================================================================
    // A changed model purges the cache; setting the same model again does not.

    pub fn set_sort_model(&self, sort_model: SortModel) {
        self.cache.set_sort_model(sort_model);
    }

    pub fn set_filter_model(&self, filter_model: FilterModel) {
        self.cache.set_filter_model(filter_model);
    }

    pub fn set_group_keys(&self, group_keys: Vec<String>) {
        self.cache.set_group_keys(group_keys);
    }

    pub fn set_pivot(&self, pivot_cols: Vec<String>, pivot_mode: bool) {
        self.cache.set_pivot(pivot_cols, pivot_mode);
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    pub fn on_block_loaded(&self, listener: impl Fn(usize) + Send + Sync + 'static) {
        self.cache.on_block_loaded(listener);
    }

    pub fn on_block_failed(&self, listener: impl Fn(usize, &DatasourceError) + Send + Sync + 'static) {
        self.cache.on_block_failed(listener);
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// The row at an absolute index, if its block has loaded.
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

    /// `None` until a response reports or implies the total.
    pub fn total_row_count(&self) -> Option<usize> {
        self.cache.total_row_count()
    }

    pub fn active_requests(&self) -> usize {
        self.cache.active_requests()
    }

    pub fn queued_requests(&self) -> usize {
        self.cache.queued_requests()
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
        let config = ServerRowModelConfig::default();
        assert_eq!(config.block_size, 100);
        assert_eq!(config.max_concurrent_requests, 2);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: ServerRowModelConfig = serde_json::from_str(r#"{"blockSize": 10}"#).unwrap();
        assert_eq!(config, ServerRowModelConfig::default().with_block_size(10));
    }

    #[test]
    fn test_without_datasource_requests_are_ignored() {
        let model = ServerRowModel::new(ServerRowModelConfig::default());
        model.request_block(0);
        assert_eq!(model.block_count(), 0);
        assert_eq!(model.get_row(0), None);
        assert!(!model.has_datasource());
    }
}
