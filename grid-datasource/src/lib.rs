//! FILENAME: grid-datasource/src/lib.rs
//! PURPOSE: Server-backed row models for the grid engine.
//! CONTEXT: Rows are fetched in fixed-size blocks from a caller-supplied
//! `Datasource`. `ServerRowModel` keeps every block it loads;
//! `InfiniteScroll` follows the viewport and evicts least recently used
//! blocks. Both share one block cache with a bounded number of requests in
//! flight. `TokioDatasource` adapts an `AsyncDatasource` to the callback
//! contract.

mod cache;
mod lru;

pub mod async_source;
pub mod block;
pub mod datasource;
pub mod infinite_scroll;
pub mod server_row_model;

pub use async_source::{AsyncDatasource, TokioDatasource};
pub use block::{BlockState, BlockStatus};
pub use cache::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CONCURRENT_REQUESTS};
pub use datasource::{Datasource, DatasourceError, GetRowsParams, LoadCallback, RowsResponse};
pub use infinite_scroll::{InfiniteScroll, InfiniteScrollConfig, DEFAULT_MAX_BLOCKS_IN_CACHE, DEFAULT_OVERSCAN_BLOCKS};
pub use server_row_model::{ServerRowModel, ServerRowModelConfig};
