//! FILENAME: grid-datasource/src/datasource.rs
//! PURPOSE: The contract between the block cache and an external datasource.
//! CONTEXT: The cache calls `Datasource::get_rows` fire-and-forget and learns
//! the outcome through the `LoadCallback`, which the datasource completes
//! exactly once, synchronously or later from any thread.

use std::fmt;

use grid_engine::{FilterModel, Row, SortModel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One block request: the half-open row range plus the current view models.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetRowsParams {
    pub start_row: usize,
    /// Exclusive.
    pub end_row: usize,
    pub sort_model: SortModel,
    pub filter_model: FilterModel,
    pub group_keys: Vec<String>,
    pub pivot_cols: Vec<String>,
    pub pivot_mode: bool,
}

/// A successful load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowsResponse {
    pub row_data: Vec<Row>,
    /// Total rows on the server, when the datasource knows it.
    pub row_count: Option<usize>,
}

impl RowsResponse {
    pub fn new(row_data: Vec<Row>) -> Self {
        RowsResponse {
            row_data,
            row_count: None,
        }
    }

    pub fn with_row_count(mut self, row_count: usize) -> Self {
        self.row_count = Some(row_count);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasourceError {
    #[error("Datasource request failed: {0}")]
    Failed(String),

    #[error("Datasource request was dropped without a response")]
    Abandoned,
}

impl DatasourceError {
    pub fn failed(message: impl Into<String>) -> Self {
        DatasourceError::Failed(message.into())
    }
}

type Completion = Box<dyn FnOnce(Result<RowsResponse, DatasourceError>) + Send>;

/// Completion handle for one `get_rows` call.
///
/// `success` and `fail` consume the handle, so a request can complete at
/// most once. Dropping an uncompleted handle fails the request with
/// `DatasourceError::Abandoned`, so a datasource that loses a request
/// (panic, cancelled task) cannot pin a concurrency slot forever.
pub struct LoadCallback {
    completion: Option<Completion>,
}

impl LoadCallback {
    pub fn new(f: impl FnOnce(Result<RowsResponse, DatasourceError>) + Send + 'static) -> Self {
        LoadCallback {
            completion: Some(Box::new(f)),
        }
    }

    pub fn success(self, response: RowsResponse) {
        self.complete(Ok(response));
    }

    pub fn fail(self, error: DatasourceError) {
        self.complete(Err(error));
    }

    pub fn complete(mut self, result: Result<RowsResponse, DatasourceError>) {
        if let Some(f) = self.completion.take() {
            f(result);
        }
    }
}

impl Drop for LoadCallback {
    fn drop(&mut self) {
        if let Some(f) = self.completion.take() {
            f(Err(DatasourceError::Abandoned));
        }
    }
}

impl fmt::Debug for LoadCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCallback")
            .field("pending", &self.completion.is_some())
            .finish()
    }
}

/// A source of rows, usually backed by a server.
pub trait Datasource: Send + Sync {
    /// Starts loading `params.start_row..params.end_row` and completes
    /// `callback` exactly once.
    fn get_rows(&self, params: GetRowsParams, callback: LoadCallback);

    /// Called when the grid stops using this datasource.
    fn destroy(&self) {}
}
