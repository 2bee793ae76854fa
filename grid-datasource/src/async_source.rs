//! FILENAME: grid-datasource/src/async_source.rs
//! PURPOSE: Runs an async datasource on a tokio runtime.
//! CONTEXT: The block cache only knows the callback-style `Datasource`.
//! `TokioDatasource` spawns each `fetch_rows` on a runtime handle and
//! completes the callback from the spawned task. If the task panics or is
//! cancelled the callback is dropped, which fails the block as abandoned.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;

use crate::datasource::{Datasource, DatasourceError, GetRowsParams, LoadCallback, RowsResponse};

/// A datasource whose loads are futures.
///
/// ```ignore
/// struct Remote { client: HttpClient }
///
/// #[async_trait]
/// impl AsyncDatasource for Remote {
///     async fn fetch_rows(&self, params: GetRowsParams) -> Result<RowsResponse, DatasourceError> {
///         self.client.rows(params.start_row, params.end_row).await
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncDatasource: Send + Sync + 'static {
    /// Loads `params.start_row..params.end_row`.
    async fn fetch_rows(&self, params: GetRowsParams) -> Result<RowsResponse, DatasourceError>;

    /// Releases connections or other resources.
    async fn close(&self) {}
}

pub struct TokioDatasource<D> {
    source: Arc<D>,
    handle: Handle,
}

impl<D: AsyncDatasource> TokioDatasource<D> {
    pub fn new(source: D, handle: Handle) -> Self {
        TokioDatasource {
            source: Arc::new(source),
            handle,
        }
    }

    /// Uses the runtime of the calling context, if there is one.
    pub fn current(source: D) -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(source, handle))
    }

    pub fn source(&self) -> &D {
        &self.source
    }
}

impl<D: AsyncDatasource> Datasource for TokioDatasource<D> {
    fn get_rows(&self, params: GetRowsParams, callback: LoadCallback) {
        let source = Arc::clone(&self.source);
        self.handle.spawn(async move {
            let result = source.fetch_rows(params).await;
            callback.complete(result);
        });
    }

    fn destroy(&self) {
        let source = Arc::clone(&self.source);
        self.handle.spawn(async move {
            source.close().await;
        });
    }
}
