//! FILENAME: grid-datasource/src/cache.rs
//! PURPOSE: Block cache shared by the server row model and infinite scroll.
//! CONTEXT: All state sits behind one mutex. The lock is never held while
//! calling into the datasource or a listener, so datasources may complete
//! synchronously from inside `get_rows`, and listeners may call back in.
//!
//! Invariants:
//! - at most one request in flight per block index;
//! - `active_requests <= max_concurrent_requests`;
//! - a block in `Loading` is never evicted;
//! - a response is applied only if its generation is still current.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use grid_engine::{log_debug, log_error, log_info, FilterModel, Row, SortModel};

use crate::block::{BlockState, BlockStatus};
use crate::datasource::{Datasource, DatasourceError, GetRowsParams, LoadCallback, RowsResponse};
use crate::lru::AccessOrder;

pub const DEFAULT_BLOCK_SIZE: usize = 100;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 2;

type LoadedListener = Arc<dyn Fn(usize) + Send + Sync>;
type FailedListener = Arc<dyn Fn(usize, &DatasourceError) + Send + Sync>;

/// The view models forwarded with every request.
#[derive(Debug, Clone, Default, PartialEq)]
struct RequestModels {
    sort_model: SortModel,
    filter_model: FilterModel,
    group_keys: Vec<String>,
    pivot_cols: Vec<String>,
    pivot_mode: bool,
}

struct CacheState {
    block_size: usize,
    max_concurrent: usize,
    datasource: Option<Arc<dyn Datasource>>,
    models: RequestModels,
    blocks: BTreeMap<usize, BlockState>,
    queue: VecDeque<usize>,
    access: AccessOrder,
    active_requests: usize,
    total_row_count: Option<usize>,
    generation: u64,
    destroyed: bool,
}

impl CacheState {
    /// Row range of a block, `None` when it does not fit in `usize`.
    fn block_range(&self, index: usize) -> Option<(usize, usize)> {
        let start = index.checked_mul(self.block_size)?;
        let end = start.checked_add(self.block_size)?;
        Some((start, end))
    }

    fn params_for(&self, index: usize) -> GetRowsParams {
        let (start_row, end_row) = self.block_range(index).unwrap_or((usize::MAX, usize::MAX));
        GetRowsParams {
            start_row,
            end_row,
            sort_model: self.models.sort_model.clone(),
            filter_model: self.models.filter_model.clone(),
            group_keys: self.models.group_keys.clone(),
            pivot_cols: self.models.pivot_cols.clone(),
            pivot_mode: self.models.pivot_mode,
        }
    }

    /// Marks `index` as loading and builds its request, if a slot is free.
    fn start(&mut self, index: usize) -> Option<Dispatch> {
        if self.active_requests >= self.max_concurrent {
            return None;
        }
        let datasource = self.datasource.clone()?;
        let block = self.blocks.get_mut(&index)?;
        if block.status != BlockStatus::Idle {
            return None;
        }
        block.status = BlockStatus::Loading;
        block.error = None;
        self.active_requests += 1;
        Some(Dispatch {
            index,
            generation: self.generation,
            params: self.params_for(index),
            datasource,
        })
    }

    /// Starts queued blocks while slots are free.
    fn drain_queue(&mut self) -> Vec<Dispatch> {
        let mut started = Vec::new();
        while self.active_requests < self.max_concurrent {
            let Some(index) = self.queue.pop_front() else {
                break;
            };
            if let Some(dispatch) = self.start(index) {
                started.push(dispatch);
            }
        }
        started
    }

    /// Forgets every block and invalidates in-flight requests.
    fn reset(&mut self) {
        self.generation += 1;
        self.blocks.clear();
        self.queue.clear();
        self.access.clear();
        self.active_requests = 0;
        self.total_row_count = None;
    }

    fn block_of(&self, row_index: usize) -> usize {
        row_index / self.block_size
    }

    /// Whether a block lies past the known end of the data, or past the
    /// addressable row range.
    fn out_of_range(&self, index: usize) -> bool {
        match self.block_range(index) {
            Some((start, _)) => self.total_row_count.is_some_and(|total| start >= total),
            None => true,
        }
    }
}

/// A request ready to be sent once the lock is released.
struct Dispatch {
    index: usize,
    generation: u64,
    params: GetRowsParams,
    datasource: Arc<dyn Datasource>,
}

enum Event {
    Loaded(usize),
    Failed(usize, DatasourceError),
}

#[derive(Default)]
struct Listeners {
    loaded: Vec<LoadedListener>,
    failed: Vec<FailedListener>,
}

struct Inner {
    state: Mutex<CacheState>,
    listeners: Mutex<Listeners>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// BLOCK CACHE
// ============================================================================

/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub(crate) struct BlockCache {
    inner: Arc<Inner>,
}

impl BlockCache {
    pub fn new(block_size: usize, max_concurrent: usize) -> Self {
        BlockCache {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState {
                    block_size: block_size.max(1),
                    max_concurrent: max_concurrent.max(1),
                    datasource: None,
                    models: RequestModels::default(),
                    blocks: BTreeMap::new(),
                    queue: VecDeque::new(),
                    access: AccessOrder::new(),
                    active_requests: 0,
                    total_row_count: None,
                    generation: 0,
                    destroyed: false,
                }),
                listeners: Mutex::new(Listeners::default()),
            }),
        }
    }

    fn send(&self, dispatch: Dispatch) {
        let Dispatch {
            index,
            generation,
            params,
            datasource,
        } = dispatch;
        log_debug!("BLOCK", "fetch block {} rows {}..{}", index, params.start_row, params.end_row);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let callback = LoadCallback::new(move |result| {
            if let Some(inner) = weak.upgrade() {
                BlockCache { inner }.complete(index, generation, result);
            }
        });
        datasource.get_rows(params, callback);
    }

    fn send_all(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            self.send(dispatch);
        }
    }

    fn complete(&self, index: usize, generation: u64, result: Result<RowsResponse, DatasourceError>) {
        let (event, next) = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if generation != state.generation {
                log_debug!("BLOCK", "dropping stale response for block {}", index);
                return;
            }
            state.active_requests = state.active_requests.saturating_sub(1);

            let block_size = state.block_size;
            let event = match state.blocks.get_mut(&index) {
                Some(block) if block.status == BlockStatus::Loading => match result {
                    Ok(response) => {
                        let start_row = block.start_row;
                        let received = response.row_data.len();
                        block.rows = response.row_data;
                        block.status = BlockStatus::Loaded;
                        block.error = None;
                        if let Some(count) = response.row_count {
                            state.total_row_count = Some(count);
                        } else if received < block_size {
                            // A short block without a count is the last one
                            state.total_row_count = Some(start_row + received);
                        }
                        log_debug!("BLOCK", "block {} loaded ({} rows)", index, received);
                        Some(Event::Loaded(index))
                    }
                    Err(error) => {
                        block.status = BlockStatus::Failed;
                        block.error = Some(error.clone());
                        log_error!("BLOCK", "block {} failed: {}", index, error);
                        Some(Event::Failed(index, error))
                    }
                },
                _ => None,
            };
            (event, state.drain_queue())
        };

        if let Some(event) = event {
            self.emit(event);
        }
        self.send_all(next);
    }

    fn emit(&self, event: Event) {
        match event {
            Event::Loaded(index) => {
                let listeners: Vec<LoadedListener> = self.inner.listeners().loaded.clone();
                for listener in listeners {
                    listener(index);
                }
            }
            Event::Failed(index, error) => {
                let listeners: Vec<FailedListener> = self.inner.listeners().failed.clone();
                for listener in listeners {
                    listener(index, &error);
                }
            }
        }
    }

    // ========================================================================
    // REQUESTS
    // ========================================================================

    /// Requests a block unless it is already known in any state.
    pub fn request_block(&self, index: usize) {
        let dispatch = {
            let mut state = self.inner.lock();
            if state.destroyed || state.datasource.is_none() {
                return;
            }
            if state.blocks.contains_key(&index) || state.out_of_range(index) {
                return;
            }
            let block_size = state.block_size;
            state.blocks.insert(index, BlockState::new(index, block_size));
            state.access.touch(index);

            let dispatch = state.start(index);
            if dispatch.is_none() {
                state.queue.push_back(index);
                log_debug!("BLOCK", "block {} queued ({} waiting)", index, state.queue.len());
            }
            dispatch
        };
        if let Some(dispatch) = dispatch {
            self.send(dispatch);
        }
    }

    /// Re-fetches a block in `Failed` state; other states are left alone.
    pub fn retry_block(&self, index: usize) -> bool {
        let dispatch = {
            let mut state = self.inner.lock();
            match state.blocks.get_mut(&index) {
                Some(block) if block.status == BlockStatus::Failed => {
                    block.status = BlockStatus::Idle;
                    block.error = None;
                }
                _ => return false,
            }
            state.access.touch(index);
            let dispatch = state.start(index);
            if dispatch.is_none() {
                state.queue.push_back(index);
            }
            dispatch
        };
        log_debug!("BLOCK", "retry block {}", index);
        if let Some(dispatch) = dispatch {
            self.send(dispatch);
        }
        true
    }

    /// Requests every block overlapping rows `start..end`.
    pub fn ensure_rows(&self, start: usize, end: usize) {
        if end <= start {
            return;
        }
        let (first, last) = {
            let state = self.inner.lock();
            (state.block_of(start), state.block_of(end - 1))
        };
        for index in first..=last {
            self.request_block(index);
        }
    }

    /// Touches blocks that are already known so they count as recently used.
    pub fn touch_blocks(&self, first: usize, last: usize) {
        let mut state = self.inner.lock();
        for index in first..=last {
            if state.blocks.contains_key(&index) {
                state.access.touch(index);
            }
        }
    }

    /// Evicts least recently touched blocks until at most `max_blocks`
    /// remain. Loading blocks are skipped; if only loading blocks are left
    /// the cache stays over the bound until they complete.
    pub fn evict_to(&self, max_blocks: usize) -> Vec<usize> {
        let mut state = self.inner.lock();
        let mut evicted = Vec::new();
        if state.blocks.len() <= max_blocks {
            return evicted;
        }

        let candidates: Vec<usize> = state.access.oldest_first().collect();
        for index in candidates {
            if state.blocks.len() <= max_blocks {
                break;
            }
            let evictable = state
                .blocks
                .get(&index)
                .is_some_and(|b| b.status != BlockStatus::Loading);
            if !evictable {
                continue;
            }
            state.blocks.remove(&index);
            state.access.remove(index);
            state.queue.retain(|&q| q != index);
            evicted.push(index);
        }

        if !evicted.is_empty() {
            log_debug!("BLOCK", "evicted blocks {:?}", evicted);
        }
        evicted
    }

    /// Drops every block; late responses for the old blocks are ignored.
    pub fn purge(&self) {
        let mut state = self.inner.lock();
        state.reset();
        log_info!("BLOCK", "cache purged (generation {})", state.generation);
    }

    // ========================================================================
    // MODELS & DATASOURCE
    // ========================================================================

    fn update_models(&self, update: impl FnOnce(&mut RequestModels)) {
        let mut state = self.inner.lock();
        let mut models = state.models.clone();
        update(&mut models);
        if models != state.models {
            state.models = models;
            state.reset();
            log_info!("BLOCK", "request models changed, cache purged");
        }
    }

    pub fn set_sort_model(&self, sort_model: SortModel) {
        self.update_models(|m| m.sort_model = sort_model);
    }

    pub fn set_filter_model(&self, filter_model: FilterModel) {
        self.update_models(|m| m.filter_model = filter_model);
    }

    pub fn set_group_keys(&self, group_keys: Vec<String>) {
        self.update_models(|m| m.group_keys = group_keys);
    }

    pub fn set_pivot(&self, pivot_cols: Vec<String>, pivot_mode: bool) {
        self.update_models(|m| {
            m.pivot_cols = pivot_cols;
            m.pivot_mode = pivot_mode;
        });
    }

    /// Swaps the datasource. The same instance again is a no-op; otherwise
    /// the old one is destroyed and the cache reset.
    pub fn set_datasource(&self, datasource: Option<Arc<dyn Datasource>>) {
        let old = {
            let mut state = self.inner.lock();
            if state.destroyed {
                return;
            }
            let same = match (&state.datasource, &datasource) {
                (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
                (None, None) => true,
                _ => false,
            };
            if same {
                return;
            }
            let old = std::mem::replace(&mut state.datasource, datasource);
            state.reset();
            old
        };
        log_info!("BLOCK", "datasource replaced");
        if let Some(old) = old {
            old.destroy();
        }
    }

    pub fn has_datasource(&self) -> bool {
        self.inner.lock().datasource.is_some()
    }

    /// Destroys the datasource and stops acting on any response.
    pub fn destroy(&self) {
        let old = {
            let mut state = self.inner.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.reset();
            state.datasource.take()
        };
        {
            let mut listeners = self.inner.listeners();
            listeners.loaded.clear();
            listeners.failed.clear();
        }
        log_info!("BLOCK", "cache destroyed");
        if let Some(old) = old {
            old.destroy();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    // ========================================================================
    // LISTENERS
    // ========================================================================

    pub fn on_block_loaded(&self, listener: impl Fn(usize) + Send + Sync + 'static) {
        self.inner.listeners().loaded.push(Arc::new(listener));
    }

    pub fn on_block_failed(&self, listener: impl Fn(usize, &DatasourceError) + Send + Sync + 'static) {
        self.inner.listeners().failed.push(Arc::new(listener));
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Row at an absolute index if its block is loaded; touches the block.
    pub fn get_row(&self, row_index: usize) -> Option<Row> {
        let mut state = self.inner.lock();
        let index = state.block_of(row_index);
        let row = state.blocks.get(&index)?.row(row_index).cloned()?;
        state.access.touch(index);
        Some(row)
    }

    /// One entry per row in `start..end`, `None` where not loaded.
    pub fn get_rows(&self, start: usize, end: usize) -> Vec<Option<Row>> {
        let mut state = self.inner.lock();
        let mut out = Vec::with_capacity(end.saturating_sub(start));
        let mut touched: Option<usize> = None;
        for row_index in start..end {
            let index = state.block_of(row_index);
            let row = state.blocks.get(&index).and_then(|b| b.row(row_index)).cloned();
            if row.is_some() && touched != Some(index) {
                state.access.touch(index);
                touched = Some(index);
            }
            out.push(row);
        }
        out
    }

    pub fn is_row_loaded(&self, row_index: usize) -> bool {
        let state = self.inner.lock();
        let index = state.block_of(row_index);
        state
            .blocks
            .get(&index)
            .is_some_and(|b| b.row(row_index).is_some())
    }

    pub fn get_block(&self, index: usize) -> Option<BlockState> {
        self.inner.lock().blocks.get(&index).cloned()
    }

    pub fn block_status(&self, index: usize) -> Option<BlockStatus> {
        self.inner.lock().blocks.get(&index).map(|b| b.status)
    }

    pub fn block_indices(&self) -> Vec<usize> {
        self.inner.lock().blocks.keys().copied().collect()
    }

    pub fn total_row_count(&self) -> Option<usize> {
        self.inner.lock().total_row_count
    }

    pub fn block_of(&self, row_index: usize) -> usize {
        self.inner.lock().block_of(row_index)
    }

    pub fn active_requests(&self) -> usize {
        self.inner.lock().active_requests
    }

    pub fn queued_requests(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn block_count(&self) -> usize {
        self.inner.lock().blocks.len()
    }
}
