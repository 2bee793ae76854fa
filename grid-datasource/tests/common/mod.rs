//! FILENAME: tests/common/mod.rs
//! Mock datasources and fixtures for grid-datasource integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use grid_datasource::{Datasource, DatasourceError, GetRowsParams, LoadCallback, RowsResponse};
use grid_engine::Row;

/// How the mock answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Completes inside `get_rows`.
    Immediate,
    /// Parks the callback until the test resolves it.
    Deferred,
}

struct MockState {
    calls: Vec<GetRowsParams>,
    pending: Vec<(GetRowsParams, LoadCallback)>,
    fail_blocks: Vec<usize>,
}

/// A datasource serving `total` rows of `{id, name}`.
pub struct MockDatasource {
    pub total: usize,
    mode: Mode,
    report_count: bool,
    state: Mutex<MockState>,
    destroyed: AtomicBool,
}

impl MockDatasource {
    pub fn new(total: usize, mode: Mode) -> Self {
        MockDatasource {
            total,
            mode,
            report_count: true,
            state: Mutex::new(MockState {
                calls: Vec::new(),
                pending: Vec::new(),
                fail_blocks: Vec::new(),
            }),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn immediate(total: usize) -> Arc<Self> {
        Arc::new(Self::new(total, Mode::Immediate))
    }

    pub fn deferred(total: usize) -> Arc<Self> {
        Arc::new(Self::new(total, Mode::Deferred))
    }

    /// Responses carry no `row_count`.
    pub fn without_row_count(mut self) -> Self {
        self.report_count = false;
        self
    }

    /// Requests starting at `start_row` fail until cleared.
    pub fn fail_start_row(&self, start_row: usize) {
        self.state.lock().unwrap().fail_blocks.push(start_row);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().fail_blocks.clear();
    }

    pub fn calls(&self) -> Vec<GetRowsParams> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Answers the oldest parked request. The callback runs after the
    /// mock's own lock is released.
    pub fn resolve_next(&self) -> bool {
        let next = {
            let mut state = self.state.lock().unwrap();
            if state.pending.is_empty() {
                None
            } else {
                Some(state.pending.remove(0))
            }
        };
        match next {
            Some((params, callback)) => {
                callback.complete(self.respond(&params));
                true
            }
            None => false,
        }
    }

    /// Answers the parked request for `start_row`.
    pub fn resolve_start_row(&self, start_row: usize) -> bool {
        let next = {
            let mut state = self.state.lock().unwrap();
            let position = state.pending.iter().position(|(p, _)| p.start_row == start_row);
            position.map(|i| state.pending.remove(i))
        };
        match next {
            Some((params, callback)) => {
                callback.complete(self.respond(&params));
                true
            }
            None => false,
        }
    }

    pub fn resolve_all(&self) {
        while self.resolve_next() {}
    }

    fn respond(&self, params: &GetRowsParams) -> Result<RowsResponse, DatasourceError> {
        let failing = self.state.lock().unwrap().fail_blocks.contains(&params.start_row);
        if failing {
            return Err(DatasourceError::failed(format!("rows {} unavailable", params.start_row)));
        }
        let end = params.end_row.min(self.total);
        let rows = (params.start_row..end).map(make_row).collect();
        let response = RowsResponse::new(rows);
        Ok(if self.report_count {
            response.with_row_count(self.total)
        } else {
            response
        })
    }
}

impl Datasource for MockDatasource {
    fn get_rows(&self, params: GetRowsParams, callback: LoadCallback) {
        self.state.lock().unwrap().calls.push(params.clone());
        match self.mode {
            Mode::Immediate => callback.complete(self.respond(&params)),
            Mode::Deferred => self.state.lock().unwrap().pending.push((params, callback)),
        }
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

pub fn make_row(index: usize) -> Row {
    Row::new().with("id", index).with("name", format!("Row {}", index))
}

/// Collects block indices reported by listeners.
#[derive(Clone, Default)]
pub struct EventLog {
    pub loaded: Arc<Mutex<Vec<usize>>>,
    pub failed: Arc<Mutex<Vec<(usize, DatasourceError)>>>,
}

impl EventLog {
    pub fn loaded(&self) -> Vec<usize> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<(usize, DatasourceError)> {
        self.failed.lock().unwrap().clone()
    }
}
