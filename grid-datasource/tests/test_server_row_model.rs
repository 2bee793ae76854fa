//! FILENAME: tests/test_server_row_model.rs
//! Integration tests for the block-cached server row model.

mod common;

use std::sync::Arc;

use common::{make_row, EventLog, MockDatasource, Mode};
use grid_datasource::{BlockStatus, DatasourceError, ServerRowModel, ServerRowModelConfig};
use grid_engine::{ColumnFilter, FilterModel, SortItem, TextOperator};

fn model(block_size: usize, max_concurrent: usize, datasource: Arc<MockDatasource>) -> ServerRowModel {
    ServerRowModel::new(
        ServerRowModelConfig::default()
            .with_block_size(block_size)
            .with_max_concurrent_requests(max_concurrent),
    )
    .with_datasource(datasource)
}

// ============================================================================
// LOADING
// ============================================================================

#[test]
fn test_request_block_loads_rows_and_total() {
    let ds = MockDatasource::immediate(100);
    let model = model(10, 2, ds.clone());

    assert_eq!(model.total_row_count(), None);
    model.request_block(0);

    assert_eq!(model.get_row(5), Some(make_row(5)));
    assert_eq!(model.total_row_count(), Some(100));
    assert_eq!(model.block_status(0), Some(BlockStatus::Loaded));

    let calls = ds.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].start_row, 0);
    assert_eq!(calls[0].end_row, 10);
}

#[test]
fn test_unloaded_rows_are_none() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());
    model.request_block(1);

    assert_eq!(model.get_row(15), None);
    assert!(!model.is_row_loaded(15));
    assert_eq!(model.block_status(1), Some(BlockStatus::Loading));

    ds.resolve_all();
    assert!(model.is_row_loaded(15));
    assert_eq!(model.get_row(15), Some(make_row(15)));
}

#[test]
fn test_pending_block_is_not_fetched_twice() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());

    model.request_block(3);
    model.request_block(3);
    model.request_block(3);
    assert_eq!(ds.call_count(), 1);

    ds.resolve_all();
    model.request_block(3);
    assert_eq!(ds.call_count(), 1);
}

#[test]
fn test_concurrency_gate_queues_and_drains() {
    let ds = MockDatasource::deferred(1000);
    let model = model(10, 2, ds.clone());

    for block in 0..5 {
        model.request_block(block);
    }
    assert_eq!(ds.call_count(), 2);
    assert_eq!(model.active_requests(), 2);
    assert_eq!(model.queued_requests(), 3);
    assert_eq!(model.block_status(2), Some(BlockStatus::Idle));

    // Each completion frees one slot for the next queued block
    assert!(ds.resolve_next());
    assert_eq!(ds.call_count(), 3);
    assert_eq!(model.active_requests(), 2);
    assert_eq!(model.queued_requests(), 2);

    ds.resolve_all();
    assert_eq!(ds.call_count(), 5);
    assert_eq!(model.active_requests(), 0);
    assert_eq!(model.queued_requests(), 0);
    for block in 0..5 {
        assert_eq!(model.block_status(block), Some(BlockStatus::Loaded));
    }
}

#[test]
fn test_out_of_order_completion() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());
    model.request_block(0);
    model.request_block(1);

    assert!(ds.resolve_start_row(10));
    assert_eq!(model.block_status(1), Some(BlockStatus::Loaded));
    assert_eq!(model.block_status(0), Some(BlockStatus::Loading));

    assert!(ds.resolve_start_row(0));
    assert_eq!(model.get_rows(8, 12), vec![
        Some(make_row(8)),
        Some(make_row(9)),
        Some(make_row(10)),
        Some(make_row(11)),
    ]);
}

#[test]
fn test_total_inferred_from_short_block() {
    let ds = Arc::new(MockDatasource::new(25, Mode::Immediate).without_row_count());
    let model = model(10, 2, ds.clone());

    model.request_block(0);
    assert_eq!(model.total_row_count(), None);

    model.request_block(2);
    assert_eq!(model.total_row_count(), Some(25));
    assert_eq!(model.get_row(24), Some(make_row(24)));

    // Nothing exists past the end
    model.request_block(5);
    assert_eq!(ds.call_count(), 2);
}

#[test]
fn test_ensure_rows_requests_covering_blocks() {
    let ds = MockDatasource::immediate(100);
    let model = model(10, 4, ds.clone());
    model.ensure_rows(15, 35);

    let starts: Vec<usize> = ds.calls().iter().map(|p| p.start_row).collect();
    assert_eq!(starts, vec![10, 20, 30]);
    assert_eq!(model.block_count(), 3);
}

// ============================================================================
// FAILURE & RETRY
// ============================================================================

#[test]
fn test_failed_block_reports_and_retries() {
    let ds = MockDatasource::immediate(100);
    ds.fail_start_row(10);
    let model = model(10, 2, ds.clone());

    let events = EventLog::default();
    let failed = events.failed.clone();
    model.on_block_failed(move |block, error| failed.lock().unwrap().push((block, error.clone())));

    model.request_block(1);
    assert_eq!(model.block_status(1), Some(BlockStatus::Failed));
    assert_eq!(
        model.get_block(1).unwrap().error,
        Some(DatasourceError::failed("rows 10 unavailable"))
    );
    assert_eq!(events.failed().len(), 1);
    assert_eq!(events.failed()[0].0, 1);

    // A failed block is not re-fetched by a plain request
    model.request_block(1);
    assert_eq!(ds.call_count(), 1);

    ds.clear_failures();
    assert!(model.retry_block(1));
    assert_eq!(ds.call_count(), 2);
    assert_eq!(model.block_status(1), Some(BlockStatus::Loaded));
    assert_eq!(model.get_block(1).unwrap().error, None);
}

#[test]
fn test_retry_ignores_non_failed_blocks() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());
    model.request_block(0);

    assert!(!model.retry_block(0));
    assert!(!model.retry_block(7));
    ds.resolve_all();
    assert!(!model.retry_block(0));
    assert_eq!(ds.call_count(), 1);
}

#[test]
fn test_failure_frees_concurrency_slot() {
    let ds = MockDatasource::deferred(100);
    ds.fail_start_row(0);
    let model = model(10, 1, ds.clone());
    model.request_block(0);
    model.request_block(1);
    assert_eq!(model.queued_requests(), 1);

    ds.resolve_next();
    assert_eq!(model.block_status(0), Some(BlockStatus::Failed));
    assert_eq!(model.block_status(1), Some(BlockStatus::Loading));
    assert_eq!(model.active_requests(), 1);
}

// ============================================================================
// PARAMETER CHANGES & PURGE
// ============================================================================

#[test]
fn test_sort_change_purges_and_forwards_model() {
    let ds = MockDatasource::immediate(100);
    let model = model(10, 2, ds.clone());
    model.request_block(0);
    assert_eq!(model.block_count(), 1);

    model.set_sort_model(vec![SortItem::desc("name")]);
    assert_eq!(model.block_count(), 0);
    assert_eq!(model.total_row_count(), None);

    model.request_block(0);
    let calls = ds.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].sort_model.is_empty());
    assert_eq!(calls[1].sort_model, vec![SortItem::desc("name")]);
}

#[test]
fn test_filter_and_group_changes_are_forwarded() {
    let ds = MockDatasource::immediate(100);
    let model = model(10, 2, ds.clone());

    let mut filter_model = FilterModel::new();
    filter_model.insert("name".to_string(), ColumnFilter::text(TextOperator::Contains, "row"));
    model.set_filter_model(filter_model.clone());
    model.set_group_keys(vec!["Europe".to_string()]);
    model.set_pivot(vec!["year".to_string()], true);
    model.request_block(0);

    let params = &ds.calls()[0];
    assert_eq!(params.filter_model, filter_model);
    assert_eq!(params.group_keys, vec!["Europe".to_string()]);
    assert_eq!(params.pivot_cols, vec!["year".to_string()]);
    assert!(params.pivot_mode);
}

#[test]
fn test_same_model_does_not_purge() {
    let ds = MockDatasource::immediate(100);
    let model = model(10, 2, ds.clone());
    model.set_sort_model(vec![SortItem::asc("name")]);
    model.request_block(0);

    model.set_sort_model(vec![SortItem::asc("name")]);
    assert_eq!(model.block_count(), 1);
}

#[test]
fn test_late_response_after_purge_is_dropped() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());
    model.request_block(0);
    model.purge_cache();

    ds.resolve_all();
    assert_eq!(model.block_count(), 0);
    assert_eq!(model.total_row_count(), None);
    assert_eq!(model.active_requests(), 0);

    // The block can be requested afresh
    model.request_block(0);
    assert_eq!(ds.call_count(), 2);
    assert_eq!(model.block_status(0), Some(BlockStatus::Loading));
}

// ============================================================================
// DATASOURCE LIFECYCLE
// ============================================================================

#[test]
fn test_datasource_swap_destroys_old_and_resets() {
    let first = MockDatasource::immediate(100);
    let second = MockDatasource::immediate(50);
    let model = model(10, 2, first.clone());
    model.request_block(0);

    model.set_datasource(Some(second.clone()));
    assert!(first.is_destroyed());
    assert!(!second.is_destroyed());
    assert_eq!(model.block_count(), 0);

    model.request_block(0);
    assert_eq!(model.total_row_count(), Some(50));
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
}

#[test]
fn test_setting_same_datasource_is_noop() {
    let ds = MockDatasource::immediate(100);
    let model = model(10, 2, ds.clone());
    model.request_block(0);

    model.set_datasource(Some(ds.clone()));
    assert!(!ds.is_destroyed());
    assert_eq!(model.block_count(), 1);
}

#[test]
fn test_destroy_stops_loading() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());
    let events = EventLog::default();
    let loaded = events.loaded.clone();
    model.on_block_loaded(move |block| loaded.lock().unwrap().push(block));
    model.request_block(0);

    model.destroy();
    assert!(ds.is_destroyed());
    assert!(model.is_destroyed());

    ds.resolve_all();
    assert!(events.loaded().is_empty());
    model.request_block(1);
    assert_eq!(ds.call_count(), 1);
}

#[test]
fn test_abandoned_request_after_swap_is_ignored() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());
    model.request_block(0);

    // Replacing the datasource drops its parked callbacks after the reset
    model.set_datasource(None);
    drop(ds);
    assert_eq!(model.block_count(), 0);
    assert_eq!(model.active_requests(), 0);
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_loaded_listener_fires_per_block() {
    let ds = MockDatasource::deferred(100);
    let model = model(10, 2, ds.clone());
    let events = EventLog::default();
    let loaded = events.loaded.clone();
    model.on_block_loaded(move |block| loaded.lock().unwrap().push(block));

    model.request_block(2);
    model.request_block(0);
    ds.resolve_start_row(0);
    ds.resolve_start_row(20);

    assert_eq!(events.loaded(), vec![0, 2]);
}
