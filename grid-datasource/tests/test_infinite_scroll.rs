//! FILENAME: tests/test_infinite_scroll.rs
//! Integration tests for viewport-driven loading and LRU eviction.

mod common;

use std::sync::Arc;

use common::{make_row, MockDatasource};
use grid_datasource::{BlockStatus, InfiniteScroll, InfiniteScrollConfig};
use grid_engine::SortItem;

fn scroll(max_blocks: usize, overscan: usize, datasource: Arc<MockDatasource>) -> InfiniteScroll {
    InfiniteScroll::new(
        InfiniteScrollConfig::default()
            .with_block_size(10)
            .with_max_concurrent_requests(4)
            .with_max_blocks_in_cache(max_blocks)
            .with_overscan_blocks(overscan),
    )
    .with_datasource(datasource)
}

#[test]
fn test_fourth_block_evicts_least_recent() {
    let ds = MockDatasource::immediate(1000);
    let scroll = scroll(3, 0, ds.clone());

    assert!(scroll.on_viewport_changed(0, 10).is_empty());
    assert!(scroll.on_viewport_changed(10, 20).is_empty());
    assert!(scroll.on_viewport_changed(20, 30).is_empty());
    assert_eq!(scroll.on_viewport_changed(30, 40), vec![0]);

    assert_eq!(scroll.cached_blocks(), vec![1, 2, 3]);
    assert_eq!(scroll.get_row(5), None);
    assert_eq!(scroll.get_row(35), Some(make_row(35)));
}

#[test]
fn test_reading_a_row_protects_its_block() {
    let ds = MockDatasource::immediate(1000);
    let scroll = scroll(3, 0, ds.clone());
    scroll.on_viewport_changed(0, 10);
    scroll.on_viewport_changed(10, 20);
    scroll.on_viewport_changed(20, 30);

    // Block 0 becomes the most recently used
    assert_eq!(scroll.get_row(5), Some(make_row(5)));
    assert_eq!(scroll.on_viewport_changed(30, 40), vec![1]);
    assert_eq!(scroll.cached_blocks(), vec![0, 2, 3]);
}

#[test]
fn test_loading_blocks_are_never_evicted() {
    let ds = MockDatasource::deferred(1000);
    let scroll = scroll(2, 0, ds.clone());
    scroll.on_viewport_changed(0, 10);
    scroll.on_viewport_changed(10, 20);

    // Over the bound, but everything is still in flight
    assert!(scroll.on_viewport_changed(20, 30).is_empty());
    assert_eq!(scroll.block_count(), 3);

    ds.resolve_all();
    assert_eq!(scroll.on_viewport_changed(20, 30), vec![0]);
    assert_eq!(scroll.cached_blocks(), vec![1, 2]);
}

#[test]
fn test_eviction_skips_loading_and_continues() {
    let ds = MockDatasource::deferred(1000);
    let scroll = scroll(2, 0, ds.clone());
    scroll.on_viewport_changed(0, 10);
    scroll.on_viewport_changed(10, 20);
    assert!(ds.resolve_start_row(10));

    // Block 0 is oldest but still loading, so block 1 goes instead
    assert_eq!(scroll.on_viewport_changed(20, 30), vec![1]);
    assert_eq!(scroll.cached_blocks(), vec![0, 2]);
    assert_eq!(scroll.block_status(0), Some(BlockStatus::Loading));
}

#[test]
fn test_overscan_loads_neighbours() {
    let ds = MockDatasource::immediate(1000);
    let scroll = scroll(10, 1, ds.clone());
    scroll.on_viewport_changed(25, 35);

    let starts: Vec<usize> = ds.calls().iter().map(|p| p.start_row).collect();
    assert_eq!(starts, vec![10, 20, 30, 40]);
}

#[test]
fn test_overscan_stops_at_known_end() {
    let ds = MockDatasource::immediate(35);
    let scroll = scroll(10, 1, ds.clone());
    scroll.on_viewport_changed(30, 35);

    let starts: Vec<usize> = ds.calls().iter().map(|p| p.start_row).collect();
    assert_eq!(starts, vec![20, 30]);
    assert_eq!(scroll.total_row_count(), Some(35));

    scroll.on_viewport_changed(30, 35);
    assert_eq!(ds.call_count(), 2);
}

#[test]
fn test_sort_change_purges_cache() {
    let ds = MockDatasource::immediate(1000);
    let scroll = scroll(5, 0, ds.clone());
    scroll.on_viewport_changed(0, 20);
    assert_eq!(scroll.block_count(), 2);

    scroll.set_sort_model(vec![SortItem::asc("name")]);
    assert_eq!(scroll.block_count(), 0);

    scroll.on_viewport_changed(0, 20);
    assert_eq!(ds.call_count(), 4);
    assert_eq!(ds.calls()[3].sort_model, vec![SortItem::asc("name")]);
}

#[test]
fn test_destroy_calls_datasource_destroy() {
    let ds = MockDatasource::immediate(1000);
    let scroll = scroll(5, 0, ds.clone());
    scroll.on_viewport_changed(0, 10);

    scroll.destroy();
    assert!(ds.is_destroyed());
    assert_eq!(scroll.block_count(), 0);
    scroll.on_viewport_changed(0, 10);
    assert_eq!(ds.call_count(), 1);
}

#[test]
fn test_viewport_past_addressable_rows_is_ignored() {
    let ds = MockDatasource::immediate(1000);
    let scroll = scroll(3, 0, ds.clone());

    assert!(scroll.on_viewport_changed(usize::MAX, usize::MAX).is_empty());
    assert!(scroll.on_viewport_changed(usize::MAX - 5, usize::MAX).is_empty());
    assert_eq!(scroll.block_count(), 0);
    assert_eq!(ds.call_count(), 0);

    // Still usable afterwards
    scroll.on_viewport_changed(0, 10);
    assert_eq!(scroll.get_row(3), Some(make_row(3)));
}
