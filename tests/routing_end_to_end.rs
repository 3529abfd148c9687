//! End-to-end routing tests
//!
//! Requests go through the coordinator: plan, split, physical task,
//! filesystem adapter and back.

use std::fs;
use std::sync::Arc;

use polyroute::config::Config;
use polyroute::coordinator::Coordinator;
use polyroute::data::{collect_rows, DataType, Row, Value};
use polyroute::filter::{Filter, Op, ValueFilter};
use polyroute::metadata::{MemoryMetadataService, MetadataService, StorageEngineMeta, TimeInterval};
use polyroute::operator::DataView;
use polyroute::split::{DataPlan, PlanKind, PlanSplitter};
use polyroute::storage::FileSystemAdapter;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn coordinator_with(dir: &TempDir, replica_num: usize, engines: u64) -> Coordinator {
    let metadata = Arc::new(MemoryMetadataService::new(replica_num));
    let mut adapters = Vec::new();
    for id in 0..engines {
        let engine = StorageEngineMeta::new(id, "filesystem")
            .with_param("dir", dir.path().join(format!("engine-{}", id)).to_string_lossy());
        adapters.push(FileSystemAdapter::new(engine.clone(), 2).unwrap());
        metadata.register_storage_engine(engine).unwrap();
    }
    let coordinator = Coordinator::with_splitter(PlanSplitter::with_seed(metadata, 1, 42));
    for adapter in adapters {
        coordinator.register_adapter(Arc::new(adapter)).unwrap();
    }
    coordinator
}

fn paths(names: &[&str]) -> Vec<String> {
    names.iter().map(|p| p.to_string()).collect()
}

fn room_temps() -> DataView {
    DataView::rows(
        paths(&["room1.temp"]),
        vec![DataType::Double],
        vec![100, 200],
        vec![
            vec![Some(Value::Double(21.5))],
            vec![Some(Value::Double(22.0))],
        ],
    )
    .unwrap()
}

fn read_all(coordinator: &Coordinator, patterns: &[&str], start: i64, end: i64) -> Vec<Row> {
    let mut stream = coordinator
        .query(&paths(patterns), TimeInterval::new(start, end).unwrap(), None)
        .unwrap();
    collect_rows(&mut stream).unwrap()
}

// =============================================================================
// Insert, query, delete
// =============================================================================

#[test]
fn test_insert_then_query_returns_inserted_points() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 0, 1);

    coordinator.insert(&room_temps()).unwrap();

    let rows = read_all(&coordinator, &["room1.temp"], 0, 300);
    assert_eq!(
        rows,
        vec![
            Row::new(100, vec![Some(Value::Double(21.5))]),
            Row::new(200, vec![Some(Value::Double(22.0))]),
        ]
    );
}

#[test]
fn test_delete_removes_only_the_range() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 0, 1);

    coordinator.insert(&room_temps()).unwrap();
    coordinator
        .delete(&paths(&["room1.temp"]), TimeInterval::new(100, 150).unwrap())
        .unwrap();

    let keys: Vec<i64> = read_all(&coordinator, &["room1.temp"], 0, 300)
        .iter()
        .map(|r| r.timestamp)
        .collect();
    assert_eq!(keys, vec![200]);
}

#[test]
fn test_query_applies_value_filter() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 0, 1);
    coordinator.insert(&room_temps()).unwrap();

    let filter = Filter::Value(ValueFilter::new("room1.temp", Op::Lt, Value::Double(22.0)));
    let mut stream = coordinator
        .query(
            &paths(&["room1.temp"]),
            TimeInterval::new(0, 300).unwrap(),
            Some(filter),
        )
        .unwrap();
    let keys: Vec<i64> = collect_rows(&mut stream)
        .unwrap()
        .iter()
        .map(|r| r.timestamp)
        .collect();
    assert_eq!(keys, vec![100]);
}

#[test]
fn test_query_joins_series_from_different_fragments() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 0, 1);

    let view = DataView::columns(
        paths(&["room1.temp", "room2.temp"]),
        vec![DataType::Double, DataType::Double],
        vec![10, 20],
        vec![
            vec![Some(Value::Double(1.0)), None],
            vec![Some(Value::Double(2.0)), Some(Value::Double(3.0))],
        ],
    )
    .unwrap();
    coordinator.insert(&view).unwrap();

    let rows = read_all(&coordinator, &["room1.temp", "room2.temp"], 0, 100);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].timestamp, 10);
    assert_eq!(rows[1].timestamp, 20);
    assert_eq!(rows[1].values.iter().filter(|v| v.is_some()).count(), 2);
}

#[test]
fn test_query_outside_inserted_range_is_empty() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 0, 1);
    coordinator.insert(&room_temps()).unwrap();

    assert!(read_all(&coordinator, &["room1.temp"], 500, 600).is_empty());
}

#[test]
fn test_series_spanning_fragments_reads_latest_values() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 0, 1);

    let points = |pairs: &[(i64, f64)]| {
        DataView::rows(
            paths(&["room1.temp"]),
            vec![DataType::Double],
            pairs.iter().map(|p| p.0).collect(),
            pairs.iter().map(|p| vec![Some(Value::Double(p.1))]).collect(),
        )
        .unwrap()
    };
    coordinator.insert(&points(&[(100, 1.0)])).unwrap();
    coordinator.insert(&points(&[(100, 2.0), (400, 3.0)])).unwrap();
    coordinator.insert(&points(&[(400, 4.0)])).unwrap();

    assert_eq!(
        read_all(&coordinator, &["room1.temp"], 300, 500),
        vec![Row::new(400, vec![Some(Value::Double(4.0))])]
    );
    assert_eq!(
        read_all(&coordinator, &["room1.temp"], 0, 1000),
        vec![
            Row::new(100, vec![Some(Value::Double(2.0))]),
            Row::new(400, vec![Some(Value::Double(4.0))]),
        ]
    );
}

// =============================================================================
// Replication
// =============================================================================

#[test]
fn test_every_replica_holds_the_insert() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 1, 2);
    coordinator.insert(&room_temps()).unwrap();

    // Queries pick a random replica; all must agree
    for _ in 0..20 {
        assert_eq!(read_all(&coordinator, &["room1.temp"], 0, 300).len(), 2);
    }
}

#[test]
fn test_delete_reaches_every_replica() {
    let temp_dir = create_temp_data_dir();
    let coordinator = coordinator_with(&temp_dir, 1, 2);
    coordinator.insert(&room_temps()).unwrap();
    coordinator
        .delete(&paths(&["room1.temp"]), TimeInterval::all())
        .unwrap();

    for _ in 0..20 {
        assert!(read_all(&coordinator, &["room1.temp"], 0, 300).is_empty());
    }
}

// =============================================================================
// Splitting
// =============================================================================

#[test]
fn test_split_groups_paths_by_routing_key() {
    let metadata = Arc::new(MemoryMetadataService::new(0));
    metadata
        .register_storage_engine(StorageEngineMeta::new(0, "filesystem"))
        .unwrap();
    let splitter = PlanSplitter::with_seed(metadata.clone(), 1, 7);

    let plan = DataPlan::new(
        PlanKind::InsertRecords,
        paths(&["room1.temp", "room2.temp", "room1.humidity"]),
        TimeInterval::new(0, 100).unwrap(),
    )
    .unwrap();
    let infos = splitter.split(&plan).unwrap();

    assert_eq!(infos.len(), 2);
    let room1 = infos
        .iter()
        .find(|i| i.path_indexes == vec![0, 2])
        .expect("room1 split");
    assert!(room1.replica.is_primary());
    assert_eq!(metadata.fragments().len(), 2);

    // Splitting again reuses the fragments
    splitter.split(&plan).unwrap();
    assert_eq!(metadata.fragments().len(), 2);
}

#[test]
fn test_split_insert_reaches_primary_and_secondaries() {
    let metadata = Arc::new(MemoryMetadataService::new(2));
    for id in 0..3 {
        metadata
            .register_storage_engine(StorageEngineMeta::new(id, "filesystem"))
            .unwrap();
    }
    let splitter = PlanSplitter::with_seed(metadata.clone(), 1, 7);

    let plan = DataPlan::new(
        PlanKind::InsertRecords,
        paths(&["room1.temp"]),
        TimeInterval::new(0, 100).unwrap(),
    )
    .unwrap();
    let infos = splitter.split(&plan).unwrap();
    assert_eq!(infos.len(), 3);
    assert!(infos[0].replica.is_primary());
    assert!(infos[1..].iter().all(|i| !i.replica.is_primary()));

    let overlapping = metadata
        .fragments_overlapping("room1", &TimeInterval::new(50, 60).unwrap())
        .unwrap();
    assert_eq!(overlapping.len(), 1);
    assert_eq!(overlapping[0].replica_count(), 3);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_coordinator_from_config_file() {
    let temp_dir = create_temp_data_dir();
    let config_path = temp_dir.path().join("polyroute.json");
    let data_dir = temp_dir.path().join("data");
    let content = serde_json::json!({
        "data_dir": data_dir.to_string_lossy(),
        "replica_num": 1,
        "storage_engines": [
            { "id": 0, "kind": "filesystem" },
            { "id": 1, "kind": "filesystem" }
        ]
    });
    fs::write(&config_path, content.to_string()).unwrap();

    let config = Config::load(&config_path).unwrap();
    let coordinator = Coordinator::from_config(&config).unwrap();
    coordinator.insert(&room_temps()).unwrap();

    assert!(data_dir.join("engine-0").is_dir());
    assert!(data_dir.join("engine-1").is_dir());
    assert_eq!(read_all(&coordinator, &["room1.temp"], 0, 300).len(), 2);

    let series = coordinator.time_series().unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].path, "room1.temp");
}

#[test]
fn test_from_config_rejects_unknown_engine_kind() {
    let temp_dir = create_temp_data_dir();
    let config = Config::from_json(&format!(
        r#"{{"data_dir": "{}", "storage_engines": [{{"id": 0, "kind": "columnar"}}]}}"#,
        temp_dir.path().display()
    ))
    .unwrap();

    let err = Coordinator::from_config(&config).err().expect("unknown kind");
    assert_eq!(err.code(), "POLY_PHYSICAL_INITIALIZATION");
}
