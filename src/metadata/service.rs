//! # Metadata Service
//!
//! Upstream source of fragment placement. The splitter only reads through
//! the [`MetadataService`] trait; [`MemoryMetadataService`] is the in-process
//! implementation used by the coordinator and tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::errors::{MetadataError, MetadataResult};
use super::fragment::{FragmentMeta, FragmentReplicaMeta, PathRange, StorageEngineMeta, TimeInterval};

/// Fragment lookup and creation
pub trait MetadataService: Send + Sync {
    /// Fragments covering `key` that overlap `interval`, ordered by start time
    fn fragments_overlapping(
        &self,
        key: &str,
        interval: &TimeInterval,
    ) -> MetadataResult<Vec<FragmentMeta>>;

    /// Creates (or returns the existing) fragment for exactly `key` × `interval`
    fn create_fragment(&self, key: &str, interval: &TimeInterval) -> MetadataResult<FragmentMeta>;

    /// Number of secondary replicas each write should reach
    fn replica_num(&self) -> usize;
}

/// In-memory metadata
#[derive(Debug)]
pub struct MemoryMetadataService {
    replica_num: usize,
    engines: RwLock<Vec<StorageEngineMeta>>,
    fragments: RwLock<Vec<FragmentMeta>>,
    next_unit: AtomicU64,
    placement_offset: AtomicUsize,
}

impl MemoryMetadataService {
    pub fn new(replica_num: usize) -> Self {
        Self {
            replica_num,
            engines: RwLock::new(Vec::new()),
            fragments: RwLock::new(Vec::new()),
            next_unit: AtomicU64::new(0),
            placement_offset: AtomicUsize::new(0),
        }
    }

    /// Register a storage engine as a placement target
    pub fn register_storage_engine(&self, engine: StorageEngineMeta) -> MetadataResult<()> {
        let mut engines = self
            .engines
            .write()
            .map_err(|_| MetadataError::Unavailable("Lock poisoned".into()))?;
        if engines.iter().any(|e| e.id == engine.id) {
            return Err(MetadataError::InvalidFragment(format!(
                "storage engine {} registered twice",
                engine.id
            )));
        }
        engines.push(engine);
        Ok(())
    }

    pub fn storage_engines(&self) -> Vec<StorageEngineMeta> {
        self.engines.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Snapshot of every known fragment
    pub fn fragments(&self) -> Vec<FragmentMeta> {
        self.fragments.read().map(|f| f.clone()).unwrap_or_default()
    }

    fn place_replicas(&self, key: &str) -> MetadataResult<Vec<FragmentReplicaMeta>> {
        let engines = self
            .engines
            .read()
            .map_err(|_| MetadataError::Unavailable("Lock poisoned".into()))?;
        if engines.is_empty() {
            return Err(MetadataError::NoStorageEngines(key.to_string()));
        }

        let count = (self.replica_num + 1).min(engines.len());
        let offset = self.placement_offset.fetch_add(1, Ordering::Relaxed) % engines.len();
        let unit = format!("unit{:010}", self.next_unit.fetch_add(1, Ordering::Relaxed));

        Ok((0..count)
            .map(|i| {
                let engine = &engines[(offset + i) % engines.len()];
                FragmentReplicaMeta::new(i, unit.clone(), engine.id)
            })
            .collect())
    }
}

impl Default for MemoryMetadataService {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MetadataService for MemoryMetadataService {
    fn fragments_overlapping(
        &self,
        key: &str,
        interval: &TimeInterval,
    ) -> MetadataResult<Vec<FragmentMeta>> {
        let fragments = self
            .fragments
            .read()
            .map_err(|_| MetadataError::Unavailable("Lock poisoned".into()))?;

        let mut found: Vec<FragmentMeta> = fragments
            .iter()
            .filter(|f| f.overlaps(key, interval))
            .cloned()
            .collect();
        found.sort_by_key(|f| f.time_interval().start());
        Ok(found)
    }

    fn create_fragment(&self, key: &str, interval: &TimeInterval) -> MetadataResult<FragmentMeta> {
        let range = PathRange::single(key);

        // Held across placement so concurrent creators of the same range
        // observe one fragment
        let mut fragments = self
            .fragments
            .write()
            .map_err(|_| MetadataError::Unavailable("Lock poisoned".into()))?;

        if let Some(existing) = fragments
            .iter()
            .find(|f| f.path_range() == &range && f.time_interval() == *interval)
        {
            return Ok(existing.clone());
        }

        let replicas = self.place_replicas(key)?;
        let fragment = FragmentMeta::new(range, *interval, replicas)?;
        fragments.push(fragment.clone());
        Ok(fragment)
    }

    fn replica_num(&self) -> usize {
        self.replica_num
    }
}
