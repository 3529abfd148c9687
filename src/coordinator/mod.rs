//! Request coordinator
//!
//! Drives insert, query and delete end to end: build a plan, split it,
//! turn every split into a physical task, run the task on the adapter of the
//! replica's engine and fold the results.
//!
//! Tasks run sequentially in split order. A failed insert task aborts the
//! request; replica writes that already succeeded are not undone.

mod errors;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::Config;
use crate::data::{merge_streams, RowStream, Timeseries, VecRowStream};
use crate::filter::Filter;
use crate::metadata::{MemoryMetadataService, MetadataService, PathRange, TimeInterval};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::operator::{is_wildcard, DataView, Delete, Insert, Operator, Project, Select, Source};
use crate::split::{DataPlan, PlanKind, PlanSplitter, SplitInfo};
use crate::storage::{open_adapter, PhysicalTask, StorageAdapter};

pub use errors::{CoordinatorError, CoordinatorResult};

/// Entry point for decoded client requests
pub struct Coordinator {
    splitter: PlanSplitter,
    adapters: RwLock<HashMap<u64, Arc<dyn StorageAdapter>>>,
    metrics: Arc<MetricsRegistry>,
}

impl Coordinator {
    pub fn new(metadata: Arc<dyn MetadataService>, routing_key_depth: usize) -> Self {
        Self::with_splitter(PlanSplitter::new(metadata, routing_key_depth))
    }

    /// Uses a prepared splitter, e.g. one with a fixed seed
    pub fn with_splitter(splitter: PlanSplitter) -> Self {
        let metrics = Arc::clone(splitter.metrics());
        Self {
            splitter,
            adapters: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// In-memory metadata plus one adapter per configured engine
    pub fn from_config(config: &Config) -> CoordinatorResult<Self> {
        config.validate()?;

        let metadata = Arc::new(MemoryMetadataService::new(config.replica_num));
        let mut adapters = Vec::new();
        for engine in config.engine_metas() {
            adapters.push(open_adapter(&engine, config.insert_batch_size)?);
            metadata.register_storage_engine(engine)?;
        }

        let coordinator = Self::new(metadata, config.routing_key_depth);
        for adapter in adapters {
            coordinator.register_adapter(adapter)?;
        }
        Ok(coordinator)
    }

    /// Routes tasks for `adapter.engine().id` to `adapter`
    pub fn register_adapter(&self, adapter: Arc<dyn StorageAdapter>) -> CoordinatorResult<()> {
        let mut adapters = self
            .adapters
            .write()
            .map_err(|_| CoordinatorError::Internal("Lock poisoned".into()))?;
        adapters.insert(adapter.engine().id, adapter);
        Ok(())
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    fn adapter(&self, engine_id: u64) -> CoordinatorResult<Arc<dyn StorageAdapter>> {
        let adapters = self
            .adapters
            .read()
            .map_err(|_| CoordinatorError::Internal("Lock poisoned".into()))?;
        adapters
            .get(&engine_id)
            .cloned()
            .ok_or(CoordinatorError::UnknownEngine(engine_id))
    }

    fn execute(&self, task: &PhysicalTask) -> CoordinatorResult<Option<Box<dyn RowStream>>> {
        let adapter = self.adapter(task.storage_engine_id())?;
        let described = task.describe();

        match adapter.execute(task).into_result() {
            Ok(stream) => {
                self.metrics.increment_tasks_executed();
                log_event_with_fields(Event::TaskExecuted, &[("task", described.as_str())]);
                Ok(stream)
            }
            Err(err) => {
                self.metrics.increment_tasks_failed();
                let reason = err.to_string();
                log_event_with_fields(
                    Event::TaskFailed,
                    &[
                        ("task", described.as_str()),
                        ("code", err.code()),
                        ("reason", reason.as_str()),
                    ],
                );
                Err(err.into())
            }
        }
    }

    fn routable(patterns: &[String], depth: usize) -> CoordinatorResult<()> {
        if let Some(bad) = patterns
            .iter()
            .find(|p| is_wildcard(&PathRange::key_for(p, depth)))
        {
            return Err(CoordinatorError::InvalidRequest(format!(
                "'{}' has a wildcard in its routing key",
                bad
            )));
        }
        Ok(())
    }

    fn select_paths(paths: &[String], info: &SplitInfo) -> Vec<String> {
        info.path_indexes.iter().map(|&i| paths[i].clone()).collect()
    }

    /// Writes `view` to the primary and the chosen secondaries of every
    /// fragment it touches
    pub fn insert(&self, view: &DataView) -> CoordinatorResult<()> {
        let (Some(min), Some(max)) = (view.min_timestamp(), view.max_timestamp()) else {
            return Ok(());
        };
        if view.paths().iter().any(|p| is_wildcard(p)) {
            return Err(CoordinatorError::InvalidRequest(
                "insert paths must not contain wildcards".into(),
            ));
        }

        let interval = TimeInterval::new(min, max.saturating_add(1))?;
        let plan = DataPlan::new(PlanKind::InsertRecords, view.paths().to_vec(), interval)?;
        let infos = self.splitter.split(&plan)?;

        let mut done = 0usize;
        for info in &infos {
            let covered = info.fragment.time_interval();
            let sub_view = view
                .sub_view(&info.path_indexes)?
                .time_slice(covered.start(), covered.end());
            if sub_view.is_empty() {
                continue;
            }
            let points = sub_view.point_count() as u64;
            let insert = Insert::new(sub_view, Source::Fragment(info.fragment.clone()));
            let task = PhysicalTask::new(
                vec![Operator::Insert(insert)],
                info.fragment.clone(),
                &info.replica,
            );

            if let Err(err) = self.execute(&task) {
                if done > 0 {
                    let completed = done.to_string();
                    let total = infos.len().to_string();
                    log_event_with_fields(
                        Event::PartialWrite,
                        &[
                            ("completed_tasks", completed.as_str()),
                            ("total_tasks", total.as_str()),
                        ],
                    );
                }
                return Err(err);
            }
            done += 1;
            self.metrics.add_rows_written(points);
        }
        Ok(())
    }

    /// Reads the series matching `patterns` in `interval`, optionally
    /// filtered, as one time-ordered stream
    pub fn query(
        &self,
        patterns: &[String],
        interval: TimeInterval,
        filter: Option<Filter>,
    ) -> CoordinatorResult<VecRowStream> {
        Self::routable(patterns, self.splitter.routing_key_depth())?;

        let plan = DataPlan::new(PlanKind::QueryData, patterns.to_vec(), interval)?;
        let infos = self.splitter.split(&plan)?;

        let mut streams: Vec<Box<dyn RowStream>> = Vec::new();
        for info in &infos {
            // Each timestamp is read from the one fragment that owns it
            let Some(owned) = interval.intersect(&info.fragment.time_interval()) else {
                continue;
            };
            let bounds = Filter::time_bounds(owned.start(), owned.end());
            let predicate = match &filter {
                Some(filter) => Filter::And(vec![bounds, filter.clone()]),
                None => bounds,
            };

            let project = Project::new(
                Self::select_paths(patterns, info),
                Source::Fragment(info.fragment.clone()),
            );
            let select = Select::new(
                predicate,
                Source::operator(Operator::Project(project.clone())),
            );
            let task = PhysicalTask::new(
                vec![Operator::Project(project), Operator::Select(select)],
                info.fragment.clone(),
                &info.replica,
            );
            if let Some(stream) = self.execute(&task)? {
                streams.push(stream);
            }
        }

        let merged = merge_streams(streams)?;
        self.metrics.add_rows_read(merged.remaining() as u64);
        Ok(merged)
    }

    /// Removes points of the matching series in `range` from every replica
    pub fn delete(&self, patterns: &[String], range: TimeInterval) -> CoordinatorResult<()> {
        Self::routable(patterns, self.splitter.routing_key_depth())?;

        let plan = DataPlan::new(PlanKind::DeleteData, patterns.to_vec(), range)?;
        for info in self.splitter.split(&plan)? {
            let delete = Delete::uniform(
                Self::select_paths(patterns, &info),
                range,
                Source::Fragment(info.fragment.clone()),
            );
            let task = PhysicalTask::new(
                vec![Operator::Delete(delete)],
                info.fragment.clone(),
                &info.replica,
            );
            self.execute(&task)?;
        }
        Ok(())
    }

    /// Every series known to any registered adapter
    pub fn time_series(&self) -> CoordinatorResult<Vec<Timeseries>> {
        let plan = DataPlan::new(PlanKind::ShowTimeSeries, Vec::new(), TimeInterval::all())?;
        // Listing is answered by the adapters directly, not by fragments
        self.splitter.split(&plan)?;

        let adapters: Vec<Arc<dyn StorageAdapter>> = self
            .adapters
            .read()
            .map_err(|_| CoordinatorError::Internal("Lock poisoned".into()))?
            .values()
            .cloned()
            .collect();

        let mut found = Vec::new();
        for adapter in adapters {
            for series in adapter.time_series()? {
                if !found.contains(&series) {
                    found.push(series);
                }
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    /// Releases every adapter's session state
    pub fn release(&self) -> CoordinatorResult<()> {
        let adapters = self
            .adapters
            .read()
            .map_err(|_| CoordinatorError::Internal("Lock poisoned".into()))?;
        for adapter in adapters.values() {
            adapter.release()?;
        }
        Ok(())
    }
}
