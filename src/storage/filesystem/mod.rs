//! Filesystem storage adapter
//!
//! Layout under the engine's `dir` parameter:
//!
//! ```text
//! <dir>/<storage unit>/<native series name>.series
//! ```
//!
//! Native names swap `.` for `$`. Each series file is an append-only log of
//! checksummed records (see [`record`]). Session state (the current storage
//! unit) is held under a mutex for the whole task.

mod checksum;
mod record;
mod series;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::data::{
    ColumnIter, DataType, Field, FilteredRowStream, MergedRowStream, RowStream, Timeseries,
};
use crate::filter::Filter;
use crate::metadata::{FragmentMeta, PathRange, StorageEngineMeta, TimeInterval};
use crate::observability::{log_event_with_fields, Event};
use crate::operator::{Delete, Insert, Operator, PatternSet, Project, Select};

use super::adapter::{check_shape, PhysicalTask, StorageAdapter, TaskExecuteResult};
use super::errors::{PhysicalError, PhysicalResult};
use super::translate::PathTranslator;

pub use record::{DecodeError, SeriesRecord};
pub use series::SeriesContents;

/// Engine kind served by this adapter
pub const KIND: &str = "filesystem";

const SERIES_EXTENSION: &str = "series";

#[derive(Debug, Default)]
struct Session {
    current_unit: Option<String>,
}

/// Reference adapter storing each series in its own file
#[derive(Debug)]
pub struct FileSystemAdapter {
    engine: StorageEngineMeta,
    root: PathBuf,
    translator: PathTranslator,
    insert_batch_size: usize,
    session: Mutex<Session>,
}

impl FileSystemAdapter {
    /// Creates the root directory named by the engine's `dir` parameter
    pub fn new(engine: StorageEngineMeta, insert_batch_size: usize) -> PhysicalResult<Self> {
        if engine.kind != KIND {
            return Err(PhysicalError::Initialization(format!(
                "engine {} has kind '{}', expected '{}'",
                engine.id, engine.kind, KIND
            )));
        }
        if insert_batch_size == 0 {
            return Err(PhysicalError::Initialization(
                "insert batch size must be positive".into(),
            ));
        }

        let root = engine
            .param("dir")
            .map(PathBuf::from)
            .ok_or_else(|| {
                PhysicalError::Initialization(format!("engine {} has no 'dir' parameter", engine.id))
            })?;
        fs::create_dir_all(&root).map_err(|e| {
            PhysicalError::Initialization(format!("cannot create {}: {}", root.display(), e))
        })?;

        let engine_name = engine.to_string();
        let dir = root.display().to_string();
        log_event_with_fields(
            Event::AdapterInitialized,
            &[("engine", engine_name.as_str()), ("dir", dir.as_str())],
        );

        Ok(Self {
            engine,
            root,
            translator: PathTranslator::default(),
            insert_batch_size,
            session: Mutex::new(Session::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage unit selected by the last task, if any
    pub fn current_storage_unit(&self) -> Option<String> {
        self.session
            .lock()
            .ok()
            .and_then(|s| s.current_unit.clone())
    }

    /// Selects `unit` for subsequent operations and returns its directory
    pub fn use_storage_unit(&self, unit: &str) -> PhysicalResult<PathBuf> {
        let mut session = self.lock_session()?;
        self.switch_unit(&mut session, unit)
    }

    fn lock_session(&self) -> PhysicalResult<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| PhysicalError::ExecuteFailure("Session lock poisoned".into()))
    }

    fn switch_unit(&self, session: &mut Session, unit: &str) -> PhysicalResult<PathBuf> {
        if unit.is_empty() || unit == "." || unit == ".." || unit.contains(['/', '\\']) {
            return Err(PhysicalError::invalid_path(unit, "not a valid storage unit name"));
        }

        let dir = self.root.join(unit);
        fs::create_dir_all(&dir)
            .map_err(|e| PhysicalError::io(format!("Failed to create unit {}", dir.display()), e))?;

        if session.current_unit.as_deref() != Some(unit) {
            let engine_name = self.engine.to_string();
            log_event_with_fields(
                Event::StorageUnitSwitch,
                &[
                    ("engine", engine_name.as_str()),
                    ("from", session.current_unit.as_deref().unwrap_or("-")),
                    ("to", unit),
                ],
            );
            session.current_unit = Some(unit.to_string());
        }
        Ok(dir)
    }

    fn series_file(&self, unit_dir: &Path, path: &str) -> PhysicalResult<PathBuf> {
        let native = self.translator.to_native(path)?;
        if native.contains(['/', '\\']) {
            return Err(PhysicalError::invalid_path(path, "contains a directory separator"));
        }
        Ok(unit_dir.join(format!("{}.{}", native, SERIES_EXTENSION)))
    }

    /// Logical path → file of every series in a unit
    fn list_series(&self, unit_dir: &Path) -> PhysicalResult<BTreeMap<String, PathBuf>> {
        let mut found = BTreeMap::new();
        let entries = match fs::read_dir(unit_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => {
                return Err(PhysicalError::io(
                    format!("Failed to list {}", unit_dir.display()),
                    e,
                ))
            }
        };

        for entry in entries {
            let file = entry
                .map_err(|e| PhysicalError::io(format!("Failed to list {}", unit_dir.display()), e))?
                .path();
            if file.extension().and_then(|e| e.to_str()) != Some(SERIES_EXTENSION) {
                continue;
            }
            if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                found.insert(self.translator.from_native(stem)?, file.clone());
            }
        }
        Ok(found)
    }

    fn list_units(&self) -> PhysicalResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| PhysicalError::io(format!("Failed to list {}", self.root.display()), e))?;

        let mut units = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| PhysicalError::io(format!("Failed to list {}", self.root.display()), e))?
                .path();
            if path.is_dir() {
                units.push(path);
            }
        }
        units.sort();
        Ok(units)
    }

    fn execute_project(
        &self,
        unit_dir: &Path,
        project: &Project,
        select: Option<&Select>,
        fragment: &FragmentMeta,
    ) -> PhysicalResult<Box<dyn RowStream>> {
        let patterns = project.pattern_set()?;

        let mut fields = Vec::new();
        let mut columns: Vec<ColumnIter> = Vec::new();
        for (path, file) in self.list_series(unit_dir)? {
            if !patterns.is_match(&path) {
                continue;
            }
            let contents = series::read(&file)?;
            fields.push(Field::new(path, contents.data_type));
            columns.push(Box::new(contents.into_records().into_iter()));
        }

        let filter = match select {
            Some(select) => select.filter.clone(),
            None => {
                let interval = fragment.time_interval();
                Filter::time_bounds(interval.start(), interval.end())
            }
        };

        let merged = MergedRowStream::new(fields, columns);
        Ok(Box::new(FilteredRowStream::new(Box::new(merged), filter)))
    }

    fn execute_insert(&self, unit_dir: &Path, insert: &Insert) -> PhysicalResult<()> {
        let view = &insert.data;
        for (i, path) in view.paths().iter().enumerate() {
            let file = self.series_file(unit_dir, path)?;
            let declared = view.data_types()[i];

            match series::data_type(&file)? {
                Some(existing) if existing != declared => {
                    return Err(PhysicalError::ExecuteFailure(format!(
                        "series '{}' has type {}, insert declares {}",
                        path, existing, declared
                    )));
                }
                Some(_) => {}
                None => {
                    series::create(&file, declared)?;
                    log_event_with_fields(
                        Event::SeriesCreated,
                        &[("path", path.as_str()), ("data_type", declared.as_str())],
                    );
                }
            }

            let records = view.records(i);
            for batch in records.chunks(self.insert_batch_size) {
                let points: Vec<SeriesRecord> =
                    batch.iter().cloned().map(SeriesRecord::Point).collect();
                series::append(&file, &points)?;
                let count = points.len().to_string();
                log_event_with_fields(
                    Event::InsertFlush,
                    &[("path", path.as_str()), ("points", count.as_str())],
                );
            }
        }
        Ok(())
    }

    fn execute_delete(&self, unit_dir: &Path, delete: &Delete) -> PhysicalResult<()> {
        let known = self.list_series(unit_dir)?;
        for (pattern, range) in delete.targets() {
            let end = range.end().min(self.max_timestamp());
            if range.start() >= end {
                continue;
            }
            let matcher = PatternSet::new(&[pattern])?;
            for (path, file) in &known {
                if matcher.is_match(path) {
                    series::append(
                        file,
                        &[SeriesRecord::DeleteRange {
                            start: range.start(),
                            end,
                        }],
                    )?;
                }
            }
        }
        Ok(())
    }

    fn run(&self, task: &PhysicalTask) -> PhysicalResult<Option<Box<dyn RowStream>>> {
        if let Err(err) = check_shape(task) {
            let described = task.describe();
            log_event_with_fields(Event::TaskNonExecutable, &[("task", described.as_str())]);
            return Err(err);
        }

        let mut session = self.lock_session()?;
        let unit_dir = self.switch_unit(&mut session, task.storage_unit())?;

        match task.operators() {
            [Operator::Project(project)] => self
                .execute_project(&unit_dir, project, None, task.fragment())
                .map(Some),
            [Operator::Project(project), Operator::Select(select)] => self
                .execute_project(&unit_dir, project, Some(select), task.fragment())
                .map(Some),
            [Operator::Insert(insert)] => self.execute_insert(&unit_dir, insert).map(|_| None),
            [Operator::Delete(delete)] => self.execute_delete(&unit_dir, delete).map(|_| None),
            _ => Err(PhysicalError::NonExecutable(task.describe())),
        }
    }
}

impl StorageAdapter for FileSystemAdapter {
    fn engine(&self) -> &StorageEngineMeta {
        &self.engine
    }

    fn boundary_of_storage(&self) -> PhysicalResult<(PathRange, TimeInterval)> {
        let mut paths: Vec<String> = Vec::new();
        let mut min_ts: Option<i64> = None;
        let mut max_ts: Option<i64> = None;

        for unit in self.list_units()? {
            for (path, file) in self.list_series(&unit)? {
                let contents = series::read(&file)?;
                if let Some((&first, _)) = contents.points.first_key_value() {
                    min_ts = Some(min_ts.map_or(first, |m| m.min(first)));
                }
                if let Some((&last, _)) = contents.points.last_key_value() {
                    max_ts = Some(max_ts.map_or(last, |m| m.max(last)));
                }
                paths.push(path);
            }
        }
        paths.sort();

        let range = match (paths.first(), paths.last()) {
            (Some(first), Some(last)) => PathRange::new(Some(first.clone()), Some(last.clone())),
            _ => PathRange::unbounded(),
        };
        let interval = match (min_ts, max_ts) {
            (Some(min), Some(max)) => TimeInterval::new(min, max.saturating_add(1))
                .map_err(|e| PhysicalError::ExecuteFailure(e.to_string()))?,
            _ => TimeInterval::all(),
        };
        Ok((range, interval))
    }

    fn time_series(&self) -> PhysicalResult<Vec<Timeseries>> {
        let mut found: BTreeMap<String, DataType> = BTreeMap::new();
        for unit in self.list_units()? {
            for (path, file) in self.list_series(&unit)? {
                if let Some(data_type) = series::data_type(&file)? {
                    found.entry(path).or_insert(data_type);
                }
            }
        }
        Ok(found
            .into_iter()
            .map(|(path, data_type)| Timeseries::new(path, data_type))
            .collect())
    }

    fn execute(&self, task: &PhysicalTask) -> TaskExecuteResult {
        self.run(task).into()
    }

    fn release(&self) -> PhysicalResult<()> {
        let mut session = self.lock_session()?;
        session.current_unit = None;
        Ok(())
    }
}
