//! # Storage Adapter Contract
//!
//! The coordinator hands each adapter a [`PhysicalTask`]: a short operator
//! chain bound to one fragment replica. The adapter answers with a
//! [`TaskExecuteResult`], never with a panic.

use std::fmt;

use crate::data::{RowStream, Timeseries};
use crate::metadata::{FragmentMeta, FragmentReplicaMeta, PathRange, StorageEngineMeta, TimeInterval};
use crate::operator::{Operator, OperatorKind};

use super::errors::{PhysicalError, PhysicalResult};

/// Largest timestamp a backend accepts
pub const MAX_TIMESTAMP: i64 = i64::MAX;

/// One unit of work for one storage unit
#[derive(Debug, Clone)]
pub struct PhysicalTask {
    operators: Vec<Operator>,
    fragment: FragmentMeta,
    storage_unit: String,
    storage_engine_id: u64,
}

impl PhysicalTask {
    /// Targets `replica` of `fragment`
    pub fn new(operators: Vec<Operator>, fragment: FragmentMeta, replica: &FragmentReplicaMeta) -> Self {
        Self {
            operators,
            fragment,
            storage_unit: replica.storage_unit.clone(),
            storage_engine_id: replica.storage_engine_id,
        }
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn fragment(&self) -> &FragmentMeta {
        &self.fragment
    }

    pub fn storage_unit(&self) -> &str {
        &self.storage_unit
    }

    pub fn storage_engine_id(&self) -> u64 {
        self.storage_engine_id
    }

    pub fn kinds(&self) -> Vec<OperatorKind> {
        self.operators.iter().map(Operator::kind).collect()
    }

    /// Operator summaries joined in order
    pub fn describe(&self) -> String {
        let ops: Vec<String> = self.operators.iter().map(Operator::describe).collect();
        format!("[{}] on {}", ops.join(", "), self.storage_unit)
    }
}

impl fmt::Display for PhysicalTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Outcome of a task: a row stream for reads, nothing for writes, or an error
pub struct TaskExecuteResult {
    stream: Option<Box<dyn RowStream>>,
    error: Option<PhysicalError>,
}

impl TaskExecuteResult {
    /// Successful write
    pub fn ok() -> Self {
        Self {
            stream: None,
            error: None,
        }
    }

    /// Successful read
    pub fn with_stream(stream: Box<dyn RowStream>) -> Self {
        Self {
            stream: Some(stream),
            error: None,
        }
    }

    pub fn failed(error: PhysicalError) -> Self {
        Self {
            stream: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&PhysicalError> {
        self.error.as_ref()
    }

    /// The error wins over any stream
    pub fn into_result(self) -> PhysicalResult<Option<Box<dyn RowStream>>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.stream),
        }
    }
}

impl From<PhysicalResult<Option<Box<dyn RowStream>>>> for TaskExecuteResult {
    fn from(result: PhysicalResult<Option<Box<dyn RowStream>>>) -> Self {
        match result {
            Ok(Some(stream)) => TaskExecuteResult::with_stream(stream),
            Ok(None) => TaskExecuteResult::ok(),
            Err(err) => TaskExecuteResult::failed(err),
        }
    }
}

impl fmt::Debug for TaskExecuteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecuteResult")
            .field("has_stream", &self.stream.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// A backend reachable through physical tasks
pub trait StorageAdapter: Send + Sync {
    /// The engine this adapter serves
    fn engine(&self) -> &StorageEngineMeta;

    /// Key and time extent of the data already in the backend
    fn boundary_of_storage(&self) -> PhysicalResult<(PathRange, TimeInterval)>;

    /// Every series the backend holds, across storage units
    fn time_series(&self) -> PhysicalResult<Vec<Timeseries>>;

    fn execute(&self, task: &PhysicalTask) -> TaskExecuteResult;

    fn max_timestamp(&self) -> i64 {
        MAX_TIMESTAMP
    }

    /// Drops any session state
    fn release(&self) -> PhysicalResult<()> {
        Ok(())
    }
}

/// Accepted operator chains: `[Project]`, `[Project, Select]`, `[Insert]`,
/// `[Delete]`
pub fn check_shape(task: &PhysicalTask) -> PhysicalResult<()> {
    match task.kinds().as_slice() {
        [OperatorKind::Project]
        | [OperatorKind::Project, OperatorKind::Select]
        | [OperatorKind::Insert]
        | [OperatorKind::Delete] => Ok(()),
        _ => Err(PhysicalError::NonExecutable(task.describe())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::VecRowStream;
    use crate::filter::Filter;
    use crate::operator::{Limit, Project, Select, Source};

    fn task(operators: Vec<Operator>) -> PhysicalTask {
        let replica = FragmentReplicaMeta::new(0, "unit0000000000", 1);
        let fragment =
            FragmentMeta::new(PathRange::single("room1"), TimeInterval::all(), vec![replica.clone()])
                .unwrap();
        PhysicalTask::new(operators, fragment, &replica)
    }

    fn project() -> Operator {
        Operator::Project(Project::new(
            vec!["room1.temp".into()],
            Source::Fragment(task(vec![]).fragment().clone()),
        ))
    }

    #[test]
    fn test_accepted_shapes() {
        assert!(check_shape(&task(vec![project()])).is_ok());

        let select = Operator::Select(Select::new(
            Filter::time_bounds(0, 10),
            Source::operator(project()),
        ));
        assert!(check_shape(&task(vec![project(), select])).is_ok());
    }

    #[test]
    fn test_rejected_shapes() {
        let err = check_shape(&task(vec![])).unwrap_err();
        assert_eq!(err.code(), "POLY_PHYSICAL_NON_EXECUTABLE");

        let limit = Operator::Limit(Limit::new(1, 0, Source::operator(project())));
        assert!(check_shape(&task(vec![project(), limit])).is_err());
        assert!(check_shape(&task(vec![project(), project()])).is_err());
    }

    #[test]
    fn test_task_result_conversion() {
        assert!(TaskExecuteResult::ok().into_result().unwrap().is_none());
        assert!(TaskExecuteResult::with_stream(Box::new(VecRowStream::empty()))
            .into_result()
            .unwrap()
            .is_some());

        let failed = TaskExecuteResult::failed(PhysicalError::ExecuteFailure("boom".into()));
        assert!(!failed.is_ok());
        assert_eq!(failed.error().map(|e| e.code()), Some("POLY_PHYSICAL_EXECUTE_FAILURE"));
        assert!(failed.into_result().is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            task(vec![project()]).describe(),
            "[Project(patterns: [room1.temp])] on unit0000000000"
        );
    }
}
