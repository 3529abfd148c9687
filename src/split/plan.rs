//! Data plans
//!
//! A plan is the routing view of a request: what kind of access, which
//! paths, which time range. It carries no values.

use std::collections::BTreeMap;
use std::fmt;

use crate::metadata::{PathRange, TimeInterval};

use super::errors::{SplitError, SplitResult};

/// Access kind of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanKind {
    InsertRecords,
    QueryData,
    DeleteData,
    /// Catalog listing; never routed to fragments
    ShowTimeSeries,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::InsertRecords => "insert_records",
            PlanKind::QueryData => "query_data",
            PlanKind::DeleteData => "delete_data",
            PlanKind::ShowTimeSeries => "show_time_series",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable routing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPlan {
    kind: PlanKind,
    paths: Vec<String>,
    interval: TimeInterval,
}

impl DataPlan {
    /// Fails on a routed plan with no paths
    pub fn new(kind: PlanKind, paths: Vec<String>, interval: TimeInterval) -> SplitResult<Self> {
        if paths.is_empty() && kind != PlanKind::ShowTimeSeries {
            return Err(SplitError::InvalidPlan(format!("{} plan without paths", kind)));
        }
        Ok(Self {
            kind,
            paths,
            interval,
        })
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn interval(&self) -> TimeInterval {
        self.interval
    }

    pub fn start_time(&self) -> i64 {
        self.interval.start()
    }

    pub fn end_time(&self) -> i64 {
        self.interval.end()
    }

    /// Routing key → indices of the paths sharing it, in path order
    pub fn indexes_of_paths(&self, depth: usize) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, path) in self.paths.iter().enumerate() {
            groups.entry(PathRange::key_for(path, depth)).or_default().push(i);
        }
        groups
    }
}
