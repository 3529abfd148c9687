//! # Plan Splitter
//!
//! Routes a [`DataPlan`] onto fragment replicas. Paths are grouped by routing
//! key; each group is resolved against the fragments overlapping the plan's
//! time range. Every part of the range no fragment covers gets a fresh
//! fragment, and the plan is routed to it in the same call. Fragments of one
//! key therefore never overlap, and every timestamp of a routed range belongs
//! to exactly one of them.
//!
//! Replica choice per plan kind:
//!
//! - query: one replica, uniformly at random
//! - insert: the primary plus `replica_num` uniform picks among secondaries
//!   (picks may repeat, the primary never does)
//! - delete: every replica
//! - show time series: nothing

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::metadata::{
    FragmentMeta, FragmentReplicaMeta, MetadataResult, MetadataService, TimeInterval,
};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::errors::{SplitError, SplitResult};
use super::plan::{DataPlan, PlanKind};

/// One routed piece of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitInfo {
    /// Indices into the plan's path list
    pub path_indexes: Vec<usize>,
    pub replica: FragmentReplicaMeta,
    pub fragment: FragmentMeta,
}

impl SplitInfo {
    pub fn new(path_indexes: Vec<usize>, replica: FragmentReplicaMeta, fragment: FragmentMeta) -> Self {
        Self {
            path_indexes,
            replica,
            fragment,
        }
    }
}

/// Picks the replicas of `fragment` a plan of `kind` should reach
pub fn choose_replicas<R: Rng + ?Sized>(
    fragment: &FragmentMeta,
    kind: PlanKind,
    replica_num: usize,
    rng: &mut R,
) -> Vec<FragmentReplicaMeta> {
    let replicas = fragment.replicas();
    let n = replicas.len();

    match kind {
        PlanKind::QueryData => vec![replicas[rng.gen_range(0..n)].clone()],
        PlanKind::InsertRecords => {
            let mut chosen = vec![replicas[0].clone()];
            if n == 1 {
                if replica_num > 0 {
                    let requested = replica_num.to_string();
                    let fragment_id = fragment.id().to_string();
                    log_event_with_fields(
                        Event::ReplicaFallback,
                        &[
                            ("fragment", fragment_id.as_str()),
                            ("requested", requested.as_str()),
                        ],
                    );
                }
                return chosen;
            }
            for _ in 0..replica_num {
                chosen.push(replicas[rng.gen_range(1..n)].clone());
            }
            chosen
        }
        PlanKind::DeleteData => replicas.to_vec(),
        PlanKind::ShowTimeSeries => Vec::new(),
    }
}

/// Parts of `interval` not covered by `fragments`, in time order.
///
/// `fragments` must be sorted by start.
pub fn uncovered(
    interval: &TimeInterval,
    fragments: &[FragmentMeta],
) -> MetadataResult<Vec<TimeInterval>> {
    let mut gaps = Vec::new();
    let mut cursor = interval.start();

    for fragment in fragments {
        let covered = fragment.time_interval();
        if covered.start() > cursor {
            let gap_end = covered.start().min(interval.end());
            if cursor < gap_end {
                gaps.push(TimeInterval::new(cursor, gap_end)?);
            }
        }
        cursor = cursor.max(covered.end());
        if cursor >= interval.end() {
            return Ok(gaps);
        }
    }

    if cursor < interval.end() {
        gaps.push(TimeInterval::new(cursor, interval.end())?);
    }
    Ok(gaps)
}

/// Splits plans against a metadata service
pub struct PlanSplitter {
    metadata: Arc<dyn MetadataService>,
    routing_key_depth: usize,
    metrics: Arc<MetricsRegistry>,
    rng: Mutex<StdRng>,
}

impl PlanSplitter {
    pub fn new(metadata: Arc<dyn MetadataService>, routing_key_depth: usize) -> Self {
        Self::with_rng(metadata, routing_key_depth, StdRng::from_entropy())
    }

    /// Deterministic replica choice
    pub fn with_seed(metadata: Arc<dyn MetadataService>, routing_key_depth: usize, seed: u64) -> Self {
        Self::with_rng(metadata, routing_key_depth, StdRng::seed_from_u64(seed))
    }

    fn with_rng(metadata: Arc<dyn MetadataService>, routing_key_depth: usize, rng: StdRng) -> Self {
        Self {
            metadata,
            routing_key_depth: routing_key_depth.max(1),
            metrics: Arc::new(MetricsRegistry::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Shares a metrics registry with the caller
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn routing_key_depth(&self) -> usize {
        self.routing_key_depth
    }

    /// Routes `plan`. A metadata failure aborts the split; no partial
    /// routing is returned.
    pub fn split(&self, plan: &DataPlan) -> SplitResult<Vec<SplitInfo>> {
        let kind = plan.kind().to_string();
        let path_count = plan.paths().len().to_string();
        log_event_with_fields(
            Event::SplitBegin,
            &[("kind", kind.as_str()), ("paths", path_count.as_str())],
        );
        self.metrics.increment_splits();

        match self.route(plan) {
            Ok(infos) => {
                let count = infos.len().to_string();
                log_event_with_fields(
                    Event::SplitComplete,
                    &[("kind", kind.as_str()), ("split_infos", count.as_str())],
                );
                Ok(infos)
            }
            Err(err) => {
                self.metrics.increment_split_failures();
                let reason = err.to_string();
                log_event_with_fields(
                    Event::SplitFailed,
                    &[
                        ("kind", kind.as_str()),
                        ("code", err.code()),
                        ("reason", reason.as_str()),
                    ],
                );
                Err(err)
            }
        }
    }

    fn route(&self, plan: &DataPlan) -> SplitResult<Vec<SplitInfo>> {
        if plan.kind() == PlanKind::ShowTimeSeries {
            log_event_with_fields(Event::PlanKindUnrouted, &[("kind", plan.kind().as_str())]);
            return Ok(Vec::new());
        }

        let interval = plan.interval();
        if interval.is_empty() {
            return Ok(Vec::new());
        }

        let replica_num = self.metadata.replica_num();
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SplitError::Internal("Rng lock poisoned".into()))?;

        let mut infos = Vec::new();
        for (key, indexes) in plan.indexes_of_paths(self.routing_key_depth) {
            let mut fragments = self.metadata.fragments_overlapping(&key, &interval)?;

            for gap in uncovered(&interval, &fragments)? {
                let fragment = self.metadata.create_fragment(&key, &gap)?;
                let fragment_id = fragment.id().to_string();
                let range = gap.to_string();
                log_event_with_fields(
                    Event::FragmentCreated,
                    &[
                        ("fragment", fragment_id.as_str()),
                        ("key", key.as_str()),
                        ("interval", range.as_str()),
                    ],
                );
                self.metrics.increment_fragments_created();
                fragments.push(fragment);
            }
            fragments.sort_by_key(|f| f.time_interval().start());

            for fragment in fragments {
                for replica in choose_replicas(&fragment, plan.kind(), replica_num, &mut *rng) {
                    infos.push(SplitInfo::new(indexes.clone(), replica, fragment.clone()));
                }
            }
        }
        Ok(infos)
    }
}
