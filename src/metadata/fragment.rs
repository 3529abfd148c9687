//! Fragment and replica descriptors
//!
//! The global (routing key × time) space is cut into fragments. Each fragment
//! is placed on one or more storage units; replica 0 is the primary.
//! Descriptors are immutable: a changed placement is a new fragment.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{MetadataError, MetadataResult};

/// Half-open time range `[start, end)`; `end == i64::MAX` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeInterval")]
pub struct TimeInterval {
    start: i64,
    end: i64,
}

/// Unchecked wire form; only reachable through `TryFrom`
#[derive(Deserialize)]
struct RawTimeInterval {
    start: i64,
    end: i64,
}

impl TryFrom<RawTimeInterval> for TimeInterval {
    type Error = MetadataError;

    fn try_from(raw: RawTimeInterval) -> MetadataResult<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeInterval {
    /// Fails if `start > end`
    pub fn new(start: i64, end: i64) -> MetadataResult<Self> {
        if start > end {
            return Err(MetadataError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// `[start, MAX)`
    pub fn from_start(start: i64) -> Self {
        Self {
            start,
            end: i64::MAX,
        }
    }

    /// `[0, MAX)`
    pub fn all() -> Self {
        Self::from_start(0)
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.end == i64::MAX
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Common part of both ranges, `None` if they do not overlap
    pub fn intersect(&self, other: &TimeInterval) -> Option<TimeInterval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Self { start, end })
    }

    /// Same start, end clamped to `max`
    pub fn clamp_end(&self, max: i64) -> Self {
        Self {
            start: self.start.min(max),
            end: self.end.min(max),
        }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "[{}, +inf)", self.start)
        } else {
            write!(f, "[{}, {})", self.start, self.end)
        }
    }
}

/// Closed lexical range of routing keys; `None` bounds are open-ended
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PathRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl PathRange {
    pub fn new(start: Option<String>, end: Option<String>) -> Self {
        Self { start, end }
    }

    /// Range covering every key
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Range covering exactly one key
    pub fn single(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            start: Some(key.clone()),
            end: Some(key),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let after_start = self.start.as_deref().map_or(true, |s| s <= key);
        let before_end = self.end.as_deref().map_or(true, |e| key <= e);
        after_start && before_end
    }

    /// Routing key of `path`: its first `depth` dot-separated components
    pub fn key_for(path: &str, depth: usize) -> String {
        path.split('.')
            .take(depth.max(1))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for PathRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            self.start.as_deref().unwrap_or("-inf"),
            self.end.as_deref().unwrap_or("+inf")
        )
    }
}

/// One placement of a fragment on a storage unit.
///
/// Names the unit and its engine; does not own a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentReplicaMeta {
    /// Position in the fragment's replica list, 0 is the primary
    pub replica_index: usize,
    pub storage_unit: String,
    pub storage_engine_id: u64,
}

impl FragmentReplicaMeta {
    pub fn new(replica_index: usize, storage_unit: impl Into<String>, storage_engine_id: u64) -> Self {
        Self {
            replica_index,
            storage_unit: storage_unit.into(),
            storage_engine_id,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.replica_index == 0
    }
}

/// A contiguous sub-range of the key × time space and its placements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    id: Uuid,
    path_range: PathRange,
    time_interval: TimeInterval,
    replicas: Vec<FragmentReplicaMeta>,
}

impl FragmentMeta {
    /// Fails on an empty replica list or replicas whose indices are not
    /// `0..n` in order
    pub fn new(
        path_range: PathRange,
        time_interval: TimeInterval,
        replicas: Vec<FragmentReplicaMeta>,
    ) -> MetadataResult<Self> {
        if replicas.is_empty() {
            return Err(MetadataError::InvalidFragment(format!(
                "fragment {} {} has no replicas",
                path_range, time_interval
            )));
        }
        if let Some(r) = replicas
            .iter()
            .enumerate()
            .find(|(i, r)| r.replica_index != *i)
        {
            return Err(MetadataError::InvalidFragment(format!(
                "replica at position {} declares index {}",
                r.0, r.1.replica_index
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            path_range,
            time_interval,
            replicas,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path_range(&self) -> &PathRange {
        &self.path_range
    }

    pub fn time_interval(&self) -> TimeInterval {
        self.time_interval
    }

    pub fn replicas(&self) -> &[FragmentReplicaMeta] {
        &self.replicas
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn primary(&self) -> &FragmentReplicaMeta {
        &self.replicas[0]
    }

    /// True if the fragment covers `key` during some part of `interval`
    pub fn overlaps(&self, key: &str, interval: &TimeInterval) -> bool {
        self.path_range.contains(key) && self.time_interval.overlaps(interval)
    }
}

/// Identity and connection parameters of one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEngineMeta {
    pub id: u64,
    /// Adapter kind, e.g. `filesystem`
    pub kind: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl StorageEngineMeta {
    pub fn new(id: u64, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

impl fmt::Display for StorageEngineMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_interval_rejects_inverted() {
        assert!(TimeInterval::new(10, 5).is_err());
        assert!(TimeInterval::new(5, 5).unwrap().is_empty());
    }

    #[test]
    fn test_time_interval_deserialize_is_checked() {
        let parsed: TimeInterval = serde_json::from_str(r#"{"start": 1, "end": 9}"#).unwrap();
        assert_eq!(parsed, TimeInterval::new(1, 9).unwrap());

        let err = serde_json::from_str::<TimeInterval>(r#"{"start": 9, "end": 1}"#).unwrap_err();
        assert!(err.to_string().contains("start 9 is after end 1"));

        let round = serde_json::to_string(&parsed).unwrap();
        assert_eq!(serde_json::from_str::<TimeInterval>(&round).unwrap(), parsed);
    }

    #[test]
    fn test_time_interval_intersect() {
        let a = TimeInterval::new(100, 200).unwrap();
        assert_eq!(
            a.intersect(&TimeInterval::new(150, 300).unwrap()),
            Some(TimeInterval::new(150, 200).unwrap())
        );
        assert_eq!(a.intersect(&TimeInterval::new(200, 300).unwrap()), None);
        assert_eq!(a.intersect(&TimeInterval::all()), Some(a));
    }

    #[test]
    fn test_time_interval_half_open() {
        let interval = TimeInterval::new(100, 200).unwrap();
        assert!(interval.contains(100));
        assert!(!interval.contains(200));
        assert!(interval.overlaps(&TimeInterval::new(199, 300).unwrap()));
        assert!(!interval.overlaps(&TimeInterval::new(200, 300).unwrap()));
        assert!(TimeInterval::all().is_unbounded());
    }

    #[test]
    fn test_path_range_contains() {
        assert!(PathRange::single("room1").contains("room1"));
        assert!(!PathRange::single("room1").contains("room2"));
        assert!(PathRange::unbounded().contains("anything"));

        let range = PathRange::new(Some("b".into()), None);
        assert!(!range.contains("a"));
        assert!(range.contains("zzz"));
    }

    #[test]
    fn test_routing_key() {
        assert_eq!(PathRange::key_for("room1.temp", 1), "room1");
        assert_eq!(PathRange::key_for("a.b.c", 2), "a.b");
        assert_eq!(PathRange::key_for("a", 3), "a");
        assert_eq!(PathRange::key_for("a.b", 0), "a");
    }

    #[test]
    fn test_fragment_requires_replicas() {
        let err = FragmentMeta::new(PathRange::single("k"), TimeInterval::all(), vec![]);
        assert!(matches!(err, Err(MetadataError::InvalidFragment(_))));
    }

    #[test]
    fn test_fragment_replica_indices_in_order() {
        let bad = FragmentMeta::new(
            PathRange::single("k"),
            TimeInterval::all(),
            vec![FragmentReplicaMeta::new(1, "u", 1)],
        );
        assert!(bad.is_err());

        let good = FragmentMeta::new(
            PathRange::single("k"),
            TimeInterval::all(),
            vec![
                FragmentReplicaMeta::new(0, "u", 1),
                FragmentReplicaMeta::new(1, "u", 2),
            ],
        )
        .unwrap();
        assert!(good.primary().is_primary());
        assert_eq!(good.replica_count(), 2);
    }
}
