//! Observable events
//!
//! Every log line emitted by the crate names one of these events.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Routing
    /// Plan split begins
    SplitBegin,
    /// Plan split complete
    SplitComplete,
    /// Metadata lookup failed, split aborted
    SplitFailed,
    /// A missing fragment was created on demand
    FragmentCreated,
    /// Insert asked for secondaries but the fragment has only a primary
    ReplicaFallback,
    /// Plan kind has no replica selection rule
    PlanKindUnrouted,

    // Storage adapter
    /// Adapter connected to its backend
    AdapterInitialized,
    /// Adapter switched its current storage unit
    StorageUnitSwitch,
    /// Series created on first write
    SeriesCreated,
    /// A batch of rows was flushed to a series
    InsertFlush,
    /// Physical task executed successfully
    TaskExecuted,
    /// Physical task returned a failure
    TaskFailed,
    /// Physical task shape not supported by the adapter
    TaskNonExecutable,

    // Coordinator
    /// Replica write failed after earlier replicas were written
    PartialWrite,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::SplitBegin => "SPLIT_BEGIN",
            Event::SplitComplete => "SPLIT_COMPLETE",
            Event::SplitFailed => "SPLIT_FAILED",
            Event::FragmentCreated => "FRAGMENT_CREATED",
            Event::ReplicaFallback => "REPLICA_FALLBACK",
            Event::PlanKindUnrouted => "PLAN_KIND_UNROUTED",

            Event::AdapterInitialized => "ADAPTER_INITIALIZED",
            Event::StorageUnitSwitch => "STORAGE_UNIT_SWITCH",
            Event::SeriesCreated => "SERIES_CREATED",
            Event::InsertFlush => "INSERT_FLUSH",
            Event::TaskExecuted => "TASK_EXECUTED",
            Event::TaskFailed => "TASK_FAILED",
            Event::TaskNonExecutable => "TASK_NON_EXECUTABLE",

            Event::PartialWrite => "PARTIAL_WRITE",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::SplitFailed | Event::TaskFailed | Event::PartialWrite
        )
    }

    /// Returns true if this event deserves operator attention without failing
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::ReplicaFallback | Event::PlanKindUnrouted | Event::TaskNonExecutable
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake() {
        for event in [
            Event::SplitBegin,
            Event::FragmentCreated,
            Event::StorageUnitSwitch,
            Event::PartialWrite,
        ] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_classification() {
        assert!(Event::TaskFailed.is_failure());
        assert!(!Event::TaskExecuted.is_failure());
        assert!(Event::PlanKindUnrouted.is_warning());
        assert!(!Event::PlanKindUnrouted.is_failure());
    }
}
