//! Observability subsystem
//!
//! - Structured logging (one JSON object per line)
//! - Typed lifecycle events
//! - Atomic counters for routing and execution
//!
//! Observability is read-only: it never changes routing or execution.

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

fn severity_for(event: Event) -> Severity {
    if event.is_failure() {
        Severity::Error
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_for_event() {
        assert_eq!(severity_for(Event::SplitBegin), Severity::Info);
        assert_eq!(severity_for(Event::ReplicaFallback), Severity::Warn);
        assert_eq!(severity_for(Event::TaskFailed), Severity::Error);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event(Event::SplitBegin);
        log_event_with_fields(Event::FragmentCreated, &[("key", "room1")]);
    }
}
