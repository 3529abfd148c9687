//! Plan splitting
//!
//! Turns a [`DataPlan`] into the list of `(paths, fragment, replica)`
//! assignments the coordinator executes.

mod errors;
mod plan;
mod splitter;

pub use errors::{SplitError, SplitResult};
pub use plan::{DataPlan, PlanKind};
pub use splitter::{choose_replicas, uncovered, PlanSplitter, SplitInfo};
