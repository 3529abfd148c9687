//! polyroute - Fragment routing and storage-adapter core for a polystore
//!
//! Series are partitioned into fragments by routing key and time interval,
//! each fragment is replicated across storage engines, and operator trees
//! are executed against one storage unit at a time by an adapter.

pub mod config;
pub mod coordinator;
pub mod data;
pub mod filter;
pub mod metadata;
pub mod observability;
pub mod operator;
pub mod split;
pub mod storage;

pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorError, CoordinatorResult};
