//! Fragment and replica metadata
//!
//! Fragments partition (routing key × time). Each fragment lists its replicas
//! on storage units; replica 0 is the primary. Descriptors are immutable and
//! shared by value.

mod errors;
mod fragment;
mod service;

pub use errors::{MetadataError, MetadataResult};
pub use fragment::{FragmentMeta, FragmentReplicaMeta, PathRange, StorageEngineMeta, TimeInterval};
pub use service::{MemoryMetadataService, MetadataService};
