//! Operator algebra
//!
//! Logical operators over fragments, user row functions and write payloads.
//! Operators are plain data: built once, validated at construction, cloned
//! when a plan is split.

mod ast;
mod errors;
mod function;
mod pattern;
mod view;

pub use ast::{
    CombineNonQuery, Delete, Insert, Limit, LimitedRowStream, Operator, OperatorKind, Project,
    RowTransform, Select, Source, TransformedRowStream, Union,
};
pub use errors::{OperatorError, OperatorResult};
pub use function::{Function, FunctionCall, FunctionRegistry, MappingType};
pub use pattern::{is_wildcard, PatternSet};
pub use view::{DataLayout, DataView};
