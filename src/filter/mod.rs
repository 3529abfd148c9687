//! Filter algebra
//!
//! Predicate tree with leaf (`Time`, `Value`) and compound (`And`, `Or`,
//! `Not`, `Bool`) kinds, classification helpers and row evaluation.
//!
//! # Classification
//!
//! - `is_leaf` / `is_compound` are exact complements over [`FilterKind`]
//! - `is_time_filter` is true iff every leaf in the tree is a `Time` leaf

mod ast;
mod eval;

pub use ast::{Filter, FilterKind, Op, TimeFilter, ValueFilter};
