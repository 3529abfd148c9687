//! Row evaluation of predicate trees
//!
//! Used by adapters that read whole series and filter locally. No type
//! coercion beyond numeric widening; a missing column never matches.

use std::cmp::Ordering;

use crate::data::{Header, Row, Value};

use super::ast::{Filter, Op, ValueFilter};

impl Filter {
    /// Evaluates the filter against one row of a stream with `header`
    pub fn matches(&self, row: &Row, header: &Header) -> bool {
        match self {
            Filter::Time(t) => compare(t.op, Some(row.timestamp.cmp(&t.value))),
            Filter::Value(v) => value_matches(v, row, header),
            Filter::Bool(b) => *b,
            Filter::And(children) => children.iter().all(|c| c.matches(row, header)),
            Filter::Or(children) => children.iter().any(|c| c.matches(row, header)),
            Filter::Not(child) => !child.matches(row, header),
        }
    }
}

fn value_matches(filter: &ValueFilter, row: &Row, header: &Header) -> bool {
    let actual = match header.index_of(&filter.path).and_then(|i| row.get(i)) {
        Some(v) => v,
        None => return false,
    };

    if let (Value::Boolean(_), Value::Boolean(_)) = (actual, &filter.value) {
        return match filter.op {
            Op::Eq => actual == &filter.value,
            Op::Ne => actual != &filter.value,
            _ => false,
        };
    }

    compare(filter.op, actual.compare(&filter.value))
}

/// Applies an operator to the ordering of `actual` relative to the bound.
/// Incomparable values only satisfy `!=`.
fn compare(op: Op, ordering: Option<Ordering>) -> bool {
    match ordering {
        None => op == Op::Ne,
        Some(ord) => match op {
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Ge => ord != Ordering::Less,
            Op::Gt => ord == Ordering::Greater,
        },
    }
}
