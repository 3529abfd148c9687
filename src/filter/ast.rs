//! Predicate tree
//!
//! Leaves compare the row timestamp (`Time`) or one column (`Value`) against
//! a constant. Compounds combine children. Trees are built once and never
//! mutated; splitting clones them.

use std::fmt;

use crate::data::Value;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>=`
    Ge,
    /// `>`
    Gt,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Ge => ">=",
            Op::Gt => ">",
        }
    }

    /// Returns true if this is an equality or inequality test
    pub fn is_equality(&self) -> bool {
        matches!(self, Op::Eq | Op::Ne)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison of the row timestamp against a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFilter {
    pub op: Op,
    pub value: i64,
}

impl TimeFilter {
    pub fn new(op: Op, value: i64) -> Self {
        Self { op, value }
    }
}

/// Comparison of one column against a constant
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilter {
    /// Logical path of the column
    pub path: String,
    pub op: Op,
    pub value: Value,
}

impl ValueFilter {
    pub fn new(path: impl Into<String>, op: Op, value: Value) -> Self {
        Self {
            path: path.into(),
            op,
            value,
        }
    }
}

/// Discriminant of a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Time,
    Value,
    Bool,
    And,
    Or,
    Not,
}

impl FilterKind {
    /// Leaves are the atomic comparisons
    pub fn is_leaf(&self) -> bool {
        matches!(self, FilterKind::Time | FilterKind::Value)
    }

    /// Everything that is not a leaf, including the `Bool` constant
    pub fn is_compound(&self) -> bool {
        !self.is_leaf()
    }
}

/// Predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Time(TimeFilter),
    Value(ValueFilter),
    /// Constant predicate
    Bool(bool),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// `start <= time < end`
    pub fn time_bounds(start: i64, end: i64) -> Self {
        Filter::And(vec![
            Filter::Time(TimeFilter::new(Op::Ge, start)),
            Filter::Time(TimeFilter::new(Op::Lt, end)),
        ])
    }

    pub fn not(child: Filter) -> Self {
        Filter::Not(Box::new(child))
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Time(_) => FilterKind::Time,
            Filter::Value(_) => FilterKind::Value,
            Filter::Bool(_) => FilterKind::Bool,
            Filter::And(_) => FilterKind::And,
            Filter::Or(_) => FilterKind::Or,
            Filter::Not(_) => FilterKind::Not,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind().is_leaf()
    }

    pub fn is_compound(&self) -> bool {
        self.kind().is_compound()
    }

    /// Returns true if the filter constrains nothing but time.
    ///
    /// A `Value` leaf anywhere in the tree makes the answer false. `And` and
    /// `Or` stop at the first child that is not time-only.
    pub fn is_time_filter(&self) -> bool {
        match self {
            Filter::Value(_) => false,
            Filter::Time(_) => true,
            Filter::Bool(_) => true,
            Filter::Not(child) => child.is_time_filter(),
            Filter::And(children) => children.iter().all(Filter::is_time_filter),
            Filter::Or(children) => children.iter().all(Filter::is_time_filter),
        }
    }

    /// Child filters of a compound node; empty for leaves and `Bool`
    pub fn children(&self) -> Vec<&Filter> {
        match self {
            Filter::And(children) | Filter::Or(children) => children.iter().collect(),
            Filter::Not(child) => vec![child.as_ref()],
            Filter::Time(_) | Filter::Value(_) | Filter::Bool(_) => Vec::new(),
        }
    }
}

/// Nested `And`/`Or` children are parenthesized; the outermost level is not
fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Filter], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        match child {
            Filter::And(_) | Filter::Or(_) => write!(f, "({})", child)?,
            _ => write!(f, "{}", child)?,
        }
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Time(t) => write!(f, "time {} {}", t.op, t.value),
            Filter::Value(v) => write!(f, "{} {} {}", v.path, v.op, v.value),
            Filter::Bool(b) => write!(f, "{}", b),
            Filter::And(children) => write_joined(f, children, "&&"),
            Filter::Or(children) => write_joined(f, children, "||"),
            Filter::Not(child) => write!(f, "!({})", child),
        }
    }
}
