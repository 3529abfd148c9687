//! # Operator Tree
//!
//! Logical operators form a tree whose leaves are fragment sources. A
//! physical task carries a short chain of them (for example
//! `Select -> Project -> Fragment`) to one storage unit.

use std::fmt;

use crate::data::{Header, Row, RowStream};
use crate::filter::Filter;
use crate::metadata::{FragmentMeta, TimeInterval};
use crate::storage::PhysicalResult;

use super::errors::{OperatorError, OperatorResult};
use super::function::{FunctionCall, MappingType};
use super::pattern::PatternSet;
use super::view::DataView;

/// Input of an operator
#[derive(Debug, Clone)]
pub enum Source {
    Operator(Box<Operator>),
    Fragment(FragmentMeta),
}

impl Source {
    pub fn operator(op: Operator) -> Self {
        Source::Operator(Box::new(op))
    }

    /// The fragment at the bottom of this source chain, following the first
    /// input of every operator
    pub fn fragment(&self) -> Option<&FragmentMeta> {
        match self {
            Source::Fragment(f) => Some(f),
            Source::Operator(op) => op.sources().first().and_then(|s| s.fragment()),
        }
    }
}

/// Selects the series whose paths match any pattern
#[derive(Debug, Clone)]
pub struct Project {
    pub patterns: Vec<String>,
    pub source: Source,
}

impl Project {
    pub fn new(patterns: Vec<String>, source: Source) -> Self {
        Self { patterns, source }
    }

    pub fn pattern_set(&self) -> OperatorResult<PatternSet> {
        PatternSet::new(&self.patterns)
    }
}

/// Keeps rows matching a filter
#[derive(Debug, Clone)]
pub struct Select {
    pub filter: Filter,
    pub source: Source,
}

impl Select {
    pub fn new(filter: Filter, source: Source) -> Self {
        Self { filter, source }
    }
}

/// Writes a payload
#[derive(Debug, Clone)]
pub struct Insert {
    pub data: DataView,
    pub source: Source,
}

impl Insert {
    pub fn new(data: DataView, source: Source) -> Self {
        Self { data, source }
    }
}

/// Removes points in one time range per pattern
#[derive(Debug, Clone)]
pub struct Delete {
    patterns: Vec<String>,
    time_ranges: Vec<TimeInterval>,
    source: Source,
}

impl Delete {
    /// `patterns` and `time_ranges` are paired by position
    pub fn new(
        patterns: Vec<String>,
        time_ranges: Vec<TimeInterval>,
        source: Source,
    ) -> OperatorResult<Self> {
        if patterns.len() != time_ranges.len() {
            return Err(OperatorError::ShapeMismatch(format!(
                "{} delete patterns but {} time ranges",
                patterns.len(),
                time_ranges.len()
            )));
        }
        Ok(Self {
            patterns,
            time_ranges,
            source,
        })
    }

    /// Same range for every pattern
    pub fn uniform(patterns: Vec<String>, range: TimeInterval, source: Source) -> Self {
        let time_ranges = vec![range; patterns.len()];
        Self {
            patterns,
            time_ranges,
            source,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn time_ranges(&self) -> &[TimeInterval] {
        &self.time_ranges
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// `(pattern, range)` pairs
    pub fn targets(&self) -> impl Iterator<Item = (&str, &TimeInterval)> {
        self.patterns
            .iter()
            .map(String::as_str)
            .zip(self.time_ranges.iter())
    }
}

/// Applies row-mapping functions in order
#[derive(Debug, Clone)]
pub struct RowTransform {
    calls: Vec<FunctionCall>,
    source: Source,
}

impl RowTransform {
    /// Fails on the first call whose function is not a row mapping
    pub fn new(calls: Vec<FunctionCall>, source: Source) -> OperatorResult<Self> {
        if let Some(call) = calls
            .iter()
            .find(|c| c.function().mapping_type() != MappingType::RowMapping)
        {
            return Err(OperatorError::NotRowMapping {
                name: call.name().to_string(),
                mapping: call.function().mapping_type(),
            });
        }
        Ok(Self { calls, source })
    }

    /// Calls in application order
    pub fn calls(&self) -> &[FunctionCall] {
        &self.calls
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Wraps `input` so every row passes through each call in order
    pub fn apply(&self, input: Box<dyn RowStream>) -> TransformedRowStream {
        TransformedRowStream {
            inner: input,
            calls: self.calls.clone(),
        }
    }
}

/// Row stream produced by [`RowTransform::apply`]
pub struct TransformedRowStream {
    inner: Box<dyn RowStream>,
    calls: Vec<FunctionCall>,
}

impl TransformedRowStream {
    fn transform(&self, row: Row) -> OperatorResult<Option<Row>> {
        let header = self.inner.header();
        let mut current = row;
        for call in &self.calls {
            match call.apply(current, header)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

impl RowStream for TransformedRowStream {
    fn header(&self) -> &Header {
        self.inner.header()
    }

    fn next_row(&mut self) -> PhysicalResult<Option<Row>> {
        while let Some(row) = self.inner.next_row()? {
            if let Some(out) = self.transform(row)? {
                return Ok(Some(out));
            }
        }
        Ok(None)
    }
}

/// Skips `offset` rows then passes at most `limit`
#[derive(Debug, Clone)]
pub struct Limit {
    pub limit: usize,
    pub offset: usize,
    pub source: Source,
}

impl Limit {
    pub fn new(limit: usize, offset: usize, source: Source) -> Self {
        Self {
            limit,
            offset,
            source,
        }
    }

    pub fn apply(&self, input: Box<dyn RowStream>) -> LimitedRowStream {
        LimitedRowStream {
            inner: input,
            to_skip: self.offset,
            remaining: self.limit,
        }
    }
}

/// Row stream produced by [`Limit::apply`]
pub struct LimitedRowStream {
    inner: Box<dyn RowStream>,
    to_skip: usize,
    remaining: usize,
}

impl RowStream for LimitedRowStream {
    fn header(&self) -> &Header {
        self.inner.header()
    }

    fn next_row(&mut self) -> PhysicalResult<Option<Row>> {
        while self.to_skip > 0 {
            if self.inner.next_row()?.is_none() {
                return Ok(None);
            }
            self.to_skip -= 1;
        }
        if self.remaining == 0 {
            return Ok(None);
        }
        let row = self.inner.next_row()?;
        if row.is_some() {
            self.remaining -= 1;
        }
        Ok(row)
    }
}

/// Concatenation of two inputs
#[derive(Debug, Clone)]
pub struct Union {
    pub left: Source,
    pub right: Source,
}

impl Union {
    pub fn new(left: Source, right: Source) -> Self {
        Self { left, right }
    }
}

/// Groups the write subtasks of one request
#[derive(Debug, Clone)]
pub struct CombineNonQuery {
    pub sources: Vec<Source>,
}

impl CombineNonQuery {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }
}

/// Discriminant of an [`Operator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Project,
    Select,
    Insert,
    Delete,
    RowTransform,
    Limit,
    Union,
    CombineNonQuery,
}

impl OperatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Project => "Project",
            OperatorKind::Select => "Select",
            OperatorKind::Insert => "Insert",
            OperatorKind::Delete => "Delete",
            OperatorKind::RowTransform => "RowTransform",
            OperatorKind::Limit => "Limit",
            OperatorKind::Union => "Union",
            OperatorKind::CombineNonQuery => "CombineNonQuery",
        }
    }

    /// Writes rather than reads
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            OperatorKind::Insert | OperatorKind::Delete | OperatorKind::CombineNonQuery
        )
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logical operator
#[derive(Debug, Clone)]
pub enum Operator {
    Project(Project),
    Select(Select),
    Insert(Insert),
    Delete(Delete),
    RowTransform(RowTransform),
    Limit(Limit),
    Union(Union),
    CombineNonQuery(CombineNonQuery),
}

impl Operator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::Project(_) => OperatorKind::Project,
            Operator::Select(_) => OperatorKind::Select,
            Operator::Insert(_) => OperatorKind::Insert,
            Operator::Delete(_) => OperatorKind::Delete,
            Operator::RowTransform(_) => OperatorKind::RowTransform,
            Operator::Limit(_) => OperatorKind::Limit,
            Operator::Union(_) => OperatorKind::Union,
            Operator::CombineNonQuery(_) => OperatorKind::CombineNonQuery,
        }
    }

    /// Deep copy; the copy shares nothing mutable with `self`
    pub fn copy(&self) -> Operator {
        self.clone()
    }

    /// Inputs in order
    pub fn sources(&self) -> Vec<&Source> {
        match self {
            Operator::Project(op) => vec![&op.source],
            Operator::Select(op) => vec![&op.source],
            Operator::Insert(op) => vec![&op.source],
            Operator::Delete(op) => vec![&op.source],
            Operator::RowTransform(op) => vec![&op.source],
            Operator::Limit(op) => vec![&op.source],
            Operator::Union(op) => vec![&op.left, &op.right],
            Operator::CombineNonQuery(op) => op.sources.iter().collect(),
        }
    }

    /// Stable one-line summary, e.g. `Project(patterns: [room1.temp])`
    pub fn describe(&self) -> String {
        match self {
            Operator::Project(op) => format!("Project(patterns: [{}])", op.patterns.join(", ")),
            Operator::Select(op) => format!("Select(filter: {})", op.filter),
            Operator::Insert(op) => format!(
                "Insert(paths: [{}], rows: {}, layout: {})",
                op.data.paths().join(", "),
                op.data.row_count(),
                op.data.layout()
            ),
            Operator::Delete(op) => {
                let targets: Vec<String> = op
                    .targets()
                    .map(|(pattern, range)| format!("{} {}", pattern, range))
                    .collect();
                format!("Delete(targets: [{}])", targets.join(", "))
            }
            Operator::RowTransform(op) => {
                let names: Vec<&str> = op.calls.iter().map(|c| c.name()).collect();
                format!("RowTransform(functions: [{}])", names.join(", "))
            }
            Operator::Limit(op) => format!("Limit(limit: {}, offset: {})", op.limit, op.offset),
            Operator::Union(_) => "Union".to_string(),
            Operator::CombineNonQuery(op) => {
                format!("CombineNonQuery(sources: {})", op.sources.len())
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
