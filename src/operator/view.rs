//! # Write Payloads
//!
//! A [`DataView`] is the decoded payload of an insert: a set of paths with
//! declared types, a timestamp per row and a matrix of optional values laid
//! out either row-major or column-major.

use std::collections::HashSet;
use std::fmt;

use crate::data::{DataType, Record, Value};

use super::errors::{OperatorError, OperatorResult};

/// Orientation of the value matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataLayout {
    /// `values[row][path]`
    Row,
    /// `values[path][row]`
    Column,
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLayout::Row => write!(f, "row"),
            DataLayout::Column => write!(f, "column"),
        }
    }
}

/// Typed, shape-checked insert payload
#[derive(Debug, Clone, PartialEq)]
pub struct DataView {
    paths: Vec<String>,
    data_types: Vec<DataType>,
    timestamps: Vec<i64>,
    layout: DataLayout,
    values: Vec<Vec<Option<Value>>>,
}

impl DataView {
    /// Validates the shape of `values` against `layout` and every present
    /// value against its path's declared type
    pub fn new(
        paths: Vec<String>,
        data_types: Vec<DataType>,
        timestamps: Vec<i64>,
        layout: DataLayout,
        values: Vec<Vec<Option<Value>>>,
    ) -> OperatorResult<Self> {
        if paths.len() != data_types.len() {
            return Err(OperatorError::ShapeMismatch(format!(
                "{} paths but {} data types",
                paths.len(),
                data_types.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = paths.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(OperatorError::ShapeMismatch(format!(
                "path '{}' appears twice",
                dup
            )));
        }

        let (outer, inner) = match layout {
            DataLayout::Row => (timestamps.len(), paths.len()),
            DataLayout::Column => (paths.len(), timestamps.len()),
        };
        if values.len() != outer {
            return Err(OperatorError::ShapeMismatch(format!(
                "{} layout expects {} outer entries, got {}",
                layout,
                outer,
                values.len()
            )));
        }
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| v.len() != inner) {
            return Err(OperatorError::ShapeMismatch(format!(
                "entry {} has {} values, expected {}",
                i,
                v.len(),
                inner
            )));
        }

        let view = Self {
            paths,
            data_types,
            timestamps,
            layout,
            values,
        };
        view.check_types()?;
        Ok(view)
    }

    /// Row-major payload
    pub fn rows(
        paths: Vec<String>,
        data_types: Vec<DataType>,
        timestamps: Vec<i64>,
        rows: Vec<Vec<Option<Value>>>,
    ) -> OperatorResult<Self> {
        Self::new(paths, data_types, timestamps, DataLayout::Row, rows)
    }

    /// Column-major payload
    pub fn columns(
        paths: Vec<String>,
        data_types: Vec<DataType>,
        timestamps: Vec<i64>,
        columns: Vec<Vec<Option<Value>>>,
    ) -> OperatorResult<Self> {
        Self::new(paths, data_types, timestamps, DataLayout::Column, columns)
    }

    fn check_types(&self) -> OperatorResult<()> {
        for row in 0..self.row_count() {
            for path in 0..self.path_count() {
                if let Some(value) = self.value(row, path) {
                    let expected = self.data_types[path];
                    if value.data_type() != expected {
                        return Err(OperatorError::TypeMismatch {
                            path: self.paths[path].clone(),
                            expected,
                            found: value.data_type(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn data_types(&self) -> &[DataType] {
        &self.data_types
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty() || self.paths.is_empty()
    }

    pub fn min_timestamp(&self) -> Option<i64> {
        self.timestamps.iter().copied().min()
    }

    pub fn max_timestamp(&self) -> Option<i64> {
        self.timestamps.iter().copied().max()
    }

    /// Value at (`row`, `path`) regardless of layout
    pub fn value(&self, row: usize, path: usize) -> Option<&Value> {
        let cell = match self.layout {
            DataLayout::Row => self.values.get(row).and_then(|r| r.get(path)),
            DataLayout::Column => self.values.get(path).and_then(|c| c.get(row)),
        };
        cell.and_then(|v| v.as_ref())
    }

    /// Present values of one path as records ordered by timestamp
    pub fn records(&self, path: usize) -> Vec<Record> {
        let mut records: Vec<Record> = (0..self.row_count())
            .filter_map(|row| {
                self.value(row, path)
                    .map(|v| Record::new(self.timestamps[row], v.clone()))
            })
            .collect();
        records.sort_by_key(|r| r.key);
        records
    }

    /// Number of present values across all paths
    pub fn point_count(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_some()).count()
    }

    /// Projection onto a subset of paths, keeping layout and timestamps
    pub fn sub_view(&self, path_indices: &[usize]) -> OperatorResult<DataView> {
        if let Some(bad) = path_indices.iter().find(|&&i| i >= self.path_count()) {
            return Err(OperatorError::ShapeMismatch(format!(
                "path index {} out of range for {} paths",
                bad,
                self.path_count()
            )));
        }

        let paths = path_indices.iter().map(|&i| self.paths[i].clone()).collect();
        let data_types = path_indices.iter().map(|&i| self.data_types[i]).collect();
        let values = match self.layout {
            DataLayout::Row => self
                .values
                .iter()
                .map(|row| path_indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
            DataLayout::Column => path_indices
                .iter()
                .map(|&i| self.values[i].clone())
                .collect(),
        };

        DataView::new(
            paths,
            data_types,
            self.timestamps.clone(),
            self.layout,
            values,
        )
    }

    /// Rows whose timestamp falls in `[start, end)`, keeping paths and layout
    pub fn time_slice(&self, start: i64, end: i64) -> DataView {
        let kept: Vec<usize> = (0..self.row_count())
            .filter(|&row| start <= self.timestamps[row] && self.timestamps[row] < end)
            .collect();

        let timestamps = kept.iter().map(|&row| self.timestamps[row]).collect();
        let values = match self.layout {
            DataLayout::Row => kept.iter().map(|&row| self.values[row].clone()).collect(),
            DataLayout::Column => self
                .values
                .iter()
                .map(|column| kept.iter().map(|&row| column[row].clone()).collect())
                .collect(),
        };

        // Shape and types were checked at construction and survive row removal
        Self {
            paths: self.paths.clone(),
            data_types: self.data_types.clone(),
            timestamps,
            layout: self.layout,
            values,
        }
    }
}
