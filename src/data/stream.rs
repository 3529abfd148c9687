//! Row streams
//!
//! A row stream is lazy, forward-only and finite. Adapters build one
//! [`MergedRowStream`] per read from time-ordered column iterators; the
//! coordinator folds the streams of several tasks together with
//! [`merge_streams`].

use std::collections::{BTreeMap, VecDeque};
use std::iter::Peekable;

use crate::filter::Filter;
use crate::storage::PhysicalResult;

use super::row::{Field, Header, Record, Row};
use super::value::Value;

/// Forward-only sequence of rows sharing one header
pub trait RowStream: Send {
    /// Fields every row is aligned with
    fn header(&self) -> &Header;

    /// Next row, `Ok(None)` once exhausted
    fn next_row(&mut self) -> PhysicalResult<Option<Row>>;
}

/// Drains a stream into memory
pub fn collect_rows(stream: &mut dyn RowStream) -> PhysicalResult<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = stream.next_row()? {
        rows.push(row);
    }
    Ok(rows)
}

/// Row stream over rows already in memory
#[derive(Debug, Clone, Default)]
pub struct VecRowStream {
    header: Header,
    rows: VecDeque<Row>,
}

impl VecRowStream {
    pub fn new(header: Header, rows: Vec<Row>) -> Self {
        Self {
            header,
            rows: rows.into(),
        }
    }

    /// Stream with no fields and no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rows not yet consumed
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowStream for VecRowStream {
    fn header(&self) -> &Header {
        &self.header
    }

    fn next_row(&mut self) -> PhysicalResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

/// Time-ordered iterator over the records of one column
pub type ColumnIter = Box<dyn Iterator<Item = Record> + Send>;

/// Merges per-column record iterators into rows keyed by time.
///
/// Every column iterator must yield strictly increasing keys. Each emitted
/// row carries the smallest pending key; columns without a record at that
/// key contribute `None`.
pub struct MergedRowStream {
    header: Header,
    columns: Vec<Peekable<ColumnIter>>,
}

impl MergedRowStream {
    /// `fields` and `columns` must be the same length and in the same order
    pub fn new(fields: Vec<Field>, columns: Vec<ColumnIter>) -> Self {
        debug_assert_eq!(fields.len(), columns.len());
        Self {
            header: Header::new(fields),
            columns: columns.into_iter().map(Iterator::peekable).collect(),
        }
    }
}

impl RowStream for MergedRowStream {
    fn header(&self) -> &Header {
        &self.header
    }

    fn next_row(&mut self) -> PhysicalResult<Option<Row>> {
        let next_key = self
            .columns
            .iter_mut()
            .filter_map(|c| c.peek().map(|r| r.key))
            .min();

        let Some(key) = next_key else {
            return Ok(None);
        };

        let values = self
            .columns
            .iter_mut()
            .map(|c| {
                if c.peek().map(|r| r.key) == Some(key) {
                    c.next().map(|r| r.value)
                } else {
                    None
                }
            })
            .collect();

        Ok(Some(Row::new(key, values)))
    }
}

/// Drops rows that do not satisfy a filter
pub struct FilteredRowStream {
    inner: Box<dyn RowStream>,
    filter: Filter,
}

impl FilteredRowStream {
    pub fn new(inner: Box<dyn RowStream>, filter: Filter) -> Self {
        Self { inner, filter }
    }
}

impl RowStream for FilteredRowStream {
    fn header(&self) -> &Header {
        self.inner.header()
    }

    fn next_row(&mut self) -> PhysicalResult<Option<Row>> {
        while let Some(row) = self.inner.next_row()? {
            if self.filter.matches(&row, self.inner.header()) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}

/// Folds several streams into one time-ordered stream.
///
/// The result header is the union of the input headers by field name, in
/// first-seen order. Rows with the same timestamp are combined; for a column
/// present in several inputs at the same timestamp the later input wins.
pub fn merge_streams(streams: Vec<Box<dyn RowStream>>) -> PhysicalResult<VecRowStream> {
    let mut fields: Vec<Field> = Vec::new();
    let mut merged: BTreeMap<i64, Vec<Option<Value>>> = BTreeMap::new();

    for mut stream in streams {
        let mapping: Vec<usize> = stream
            .header()
            .fields()
            .iter()
            .map(|f| match fields.iter().position(|g| g.name == f.name) {
                Some(i) => i,
                None => {
                    fields.push(f.clone());
                    fields.len() - 1
                }
            })
            .collect();

        while let Some(row) = stream.next_row()? {
            let entry = merged.entry(row.timestamp).or_default();
            for (i, value) in row.values.into_iter().enumerate() {
                let (Some(value), Some(&target)) = (value, mapping.get(i)) else {
                    continue;
                };
                if entry.len() <= target {
                    entry.resize(target + 1, None);
                }
                entry[target] = Some(value);
            }
        }
    }

    let width = fields.len();
    let rows = merged
        .into_iter()
        .map(|(ts, mut values)| {
            values.resize(width, None);
            Row::new(ts, values)
        })
        .collect();

    Ok(VecRowStream::new(Header::new(fields), rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataType;
    use crate::filter::{Op, TimeFilter};

    fn column(records: Vec<(i64, f64)>) -> ColumnIter {
        Box::new(
            records
                .into_iter()
                .map(|(k, v)| Record::new(k, Value::Double(v)))
                .collect::<Vec<_>>()
                .into_iter(),
        )
    }

    #[test]
    fn test_merged_stream_aligns_by_time() {
        let mut stream = MergedRowStream::new(
            vec![
                Field::new("a.x", DataType::Double),
                Field::new("a.y", DataType::Double),
            ],
            vec![
                column(vec![(1, 1.0), (3, 3.0)]),
                column(vec![(2, 20.0), (3, 30.0)]),
            ],
        );

        let rows = collect_rows(&mut stream).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], Row::new(1, vec![Some(Value::Double(1.0)), None]));
        assert_eq!(rows[1], Row::new(2, vec![None, Some(Value::Double(20.0))]));
        assert_eq!(
            rows[2],
            Row::new(3, vec![Some(Value::Double(3.0)), Some(Value::Double(30.0))])
        );
    }

    #[test]
    fn test_filtered_stream() {
        let inner = MergedRowStream::new(
            vec![Field::new("a.x", DataType::Double)],
            vec![column(vec![(1, 1.0), (5, 5.0), (9, 9.0)])],
        );
        let filter = Filter::Time(TimeFilter::new(Op::Ge, 5));
        let mut stream = FilteredRowStream::new(Box::new(inner), filter);

        let keys: Vec<i64> = collect_rows(&mut stream)
            .unwrap()
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(keys, vec![5, 9]);
    }

    #[test]
    fn test_merge_streams_unions_headers() {
        let left = VecRowStream::new(
            Header::new(vec![Field::new("a.x", DataType::Long)]),
            vec![Row::new(10, vec![Some(Value::Long(1))])],
        );
        let right = VecRowStream::new(
            Header::new(vec![
                Field::new("b.y", DataType::Long),
                Field::new("a.x", DataType::Long),
            ]),
            vec![
                Row::new(5, vec![Some(Value::Long(7)), None]),
                Row::new(10, vec![Some(Value::Long(8)), None]),
            ],
        );

        let mut merged = merge_streams(vec![Box::new(left), Box::new(right)]).unwrap();
        let names: Vec<&str> = merged
            .header()
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.x", "b.y"]);

        let rows = collect_rows(&mut merged).unwrap();
        assert_eq!(rows[0], Row::new(5, vec![None, Some(Value::Long(7))]));
        assert_eq!(
            rows[1],
            Row::new(10, vec![Some(Value::Long(1)), Some(Value::Long(8))])
        );
    }
}
