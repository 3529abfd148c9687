//! Values, rows and row streams shared by every layer

mod row;
mod stream;
mod value;

pub use row::{Field, Header, Record, Row, Timeseries};
pub use stream::{
    collect_rows, merge_streams, ColumnIter, FilteredRowStream, MergedRowStream, RowStream,
    VecRowStream,
};
pub use value::{DataType, Value};
