//! Append-only series files
//!
//! One file per series. The first record declares the data type; later
//! records are points and range tombstones. Reading replays the whole file:
//! later points overwrite earlier ones at the same timestamp, a tombstone
//! removes every earlier point in its range.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::data::{DataType, Record, Value};
use crate::storage::errors::{PhysicalError, PhysicalResult};

use super::record::SeriesRecord;

/// Replayed state of one series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesContents {
    pub data_type: DataType,
    pub points: BTreeMap<i64, Value>,
}

impl SeriesContents {
    /// Points as time-ordered records
    pub fn into_records(self) -> Vec<Record> {
        self.points
            .into_iter()
            .map(|(key, value)| Record::new(key, value))
            .collect()
    }
}

fn corruption(path: &Path, offset: u64, reason: impl Into<String>) -> PhysicalError {
    PhysicalError::DataCorruption {
        file: path.display().to_string(),
        offset,
        reason: reason.into(),
    }
}

/// Creates a new series file holding only its header
pub fn create(path: &Path, data_type: DataType) -> PhysicalResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| PhysicalError::io(format!("Failed to create {}", path.display()), e))?;

    file.write_all(&SeriesRecord::Header(data_type).serialize())
        .and_then(|_| file.sync_all())
        .map_err(|e| PhysicalError::io(format!("Failed to write header of {}", path.display()), e))
}

/// Appends records and syncs once
pub fn append(path: &Path, records: &[SeriesRecord]) -> PhysicalResult<()> {
    let mut buf = Vec::new();
    for record in records {
        record.serialize_into(&mut buf);
    }

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| PhysicalError::io(format!("Failed to open {}", path.display()), e))?;

    file.write_all(&buf)
        .and_then(|_| file.sync_data())
        .map_err(|e| PhysicalError::io(format!("Failed to append to {}", path.display()), e))
}

/// Declared type of an existing series, `None` if the file does not exist
pub fn data_type(path: &Path) -> PhysicalResult<Option<DataType>> {
    let mut file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PhysicalError::io(format!("Failed to open {}", path.display()), e)),
    };

    // Header record is exactly 10 bytes: length, kind, tag, checksum
    let mut buf = [0u8; 10];
    file.read_exact(&mut buf)
        .map_err(|e| corruption(path, 0, format!("Failed to read header: {}", e)))?;

    match SeriesRecord::deserialize(&buf) {
        Ok((SeriesRecord::Header(data_type), _)) => Ok(Some(data_type)),
        Ok(_) => Err(corruption(path, 0, "First record is not a header")),
        Err(e) => Err(corruption(path, 0, e.reason)),
    }
}

/// Replays the full file
pub fn read(path: &Path) -> PhysicalResult<SeriesContents> {
    let data = fs::read(path)
        .map_err(|e| PhysicalError::io(format!("Failed to read {}", path.display()), e))?;

    let mut offset = 0usize;
    let mut data_type = None;
    let mut points = BTreeMap::new();

    while offset < data.len() {
        let (record, consumed) = SeriesRecord::deserialize(&data[offset..])
            .map_err(|e| corruption(path, offset as u64, e.reason))?;

        match (record, data_type) {
            (SeriesRecord::Header(t), None) => data_type = Some(t),
            (SeriesRecord::Header(_), Some(_)) => {
                return Err(corruption(path, offset as u64, "Duplicate header record"))
            }
            (_, None) => {
                return Err(corruption(path, offset as u64, "First record is not a header"))
            }
            (SeriesRecord::Point(point), Some(t)) => {
                if point.value.data_type() != t {
                    return Err(corruption(
                        path,
                        offset as u64,
                        format!(
                            "Point of type {} in series of type {}",
                            point.value.data_type(),
                            t
                        ),
                    ));
                }
                points.insert(point.key, point.value);
            }
            (SeriesRecord::DeleteRange { start, end }, Some(_)) => {
                let doomed: Vec<i64> = points.range(start..end.max(start)).map(|(k, _)| *k).collect();
                for key in doomed {
                    points.remove(&key);
                }
            }
        }
        offset += consumed;
    }

    let data_type = data_type.ok_or_else(|| corruption(path, 0, "Empty series file"))?;
    Ok(SeriesContents { data_type, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn point(ts: i64, v: f64) -> SeriesRecord {
        SeriesRecord::Point(Record::new(ts, Value::Double(v)))
    }

    #[test]
    fn test_create_append_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("room1$temp.series");

        create(&path, DataType::Double).unwrap();
        assert_eq!(data_type(&path).unwrap(), Some(DataType::Double));

        append(&path, &[point(200, 22.0), point(100, 21.5)]).unwrap();
        append(&path, &[point(100, 21.7)]).unwrap();

        let contents = read(&path).unwrap();
        assert_eq!(contents.data_type, DataType::Double);
        let records = contents.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], Record::new(100, Value::Double(21.7)));
        assert_eq!(records[1], Record::new(200, Value::Double(22.0)));
    }

    #[test]
    fn test_tombstone_removes_earlier_points_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.series");

        create(&path, DataType::Double).unwrap();
        append(
            &path,
            &[
                point(100, 1.0),
                point(150, 1.5),
                point(200, 2.0),
                SeriesRecord::DeleteRange { start: 100, end: 200 },
                point(120, 1.2),
            ],
        )
        .unwrap();

        let keys: Vec<i64> = read(&path).unwrap().points.keys().copied().collect();
        assert_eq!(keys, vec![120, 200]);
    }

    #[test]
    fn test_missing_file_has_no_type() {
        let dir = TempDir::new().unwrap();
        assert_eq!(data_type(&dir.path().join("absent.series")).unwrap(), None);
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.series");
        create(&path, DataType::Long).unwrap();
        assert!(create(&path, DataType::Long).is_err());
    }

    #[test]
    fn test_corruption_reports_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.series");
        create(&path, DataType::Double).unwrap();
        append(&path, &[point(1, 1.0)]).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 6;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        match read(&path) {
            Err(PhysicalError::DataCorruption { offset, reason, .. }) => {
                assert_eq!(offset, 10);
                assert!(reason.contains("Checksum mismatch"));
            }
            other => panic!("expected corruption, got {:?}", other),
        }
    }
}
