//! Series file record format
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, includes itself and the checksum)
//! +------------------+
//! | Kind             | (u8: 1 = header, 2 = point, 3 = delete range)
//! +------------------+
//! | Body             | (kind specific)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Header body: data type tag (u8).
//! Point body: timestamp (i64 LE), value tag (u8), value bytes.
//! Delete range body: start (i64 LE), end (i64 LE).
//!
//! Checksum covers all bytes except the checksum itself.

use crate::data::{DataType, Record, Value};

use super::checksum::{compute_checksum, verify_checksum};

const KIND_HEADER: u8 = 1;
const KIND_POINT: u8 = 2;
const KIND_DELETE_RANGE: u8 = 3;

/// length + kind + checksum
const MIN_RECORD_SIZE: usize = 4 + 1 + 4;

/// One entry of a series file
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesRecord {
    /// First record of every file
    Header(DataType),
    Point(Record),
    /// Tombstone for points in `[start, end)`
    DeleteRange { start: i64, end: i64 },
}

/// Framing or checksum failure at some offset of the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

fn type_tag(data_type: DataType) -> u8 {
    match data_type {
        DataType::Boolean => 0,
        DataType::Integer => 1,
        DataType::Long => 2,
        DataType::Float => 3,
        DataType::Double => 4,
        DataType::Binary => 5,
    }
}

fn type_from_tag(tag: u8) -> Result<DataType, DecodeError> {
    Ok(match tag {
        0 => DataType::Boolean,
        1 => DataType::Integer,
        2 => DataType::Long,
        3 => DataType::Float,
        4 => DataType::Double,
        5 => DataType::Binary,
        other => return Err(DecodeError::new(format!("Unknown data type tag {}", other))),
    })
}

fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    buf.push(type_tag(value.data_type()));
    match value {
        Value::Boolean(v) => buf.push(u8::from(*v)),
        Value::Integer(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Long(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Binary(v) => {
            buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
            buf.extend_from_slice(v);
        }
    }
}

/// Forward-only cursor over a record body
struct BodyReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| DecodeError::new("Record body truncated"))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn take_vec(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let end = self.pos + len;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| DecodeError::new("Record body truncated"))?;
        self.pos = end;
        Ok(slice.to_vec())
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take::<8>()?))
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.pos != self.data.len() {
            return Err(DecodeError::new(format!(
                "{} trailing bytes in record body",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}

fn decode_value(reader: &mut BodyReader<'_>) -> Result<Value, DecodeError> {
    Ok(match type_from_tag(reader.u8()?)? {
        DataType::Boolean => Value::Boolean(reader.u8()? != 0),
        DataType::Integer => Value::Integer(i32::from_le_bytes(reader.take::<4>()?)),
        DataType::Long => Value::Long(reader.i64()?),
        DataType::Float => Value::Float(f32::from_le_bytes(reader.take::<4>()?)),
        DataType::Double => Value::Double(f64::from_le_bytes(reader.take::<8>()?)),
        DataType::Binary => {
            let len = u32::from_le_bytes(reader.take::<4>()?) as usize;
            Value::Binary(reader.take_vec(len)?)
        }
    })
}

impl SeriesRecord {
    fn kind(&self) -> u8 {
        match self {
            SeriesRecord::Header(_) => KIND_HEADER,
            SeriesRecord::Point(_) => KIND_POINT,
            SeriesRecord::DeleteRange { .. } => KIND_DELETE_RANGE,
        }
    }

    fn serialize_body(&self, buf: &mut Vec<u8>) {
        match self {
            SeriesRecord::Header(data_type) => buf.push(type_tag(*data_type)),
            SeriesRecord::Point(record) => {
                buf.extend_from_slice(&record.key.to_le_bytes());
                encode_value(&record.value, buf);
            }
            SeriesRecord::DeleteRange { start, end } => {
                buf.extend_from_slice(&start.to_le_bytes());
                buf.extend_from_slice(&end.to_le_bytes());
            }
        }
    }

    /// Appends the framed record to `out`
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        let mut body = Vec::new();
        self.serialize_body(&mut body);

        let record_length = (MIN_RECORD_SIZE + body.len()) as u32;
        let start = out.len();
        out.extend_from_slice(&record_length.to_le_bytes());
        out.push(self.kind());
        out.extend_from_slice(&body);
        let checksum = compute_checksum(&out[start..]);
        out.extend_from_slice(&checksum.to_le_bytes());
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize_into(&mut out);
        out
    }

    /// Decodes the record at the start of `data`, verifying its checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(DecodeError::new(format!(
                "Truncated record: {} bytes remaining, minimum record size is {}",
                data.len(),
                MIN_RECORD_SIZE
            )));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_length < MIN_RECORD_SIZE {
            return Err(DecodeError::new(format!(
                "Invalid record length: {}",
                record_length
            )));
        }
        if data.len() < record_length {
            return Err(DecodeError::new(format!(
                "Record truncated: expected {} bytes, got {}",
                record_length,
                data.len()
            )));
        }

        let checksum_offset = record_length - 4;
        let stored = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        if !verify_checksum(&data[..checksum_offset], stored) {
            return Err(DecodeError::new(format!(
                "Checksum mismatch: computed {:08x}, stored {:08x}",
                compute_checksum(&data[..checksum_offset]),
                stored
            )));
        }

        let mut reader = BodyReader::new(&data[5..checksum_offset]);
        let record = match data[4] {
            KIND_HEADER => SeriesRecord::Header(type_from_tag(reader.u8()?)?),
            KIND_POINT => {
                let key = reader.i64()?;
                SeriesRecord::Point(Record::new(key, decode_value(&mut reader)?))
            }
            KIND_DELETE_RANGE => SeriesRecord::DeleteRange {
                start: reader.i64()?,
                end: reader.i64()?,
            },
            other => return Err(DecodeError::new(format!("Unknown record kind {}", other))),
        };
        reader.finish()?;

        Ok((record, record_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_value_kind_survives_framing() {
        let values = [
            Value::Boolean(true),
            Value::Integer(-7),
            Value::Long(i64::MIN),
            Value::Float(1.5),
            Value::Double(21.5),
            Value::from("warm"),
        ];
        for value in values {
            let record = SeriesRecord::Point(Record::new(100, value));
            let bytes = record.serialize();
            let (decoded, consumed) = SeriesRecord::deserialize(&bytes).unwrap();
            assert_eq!(decoded, record);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_consecutive_records() {
        let mut buf = Vec::new();
        SeriesRecord::Header(DataType::Double).serialize_into(&mut buf);
        SeriesRecord::DeleteRange { start: 0, end: 10 }.serialize_into(&mut buf);

        let (first, n) = SeriesRecord::deserialize(&buf).unwrap();
        let (second, m) = SeriesRecord::deserialize(&buf[n..]).unwrap();
        assert_eq!(first, SeriesRecord::Header(DataType::Double));
        assert_eq!(second, SeriesRecord::DeleteRange { start: 0, end: 10 });
        assert_eq!(n + m, buf.len());
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut bytes = SeriesRecord::Point(Record::new(5, Value::Long(9))).serialize();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;

        let err = SeriesRecord::deserialize(&bytes).unwrap_err();
        assert!(err.reason.contains("Checksum mismatch"));
    }

    #[test]
    fn test_truncation_detected() {
        let bytes = SeriesRecord::Header(DataType::Long).serialize();
        let err = SeriesRecord::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.reason.contains("truncated") || err.reason.contains("Truncated"));
    }
}
