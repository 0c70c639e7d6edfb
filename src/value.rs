use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};

use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::field::Encoding;
use crate::protocol::column::Column;
use crate::protocol::primitive::*;

/// A decoded field value borrowing from the current row span.
///
/// This is the reference implementation of the codec dispatch contract; the
/// cursor only locates value bytes and a was-null flag, everything below is
/// replaceable by a caller's own [`Decode`] impls.
#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    Null,
    /// TINYINT, SMALLINT, INT, BIGINT, YEAR
    Int(i64),
    /// The unsigned variants
    UInt(u64),
    Float(f32),
    Double(f64),
    /// DATE/DATETIME/TIMESTAMP - 0 bytes (0000-00-00 00:00:00)
    Datetime0,
    /// DATE/DATETIME/TIMESTAMP - date only
    Datetime4(&'a Datetime4),
    /// DATE/DATETIME/TIMESTAMP - without microseconds
    Datetime7(&'a Datetime7),
    /// DATE/DATETIME/TIMESTAMP - with microseconds
    Datetime11(&'a Datetime11),
    /// TIME - 0 bytes (00:00:00)
    Time0,
    /// TIME - without microseconds
    Time8(&'a Time8),
    /// TIME - with microseconds
    Time12(&'a Time12),
    /// BLOB, GEOMETRY, STRING, VARCHAR, DECIMAL, JSON, ..
    Bytes(&'a [u8]),
}

impl<'a> Value<'a> {
    /// Decode one located field. `None` is the engine's was-null signal.
    pub fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        match field {
            None => Ok(Value::Null),
            Some(bytes) => match encoding {
                Encoding::Binary => Self::decode_binary(col, bytes),
                Encoding::Text => Self::decode_text(col, bytes),
            },
        }
    }

    /// Binary-protocol value bytes, already stripped of length prefixes.
    fn decode_binary(col: &Column, bytes: &'a [u8]) -> Result<Self> {
        use ColumnType::*;

        let unsigned = col.is_unsigned();
        match col.column_type {
            MYSQL_TYPE_NULL => Ok(Value::Null),

            MYSQL_TYPE_TINY => {
                let (val, _) = read_int_1(bytes)?;
                Ok(if unsigned {
                    Value::UInt(val as u64)
                } else {
                    Value::Int(val as i8 as i64)
                })
            }
            MYSQL_TYPE_SHORT | MYSQL_TYPE_YEAR => {
                let (val, _) = read_int_2(bytes)?;
                Ok(if unsigned {
                    Value::UInt(val as u64)
                } else {
                    Value::Int(val as i16 as i64)
                })
            }
            MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG => {
                let (val, _) = read_int_4(bytes)?;
                Ok(if unsigned {
                    Value::UInt(val as u64)
                } else {
                    Value::Int(val as i32 as i64)
                })
            }
            MYSQL_TYPE_LONGLONG => {
                let (val, _) = read_int_8(bytes)?;
                Ok(if unsigned {
                    Value::UInt(val)
                } else {
                    Value::Int(val as i64)
                })
            }

            MYSQL_TYPE_FLOAT => {
                let (val, _) = read_int_4(bytes)?;
                Ok(Value::Float(f32::from_bits(val)))
            }
            MYSQL_TYPE_DOUBLE => {
                let (val, _) = read_int_8(bytes)?;
                Ok(Value::Double(f64::from_bits(val)))
            }

            MYSQL_TYPE_DATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_NEWDATE
            | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP2 => match bytes.len() {
                0 => Ok(Value::Datetime0),
                4 => Ok(Value::Datetime4(
                    Datetime4::ref_from_bytes(bytes).map_err(|_| Error::InvalidPacket)?,
                )),
                7 => Ok(Value::Datetime7(
                    Datetime7::ref_from_bytes(bytes).map_err(|_| Error::InvalidPacket)?,
                )),
                11 => Ok(Value::Datetime11(
                    Datetime11::ref_from_bytes(bytes).map_err(|_| Error::InvalidPacket)?,
                )),
                n => Err(decode_err(col, format!("invalid datetime length: {n}"))),
            },

            MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => match bytes.len() {
                0 => Ok(Value::Time0),
                8 => Ok(Value::Time8(
                    Time8::ref_from_bytes(bytes).map_err(|_| Error::InvalidPacket)?,
                )),
                12 => Ok(Value::Time12(
                    Time12::ref_from_bytes(bytes).map_err(|_| Error::InvalidPacket)?,
                )),
                n => Err(decode_err(col, format!("invalid time length: {n}"))),
            },

            _ => Ok(Value::Bytes(bytes)),
        }
    }

    /// Text-protocol value bytes; numeric columns arrive as ASCII literals.
    fn decode_text(col: &Column, bytes: &'a [u8]) -> Result<Self> {
        use ColumnType::*;

        match col.column_type {
            MYSQL_TYPE_NULL => Ok(Value::Null),

            MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG
            | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
                let text = ascii(col, bytes)?;
                if col.is_unsigned() {
                    text.parse::<u64>()
                        .map(Value::UInt)
                        .map_err(|e| decode_err(col, e.to_string()))
                } else {
                    text.parse::<i64>()
                        .map(Value::Int)
                        .map_err(|e| decode_err(col, e.to_string()))
                }
            }

            MYSQL_TYPE_FLOAT => ascii(col, bytes)?
                .parse::<f32>()
                .map(Value::Float)
                .map_err(|e| decode_err(col, e.to_string())),
            MYSQL_TYPE_DOUBLE => ascii(col, bytes)?
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| decode_err(col, e.to_string())),

            // Temporal literals, decimals, strings, blobs: handed through as
            // bytes; richer parsing is the codec collaborator's business.
            _ => Ok(Value::Bytes(bytes)),
        }
    }

    /// Owned parameter form for write-back, e.g. a primary key predicate.
    pub fn to_param(&self) -> Param {
        match *self {
            Value::Null | Value::Datetime0 | Value::Time0 => Param::Null,
            Value::Int(v) => Param::Int(v),
            Value::UInt(v) => Param::UInt(v),
            Value::Float(v) => Param::Double(v as f64),
            Value::Double(v) => Param::Double(v),
            Value::Bytes(v) => Param::Bytes(v.to_vec()),
            Value::Datetime4(d) => Param::Text(format!(
                "{:04}-{:02}-{:02}",
                d.year(),
                d.month,
                d.day
            )),
            Value::Datetime7(d) => Param::Text(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                d.year(),
                d.month,
                d.day,
                d.hour,
                d.minute,
                d.second
            )),
            Value::Datetime11(d) => Param::Text(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
                d.year(),
                d.month,
                d.day,
                d.hour,
                d.minute,
                d.second,
                d.microsecond()
            )),
            Value::Time8(t) => Param::Text(format!(
                "{}{:02}:{:02}:{:02}",
                if t.is_negative() { "-" } else { "" },
                t.days() * 24 + t.hour as u32,
                t.minute,
                t.second
            )),
            Value::Time12(t) => Param::Text(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                if t.is_negative() { "-" } else { "" },
                t.days() * 24 + t.hour as u32,
                t.minute,
                t.second,
                t.microsecond()
            )),
        }
    }
}

fn ascii<'a>(col: &Column, bytes: &'a [u8]) -> Result<&'a str> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| decode_err(col, "invalid utf-8".to_string()))
}

fn decode_err(col: &Column, message: String) -> Error {
    Error::Decode {
        column: col.name.clone(),
        message,
    }
}

// ============================================================================
// Temporal wire layouts (zero-copy)
// ============================================================================

/// DATE/DATETIME/TIMESTAMP - 4 bytes (date only)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
pub struct Datetime4 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
}

impl Datetime4 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// DATE/DATETIME/TIMESTAMP - 7 bytes (without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
pub struct Datetime7 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Datetime7 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// DATE/DATETIME/TIMESTAMP - 11 bytes (with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
pub struct Datetime11 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Datetime11 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

/// TIME - 8 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
pub struct Time8 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Time8 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }
}

/// TIME - 12 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
pub struct Time12 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Time12 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// An owned value staged for write-back or bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Bytes(Vec<u8>),
    Text(String),
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<u64> for Param {
    fn from(v: u64) -> Self {
        Param::UInt(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Double(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<&[u8]> for Param {
    fn from(v: &[u8]) -> Self {
        Param::Bytes(v.to_vec())
    }
}

// ============================================================================
// Decode dispatch
// ============================================================================

/// Per-type decode contract keyed by (wire type, requested representation).
///
/// The cursor hands every impl the column descriptor, the row encoding, and
/// the located value bytes (`None` for NULL). Anything beyond these reference
/// impls belongs to the caller.
pub trait Decode<'a>: Sized {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self>;
}

impl<'a> Decode<'a> for Value<'a> {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        Value::decode(col, encoding, field)
    }
}

impl<'a, T: Decode<'a>> Decode<'a> for Option<T> {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        match field {
            None => Ok(None),
            Some(_) => T::decode(col, encoding, field).map(Some),
        }
    }
}

macro_rules! decode_int {
    ($($ty:ty),*) => {$(
        impl<'a> Decode<'a> for $ty {
            fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
                match Value::decode(col, encoding, field)? {
                    Value::Null => Err(Error::UnexpectedNull),
                    Value::Int(v) => <$ty>::try_from(v)
                        .map_err(|_| decode_err(col, format!("{v} out of range for {}", stringify!($ty)))),
                    Value::UInt(v) => <$ty>::try_from(v)
                        .map_err(|_| decode_err(col, format!("{v} out of range for {}", stringify!($ty)))),
                    other => Err(decode_err(col, format!("cannot convert {other:?} to {}", stringify!($ty)))),
                }
            }
        }
    )*};
}

decode_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl<'a> Decode<'a> for f64 {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        match Value::decode(col, encoding, field)? {
            Value::Null => Err(Error::UnexpectedNull),
            Value::Float(v) => Ok(v as f64),
            Value::Double(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::UInt(v) => Ok(v as f64),
            other => Err(decode_err(col, format!("cannot convert {other:?} to f64"))),
        }
    }
}

impl<'a> Decode<'a> for f32 {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        match Value::decode(col, encoding, field)? {
            Value::Null => Err(Error::UnexpectedNull),
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f32),
            Value::UInt(v) => Ok(v as f32),
            other => Err(decode_err(col, format!("cannot convert {other:?} to f32"))),
        }
    }
}

impl<'a> Decode<'a> for bool {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        match Value::decode(col, encoding, field)? {
            Value::Null => Err(Error::UnexpectedNull),
            Value::Int(v) => Ok(v != 0),
            Value::UInt(v) => Ok(v != 0),
            other => Err(decode_err(col, format!("cannot convert {other:?} to bool"))),
        }
    }
}

impl<'a> Decode<'a> for &'a [u8] {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        match Value::decode(col, encoding, field)? {
            Value::Null => Err(Error::UnexpectedNull),
            Value::Bytes(v) => Ok(v),
            other => Err(decode_err(col, format!("cannot borrow {other:?} as bytes"))),
        }
    }
}

impl<'a> Decode<'a> for &'a str {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        let bytes = <&[u8]>::decode(col, encoding, field)?;
        simdutf8::basic::from_utf8(bytes).map_err(|_| decode_err(col, "invalid utf-8".to_string()))
    }
}

impl<'a> Decode<'a> for String {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        <&str>::decode(col, encoding, field).map(str::to_owned)
    }
}

impl<'a> Decode<'a> for Vec<u8> {
    fn decode(col: &Column, encoding: Encoding, field: Option<&'a [u8]>) -> Result<Self> {
        <&[u8]>::decode(col, encoding, field).map(<[u8]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ColumnFlags;
    use crate::testutil::column;
    use pretty_assertions::assert_eq;

    #[test]
    fn binary_integer_signedness() {
        let col = column("v", ColumnType::MYSQL_TYPE_TINY, ColumnFlags::empty());
        let value = Value::decode(&col, Encoding::Binary, Some(&[214])).unwrap();
        assert!(matches!(value, Value::Int(-42)));

        let col = column("v", ColumnType::MYSQL_TYPE_TINY, ColumnFlags::UNSIGNED_FLAG);
        let value = Value::decode(&col, Encoding::Binary, Some(&[214])).unwrap();
        assert!(matches!(value, Value::UInt(214)));
    }

    #[test]
    fn text_integer_parses_ascii() {
        let col = column("v", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty());
        let value = Value::decode(&col, Encoding::Text, Some(b"-100000")).unwrap();
        assert!(matches!(value, Value::Int(-100000)));
    }

    #[test]
    fn overflow_is_scoped_to_the_call() {
        let col = column("v", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty());
        let err = i8::decode(&col, Encoding::Text, Some(b"300")).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        // The same field still decodes at a wider type.
        assert_eq!(i32::decode(&col, Encoding::Text, Some(b"300")).unwrap(), 300);
    }

    #[test]
    fn null_handling() {
        let col = column("v", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty());
        assert!(matches!(
            i64::decode(&col, Encoding::Text, None),
            Err(Error::UnexpectedNull)
        ));
        assert_eq!(Option::<i64>::decode(&col, Encoding::Text, None).unwrap(), None);
    }

    #[test]
    fn binary_datetime_lengths() {
        let col = column("v", ColumnType::MYSQL_TYPE_DATETIME, ColumnFlags::empty());

        let mut bytes = 2024u16.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[12, 25]);
        let value = Value::decode(&col, Encoding::Binary, Some(&bytes)).unwrap();
        match value {
            Value::Datetime4(d) => {
                assert_eq!(d.year(), 2024);
                assert_eq!(d.month, 12);
                assert_eq!(d.day, 25);
            }
            other => panic!("expected Datetime4, got {other:?}"),
        }

        let value = Value::decode(&col, Encoding::Binary, Some(&[])).unwrap();
        assert!(matches!(value, Value::Datetime0));
    }

    #[test]
    fn param_from_value() {
        assert_eq!(Value::Int(-5).to_param(), Param::Int(-5));
        assert_eq!(Value::Bytes(b"k").to_param(), Param::Bytes(b"k".to_vec()));
        assert_eq!(Value::Null.to_param(), Param::Null);
    }
}
