use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::protocol::column::Column;
use crate::protocol::primitive::{TEXT_NULL_MARKER, read_int_lenenc};

/// Row encoding negotiated by the command that produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Every field is length-prefixed, NULL is the `0xFB` marker.
    Text,
    /// A leading null bitmap, then fixed- or length-prefixed fields.
    Binary,
}

/// Bytes of the binary-protocol null bitmap preceding any field bytes:
/// `ceil((column_count + 2) / 8)`.
pub fn null_bitmap_len(column_count: usize) -> usize {
    (column_count + 7 + 2) >> 3
}

/// Result-set null bitmap; bit positions are shifted by 2.
#[derive(Debug, Clone, Copy)]
struct NullBitmap<'a> {
    bitmap: &'a [u8],
}

impl NullBitmap<'_> {
    fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + 2;
        let byte_pos = bit_pos >> 3;
        let bit_offset = bit_pos & 7;
        match self.bitmap.get(byte_pos) {
            Some(byte) => (byte & (1 << bit_offset)) != 0,
            None => false,
        }
    }
}

/// Explicit decode cursor over the current row span.
///
/// Tracks how far the field walk has advanced so sequential getters are O(1);
/// a backward target restarts the walk from the row start. Reset on every
/// cursor reposition — never ambient state that survives a row change.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldScratch {
    /// Next 0-based column the walk has not passed yet.
    next_col: usize,
    /// Byte offset of `next_col`'s field within the row span.
    offset: usize,
    /// Whether the last located field was NULL.
    last_null: bool,
}

impl FieldScratch {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn last_null(&self) -> bool {
        self.last_null
    }

    /// Locate the value bytes of the 0-based `target` column inside `payload`.
    ///
    /// Returns `None` for a NULL field and records the was-null flag either
    /// way. Length prefixes (text fields, binary strings, temporal length
    /// bytes) are consumed here; callers only ever see value bytes.
    pub fn locate<'a>(
        &mut self,
        payload: &'a [u8],
        columns: &[Column],
        encoding: Encoding,
        target: usize,
    ) -> Result<Option<&'a [u8]>> {
        match encoding {
            Encoding::Text => self.locate_text(payload, target),
            Encoding::Binary => self.locate_binary(payload, columns, target),
        }
    }

    fn locate_text<'a>(&mut self, payload: &'a [u8], target: usize) -> Result<Option<&'a [u8]>> {
        if target < self.next_col {
            self.next_col = 0;
            self.offset = 0;
        }

        while self.next_col < target {
            let (_, _, total) = text_field_span(&payload[self.offset..])?;
            self.offset += total;
            self.next_col += 1;
        }

        let field = &payload[self.offset..];
        let (value_start, value_len, total) = text_field_span(field)?;
        self.offset += total;
        self.next_col = target + 1;

        if value_len == usize::MAX {
            self.last_null = true;
            return Ok(None);
        }
        self.last_null = false;
        Ok(Some(&field[value_start..value_start + value_len]))
    }

    fn locate_binary<'a>(
        &mut self,
        payload: &'a [u8],
        columns: &[Column],
        target: usize,
    ) -> Result<Option<&'a [u8]>> {
        // Binary row packets lead with 0x00, then the null bitmap.
        let bitmap_len = null_bitmap_len(columns.len());
        let header_len = 1 + bitmap_len;
        if payload.len() < header_len {
            return Err(Error::UnexpectedEof);
        }
        let bitmap = NullBitmap {
            bitmap: &payload[1..header_len],
        };

        if target < self.next_col || self.offset == 0 {
            self.next_col = 0;
            self.offset = header_len;
        }

        while self.next_col < target {
            if !bitmap.is_null(self.next_col) {
                let (_, _, total) =
                    binary_field_span(&columns[self.next_col], &payload[self.offset..])?;
                self.offset += total;
            }
            self.next_col += 1;
        }

        if bitmap.is_null(target) {
            self.next_col = target + 1;
            self.last_null = true;
            return Ok(None);
        }

        let field = &payload[self.offset..];
        let (value_start, value_len, total) = binary_field_span(&columns[target], field)?;
        self.offset += total;
        self.next_col = target + 1;
        self.last_null = false;
        Ok(Some(&field[value_start..value_start + value_len]))
    }
}

/// `(value offset, value length, total field length)` of one text field.
/// A NULL marker reports `usize::MAX` as its value length.
fn text_field_span(field: &[u8]) -> Result<(usize, usize, usize)> {
    match field.first() {
        None => Err(Error::UnexpectedEof),
        Some(&TEXT_NULL_MARKER) => Ok((0, usize::MAX, 1)),
        Some(_) => {
            let (len, rest) = read_int_lenenc(field)?;
            let prefix = field.len() - rest.len();
            let len = len as usize;
            if rest.len() < len {
                return Err(Error::UnexpectedEof);
            }
            Ok((prefix, len, prefix + len))
        }
    }
}

/// `(value offset, value length, total field length)` of one binary field.
fn binary_field_span(col: &Column, field: &[u8]) -> Result<(usize, usize, usize)> {
    use ColumnType::*;

    let fixed = match col.column_type {
        MYSQL_TYPE_NULL => Some(0),
        MYSQL_TYPE_TINY => Some(1),
        MYSQL_TYPE_SHORT | MYSQL_TYPE_YEAR => Some(2),
        MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG | MYSQL_TYPE_FLOAT => Some(4),
        MYSQL_TYPE_LONGLONG | MYSQL_TYPE_DOUBLE => Some(8),
        MYSQL_TYPE_DATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_NEWDATE
        | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP2 | MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => {
            // Length-prefixed by a single byte.
            let len = *field.first().ok_or(Error::UnexpectedEof)? as usize;
            if field.len() < 1 + len {
                return Err(Error::UnexpectedEof);
            }
            return Ok((1, len, 1 + len));
        }
        _ => None,
    };

    match fixed {
        Some(len) => {
            if field.len() < len {
                return Err(Error::UnexpectedEof);
            }
            Ok((0, len, len))
        }
        None => {
            // Everything else is a length-encoded byte string.
            let (len, rest) = read_int_lenenc(field)?;
            let prefix = field.len() - rest.len();
            let len = len as usize;
            if rest.len() < len {
                return Err(Error::UnexpectedEof);
            }
            Ok((prefix, len, prefix + len))
        }
    }
}
