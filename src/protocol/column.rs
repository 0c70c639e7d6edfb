use std::collections::HashMap;
use std::sync::OnceLock;

use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};

use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result, eyre::eyre};
use crate::protocol::primitive::*;

/// One column of a result, parsed from its column definition packet.
///
/// Immutable and shared read-only by the cursor, codec dispatch, and
/// metadata-reflection callers.
#[derive(Debug, Clone)]
pub struct Column {
    pub schema: String,
    /// Table alias as selected.
    pub table: String,
    /// Table the column physically belongs to.
    pub org_table: String,
    /// Column alias as selected; the label getters resolve against.
    pub name: String,
    /// Column name in the owning table.
    pub org_name: String,
    pub charset: u16,
    pub length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl Column {
    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(ColumnFlags::PRI_KEY_FLAG)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.flags.contains(ColumnFlags::AUTO_INCREMENT_FLAG)
    }

    pub fn is_nullable(&self) -> bool {
        !self.flags.contains(ColumnFlags::NOT_NULL_FLAG)
    }

    pub fn has_default(&self) -> bool {
        !self.flags.contains(ColumnFlags::NO_DEFAULT_VALUE_FLAG)
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }

    pub fn is_zerofill(&self) -> bool {
        self.flags.contains(ColumnFlags::ZEROFILL_FLAG)
    }

    pub fn is_binary(&self) -> bool {
        self.flags.contains(ColumnFlags::BINARY_FLAG)
    }
}

/// Fixed-size tail of a column definition packet (12 bytes, zero-copy).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
struct ColumnDefinitionTail {
    charset: U16LE,
    column_length: U32LE,
    column_type: u8,
    flags: U16LE,
    decimals: u8,
    reserved: U16LE,
}

/// The immutable column descriptor set of one result.
///
/// Parsed once per result. The catalog prefix length is computed during that
/// parse and kept here — per result, never a process-wide cached value — so
/// concurrent connections cannot contaminate each other's metadata parsing.
#[derive(Debug)]
pub struct ColumnSet {
    columns: Vec<Column>,
    /// Byte offset of the schema field in every column packet of this result
    /// (the length of the constant catalog prefix).
    metadata_offset: usize,
    /// Lowercased label -> 0-based index, built on first label lookup.
    label_cache: OnceLock<HashMap<String, usize>>,
}

impl ColumnSet {
    /// Parse the column definition packets of one result.
    pub fn parse<'a, I>(packets: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut metadata_offset = None;
        let mut columns = Vec::new();
        for payload in packets {
            // The catalog field is constant across a result; measure it once.
            let offset = match metadata_offset {
                Some(offset) => offset,
                None => {
                    let (catalog, rest) = read_bytes_lenenc(payload)?;
                    let offset = payload.len() - rest.len();
                    if catalog != b"def" {
                        tracing::debug!(?catalog, "nonstandard catalog in column definition");
                    }
                    metadata_offset = Some(offset);
                    offset
                }
            };
            let data = payload.get(offset..).ok_or(Error::UnexpectedEof)?;
            columns.push(parse_column(data)?);
        }
        Ok(Self {
            columns,
            metadata_offset: metadata_offset.unwrap_or(0),
            label_cache: OnceLock::new(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn metadata_offset(&self) -> usize {
        self.metadata_offset
    }

    /// 0-based column for a checked 1-based index.
    pub fn column(&self, index: usize) -> Result<&Column> {
        if index == 0 || index > self.columns.len() {
            return Err(Error::ColumnIndexOutOfRange {
                index,
                count: self.columns.len(),
            });
        }
        Ok(&self.columns[index - 1])
    }

    /// Resolve a case-insensitive column label to its 1-based index.
    ///
    /// The lookup table is built on first use and reused afterwards. When two
    /// columns share a label the first one wins, matching server order.
    pub fn index_of_label(&self, label: &str) -> Result<usize> {
        let cache = self.label_cache.get_or_init(|| {
            let mut map = HashMap::with_capacity(self.columns.len());
            for (idx, col) in self.columns.iter().enumerate() {
                map.entry(col.name.to_ascii_lowercase()).or_insert(idx + 1);
            }
            map
        });
        cache
            .get(&label.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| Error::UnknownLabel(label.to_string()))
    }
}

fn parse_column(data: &[u8]) -> Result<Column> {
    let (schema, data) = read_bytes_lenenc(data)?;
    let (table, data) = read_bytes_lenenc(data)?;
    let (org_table, data) = read_bytes_lenenc(data)?;
    let (name, data) = read_bytes_lenenc(data)?;
    let (org_name, data) = read_bytes_lenenc(data)?;

    // Fixed-tail length marker, always 0x0c.
    let (_tail_len, data) = read_int_lenenc(data)?;
    let tail =
        ColumnDefinitionTail::ref_from_bytes(data.get(..12).ok_or(Error::UnexpectedEof)?)
            .map_err(|_| Error::InvalidPacket)?;

    let column_type = ColumnType::from_u8(tail.column_type)
        .ok_or_else(|| Error::LibraryBug(eyre!("unknown column type: 0x{:02X}", tail.column_type)))?;

    Ok(Column {
        schema: String::from_utf8_lossy(schema).into_owned(),
        table: String::from_utf8_lossy(table).into_owned(),
        org_table: String::from_utf8_lossy(org_table).into_owned(),
        name: String::from_utf8_lossy(name).into_owned(),
        org_name: String::from_utf8_lossy(org_name).into_owned(),
        charset: tail.charset.get(),
        length: tail.column_length.get(),
        column_type,
        flags: ColumnFlags::from_bits_truncate(tail.flags.get()),
        decimals: tail.decimals,
    })
}
