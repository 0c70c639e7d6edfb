//! Packet builders shared by unit tests.

use crate::constant::{ColumnFlags, ColumnType};
use crate::field::null_bitmap_len;
use crate::protocol::column::{Column, ColumnSet};
use crate::protocol::packet::EofSemantics;

/// Wrap one payload in a wire frame (3-byte length + sequence id).
pub(crate) fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes()[..3].to_vec();
    out.push(0);
    out.extend_from_slice(payload);
    out
}

pub(crate) fn end_of_stream_payload(eof: EofSemantics, status: u16, warnings: u16) -> Vec<u8> {
    match eof {
        EofSemantics::Legacy => {
            let mut out = vec![0xFE];
            out.extend_from_slice(&warnings.to_le_bytes());
            out.extend_from_slice(&status.to_le_bytes());
            out
        }
        EofSemantics::Deprecated => {
            let mut out = vec![0xFE, 0x00, 0x00];
            out.extend_from_slice(&status.to_le_bytes());
            out.extend_from_slice(&warnings.to_le_bytes());
            out
        }
    }
}

/// A whole text-protocol result stream, framed: column count, definitions,
/// rows, terminal status packet.
pub(crate) fn text_result_stream(
    specs: &[(&str, &str, &str, ColumnType, ColumnFlags)],
    rows: &[Vec<Option<&[u8]>>],
    eof: EofSemantics,
) -> Vec<u8> {
    let mut stream = Vec::new();
    let mut count = Vec::new();
    write_int_lenenc(&mut count, specs.len() as u64);
    stream.extend_from_slice(&frame(&count));
    for (schema, table, name, ty, flags) in specs {
        stream.extend_from_slice(&frame(&column_packet(schema, table, name, *ty, *flags)));
    }
    if eof == EofSemantics::Legacy {
        stream.extend_from_slice(&frame(&end_of_stream_payload(eof, 0, 0)));
    }
    for row in rows {
        stream.extend_from_slice(&frame(&text_row_payload(row)));
    }
    stream.extend_from_slice(&frame(&end_of_stream_payload(eof, 0, 0)));
    stream
}

pub(crate) fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xFC);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value < (1 << 24) {
        out.push(0xFD);
        out.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
    } else {
        out.push(0xFE);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

pub(crate) fn write_bytes_lenenc(out: &mut Vec<u8>, bytes: &[u8]) {
    write_int_lenenc(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// One column definition payload as the server would send it.
pub(crate) fn column_packet(
    schema: &str,
    table: &str,
    name: &str,
    column_type: ColumnType,
    flags: ColumnFlags,
) -> Vec<u8> {
    let mut out = Vec::new();
    write_bytes_lenenc(&mut out, b"def");
    write_bytes_lenenc(&mut out, schema.as_bytes());
    write_bytes_lenenc(&mut out, table.as_bytes()); // alias
    write_bytes_lenenc(&mut out, table.as_bytes()); // original
    write_bytes_lenenc(&mut out, name.as_bytes()); // alias
    write_bytes_lenenc(&mut out, name.as_bytes()); // original
    out.push(0x0C);
    out.extend_from_slice(&33u16.to_le_bytes()); // charset (utf8)
    out.extend_from_slice(&255u32.to_le_bytes()); // declared length
    out.push(column_type as u8);
    out.extend_from_slice(&flags.bits().to_le_bytes());
    out.push(0); // decimals
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved
    out
}

pub(crate) fn column_set(
    specs: &[(&str, &str, &str, ColumnType, ColumnFlags)],
) -> ColumnSet {
    let packets: Vec<Vec<u8>> = specs
        .iter()
        .map(|(schema, table, name, ty, flags)| column_packet(schema, table, name, *ty, *flags))
        .collect();
    ColumnSet::parse(packets.iter().map(Vec::as_slice)).unwrap()
}

/// A bare column descriptor for decode tests.
pub(crate) fn column(name: &str, column_type: ColumnType, flags: ColumnFlags) -> Column {
    Column {
        schema: "db".to_string(),
        table: "t".to_string(),
        org_table: "t".to_string(),
        name: name.to_string(),
        org_name: name.to_string(),
        charset: 33,
        length: 255,
        column_type,
        flags,
        decimals: 0,
    }
}

/// One text-protocol row payload.
pub(crate) fn text_row_payload(fields: &[Option<&[u8]>]) -> Vec<u8> {
    let mut out = Vec::new();
    for field in fields {
        match field {
            None => out.push(0xFB),
            Some(bytes) => write_bytes_lenenc(&mut out, bytes),
        }
    }
    out
}

/// One binary-protocol row payload: 0x00 header, null bitmap, field bytes.
///
/// `fields` carry raw wire bytes for fixed-width types; variable types get
/// their length prefixes added here.
pub(crate) fn binary_row_payload(cols: &[Column], fields: &[Option<Vec<u8>>]) -> Vec<u8> {
    use ColumnType::*;

    let mut out = vec![0x00];
    let mut bitmap = vec![0u8; null_bitmap_len(cols.len())];
    for (idx, field) in fields.iter().enumerate() {
        if field.is_none() {
            let bit = idx + 2;
            bitmap[bit >> 3] |= 1 << (bit & 7);
        }
    }
    out.extend_from_slice(&bitmap);

    for (col, field) in cols.iter().zip(fields) {
        let Some(bytes) = field else { continue };
        match col.column_type {
            MYSQL_TYPE_NULL | MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_YEAR
            | MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG | MYSQL_TYPE_FLOAT | MYSQL_TYPE_LONGLONG
            | MYSQL_TYPE_DOUBLE => out.extend_from_slice(bytes),
            MYSQL_TYPE_DATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_NEWDATE
            | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP2 | MYSQL_TYPE_TIME
            | MYSQL_TYPE_TIME2 => {
                out.push(bytes.len() as u8);
                out.extend_from_slice(bytes);
            }
            _ => write_bytes_lenenc(&mut out, bytes),
        }
    }
    out
}
