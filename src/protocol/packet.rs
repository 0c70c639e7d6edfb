use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::U16 as U16LE;

use crate::constant::{LONG_PACKET_THRESHOLD, StatusFlags};
use crate::error::{Error, Result, ServerError};
use crate::protocol::primitive::*;

/// Which end-of-stream sub-format the connection negotiated.
///
/// With deprecated end-of-stream markers the terminal packet reuses the
/// command-acknowledgement (OK) layout; without them it is the legacy 5-byte
/// EOF packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofSemantics {
    Legacy,
    Deprecated,
}

/// Classification of one packet in a row stream.
#[derive(Debug)]
pub enum Packet {
    /// Terminal server error; the command is over.
    Err(ServerError),
    /// Terminal status packet; carries flags the cursor must retain.
    EndOfStream(EndOfStream),
    /// Anything else is row data.
    Row,
}

/// Status carried by the terminal packet of a row stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndOfStream {
    pub status: StatusFlags,
    pub warnings: u16,
}

impl EndOfStream {
    pub fn more_results_exists(&self) -> bool {
        self.status
            .contains(StatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }

    pub fn output_parameters(&self) -> bool {
        self.status.contains(StatusFlags::SERVER_PS_OUT_PARAMS)
    }
}

/// Classify a row-stream packet by its lead byte and length.
///
/// `0xFF` is always a terminal error. `0xFE` is ambiguous: a row may
/// legitimately start with `0xFE` (the 8-byte length-encoding marker), so it
/// is end-of-stream only when the payload is below the long-packet threshold.
/// Everything else is row data.
pub fn classify(payload: &[u8], eof: EofSemantics) -> Result<Packet> {
    match payload.first() {
        None => Err(Error::InvalidPacket),
        Some(0xFF) => Ok(Packet::Err(read_err_packet(payload)?)),
        Some(0xFE) if payload.len() < LONG_PACKET_THRESHOLD => {
            Ok(Packet::EndOfStream(read_end_of_stream(payload, eof)?))
        }
        Some(_) => Ok(Packet::Row),
    }
}

/// Parse an ERR packet: `0xFF, code:u16, '#' + sqlstate:5 (optional), message`.
pub fn read_err_packet(payload: &[u8]) -> Result<ServerError> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFF {
        return Err(Error::InvalidPacket);
    }

    let (code, data) = read_int_2(data)?;

    let (sql_state, rest) = if !data.is_empty() && data[0] == b'#' {
        let (state_bytes, rest) = read_bytes_fix(&data[1..], 5)?;
        (String::from_utf8_lossy(state_bytes).into_owned(), rest)
    } else {
        (String::new(), data)
    };

    let message = String::from_utf8_lossy(rest).into_owned();

    Ok(ServerError {
        code,
        sql_state,
        message,
    })
}

/// Parse the terminal status packet in either sub-format.
///
/// Legacy: `0xFE, warnings:u16, status:u16`.
/// Deprecated-marker: OK layout — `0xFE`, affected rows and last insert id as
/// length-encoded integers (skipped), then `status:u16, warnings:u16`.
pub fn read_end_of_stream(payload: &[u8], eof: EofSemantics) -> Result<EndOfStream> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }

    match eof {
        EofSemantics::Legacy => {
            let tail = LegacyEofTail::ref_from_bytes(data.get(..4).ok_or(Error::UnexpectedEof)?)
                .map_err(|_| Error::InvalidPacket)?;
            Ok(EndOfStream {
                status: StatusFlags::from_bits_truncate(tail.status.get()),
                warnings: tail.warnings.get(),
            })
        }
        EofSemantics::Deprecated => {
            let (_affected_rows, rest) = read_int_lenenc(data)?;
            let (_last_insert_id, rest) = read_int_lenenc(rest)?;
            let (status, rest) = read_int_2(rest)?;
            let (warnings, _rest) = read_int_2(rest)?;
            Ok(EndOfStream {
                status: StatusFlags::from_bits_truncate(status),
                warnings,
            })
        }
    }
}

/// Fixed tail of the legacy EOF packet (zero-copy).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
struct LegacyEofTail {
    warnings: U16LE,
    status: U16LE,
}
