use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

/// Lead byte marking a NULL field in the text row encoding.
pub const TEXT_NULL_MARKER: u8 = 0xFB;

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(Error::UnexpectedEof);
    }
    Ok((data[0], &data[1..]))
}

/// Read 2-byte little-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    if data.len() < 2 {
        return Err(Error::UnexpectedEof);
    }
    let value = U16LE::ref_from_bytes(&data[..2])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[2..]))
}

/// Read 3-byte little-endian integer
pub fn read_int_3(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 3 {
        return Err(Error::UnexpectedEof);
    }
    let value = u32::from_le_bytes([data[0], data[1], data[2], 0]);
    Ok((value, &data[3..]))
}

/// Read 4-byte little-endian integer
pub fn read_int_4(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    let value = U32LE::ref_from_bytes(&data[..4])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[4..]))
}

/// Read 8-byte little-endian integer
pub fn read_int_8(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < 8 {
        return Err(Error::UnexpectedEof);
    }
    let value = U64LE::ref_from_bytes(&data[..8])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[8..]))
}

/// Read length-encoded integer.
///
/// Lead bytes: `< 0xFB` literal value, `0xFC` 2-byte, `0xFD` 3-byte,
/// `0xFE` 8-byte. `0xFB` is not a valid integer lead byte here.
pub fn read_int_lenenc(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.is_empty() {
        return Err(Error::UnexpectedEof);
    }

    match data[0] {
        0xFC => {
            let (val, rest) = read_int_2(&data[1..])?;
            Ok((val as u64, rest))
        }
        0xFD => {
            let (val, rest) = read_int_3(&data[1..])?;
            Ok((val as u64, rest))
        }
        0xFE => {
            let (val, rest) = read_int_8(&data[1..])?;
            Ok((val, rest))
        }
        val => Ok((val as u64, &data[1..])),
    }
}

/// Read fixed-length bytes
pub fn read_bytes_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::UnexpectedEof);
    }
    Ok((&data[..len], &data[len..]))
}

/// Read length-encoded bytes
pub fn read_bytes_lenenc(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_int_lenenc(data)?;
    read_bytes_fix(rest, len as usize)
}

/// Read one text-encoded field: `None` for the `0xFB` NULL marker, the value
/// bytes otherwise.
pub fn read_text_field(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    if data.is_empty() {
        return Err(Error::UnexpectedEof);
    }
    if data[0] == TEXT_NULL_MARKER {
        return Ok((None, &data[1..]));
    }
    let (bytes, rest) = read_bytes_lenenc(data)?;
    Ok((Some(bytes), rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn int_lenenc_widths() {
        assert_eq!(read_int_lenenc(&[0xFA, 1]).unwrap(), (0xFA, &[1u8][..]));
        assert_eq!(
            read_int_lenenc(&[0xFC, 0x34, 0x12]).unwrap(),
            (0x1234, &[][..])
        );
        assert_eq!(
            read_int_lenenc(&[0xFD, 0x56, 0x34, 0x12]).unwrap(),
            (0x123456, &[][..])
        );
        assert_eq!(
            read_int_lenenc(&[0xFE, 8, 7, 6, 5, 4, 3, 2, 1]).unwrap(),
            (0x0102030405060708, &[][..])
        );
    }

    #[test]
    fn int_lenenc_truncated() {
        assert!(matches!(
            read_int_lenenc(&[0xFC, 0x34]),
            Err(Error::UnexpectedEof)
        ));
        assert!(matches!(read_int_lenenc(&[]), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn text_field_null_and_value() {
        let (field, rest) = read_text_field(&[0xFB, 0x01]).unwrap();
        assert_eq!(field, None);
        assert_eq!(rest, &[0x01]);

        let (field, rest) = read_text_field(&[3, b'a', b'b', b'c', 9]).unwrap();
        assert_eq!(field, Some(&b"abc"[..]));
        assert_eq!(rest, &[9]);
    }
}
