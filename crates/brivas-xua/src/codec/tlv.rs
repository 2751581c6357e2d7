//! TLV parameter encoding/decoding

use super::ParameterTag;
use crate::errors::CodecError;
use crate::types::AffectedPointCode;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Tag + Length prefix size
pub const PREFIX_LEN: usize = 4;

/// Zero bytes needed to bring `len` to a 4-byte boundary
pub fn padding(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Largest value the 16-bit Length field can describe
pub const MAX_VALUE_LEN: usize = u16::MAX as usize - PREFIX_LEN;

/// Reject a value too long for one TLV
pub fn check_value_len(tag: ParameterTag, len: usize) -> Result<(), CodecError> {
    if len > MAX_VALUE_LEN {
        return Err(CodecError::InvalidParameterLength {
            tag: tag.value(),
            length: PREFIX_LEN + len,
        });
    }
    Ok(())
}

/// Encode a TLV parameter, padding the value to a 4-byte boundary.
///
/// Callers check oversized values with [`check_value_len`] first.
pub fn put_param(buf: &mut BytesMut, tag: ParameterTag, value: &[u8]) {
    let length = PREFIX_LEN + value.len();
    buf.put_u16(tag.value());
    buf.put_u16(length as u16);
    buf.put_slice(value);
    buf.put_bytes(0, padding(value.len()));
}

pub fn put_u32_param(buf: &mut BytesMut, tag: ParameterTag, value: u32) {
    put_param(buf, tag, &value.to_be_bytes());
}

/// 8-bit value right-justified in a 32-bit field
pub fn put_u8_param(buf: &mut BytesMut, tag: ParameterTag, value: u8) {
    put_param(buf, tag, &[0, 0, 0, value]);
}

/// Two 16-bit values packed into one 32-bit field
pub fn put_u16_pair(buf: &mut BytesMut, tag: ParameterTag, first: u16, second: u16) {
    let mut value = [0u8; 4];
    value[..2].copy_from_slice(&first.to_be_bytes());
    value[2..].copy_from_slice(&second.to_be_bytes());
    put_param(buf, tag, &value);
}

/// Routing Context list; omitted when empty
pub fn put_routing_context(buf: &mut BytesMut, contexts: &[u32]) {
    if contexts.is_empty() {
        return;
    }
    let value: Vec<u8> = contexts.iter().flat_map(|v| v.to_be_bytes()).collect();
    put_param(buf, ParameterTag::RoutingContext, &value);
}

/// Affected Point Code list; omitted when empty
pub fn put_affected_point_codes(buf: &mut BytesMut, codes: &[AffectedPointCode]) {
    if codes.is_empty() {
        return;
    }
    let value: Vec<u8> = codes.iter().flat_map(|apc| apc.encode().to_be_bytes()).collect();
    put_param(buf, ParameterTag::AffectedPointCode, &value);
}

pub fn put_data(buf: &mut BytesMut, data: &[u8]) {
    put_param(buf, ParameterTag::Data, data);
}

pub fn put_string(buf: &mut BytesMut, tag: ParameterTag, value: &str) {
    put_param(buf, tag, value.as_bytes());
}

/// Read the next TLV element, returning its raw tag and exact value bytes.
///
/// Consumes the 4-byte prefix, the value and any alignment padding that is
/// present. Returns `Ok(None)` once the buffer is exhausted.
pub fn next_element(buf: &mut Bytes) -> Result<Option<(u16, Bytes)>, CodecError> {
    if !buf.has_remaining() {
        return Ok(None);
    }
    if buf.remaining() < PREFIX_LEN {
        return Err(CodecError::Truncated {
            needed: PREFIX_LEN,
            available: buf.remaining(),
        });
    }

    let tag = buf.get_u16();
    let length = buf.get_u16() as usize;
    if length < PREFIX_LEN {
        return Err(CodecError::InvalidParameterLength { tag, length });
    }

    let value_len = length - PREFIX_LEN;
    if buf.remaining() < value_len {
        return Err(CodecError::Truncated {
            needed: value_len,
            available: buf.remaining(),
        });
    }
    let value = buf.split_to(value_len);

    let pad = padding(value_len).min(buf.remaining());
    buf.advance(pad);

    Ok(Some((tag, value)))
}

fn expect_len(tag: ParameterTag, value: &Bytes, expected: usize) -> Result<(), CodecError> {
    if value.len() != expected {
        return Err(CodecError::InvalidParameterLength {
            tag: tag.value(),
            length: value.len() + PREFIX_LEN,
        });
    }
    Ok(())
}

pub fn read_u32(tag: ParameterTag, value: &Bytes) -> Result<u32, CodecError> {
    expect_len(tag, value, 4)?;
    Ok(value.clone().get_u32())
}

pub fn read_u8(tag: ParameterTag, value: &Bytes) -> Result<u8, CodecError> {
    expect_len(tag, value, 4)?;
    Ok(value[3])
}

pub fn read_u16_pair(tag: ParameterTag, value: &Bytes) -> Result<(u16, u16), CodecError> {
    expect_len(tag, value, 4)?;
    let mut v = value.clone();
    Ok((v.get_u16(), v.get_u16()))
}

pub fn read_u32_list(tag: ParameterTag, value: &Bytes) -> Result<Vec<u32>, CodecError> {
    if value.len() % 4 != 0 {
        return Err(CodecError::InvalidParameterLength {
            tag: tag.value(),
            length: value.len() + PREFIX_LEN,
        });
    }
    Ok(value
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn read_routing_context(value: &Bytes) -> Result<Vec<u32>, CodecError> {
    read_u32_list(ParameterTag::RoutingContext, value)
}

pub fn read_affected_point_codes(value: &Bytes) -> Result<Vec<AffectedPointCode>, CodecError> {
    Ok(read_u32_list(ParameterTag::AffectedPointCode, value)?
        .into_iter()
        .map(AffectedPointCode::decode)
        .collect())
}

pub fn read_string(value: &Bytes) -> String {
    String::from_utf8_lossy(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_length_limit() {
        assert!(check_value_len(ParameterTag::Data, MAX_VALUE_LEN).is_ok());
        assert!(matches!(
            check_value_len(ParameterTag::Data, MAX_VALUE_LEN + 1),
            Err(CodecError::InvalidParameterLength {
                tag: 0x010B,
                length: 65536
            })
        ));
    }

    #[test]
    fn test_u8_param_layout() {
        let mut buf = BytesMut::new();
        put_u8_param(&mut buf, ParameterTag::SubsystemNumber, 8);
        assert_eq!(&buf[..], &[0x80, 0x03, 0x00, 0x08, 0, 0, 0, 8]);
    }

    #[test]
    fn test_data_padding() {
        let mut buf = BytesMut::new();
        put_data(&mut buf, &[1, 2, 3]);
        assert_eq!(&buf[..], &[0x01, 0x0B, 0x00, 0x07, 1, 2, 3, 0]);

        let mut bytes = buf.freeze();
        let (tag, value) = next_element(&mut bytes).unwrap().unwrap();
        assert_eq!(tag, 0x010B);
        assert_eq!(&value[..], &[1, 2, 3]);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_empty_routing_context_omitted() {
        let mut buf = BytesMut::new();
        put_routing_context(&mut buf, &[]);
        assert!(buf.is_empty());

        put_routing_context(&mut buf, &[101, 102]);
        assert_eq!(&buf[..4], &[0x00, 0x06, 0x00, 0x0C]);
    }

    #[test]
    fn test_list_length_not_multiple_of_four() {
        let value = Bytes::from_static(&[0, 0, 0, 1, 0, 0]);
        assert_eq!(
            read_routing_context(&value),
            Err(CodecError::InvalidParameterLength { tag: 0x0006, length: 10 })
        );
    }

    #[test]
    fn test_scalar_length_mismatch() {
        let value = Bytes::from_static(&[0, 0, 1]);
        assert!(matches!(
            read_u32(ParameterTag::ErrorCode, &value),
            Err(CodecError::InvalidParameterLength { tag: 0x000C, .. })
        ));
        let value = Bytes::from_static(&[0, 0, 0, 0, 7]);
        assert!(read_u8(ParameterTag::Smi, &value).is_err());
    }

    #[test]
    fn test_next_element_errors() {
        let mut short_len = Bytes::from_static(&[0x00, 0x04, 0x00, 0x02]);
        assert!(matches!(
            next_element(&mut short_len),
            Err(CodecError::InvalidParameterLength { tag: 0x0004, length: 2 })
        ));

        let mut overrun = Bytes::from_static(&[0x00, 0x04, 0x00, 0x10, b'a']);
        assert!(matches!(next_element(&mut overrun), Err(CodecError::Truncated { .. })));

        let mut stub = Bytes::from_static(&[0x00]);
        assert!(next_element(&mut stub).is_err());

        let mut empty = Bytes::new();
        assert_eq!(next_element(&mut empty), Ok(None));
    }

    #[test]
    fn test_consumes_padding_between_elements() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, ParameterTag::InfoString, "hello");
        put_u32_param(&mut buf, ParameterTag::ErrorCode, 7);
        let mut bytes = buf.freeze();

        let (tag, info) = next_element(&mut bytes).unwrap().unwrap();
        assert_eq!(tag, 0x0004);
        assert_eq!(read_string(&info), "hello");

        let (tag, code) = next_element(&mut bytes).unwrap().unwrap();
        assert_eq!(tag, 0x000C);
        assert_eq!(read_u32(ParameterTag::ErrorCode, &code), Ok(7));
        assert_eq!(next_element(&mut bytes), Ok(None));
    }

    #[test]
    fn test_affected_point_codes() {
        let codes = vec![AffectedPointCode { mask: 1, point_code: 0x123456 }];
        let mut buf = BytesMut::new();
        put_affected_point_codes(&mut buf, &codes);
        assert_eq!(&buf[4..], &[0x01, 0x12, 0x34, 0x56]);

        let mut bytes = buf.freeze();
        let (_, value) = next_element(&mut bytes).unwrap().unwrap();
        assert_eq!(read_affected_point_codes(&value), Ok(codes));
    }
}
