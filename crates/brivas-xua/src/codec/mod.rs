//! xUA wire format
//!
//! Every message is an 8-byte common header followed by a sequence of
//! 4-byte aligned TLV parameters.

pub mod address;
pub mod tlv;

use crate::errors::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// xUA Version
pub const XUA_VERSION: u8 = 1;

/// Common header length
pub const HEADER_LEN: usize = 8;

/// xUA Parameter Tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ParameterTag {
    InfoString = 0x0004,
    RoutingContext = 0x0006,
    DiagnosticInfo = 0x0007,
    TrafficModeTypeLegacy = 0x0008,
    HeartbeatData = 0x0009,
    TrafficModeType = 0x000B,
    ErrorCode = 0x000C,
    Status = 0x000D,
    AspIdentifier = 0x0011,
    AffectedPointCode = 0x0012,
    CorrelationId = 0x0013,
    HopCount = 0x0101,
    SourceAddress = 0x0102,
    DestinationAddress = 0x0103,
    SccpCause = 0x0106,
    Data = 0x010B,
    UserCause = 0x010C,
    NetworkAppearance = 0x010D,
    Smi = 0x0112,
    Importance = 0x0113,
    MessagePriority = 0x0114,
    ProtocolClass = 0x0115,
    SequenceControl = 0x0116,
    Segmentation = 0x0117,
    CongestionLevel = 0x0118,
    GlobalTitle = 0x8001,
    PointCode = 0x8002,
    SubsystemNumber = 0x8003,
}

impl ParameterTag {
    pub fn from_u16(v: u16) -> Option<Self> {
        let tag = match v {
            0x0004 => Self::InfoString,
            0x0006 => Self::RoutingContext,
            0x0007 => Self::DiagnosticInfo,
            0x0008 => Self::TrafficModeTypeLegacy,
            0x0009 => Self::HeartbeatData,
            0x000B => Self::TrafficModeType,
            0x000C => Self::ErrorCode,
            0x000D => Self::Status,
            0x0011 => Self::AspIdentifier,
            0x0012 => Self::AffectedPointCode,
            0x0013 => Self::CorrelationId,
            0x0101 => Self::HopCount,
            0x0102 => Self::SourceAddress,
            0x0103 => Self::DestinationAddress,
            0x0106 => Self::SccpCause,
            0x010B => Self::Data,
            0x010C => Self::UserCause,
            0x010D => Self::NetworkAppearance,
            0x0112 => Self::Smi,
            0x0113 => Self::Importance,
            0x0114 => Self::MessagePriority,
            0x0115 => Self::ProtocolClass,
            0x0116 => Self::SequenceControl,
            0x0117 => Self::Segmentation,
            0x0118 => Self::CongestionLevel,
            0x8001 => Self::GlobalTitle,
            0x8002 => Self::PointCode,
            0x8003 => Self::SubsystemNumber,
            _ => return None,
        };
        Some(tag)
    }

    pub fn value(&self) -> u16 {
        *self as u16
    }
}

/// Common message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub class: u8,
    pub msg_type: u8,
    /// Total length including the header
    pub length: u32,
}

impl Header {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(XUA_VERSION);
        buf.put_u8(0); // Reserved
        buf.put_u8(self.class);
        buf.put_u8(self.msg_type);
        buf.put_u32(self.length);
    }

    pub fn decode(mut data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available: data.len(),
            });
        }

        let version = data.get_u8();
        if version != XUA_VERSION {
            return Err(CodecError::InvalidVersion(version));
        }

        let _reserved = data.get_u8();
        let class = data.get_u8();
        let msg_type = data.get_u8();
        let length = data.get_u32();

        Ok(Self { class, msg_type, length })
    }
}

/// Prefix a message body with the common header
pub fn encode_frame(class: u8, msg_type: u8, body: &[u8]) -> Bytes {
    let length = HEADER_LEN + body.len();
    let mut buf = BytesMut::with_capacity(length);
    Header {
        class,
        msg_type,
        length: length as u32,
    }
    .encode(&mut buf);
    buf.put_slice(body);
    buf.freeze()
}

/// Validate the header of a received frame and split off its body
pub fn split_frame(mut frame: Bytes) -> Result<(Header, Bytes), CodecError> {
    let header = Header::decode(&frame)?;
    let declared = header.length as usize;

    if declared < HEADER_LEN {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }
    if frame.len() < declared {
        return Err(CodecError::Truncated {
            needed: declared,
            available: frame.len(),
        });
    }
    if frame.len() > declared {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }

    frame.advance(HEADER_LEN);
    Ok((header, frame))
}
