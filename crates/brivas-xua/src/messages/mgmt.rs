//! Management (MGMT) messages: ERR and NTFY

use super::Parameters;
use crate::codec::tlv::{self, put_affected_point_codes, put_param, put_routing_context, put_string, put_u32_param};
use crate::codec::ParameterTag;
use crate::errors::CodecError;
use crate::types::{AffectedPointCode, ErrorCode};
use bytes::{Bytes, BytesMut};

/// ERR message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error_code: ErrorCode,
    pub routing_context: Vec<u32>,
    pub affected_point_codes: Vec<AffectedPointCode>,
    pub network_appearance: Option<u32>,
    pub diagnostic_info: Option<Bytes>,
}

impl ErrorMessage {
    pub fn new(error_code: ErrorCode) -> Self {
        Self {
            error_code,
            ..Default::default()
        }
    }
}

impl Default for ErrorMessage {
    fn default() -> Self {
        Self {
            error_code: ErrorCode(0),
            routing_context: Vec::new(),
            affected_point_codes: Vec::new(),
            network_appearance: None,
            diagnostic_info: None,
        }
    }
}

impl Parameters for ErrorMessage {
    const MANDATORY: &'static [ParameterTag] = &[ParameterTag::ErrorCode];

    fn marshal(&self, buf: &mut BytesMut) {
        put_u32_param(buf, ParameterTag::ErrorCode, self.error_code.0);
        put_routing_context(buf, &self.routing_context);
        put_affected_point_codes(buf, &self.affected_point_codes);
        if let Some(na) = self.network_appearance {
            put_u32_param(buf, ParameterTag::NetworkAppearance, na);
        }
        if let Some(diag) = &self.diagnostic_info {
            put_param(buf, ParameterTag::DiagnosticInfo, diag);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::ErrorCode => self.error_code = ErrorCode(tlv::read_u32(tag, &value)?),
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::AffectedPointCode => {
                self.affected_point_codes = tlv::read_affected_point_codes(&value)?
            }
            ParameterTag::NetworkAppearance => self.network_appearance = Some(tlv::read_u32(tag, &value)?),
            ParameterTag::DiagnosticInfo => self.diagnostic_info = Some(value),
            _ => {}
        }
        Ok(())
    }
}

/// NTFY message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notify {
    /// Status Type (high 16 bits) and Status Information (low 16 bits)
    pub status: u32,
    pub asp_identifier: Option<u32>,
    pub routing_context: Vec<u32>,
    pub info_string: Option<String>,
}

impl Notify {
    pub const TYPE_AS_STATE_CHANGE: u16 = 1;
    pub const TYPE_OTHER: u16 = 2;

    pub const AS_INACTIVE: u32 = 0x0001_0002;
    pub const AS_ACTIVE: u32 = 0x0001_0003;
    pub const AS_PENDING: u32 = 0x0001_0004;
    pub const INSUFFICIENT_ASP_RESOURCES: u32 = 0x0002_0001;
    pub const ALTERNATE_ASP_ACTIVE: u32 = 0x0002_0002;
    pub const ASP_FAILURE: u32 = 0x0002_0003;

    pub fn status_type(&self) -> u16 {
        (self.status >> 16) as u16
    }

    pub fn status_info(&self) -> u16 {
        (self.status & 0xFFFF) as u16
    }

    pub fn describe(&self) -> &'static str {
        match self.status {
            Self::AS_INACTIVE => "AS-INACTIVE",
            Self::AS_ACTIVE => "AS-ACTIVE",
            Self::AS_PENDING => "AS-PENDING",
            Self::INSUFFICIENT_ASP_RESOURCES => "Insufficient ASP Resources Active in AS",
            Self::ALTERNATE_ASP_ACTIVE => "Alternate ASP Active",
            Self::ASP_FAILURE => "ASP Failure",
            _ => "Unknown",
        }
    }
}

impl Parameters for Notify {
    const MANDATORY: &'static [ParameterTag] = &[ParameterTag::Status];

    fn marshal(&self, buf: &mut BytesMut) {
        put_u32_param(buf, ParameterTag::Status, self.status);
        if let Some(id) = self.asp_identifier {
            put_u32_param(buf, ParameterTag::AspIdentifier, id);
        }
        put_routing_context(buf, &self.routing_context);
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::Status => self.status = tlv::read_u32(tag, &value)?,
            ParameterTag::AspIdentifier => self.asp_identifier = Some(tlv::read_u32(tag, &value)?),
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::InfoString => self.info_string = Some(tlv::read_string(&value)),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::decode_body;

    #[test]
    fn test_err_layout() {
        let mut buf = BytesMut::new();
        ErrorMessage::new(ErrorCode::PROTOCOL_ERROR).marshal(&mut buf);
        assert_eq!(&buf[..], &[0x00, 0x0C, 0x00, 0x08, 0, 0, 0, 7]);
    }

    #[test]
    fn test_notify_status_split() {
        let ntfy = Notify {
            status: Notify::ASP_FAILURE,
            ..Default::default()
        };
        assert_eq!(ntfy.status_type(), Notify::TYPE_OTHER);
        assert_eq!(ntfy.status_info(), 3);
        assert_eq!(ntfy.describe(), "ASP Failure");
    }

    #[test]
    fn test_err_code_length_mismatch() {
        let body = Bytes::from_static(&[0x00, 0x0C, 0x00, 0x06, 0, 7, 0, 0]);
        assert!(matches!(
            decode_body::<ErrorMessage>(body),
            Err(CodecError::InvalidParameterLength { tag: 0x000C, length: 6 })
        ));
    }
}
