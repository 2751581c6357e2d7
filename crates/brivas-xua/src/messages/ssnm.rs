//! SS7 Signalling Network Management (SSNM) messages

use super::Parameters;
use crate::codec::tlv::{self, put_affected_point_codes, put_routing_context, put_string, put_u16_pair, put_u32_param, put_u8_param};
use crate::codec::ParameterTag;
use crate::errors::CodecError;
use crate::types::AffectedPointCode;
use bytes::{Bytes, BytesMut};

/// Cause and User packed in one 0x010C parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserCause {
    pub cause: u16,
    pub user: u16,
}

impl UserCause {
    fn read(tag: ParameterTag, value: &Bytes) -> Result<Self, CodecError> {
        let (cause, user) = tlv::read_u16_pair(tag, value)?;
        Ok(Self { cause, user })
    }

    fn write(&self, buf: &mut BytesMut) {
        put_u16_pair(buf, ParameterTag::UserCause, self.cause, self.user);
    }
}

/// DUNA / DAVA / DRST body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationState {
    pub routing_context: Vec<u32>,
    pub affected_point_codes: Vec<AffectedPointCode>,
    pub ssn: Option<u8>,
    pub smi: Option<u8>,
    pub info_string: Option<String>,
}

impl Parameters for DestinationState {
    fn marshal(&self, buf: &mut BytesMut) {
        put_routing_context(buf, &self.routing_context);
        put_affected_point_codes(buf, &self.affected_point_codes);
        if let Some(ssn) = self.ssn {
            put_u8_param(buf, ParameterTag::SubsystemNumber, ssn);
        }
        if let Some(smi) = self.smi {
            put_u8_param(buf, ParameterTag::Smi, smi);
        }
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::AffectedPointCode => {
                self.affected_point_codes = tlv::read_affected_point_codes(&value)?
            }
            ParameterTag::SubsystemNumber => self.ssn = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::Smi => self.smi = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::InfoString => self.info_string = Some(tlv::read_string(&value)),
            _ => {}
        }
        Ok(())
    }
}

/// DAUD body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationAudit {
    pub routing_context: Vec<u32>,
    pub affected_point_codes: Vec<AffectedPointCode>,
    pub ssn: Option<u8>,
    pub user_cause: Option<UserCause>,
    pub info_string: Option<String>,
}

impl DestinationAudit {
    /// Every list fits its TLV
    pub fn validate(&self) -> Result<(), CodecError> {
        tlv::check_value_len(ParameterTag::RoutingContext, self.routing_context.len() * 4)?;
        tlv::check_value_len(ParameterTag::AffectedPointCode, self.affected_point_codes.len() * 4)
    }
}

impl Parameters for DestinationAudit {
    fn marshal(&self, buf: &mut BytesMut) {
        put_routing_context(buf, &self.routing_context);
        put_affected_point_codes(buf, &self.affected_point_codes);
        if let Some(ssn) = self.ssn {
            put_u8_param(buf, ParameterTag::SubsystemNumber, ssn);
        }
        if let Some(user_cause) = &self.user_cause {
            user_cause.write(buf);
        }
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::AffectedPointCode => {
                self.affected_point_codes = tlv::read_affected_point_codes(&value)?
            }
            ParameterTag::SubsystemNumber => self.ssn = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::UserCause => self.user_cause = Some(UserCause::read(tag, &value)?),
            ParameterTag::InfoString => self.info_string = Some(tlv::read_string(&value)),
            _ => {}
        }
        Ok(())
    }
}

/// SCON body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Congestion {
    pub routing_context: Vec<u32>,
    pub affected_point_codes: Vec<AffectedPointCode>,
    pub ssn: Option<u8>,
    pub congestion_level: Option<u32>,
    pub smi: Option<u8>,
    pub info_string: Option<String>,
}

impl Parameters for Congestion {
    fn marshal(&self, buf: &mut BytesMut) {
        put_routing_context(buf, &self.routing_context);
        put_affected_point_codes(buf, &self.affected_point_codes);
        if let Some(ssn) = self.ssn {
            put_u8_param(buf, ParameterTag::SubsystemNumber, ssn);
        }
        if let Some(level) = self.congestion_level {
            put_u32_param(buf, ParameterTag::CongestionLevel, level);
        }
        if let Some(smi) = self.smi {
            put_u8_param(buf, ParameterTag::Smi, smi);
        }
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::AffectedPointCode => {
                self.affected_point_codes = tlv::read_affected_point_codes(&value)?
            }
            ParameterTag::SubsystemNumber => self.ssn = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::CongestionLevel => self.congestion_level = Some(tlv::read_u32(tag, &value)?),
            ParameterTag::Smi => self.smi = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::InfoString => self.info_string = Some(tlv::read_string(&value)),
            _ => {}
        }
        Ok(())
    }
}

/// DUPU body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPartUnavailable {
    pub routing_context: Vec<u32>,
    pub affected_point_codes: Vec<AffectedPointCode>,
    pub user_cause: Option<UserCause>,
    pub info_string: Option<String>,
}

impl Parameters for UserPartUnavailable {
    fn marshal(&self, buf: &mut BytesMut) {
        put_routing_context(buf, &self.routing_context);
        put_affected_point_codes(buf, &self.affected_point_codes);
        if let Some(user_cause) = &self.user_cause {
            user_cause.write(buf);
        }
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::AffectedPointCode => {
                self.affected_point_codes = tlv::read_affected_point_codes(&value)?
            }
            ParameterTag::UserCause => self.user_cause = Some(UserCause::read(tag, &value)?),
            ParameterTag::InfoString => self.info_string = Some(tlv::read_string(&value)),
            _ => {}
        }
        Ok(())
    }
}
