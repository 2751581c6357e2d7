//! ASP State Maintenance (ASPSM) messages

use super::Parameters;
use crate::codec::tlv::{self, put_param, put_string, put_u32_param};
use crate::codec::ParameterTag;
use crate::errors::CodecError;
use bytes::{Bytes, BytesMut};

/// ASPUP message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AspUp {
    pub asp_identifier: Option<u32>,
    pub info_string: Option<String>,
}

impl Parameters for AspUp {
    fn marshal(&self, buf: &mut BytesMut) {
        if let Some(id) = self.asp_identifier {
            put_u32_param(buf, ParameterTag::AspIdentifier, id);
        }
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::AspIdentifier => self.asp_identifier = Some(tlv::read_u32(tag, &value)?),
            ParameterTag::InfoString => self.info_string = Some(tlv::read_string(&value)),
            _ => {}
        }
        Ok(())
    }
}

/// Body shared by ASPUP Ack, ASPDN and ASPDN Ack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AspStateInfo {
    pub info_string: Option<String>,
}

impl Parameters for AspStateInfo {
    fn marshal(&self, buf: &mut BytesMut) {
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        if tag == ParameterTag::InfoString {
            self.info_string = Some(tlv::read_string(&value));
        }
        Ok(())
    }
}

/// BEAT / BEAT Ack body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heartbeat {
    /// Opaque data echoed back unchanged by the receiver
    pub data: Option<Bytes>,
}

impl Heartbeat {
    pub fn new(data: Bytes) -> Self {
        Self { data: Some(data) }
    }

    /// The acknowledgement carrying the same Heartbeat Data
    pub fn echo(&self) -> Self {
        self.clone()
    }
}

impl Parameters for Heartbeat {
    fn marshal(&self, buf: &mut BytesMut) {
        if let Some(data) = &self.data {
            put_param(buf, ParameterTag::HeartbeatData, data);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        if tag == ParameterTag::HeartbeatData {
            self.data = Some(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    #[test]
    fn test_heartbeat_echo_preserves_data() {
        let beat = Heartbeat::new(Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]));
        let frame = Message::HeartbeatAck(beat.echo()).encode();

        assert_eq!(&frame[..4], &[1, 0, 3, 6]);
        assert_eq!(&frame[8..], &[0x00, 0x09, 0x00, 0x08, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_empty_aspup_has_no_body() {
        let frame = Message::AspUp(AspUp::default()).encode();
        assert_eq!(&frame[..], &[1, 0, 3, 1, 0, 0, 0, 8]);
    }
}
