//! ASP Traffic Maintenance (ASPTM) messages

use super::Parameters;
use crate::codec::tlv::{self, put_routing_context, put_string, put_u32_param};
use crate::codec::ParameterTag;
use crate::errors::CodecError;
use crate::types::TrafficModeType;
use bytes::{Bytes, BytesMut};

/// ASPAC / ASPAC Ack body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AspActive {
    pub traffic_mode: Option<TrafficModeType>,
    pub routing_context: Vec<u32>,
    pub info_string: Option<String>,
}

impl Parameters for AspActive {
    fn marshal(&self, buf: &mut BytesMut) {
        if let Some(mode) = self.traffic_mode {
            put_u32_param(buf, ParameterTag::TrafficModeType, mode as u32);
        }
        put_routing_context(buf, &self.routing_context);
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            // Older peers send the mode under 0x0008
            ParameterTag::TrafficModeType | ParameterTag::TrafficModeTypeLegacy => {
                let raw = tlv::read_u32(tag, &value)?;
                let mode = TrafficModeType::from_u32(raw).ok_or(CodecError::InvalidValue {
                    tag: tag.value(),
                    value: raw,
                })?;
                self.traffic_mode = Some(mode);
            }
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::InfoString => self.info_string = Some(tlv::read_string(&value)),
            _ => {}
        }
        Ok(())
    }
}

/// ASPIA / ASPIA Ack body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AspInactive {
    pub routing_context: Vec<u32>,
    pub info_string: Option<String>,
}

impl Parameters for AspInactive {
    fn marshal(&self, buf: &mut BytesMut) {
        put_routing_context(buf, &self.routing_context);
        if let Some(info) = &self.info_string {
            put_string(buf, ParameterTag::InfoString, info);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
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
    fn test_aspac_layout() {
        let mut buf = BytesMut::new();
        AspActive {
            traffic_mode: Some(TrafficModeType::Loadshare),
            routing_context: vec![101],
            info_string: None,
        }
        .marshal(&mut buf);

        assert_eq!(
            &buf[..],
            &[0x00, 0x0B, 0x00, 0x08, 0, 0, 0, 2, 0x00, 0x06, 0x00, 0x08, 0, 0, 0, 101]
        );
    }

    #[test]
    fn test_legacy_traffic_mode_tag() {
        let body = Bytes::from_static(&[0x00, 0x08, 0x00, 0x08, 0, 0, 0, 1]);
        let ack: AspActive = decode_body(body).unwrap();
        assert_eq!(ack.traffic_mode, Some(TrafficModeType::Override));
    }

    #[test]
    fn test_invalid_traffic_mode() {
        let body = Bytes::from_static(&[0x00, 0x0B, 0x00, 0x08, 0, 0, 0, 9]);
        assert_eq!(
            decode_body::<AspActive>(body),
            Err(CodecError::InvalidValue { tag: 0x000B, value: 9 })
        );
    }
}
