//! Connectionless (CL) messages: CLDT and CLDR

use super::Parameters;
use crate::codec::address::SccpAddress;
use crate::codec::tlv::{self, put_data, put_routing_context, put_u32_param, put_u8_param};
use crate::codec::ParameterTag;
use crate::errors::CodecError;
use crate::types::{ProtocolClass, Segmentation};
use bytes::{Bytes, BytesMut};

/// CLDT message (Connectionless Data Transfer)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cldt {
    pub routing_context: Vec<u32>,
    pub protocol_class: ProtocolClass,
    pub source: SccpAddress,
    pub destination: SccpAddress,
    pub sequence_control: u32,
    pub hop_count: Option<u8>,
    pub importance: Option<u8>,
    pub message_priority: Option<u8>,
    pub correlation_id: Option<u32>,
    pub segmentation: Option<Segmentation>,
    pub data: Bytes,
}

impl Cldt {
    pub fn new(source: SccpAddress, destination: SccpAddress, data: Bytes) -> Self {
        Self {
            source,
            destination,
            data,
            ..Default::default()
        }
    }

    /// Both addresses must be routable before the message is sent
    pub fn check_addresses(&self) -> Result<(), CodecError> {
        self.source.check("source")?;
        self.destination.check("destination")
    }

    /// Addresses plus every variable-length value fitting its TLV
    pub fn validate(&self) -> Result<(), CodecError> {
        self.check_addresses()?;
        tlv::check_value_len(ParameterTag::RoutingContext, self.routing_context.len() * 4)?;
        tlv::check_value_len(ParameterTag::Data, self.data.len())
    }
}

impl Parameters for Cldt {
    const MANDATORY: &'static [ParameterTag] = &[ParameterTag::Data];

    fn marshal(&self, buf: &mut BytesMut) {
        put_routing_context(buf, &self.routing_context);
        put_u8_param(buf, ParameterTag::ProtocolClass, self.protocol_class.encode());
        self.source.marshal(buf, ParameterTag::SourceAddress);
        self.destination.marshal(buf, ParameterTag::DestinationAddress);
        put_u32_param(buf, ParameterTag::SequenceControl, self.sequence_control);
        put_optional(
            buf,
            self.hop_count,
            self.importance,
            self.message_priority,
            self.correlation_id,
            self.segmentation,
        );
        put_data(buf, &self.data);
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::ProtocolClass => {
                self.protocol_class = ProtocolClass::decode(tlv::read_u8(tag, &value)?)
            }
            ParameterTag::SourceAddress => self.source = SccpAddress::unmarshal(tag, value)?,
            ParameterTag::DestinationAddress => self.destination = SccpAddress::unmarshal(tag, value)?,
            ParameterTag::SequenceControl => self.sequence_control = tlv::read_u32(tag, &value)?,
            ParameterTag::HopCount => self.hop_count = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::Importance => self.importance = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::MessagePriority => self.message_priority = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::CorrelationId => self.correlation_id = Some(tlv::read_u32(tag, &value)?),
            ParameterTag::Segmentation => {
                self.segmentation = Some(Segmentation::decode(tlv::read_u32(tag, &value)?))
            }
            ParameterTag::Data => self.data = value,
            _ => {}
        }
        Ok(())
    }
}

/// CLDR message (Connectionless Data Response)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cldr {
    pub routing_context: Vec<u32>,
    /// SCCP return cause
    pub cause: u32,
    pub source: SccpAddress,
    pub destination: SccpAddress,
    pub hop_count: Option<u8>,
    pub importance: Option<u8>,
    pub message_priority: Option<u8>,
    pub correlation_id: Option<u32>,
    pub segmentation: Option<Segmentation>,
    pub data: Option<Bytes>,
}

impl Parameters for Cldr {
    fn marshal(&self, buf: &mut BytesMut) {
        put_routing_context(buf, &self.routing_context);
        put_u32_param(buf, ParameterTag::SccpCause, self.cause);
        self.source.marshal(buf, ParameterTag::SourceAddress);
        self.destination.marshal(buf, ParameterTag::DestinationAddress);
        put_optional(
            buf,
            self.hop_count,
            self.importance,
            self.message_priority,
            self.correlation_id,
            self.segmentation,
        );
        if let Some(data) = &self.data {
            put_data(buf, data);
        }
    }

    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError> {
        match tag {
            ParameterTag::RoutingContext => self.routing_context = tlv::read_routing_context(&value)?,
            ParameterTag::SccpCause => self.cause = tlv::read_u32(tag, &value)?,
            ParameterTag::SourceAddress => self.source = SccpAddress::unmarshal(tag, value)?,
            ParameterTag::DestinationAddress => self.destination = SccpAddress::unmarshal(tag, value)?,
            ParameterTag::HopCount => self.hop_count = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::Importance => self.importance = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::MessagePriority => self.message_priority = Some(tlv::read_u8(tag, &value)?),
            ParameterTag::CorrelationId => self.correlation_id = Some(tlv::read_u32(tag, &value)?),
            ParameterTag::Segmentation => {
                self.segmentation = Some(Segmentation::decode(tlv::read_u32(tag, &value)?))
            }
            ParameterTag::Data => self.data = Some(value),
            _ => {}
        }
        Ok(())
    }
}

fn put_optional(
    buf: &mut BytesMut,
    hop_count: Option<u8>,
    importance: Option<u8>,
    message_priority: Option<u8>,
    correlation_id: Option<u32>,
    segmentation: Option<Segmentation>,
) {
    if let Some(hops) = hop_count {
        put_u8_param(buf, ParameterTag::HopCount, hops);
    }
    if let Some(importance) = importance {
        put_u8_param(buf, ParameterTag::Importance, importance);
    }
    if let Some(priority) = message_priority {
        put_u8_param(buf, ParameterTag::MessagePriority, priority);
    }
    if let Some(id) = correlation_id {
        put_u32_param(buf, ParameterTag::CorrelationId, id);
    }
    if let Some(seg) = segmentation {
        put_u32_param(buf, ParameterTag::Segmentation, seg.encode());
    }
}
