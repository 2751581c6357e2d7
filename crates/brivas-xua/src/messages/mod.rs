//! xUA Message Catalog
//!
//! One variant per wire message. Each payload type knows its TLV layout
//! through [`Parameters`]; [`Message`] owns the (class, type) mapping and
//! dispatches inbound frames to the right payload.

mod aspsm;
mod asptm;
mod cl;
mod mgmt;
mod ssnm;

pub use aspsm::{AspStateInfo, AspUp, Heartbeat};
pub use asptm::{AspActive, AspInactive};
pub use cl::{Cldr, Cldt};
pub use mgmt::{ErrorMessage, Notify};
pub use ssnm::{Congestion, DestinationAudit, DestinationState, UserCause, UserPartUnavailable};

use crate::codec::tlv::next_element;
use crate::codec::{encode_frame, split_frame, ParameterTag};
use crate::errors::CodecError;
use crate::types::MessageClass;
use bytes::{Bytes, BytesMut};
use tracing::trace;

/// TLV body of a message
pub trait Parameters: Default {
    /// Parameters that must be present on decode
    const MANDATORY: &'static [ParameterTag] = &[];

    /// Append every present parameter to `buf`
    fn marshal(&self, buf: &mut BytesMut);

    /// Consume one recognised parameter. Tags outside the message's set are ignored.
    fn unmarshal(&mut self, tag: ParameterTag, value: Bytes) -> Result<(), CodecError>;
}

/// Run the TLV loop over a message body
pub fn decode_body<T: Parameters>(mut body: Bytes) -> Result<T, CodecError> {
    let mut msg = T::default();
    let mut seen = Vec::with_capacity(8);

    while let Some((raw, value)) = next_element(&mut body)? {
        match ParameterTag::from_u16(raw) {
            Some(tag) => {
                msg.unmarshal(tag, value)?;
                seen.push(tag);
            }
            None => trace!(tag = raw, len = value.len(), "Skipping unknown parameter"),
        }
    }

    if let Some(missing) = T::MANDATORY.iter().find(|tag| !seen.contains(tag)) {
        return Err(CodecError::MissingParameter(parameter_name(*missing)));
    }

    Ok(msg)
}

fn parameter_name(tag: ParameterTag) -> &'static str {
    match tag {
        ParameterTag::ErrorCode => "Error Code",
        ParameterTag::Status => "Status",
        ParameterTag::Data => "Data",
        _ => "parameter",
    }
}

/// xUA Message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Management (MGMT)
    Error(ErrorMessage),
    Notify(Notify),

    // SS7 Signalling Network Management (SSNM)
    Duna(DestinationState),
    Dava(DestinationState),
    Daud(DestinationAudit),
    Scon(Congestion),
    Dupu(UserPartUnavailable),
    Drst(DestinationState),

    // ASP State Maintenance (ASPSM)
    AspUp(AspUp),
    AspDown(AspStateInfo),
    Heartbeat(Heartbeat),
    AspUpAck(AspStateInfo),
    AspDownAck(AspStateInfo),
    HeartbeatAck(Heartbeat),

    // ASP Traffic Maintenance (ASPTM)
    AspActive(AspActive),
    AspInactive(AspInactive),
    AspActiveAck(AspActive),
    AspInactiveAck(AspInactive),

    // Connectionless (CL)
    Cldt(Cldt),
    Cldr(Cldr),
}

impl Message {
    pub fn class(&self) -> MessageClass {
        match self {
            Self::Error(_) | Self::Notify(_) => MessageClass::Management,
            Self::Duna(_)
            | Self::Dava(_)
            | Self::Daud(_)
            | Self::Scon(_)
            | Self::Dupu(_)
            | Self::Drst(_) => MessageClass::Ssnm,
            Self::AspUp(_)
            | Self::AspDown(_)
            | Self::Heartbeat(_)
            | Self::AspUpAck(_)
            | Self::AspDownAck(_)
            | Self::HeartbeatAck(_) => MessageClass::Aspsm,
            Self::AspActive(_)
            | Self::AspInactive(_)
            | Self::AspActiveAck(_)
            | Self::AspInactiveAck(_) => MessageClass::Asptm,
            Self::Cldt(_) | Self::Cldr(_) => MessageClass::Cl,
        }
    }

    pub fn message_type(&self) -> u8 {
        match self {
            Self::Error(_) => 0x00,
            Self::Notify(_) => 0x01,
            Self::Duna(_) => 0x01,
            Self::Dava(_) => 0x02,
            Self::Daud(_) => 0x03,
            Self::Scon(_) => 0x04,
            Self::Dupu(_) => 0x05,
            Self::Drst(_) => 0x06,
            Self::AspUp(_) => 0x01,
            Self::AspDown(_) => 0x02,
            Self::Heartbeat(_) => 0x03,
            Self::AspUpAck(_) => 0x04,
            Self::AspDownAck(_) => 0x05,
            Self::HeartbeatAck(_) => 0x06,
            Self::AspActive(_) => 0x01,
            Self::AspInactive(_) => 0x02,
            Self::AspActiveAck(_) => 0x03,
            Self::AspInactiveAck(_) => 0x04,
            Self::Cldt(_) => 0x01,
            Self::Cldr(_) => 0x02,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Error(_) => "ERR",
            Self::Notify(_) => "NTFY",
            Self::Duna(_) => "DUNA",
            Self::Dava(_) => "DAVA",
            Self::Daud(_) => "DAUD",
            Self::Scon(_) => "SCON",
            Self::Dupu(_) => "DUPU",
            Self::Drst(_) => "DRST",
            Self::AspUp(_) => "ASPUP",
            Self::AspDown(_) => "ASPDN",
            Self::Heartbeat(_) => "BEAT",
            Self::AspUpAck(_) => "ASPUP Ack",
            Self::AspDownAck(_) => "ASPDN Ack",
            Self::HeartbeatAck(_) => "BEAT Ack",
            Self::AspActive(_) => "ASPAC",
            Self::AspInactive(_) => "ASPIA",
            Self::AspActiveAck(_) => "ASPAC Ack",
            Self::AspInactiveAck(_) => "ASPIA Ack",
            Self::Cldt(_) => "CLDT",
            Self::Cldr(_) => "CLDR",
        }
    }

    /// Encode the TLV body
    pub fn marshal(&self, buf: &mut BytesMut) {
        match self {
            Self::Error(m) => m.marshal(buf),
            Self::Notify(m) => m.marshal(buf),
            Self::Duna(m) | Self::Dava(m) | Self::Drst(m) => m.marshal(buf),
            Self::Daud(m) => m.marshal(buf),
            Self::Scon(m) => m.marshal(buf),
            Self::Dupu(m) => m.marshal(buf),
            Self::AspUp(m) => m.marshal(buf),
            Self::AspDown(m) | Self::AspUpAck(m) | Self::AspDownAck(m) => m.marshal(buf),
            Self::Heartbeat(m) | Self::HeartbeatAck(m) => m.marshal(buf),
            Self::AspActive(m) | Self::AspActiveAck(m) => m.marshal(buf),
            Self::AspInactive(m) | Self::AspInactiveAck(m) => m.marshal(buf),
            Self::Cldt(m) => m.marshal(buf),
            Self::Cldr(m) => m.marshal(buf),
        }
    }

    /// Encode header and body into a complete frame
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        self.marshal(&mut body);
        encode_frame(self.class() as u8, self.message_type(), &body)
    }

    /// Decode a complete frame
    pub fn decode(frame: Bytes) -> Result<Self, CodecError> {
        let (header, body) = split_frame(frame)?;

        let class = MessageClass::from_u8(header.class)
            .filter(|c| c.is_supported())
            .ok_or(CodecError::UnsupportedClass(header.class))?;

        let msg = match (class, header.msg_type) {
            (MessageClass::Management, 0x00) => Self::Error(decode_body(body)?),
            (MessageClass::Management, 0x01) => Self::Notify(decode_body(body)?),
            (MessageClass::Ssnm, 0x01) => Self::Duna(decode_body(body)?),
            (MessageClass::Ssnm, 0x02) => Self::Dava(decode_body(body)?),
            (MessageClass::Ssnm, 0x03) => Self::Daud(decode_body(body)?),
            (MessageClass::Ssnm, 0x04) => Self::Scon(decode_body(body)?),
            (MessageClass::Ssnm, 0x05) => Self::Dupu(decode_body(body)?),
            (MessageClass::Ssnm, 0x06) => Self::Drst(decode_body(body)?),
            (MessageClass::Aspsm, 0x01) => Self::AspUp(decode_body(body)?),
            (MessageClass::Aspsm, 0x02) => Self::AspDown(decode_body(body)?),
            (MessageClass::Aspsm, 0x03) => Self::Heartbeat(decode_body(body)?),
            (MessageClass::Aspsm, 0x04) => Self::AspUpAck(decode_body(body)?),
            (MessageClass::Aspsm, 0x05) => Self::AspDownAck(decode_body(body)?),
            (MessageClass::Aspsm, 0x06) => Self::HeartbeatAck(decode_body(body)?),
            (MessageClass::Asptm, 0x01) => Self::AspActive(decode_body(body)?),
            (MessageClass::Asptm, 0x02) => Self::AspInactive(decode_body(body)?),
            (MessageClass::Asptm, 0x03) => Self::AspActiveAck(decode_body(body)?),
            (MessageClass::Asptm, 0x04) => Self::AspInactiveAck(decode_body(body)?),
            (MessageClass::Cl, 0x01) => Self::Cldt(decode_body(body)?),
            (MessageClass::Cl, 0x02) => Self::Cldr(decode_body(body)?),
            _ => {
                return Err(CodecError::UnsupportedMessage {
                    class: header.class,
                    msg_type: header.msg_type,
                })
            }
        };

        Ok(msg)
    }
}
