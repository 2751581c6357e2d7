//! Common types used across the xUA engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// xUA Message Class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageClass {
    Management = 0,
    Transfer = 1,
    Ssnm = 2,  // SS7 Signalling Network Management
    Aspsm = 3, // ASP State Maintenance
    Asptm = 4, // ASP Traffic Maintenance
    Qptm = 5,  // Q.921 Peer-to-Peer
    Maup = 6,  // MTP2 User Adaptation
    Cl = 7,    // Connectionless
    Co = 8,    // Connection-Oriented
    Rkm = 9,   // Routing Key Management
    Iim = 10,  // Interface Identifier Management
}

impl MessageClass {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Management),
            1 => Some(Self::Transfer),
            2 => Some(Self::Ssnm),
            3 => Some(Self::Aspsm),
            4 => Some(Self::Asptm),
            5 => Some(Self::Qptm),
            6 => Some(Self::Maup),
            7 => Some(Self::Cl),
            8 => Some(Self::Co),
            9 => Some(Self::Rkm),
            10 => Some(Self::Iim),
            _ => None,
        }
    }

    /// Whether this engine implements messages of the class
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::Management | Self::Ssnm | Self::Aspsm | Self::Asptm | Self::Cl
        )
    }
}

/// Traffic Mode Type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum TrafficModeType {
    Override = 1,
    #[default]
    Loadshare = 2,
    Broadcast = 3,
}

impl TrafficModeType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Override),
            2 => Some(Self::Loadshare),
            3 => Some(Self::Broadcast),
            _ => None,
        }
    }
}

/// Protocol Class for SCCP connectionless data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolClass {
    pub class: u8,
    pub return_on_error: bool,
}

impl ProtocolClass {
    pub const CLASS_0: Self = Self { class: 0, return_on_error: false };
    pub const CLASS_1: Self = Self { class: 1, return_on_error: false };

    pub fn with_return_on_error(mut self) -> Self {
        self.return_on_error = true;
        self
    }

    pub fn encode(&self) -> u8 {
        (self.class & 0x7F) | if self.return_on_error { 0x80 } else { 0 }
    }

    pub fn decode(v: u8) -> Self {
        Self {
            class: v & 0x7F,
            return_on_error: (v & 0x80) != 0,
        }
    }
}

/// Numbering Plan for Global Titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NumberingPlan {
    Unknown = 0,
    IsdnTelephony = 1, // E.164
    Generic = 2,
    Data = 3, // X.121
    Telex = 4,
    MaritimeMobile = 5,
    LandMobile = 6,
    IsdnMobile = 7, // E.214
}

/// Nature of Address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NatureOfAddress {
    Unknown = 0,
    SubscriberNumber = 1,
    Reserved = 2,
    NationalSignificant = 3,
    International = 4,
}

/// Affected Point Code entry (mask + 24-bit point code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffectedPointCode {
    pub mask: u8,
    pub point_code: u32,
}

impl AffectedPointCode {
    pub fn new(point_code: u32) -> Self {
        Self {
            mask: 0,
            point_code: point_code & 0x00FF_FFFF,
        }
    }

    pub fn encode(&self) -> u32 {
        ((self.mask as u32) << 24) | (self.point_code & 0x00FF_FFFF)
    }

    pub fn decode(v: u32) -> Self {
        Self {
            mask: (v >> 24) as u8,
            point_code: v & 0x00FF_FFFF,
        }
    }
}

/// Segmentation parameter of connectionless data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmentation {
    pub first: bool,
    pub remaining: u8,
    pub reference: u32,
}

impl Segmentation {
    pub fn encode(&self) -> u32 {
        let first = if self.first { 0x8000_0000 } else { 0 };
        first | ((self.remaining as u32 & 0x7F) << 24) | (self.reference & 0x00FF_FFFF)
    }

    pub fn decode(v: u32) -> Self {
        Self {
            first: (v & 0x8000_0000) != 0,
            remaining: ((v >> 24) & 0x7F) as u8,
            reference: v & 0x00FF_FFFF,
        }
    }
}

/// Error code carried by ERR messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const INVALID_VERSION: Self = Self(0x01);
    pub const UNSUPPORTED_MESSAGE_CLASS: Self = Self(0x03);
    pub const UNSUPPORTED_MESSAGE_TYPE: Self = Self(0x04);
    pub const UNSUPPORTED_TRAFFIC_MODE: Self = Self(0x05);
    pub const UNEXPECTED_MESSAGE: Self = Self(0x06);
    pub const PROTOCOL_ERROR: Self = Self(0x07);
    pub const INVALID_STREAM_ID: Self = Self(0x09);
    pub const REFUSED_MANAGEMENT_BLOCKING: Self = Self(0x0d);
    pub const ASP_ID_REQUIRED: Self = Self(0x0e);
    pub const INVALID_ASP_ID: Self = Self(0x0f);
    pub const INVALID_PARAMETER_VALUE: Self = Self(0x11);
    pub const PARAMETER_FIELD_ERROR: Self = Self(0x12);
    pub const UNEXPECTED_PARAMETER: Self = Self(0x13);
    pub const DESTINATION_STATUS_UNKNOWN: Self = Self(0x14);
    pub const INVALID_NETWORK_APPEARANCE: Self = Self(0x15);
    pub const MISSING_PARAMETER: Self = Self(0x16);
    pub const INVALID_ROUTING_CONTEXT: Self = Self(0x19);
    pub const NO_CONFIGURED_AS_FOR_ASP: Self = Self(0x1a);

    pub fn name(&self) -> &'static str {
        match self.0 {
            0x01 => "Invalid Version",
            0x03 => "Unsupported Message Class",
            0x04 => "Unsupported Message Type",
            0x05 => "Unsupported Traffic Handling Mode",
            0x06 => "Unexpected Message",
            0x07 => "Protocol Error",
            0x09 => "Invalid Stream Identifier",
            0x0d => "Refused - Management Blocking",
            0x0e => "ASP Identifier Required",
            0x0f => "Invalid ASP Identifier",
            0x11 => "Invalid Parameter Value",
            0x12 => "Parameter Field Error",
            0x13 => "Unexpected Parameter",
            0x14 => "Destination Status Unknown",
            0x15 => "Invalid Network Appearance",
            0x16 => "Missing Parameter",
            0x19 => "Invalid Routing Context",
            0x1a => "No Configured AS for ASP",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x} ({})", self.0, self.name())
    }
}

impl From<u32> for ErrorCode {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
