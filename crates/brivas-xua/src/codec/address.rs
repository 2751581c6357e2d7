//! SCCP Addressing (Source/Destination Address parameters)

use super::tlv::{self, next_element, put_param, put_u32_param, put_u8_param};
use super::ParameterTag;
use crate::errors::CodecError;
use crate::types::{NatureOfAddress, NumberingPlan};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Routing Indicator: route on Global Title
pub const ROUTE_ON_GT: u16 = 1;
/// Routing Indicator: route on Point Code + SSN
pub const ROUTE_ON_SSN_PC: u16 = 2;

/// Address Indicator bits
pub const AI_GT: u16 = 0x04;
pub const AI_PC: u16 = 0x02;
pub const AI_SSN: u16 = 0x01;

/// Global Title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTitle {
    pub translation_type: u8,
    pub numbering_plan: u8,
    pub nature_of_address: u8,
    pub digits: String,
}

impl GlobalTitle {
    /// The digit count is carried in one octet
    pub const MAX_DIGITS: usize = u8::MAX as usize;

    pub fn new(digits: &str) -> Self {
        Self {
            translation_type: 0,
            numbering_plan: NumberingPlan::Unknown as u8,
            nature_of_address: NatureOfAddress::Unknown as u8,
            digits: digits.to_string(),
        }
    }

    /// Create E.164 Global Title (most common)
    pub fn e164(digits: &str) -> Self {
        Self {
            translation_type: 0,
            numbering_plan: NumberingPlan::IsdnTelephony as u8,
            nature_of_address: NatureOfAddress::International as u8,
            digits: digits.to_string(),
        }
    }

    /// Get GTI value derived from which classifiers are set
    pub fn gti(&self) -> u8 {
        let npi_unknown = self.numbering_plan == NumberingPlan::Unknown as u8;
        let nai_unknown = self.nature_of_address == NatureOfAddress::Unknown as u8;

        if self.translation_type == 0 && npi_unknown {
            1
        } else if nai_unknown && npi_unknown {
            2
        } else if nai_unknown {
            3
        } else {
            4
        }
    }

    fn digit_count(&self) -> usize {
        self.digits.chars().count().min(Self::MAX_DIGITS)
    }

    /// Reject digit strings the Number of Digits octet cannot describe
    pub fn check(&self) -> Result<(), CodecError> {
        let count = self.digits.chars().count();
        if count > Self::MAX_DIGITS {
            return Err(CodecError::InvalidAddress(format!(
                "{} global title digits, at most {} allowed",
                count,
                Self::MAX_DIGITS
            )));
        }
        Ok(())
    }

    /// Encode the Global Title sub-TLV
    pub fn encode(&self, buf: &mut BytesMut) {
        let count = self.digit_count();
        let mut value = BytesMut::with_capacity(8 + count.div_ceil(8) * 4);
        value.put_bytes(0, 3); // Reserved
        value.put_u8(self.gti());
        value.put_u8(count as u8);
        value.put_u8(self.translation_type);
        value.put_u8(self.numbering_plan);
        value.put_u8(self.nature_of_address);

        let bcd = encode_bcd_digits(&self.digits, count);
        let bcd_len = bcd.len();
        value.put_slice(&bcd);
        value.put_bytes(0, tlv::padding(bcd_len));

        put_param(buf, ParameterTag::GlobalTitle, &value);
    }

    /// Decode the Global Title sub-TLV value
    pub fn decode(mut value: Bytes) -> Result<Self, CodecError> {
        if value.remaining() < 8 {
            return Err(CodecError::InvalidParameterLength {
                tag: ParameterTag::GlobalTitle.value(),
                length: value.len() + tlv::PREFIX_LEN,
            });
        }

        // GTI is recomputed from the classifiers
        value.advance(4);
        let count = value.get_u8() as usize;
        let translation_type = value.get_u8();
        let numbering_plan = value.get_u8();
        let nature_of_address = value.get_u8();

        let digits = decode_bcd_digits(&value, count)?;

        Ok(Self {
            translation_type,
            numbering_plan,
            nature_of_address,
            digits,
        })
    }
}

/// SCCP Address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SccpAddress {
    /// Global Title (optional)
    pub global_title: Option<GlobalTitle>,
    /// Point Code (optional)
    pub point_code: Option<u32>,
    /// Subsystem Number (optional)
    pub subsystem_number: Option<u8>,
}

impl SccpAddress {
    /// Create address with SSN and PC
    pub fn from_ssn_pc(ssn: u8, pc: u32) -> Self {
        Self {
            global_title: None,
            point_code: Some(pc),
            subsystem_number: Some(ssn),
        }
    }

    /// Create address with Global Title
    pub fn from_gt(gt: GlobalTitle, ssn: Option<u8>) -> Self {
        Self {
            global_title: Some(gt),
            point_code: None,
            subsystem_number: ssn,
        }
    }

    pub fn routing_indicator(&self) -> u16 {
        if self.point_code.is_some() && self.subsystem_number.is_some() {
            ROUTE_ON_SSN_PC
        } else {
            ROUTE_ON_GT
        }
    }

    pub fn address_indicator(&self) -> u16 {
        let mut ai = 0;
        if self.global_title.is_some() {
            ai |= AI_GT;
        }
        if self.point_code.is_some() {
            ai |= AI_PC;
        }
        if self.subsystem_number.is_some() {
            ai |= AI_SSN;
        }
        ai
    }

    /// An address can be routed on its GT or on PC + SSN
    pub fn is_routable(&self) -> bool {
        self.global_title.is_some() || (self.point_code.is_some() && self.subsystem_number.is_some())
    }

    /// Routable, with an encodable Global Title
    pub fn check(&self, side: &str) -> Result<(), CodecError> {
        if !self.is_routable() {
            return Err(CodecError::InvalidAddress(format!("{} address is not routable", side)));
        }
        match &self.global_title {
            Some(gt) => gt.check(),
            None => Ok(()),
        }
    }

    /// Encode as a nested address parameter under `tag`
    pub fn marshal(&self, buf: &mut BytesMut, tag: ParameterTag) {
        let mut value = BytesMut::new();
        value.put_u16(self.routing_indicator());
        value.put_u16(self.address_indicator());

        if let Some(gt) = &self.global_title {
            gt.encode(&mut value);
        }
        if let Some(pc) = self.point_code {
            put_u32_param(&mut value, ParameterTag::PointCode, pc);
        }
        if let Some(ssn) = self.subsystem_number {
            put_u8_param(&mut value, ParameterTag::SubsystemNumber, ssn);
        }

        put_param(buf, tag, &value);
    }

    /// Decode the value of an address parameter
    pub fn unmarshal(tag: ParameterTag, mut value: Bytes) -> Result<Self, CodecError> {
        if value.remaining() < 4 {
            return Err(CodecError::InvalidParameterLength {
                tag: tag.value(),
                length: value.len() + tlv::PREFIX_LEN,
            });
        }

        // Routing and address indicators are derived from the sub-parameters
        let _routing_indicator = value.get_u16();
        let _address_indicator = value.get_u16();

        let mut address = Self::default();
        while let Some((raw, element)) = next_element(&mut value)? {
            match ParameterTag::from_u16(raw) {
                Some(ParameterTag::GlobalTitle) => {
                    address.global_title = Some(GlobalTitle::decode(element)?);
                }
                Some(ParameterTag::PointCode) => {
                    address.point_code = Some(tlv::read_u32(ParameterTag::PointCode, &element)?);
                }
                Some(ParameterTag::SubsystemNumber) => {
                    address.subsystem_number = Some(tlv::read_u8(ParameterTag::SubsystemNumber, &element)?);
                }
                _ => {}
            }
        }

        Ok(address)
    }
}

/// Pack digits two per byte, low nibble first.
///
/// Non-digit characters become 0 and an odd count leaves a zero filler nibble.
fn encode_bcd_digits(digits: &str, count: usize) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .chars()
        .take(count)
        .map(|c| c.to_digit(10).map(|d| d as u8).unwrap_or(0))
        .collect();

    nibbles
        .chunks(2)
        .map(|pair| match pair {
            [low, high] => low | (high << 4),
            [low] => *low,
            _ => 0,
        })
        .collect()
}

fn decode_bcd_digits(data: &Bytes, count: usize) -> Result<String, CodecError> {
    let needed = count.div_ceil(2);
    if data.len() < needed {
        return Err(CodecError::InvalidAddress(format!(
            "{} digits need {} bytes, have {}",
            count,
            needed,
            data.len()
        )));
    }

    let digits = (0..count)
        .map(|i| {
            let byte = data[i / 2];
            let nibble = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
            char::from_digit(nibble as u32, 16).unwrap_or('0')
        })
        .collect();

    Ok(digits)
}
