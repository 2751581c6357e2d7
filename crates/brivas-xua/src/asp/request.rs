//! ASP requests that expect an acknowledgement

use super::AspState;
use crate::config::XuaConfig;
use crate::errors::{Result, XuaError};
use crate::messages::{AspActive, AspStateInfo, AspUp, Message};

/// Outstanding request kinds. At most one is pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    AspUp,
    AspActive,
    AspDown,
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AspUp => "ASPUP",
            Self::AspActive => "ASPAC",
            Self::AspDown => "ASPDN",
        }
    }

    /// Message sent for this request
    pub fn build(&self, config: &XuaConfig) -> Message {
        match self {
            Self::AspUp => Message::AspUp(AspUp {
                asp_identifier: config.asp.asp_identifier,
                info_string: config.asp.info_string.clone(),
            }),
            Self::AspActive => Message::AspActive(AspActive {
                traffic_mode: Some(config.asp.traffic_mode),
                routing_context: config.asp.routing_context.clone(),
                info_string: None,
            }),
            Self::AspDown => Message::AspDown(AspStateInfo::default()),
        }
    }

    /// Map a response onto the request outcome
    pub fn resolve(&self, response: &Message) -> Result<()> {
        match (self, response) {
            (Self::AspUp, Message::AspUpAck(_))
            | (Self::AspActive, Message::AspActiveAck(_))
            | (Self::AspDown, Message::AspDownAck(_)) => Ok(()),
            (_, Message::Error(err)) => Err(XuaError::Peer {
                code: err.error_code,
            }),
            (_, other) => Err(XuaError::UnexpectedResult {
                request: self.name(),
                received: other.name(),
            }),
        }
    }

    /// State entered once the request is acknowledged
    pub fn next_state(&self) -> AspState {
        match self {
            Self::AspUp => AspState::Inactive,
            Self::AspActive => AspState::Active,
            Self::AspDown => AspState::Down,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ErrorMessage;
    use crate::types::{ErrorCode, TrafficModeType};

    #[test]
    fn test_build_aspac_from_config() {
        let mut config = XuaConfig::default();
        config.asp.routing_context = vec![101];

        let msg = RequestKind::AspActive.build(&config);
        assert_eq!(
            msg,
            Message::AspActive(AspActive {
                traffic_mode: Some(TrafficModeType::Loadshare),
                routing_context: vec![101],
                info_string: None,
            })
        );
    }

    #[test]
    fn test_aspup_omits_unconfigured_identity() {
        let msg = RequestKind::AspUp.build(&XuaConfig::default());
        assert_eq!(msg, Message::AspUp(AspUp::default()));
    }

    #[test]
    fn test_resolve() {
        assert!(RequestKind::AspUp
            .resolve(&Message::AspUpAck(AspStateInfo::default()))
            .is_ok());

        let err = RequestKind::AspActive
            .resolve(&Message::Error(ErrorMessage::new(ErrorCode::PROTOCOL_ERROR)))
            .unwrap_err();
        assert!(matches!(err, XuaError::Peer { code } if code == ErrorCode::PROTOCOL_ERROR));

        let err = RequestKind::AspUp
            .resolve(&Message::AspDownAck(AspStateInfo::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            XuaError::UnexpectedResult {
                request: "ASPUP",
                received: "ASPDN Ack"
            }
        ));
    }

    #[test]
    fn test_next_state() {
        assert_eq!(RequestKind::AspUp.next_state(), AspState::Inactive);
        assert_eq!(RequestKind::AspActive.next_state(), AspState::Active);
        assert_eq!(RequestKind::AspDown.next_state(), AspState::Down);
    }
}
