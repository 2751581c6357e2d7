//! Error types for the xUA engine

use crate::asp::AspState;
use crate::types::ErrorCode;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, XuaError>;

/// Top-level xUA error
#[derive(Debug, Error)]
pub enum XuaError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Peer error: {code}")]
    Peer { code: ErrorCode },

    #[error("Timeout waiting for {request} response")]
    Timeout { request: &'static str },

    #[error("Request already pending: {pending}")]
    RequestPending { pending: &'static str },

    #[error("Unexpected result for {request}: got {received}")]
    UnexpectedResult {
        request: &'static str,
        received: &'static str,
    },

    #[error("Invalid state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: AspState,
        actual: AspState,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("ASP is already serving")]
    AlreadyServing,
}

/// Wire and parameter errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),

    #[error("Truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Length mismatch: header says {declared}, frame has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Invalid length {length} for parameter 0x{tag:04X}")]
    InvalidParameterLength { tag: u16, length: usize },

    #[error("Invalid value {value} for parameter 0x{tag:04X}")]
    InvalidValue { tag: u16, value: u32 },

    #[error("Unsupported message class: {0}")]
    UnsupportedClass(u8),

    #[error("Unsupported message: class={class}, type={msg_type}")]
    UnsupportedMessage { class: u8, msg_type: u8 },

    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid SCCP address: {0}")]
    InvalidAddress(String),
}

impl CodecError {
    /// Error code to report back to the peer for this decode failure
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidVersion(_) => ErrorCode::INVALID_VERSION,
            Self::UnsupportedClass(_) => ErrorCode::UNSUPPORTED_MESSAGE_CLASS,
            Self::UnsupportedMessage { .. } => ErrorCode::UNSUPPORTED_MESSAGE_TYPE,
            Self::MissingParameter(_) => ErrorCode::MISSING_PARAMETER,
            Self::InvalidValue { .. } | Self::InvalidAddress(_) => ErrorCode::INVALID_PARAMETER_VALUE,
            Self::Truncated { .. }
            | Self::LengthMismatch { .. }
            | Self::InvalidParameterLength { .. } => ErrorCode::PARAMETER_FIELD_ERROR,
        }
    }
}

/// Transport adapter errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Association closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
