//! # Brivas xUA ASP Engine
//!
//! ASP side of a SIGTRAN user adaptation peering (SUA, with M3UA-compatible
//! management classes) towards a Signalling Gateway:
//!
//! - **Codec** - fixed 8-byte header, TLV parameters, SCCP address sub-TLVs
//! - **Messages** - MGMT, SSNM, ASPSM, ASPTM and connectionless (CL) catalog
//! - **ASP** - Down/Inactive/Active state machine with request correlation
//! - **Transport** - message-oriented association boundary (framed TCP, in-memory)
//!
//! ## Example
//! ```rust,ignore
//! use brivas_xua::{Asp, Handlers, SccpAddress, TcpTransport, XuaConfig};
//!
//! let config = XuaConfig::load("xua.json")?;
//! let transport = TcpTransport::new(config.transport.clone());
//! let asp = Asp::new(config, transport)?;
//!
//! let handlers = Handlers::new()
//!     .on_data(|payload| println!("received {} bytes", payload.len()))
//!     .on_up(|| println!("ASP active"));
//!
//! // Blocks until the association goes down
//! asp.serve(handlers).await?;
//! ```

pub mod asp;
pub mod codec;
pub mod config;
pub mod errors;
pub mod messages;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-exports
pub use config::XuaConfig;
pub use errors::{CodecError, Result, TransportError, XuaError};
pub use types::*;

pub use asp::{Asp, AspState, Handlers};
pub use codec::address::{GlobalTitle, SccpAddress};
pub use messages::Message;
pub use transport::{MemoryPeer, MemoryTransport, TcpTransport, Transport, TransportEvent};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default SCTP port for SUA
pub const DEFAULT_SUA_PORT: u16 = 14001;

/// Default SCTP port for M3UA
pub const DEFAULT_M3UA_PORT: u16 = 2905;

/// SCTP Payload Protocol Identifiers
pub mod ppid {
    pub const M3UA: u32 = 3;
    pub const SUA: u32 = 4;
}
