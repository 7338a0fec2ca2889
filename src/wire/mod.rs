//! # Wire Protocol Module
//!
//! The binary wire protocol: a fixed-size header in one of two dialects,
//! followed by a length-prefixed, BER-tagged payload.
//!
//! ## Dialects
//!
//! - **Client dialect** (6-byte header): client↔server packets, and the
//!   server→manager diagnostic packet.
//! - **Manager dialect** (4-byte header): starter↔manager command packets.
//!
//! ## Payload encoding
//!
//! Each field on the wire is `{tag: 1 byte, length: 1 byte, value: length
//! bytes}`. Only `INTEGER` (`0x02`) and `STRING` (`0x0C`) are produced by
//! this implementation; other BER tags are recognized but never emitted.

pub mod ber;
pub mod error;
pub mod header;
pub mod packet;
pub mod payload;
pub mod response;

pub use error::ErrorCode;
pub use header::{Dialect, Header};
pub use packet::{ClientPacketType, ManagerPacketType};
pub use payload::{decode_payload, PayloadView};
pub use response::{encode_error, encode_response, ResponseSpec};

/// Protocol version emitted by this implementation.
pub const PROTOCOL_VERSION: u8 = crate::defaults::PROTOCOL_VERSION;
