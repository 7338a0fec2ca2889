//! Header encode/decode for both wire dialects.
//!
//! Per the REDESIGN FLAGS, this models one `Header` type with a `Dialect`
//! discriminant rather than two distinct header types, since every field
//! but `sender_id` is shared between dialects.

use crate::wire::ErrorCode;

/// Which header shape is in play on a given socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// 6-byte header: client↔server, and the server→manager diagnostic.
    Client,
    /// 4-byte header: starter↔manager command channel.
    Manager,
}

impl Dialect {
    /// Size in bytes of this dialect's header.
    pub const fn header_len(self) -> usize {
        match self {
            Dialect::Client => 6,
            Dialect::Manager => 4,
        }
    }
}

/// A decoded packet header. `sender_id` is always `0` under the manager
/// dialect, which carries no sender field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub packet_type: u8,
    pub version: u8,
    pub sender_id: u16,
    pub payload_len: u16,
}

impl Header {
    pub fn new(packet_type: u8, version: u8, sender_id: u16, payload_len: u16) -> Self {
        Self {
            packet_type,
            version,
            sender_id,
            payload_len,
        }
    }

    /// Decode a header of the given dialect from its raw bytes.
    ///
    /// Fails with [`ErrorCode::InvReq`] if fewer than the dialect's header
    /// size was provided.
    pub fn decode(bytes: &[u8], dialect: Dialect) -> Result<Header, ErrorCode> {
        if bytes.len() < dialect.header_len() {
            return Err(ErrorCode::InvReq);
        }
        match dialect {
            Dialect::Client => {
                let packet_type = bytes[0];
                let version = bytes[1];
                let sender_id = u16::from_be_bytes([bytes[2], bytes[3]]);
                let payload_len = u16::from_be_bytes([bytes[4], bytes[5]]);
                Ok(Header::new(packet_type, version, sender_id, payload_len))
            }
            Dialect::Manager => {
                let packet_type = bytes[0];
                let version = bytes[1];
                let payload_len = u16::from_be_bytes([bytes[2], bytes[3]]);
                Ok(Header::new(packet_type, version, 0, payload_len))
            }
        }
    }

    /// Encode this header in the given dialect, appending to `out`.
    pub fn encode(&self, dialect: Dialect, out: &mut Vec<u8>) {
        match dialect {
            Dialect::Client => {
                out.push(self.packet_type);
                out.push(self.version);
                out.extend_from_slice(&self.sender_id.to_be_bytes());
                out.extend_from_slice(&self.payload_len.to_be_bytes());
            }
            Dialect::Manager => {
                out.push(self.packet_type);
                out.push(self.version);
                out.extend_from_slice(&self.payload_len.to_be_bytes());
            }
        }
    }
}
