//! The server→manager diagnostic packet (§5, §6).
//!
//! Built once at multiplexer start; header, tags, and lengths are
//! constants, so each tick only overwrites the two integer value
//! positions in place rather than re-encoding the whole buffer.

use crate::wire::ber::TAG_INTEGER;
use crate::wire::header::{Dialect, Header};
use crate::wire::packet::ClientPacketType;

/// Total size of the diagnostic packet: 6-byte header + 10-byte payload.
pub const DIAGNOSTIC_LEN: usize = 16;

const USER_COUNT_VALUE_OFFSET: usize = 8;
const MSG_COUNT_VALUE_OFFSET: usize = 12;

/// A 16-byte diagnostic buffer, rewritten in place on each tick.
pub struct Diagnostic {
    buf: [u8; DIAGNOSTIC_LEN],
}

impl Diagnostic {
    /// Build the fixed buffer: `{0x0A, 0x03, 0x0000, 0x000A}` header,
    /// `{0x02, 0x02, user_count}` and `{0x02, 0x04, msg_count}` fields,
    /// both initialized to zero.
    pub fn new(version: u8) -> Self {
        let header = Header::new(ClientPacketType::SvrDiagnostic.wire_value(), version, 0, 10);
        let mut out = Vec::with_capacity(DIAGNOSTIC_LEN);
        header.encode(Dialect::Client, &mut out);
        out.push(TAG_INTEGER);
        out.push(2);
        out.extend_from_slice(&0u16.to_be_bytes());
        out.push(TAG_INTEGER);
        out.push(4);
        out.extend_from_slice(&0u32.to_be_bytes());

        let mut buf = [0u8; DIAGNOSTIC_LEN];
        buf.copy_from_slice(&out);
        Self { buf }
    }

    /// Rewrite the two counter values in place and return the full buffer
    /// ready to write to the manager socket.
    pub fn render(&mut self, user_count: u16, msg_count: u32) -> &[u8; DIAGNOSTIC_LEN] {
        self.buf[USER_COUNT_VALUE_OFFSET..USER_COUNT_VALUE_OFFSET + 2]
            .copy_from_slice(&user_count.to_be_bytes());
        self.buf[MSG_COUNT_VALUE_OFFSET..MSG_COUNT_VALUE_OFFSET + 4]
            .copy_from_slice(&msg_count.to_be_bytes());
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_concrete_diagnostic_scenario() {
        let mut diag = Diagnostic::new(3);
        let bytes = diag.render(2, 7);
        assert_eq!(
            bytes,
            &[
                0x0A, 0x03, 0x00, 0x00, 0x00, 0x0A, 0x02, 0x02, 0x00, 0x02, 0x02, 0x04, 0x00,
                0x00, 0x00, 0x07,
            ]
        );
    }

    #[test]
    fn rerendering_updates_counters_without_changing_layout() {
        let mut diag = Diagnostic::new(3);
        diag.render(1, 1);
        let bytes = diag.render(5, 9);
        assert_eq!(bytes[0], 0x0A);
        assert_eq!(u16::from_be_bytes([bytes[8], bytes[9]]), 5);
        assert_eq!(u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]), 9);
    }
}
