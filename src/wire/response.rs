//! Server-originated response encoding (§4.1 operations 3 and 4).

use crate::wire::ber;
use crate::wire::header::{Dialect, Header};
use crate::wire::packet::ClientPacketType;
use crate::wire::ErrorCode;

/// A server-originated response, prior to encoding. All responses are
/// sent under the client dialect with `sender_id = 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSpec {
    /// `SYS_SUCCESS`, with an optional assigned user id.
    Success { user_id: Option<u32> },
    /// `ACC_LOGIN_SUCCESS`, sent for both successful `ACC_LOGIN` and
    /// successful `ACC_CREATE` (§8 scenario 1).
    LoginOrCreateSuccess { user_id: u32 },
}

/// Encode a success response. The header's `payload_len` is always the
/// exact number of payload bytes written.
pub fn encode_response(spec: &ResponseSpec, version: u8) -> Vec<u8> {
    let mut payload = Vec::new();
    let packet_type = match spec {
        ResponseSpec::Success { user_id } => {
            if let Some(id) = user_id {
                ber::encode_integer(&mut payload, *id);
            }
            ClientPacketType::SysSuccess
        }
        ResponseSpec::LoginOrCreateSuccess { user_id } => {
            ber::encode_integer(&mut payload, *user_id);
            ClientPacketType::AccLoginSuccess
        }
    };

    let header = Header::new(
        packet_type.wire_value(),
        version,
        0,
        payload.len() as u16,
    );
    let mut out = Vec::with_capacity(6 + payload.len());
    header.encode(Dialect::Client, &mut out);
    out.extend_from_slice(&payload);
    out
}

/// Encode a `SYS_ERROR` response (§4.1 operation 4). Returns `None` for
/// `ACC_LOGOUT` requests: logout failures are silent and never produce a
/// packet.
pub fn encode_error(code: ErrorCode, request_type: ClientPacketType, version: u8) -> Option<Vec<u8>> {
    if request_type == ClientPacketType::AccLogout {
        return None;
    }

    let mut payload = Vec::new();
    ber::encode_integer(&mut payload, code.wire_value() as u32);
    ber::encode_string(&mut payload, code.message());

    let header = Header::new(
        ClientPacketType::SysError.wire_value(),
        version,
        0,
        payload.len() as u16,
    );
    let mut out = Vec::with_capacity(6 + payload.len());
    header.encode(Dialect::Client, &mut out);
    out.extend_from_slice(&payload);
    Some(out)
}
