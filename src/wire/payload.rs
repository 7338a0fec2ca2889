//! Payload decoding (§4.1 operation 2: `decode_payload`).
//!
//! Centralizes the per-type expected-field extraction §6's payload table
//! describes, so call sites match on a typed [`PayloadView`] instead of
//! running their own ad hoc [`crate::wire::ber::FieldReader`] sequence.

use crate::wire::ber::FieldReader;
use crate::wire::header::Header;
use crate::wire::packet::ClientPacketType;
use crate::wire::ErrorCode;

/// The fields extracted from a client-dialect payload, one variant per
/// packet type that carries fields. Types with an empty payload (like
/// `ACC_LOGOUT`) decode to [`PayloadView::Empty`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadView {
    Empty,
    AccLogin { username: String, password: String },
    AccCreate { username: String, password: String },
    AccEdit { new_password: String },
    ChtSend { message: String },
}

/// Decode `bytes` according to the packet type named by `header`.
///
/// Fails with [`ErrorCode::InvReq`] if fewer bytes than `header.payload_len`
/// were supplied, the packet type is unrecognized or carries no known
/// field table (reserved/diagnostic/response types are never decoded this
/// way), an expected tag is missing, or a declared field length runs past
/// the end of the payload.
pub fn decode_payload(header: &Header, bytes: &[u8]) -> Result<PayloadView, ErrorCode> {
    if bytes.len() < header.payload_len as usize {
        return Err(ErrorCode::InvReq);
    }
    let bytes = &bytes[..header.payload_len as usize];

    let packet_type =
        ClientPacketType::from_request_byte(header.packet_type).ok_or(ErrorCode::InvReq)?;

    match packet_type {
        ClientPacketType::AccLogin => {
            let mut reader = FieldReader::new(bytes);
            let username = reader.expect_string()?;
            let password = reader.expect_string()?;
            Ok(PayloadView::AccLogin { username, password })
        }
        ClientPacketType::AccCreate => {
            let mut reader = FieldReader::new(bytes);
            let username = reader.expect_string()?;
            let password = reader.expect_string()?;
            Ok(PayloadView::AccCreate { username, password })
        }
        ClientPacketType::AccEdit => {
            let mut reader = FieldReader::new(bytes);
            let new_password = reader.expect_string()?;
            Ok(PayloadView::AccEdit { new_password })
        }
        ClientPacketType::AccLogout => Ok(PayloadView::Empty),
        ClientPacketType::ChtSend => {
            let mut reader = FieldReader::new(bytes);
            let message = reader.expect_string()?;
            Ok(PayloadView::ChtSend { message })
        }
        _ => Err(ErrorCode::InvReq),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ber::encode_string;

    fn login_payload() -> Vec<u8> {
        let mut payload = Vec::new();
        encode_string(&mut payload, "ali");
        encode_string(&mut payload, "pw");
        payload
    }

    #[test]
    fn decodes_acc_login_fields() {
        let payload = login_payload();
        let header = Header::new(
            ClientPacketType::AccLogin.wire_value(),
            3,
            0,
            payload.len() as u16,
        );
        match decode_payload(&header, &payload).unwrap() {
            PayloadView::AccLogin { username, password } => {
                assert_eq!(username, "ali");
                assert_eq!(password, "pw");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn decodes_acc_create_fields() {
        let payload = login_payload();
        let header = Header::new(
            ClientPacketType::AccCreate.wire_value(),
            3,
            0,
            payload.len() as u16,
        );
        match decode_payload(&header, &payload).unwrap() {
            PayloadView::AccCreate { username, password } => {
                assert_eq!(username, "ali");
                assert_eq!(password, "pw");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn decodes_acc_edit_field() {
        let mut payload = Vec::new();
        encode_string(&mut payload, "newpass");
        let header = Header::new(
            ClientPacketType::AccEdit.wire_value(),
            3,
            0,
            payload.len() as u16,
        );
        match decode_payload(&header, &payload).unwrap() {
            PayloadView::AccEdit { new_password } => assert_eq!(new_password, "newpass"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn decodes_acc_logout_as_empty() {
        let header = Header::new(ClientPacketType::AccLogout.wire_value(), 3, 0, 0);
        assert_eq!(decode_payload(&header, &[]).unwrap(), PayloadView::Empty);
    }

    #[test]
    fn decodes_cht_send_field() {
        let mut payload = Vec::new();
        encode_string(&mut payload, "hello");
        let header = Header::new(
            ClientPacketType::ChtSend.wire_value(),
            3,
            0,
            payload.len() as u16,
        );
        match decode_payload(&header, &payload).unwrap() {
            PayloadView::ChtSend { message } => assert_eq!(message, "hello"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn rejects_declared_length_exceeding_available_bytes() {
        let header = Header::new(ClientPacketType::ChtSend.wire_value(), 3, 0, 50);
        let payload = vec![0x0C, 0x02, b'h', b'i'];
        assert_eq!(
            decode_payload(&header, &payload).unwrap_err(),
            ErrorCode::InvReq
        );
    }

    #[test]
    fn rejects_missing_expected_tag() {
        let header = Header::new(ClientPacketType::AccLogin.wire_value(), 3, 0, 0);
        assert_eq!(
            decode_payload(&header, &[]).unwrap_err(),
            ErrorCode::InvReq
        );
    }

    #[test]
    fn unsupported_reserved_type_is_invalid_request() {
        let header = Header::new(ClientPacketType::LstGet.wire_value(), 3, 0, 0);
        assert_eq!(
            decode_payload(&header, &[]).unwrap_err(),
            ErrorCode::InvReq
        );
    }
}
