//! Chat message handling (§4.1/§4.2 `CHT_SEND`).
//!
//! `CHT_SEND` has no reply on success; the multiplexer decodes the
//! `CHT_SEND` payload via [`crate::wire::decode_payload`] and increments
//! `msg_count` itself once this handler returns `Ok`, so this module's only
//! job is the message's business-rule validation beyond field extraction.

use crate::wire::ErrorCode;

const MAX_MESSAGE_LEN: usize = 255;

/// Validate an already-decoded `CHT_SEND` message string.
///
/// Fails with [`ErrorCode::InvReq`] if the message is empty or exceeds the
/// wire's 255-byte field limit.
pub fn handle_send(message: &str) -> Result<(), ErrorCode> {
    if message.is_empty() || message.len() > MAX_MESSAGE_LEN {
        return Err(ErrorCode::InvReq);
    }
    Ok(())
}
