//! Error taxonomy (§7). Every failure a handler or the codec can report is
//! one of these variants; each carries its own wire value and human string
//! so `encode_error` never has to consult a side table.

use thiserror::Error;

/// The closed set of error codes the wire protocol can report.
///
/// `EC_GOOD` (0x00) is deliberately not a variant here: it is the absence
/// of an error, represented by `Ok(_)` in handler signatures, not a value
/// of this enum.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    #[error("Invalid User ID")]
    InvUserId,
    #[error("Invalid Authentication")]
    InvAuthInfo,
    #[error("User Already Exist")]
    UserExists,
    #[error("Server Error")]
    Server,
    #[error("Invalid message")]
    InvReq,
    #[error("message Timeout")]
    ReqTimeout,
}

impl ErrorCode {
    /// The numeric code carried on the wire inside the `SYS_ERROR` payload.
    pub fn wire_value(self) -> u8 {
        match self {
            ErrorCode::InvUserId => 0x0B,
            ErrorCode::InvAuthInfo => 0x0C,
            ErrorCode::UserExists => 0x0D,
            ErrorCode::Server => 0x15,
            ErrorCode::InvReq => 0x1F,
            ErrorCode::ReqTimeout => 0x20,
        }
    }

    /// The fixed human-readable string paired with this code on the wire.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::InvUserId => "Invalid User ID",
            ErrorCode::InvAuthInfo => "Invalid Authentication",
            ErrorCode::UserExists => "User Already Exist",
            ErrorCode::Server => "Server Error",
            ErrorCode::InvReq => "Invalid message",
            ErrorCode::ReqTimeout => "message Timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_match_taxonomy() {
        assert_eq!(ErrorCode::InvUserId.wire_value(), 0x0B);
        assert_eq!(ErrorCode::InvAuthInfo.wire_value(), 0x0C);
        assert_eq!(ErrorCode::UserExists.wire_value(), 0x0D);
        assert_eq!(ErrorCode::Server.wire_value(), 0x15);
        assert_eq!(ErrorCode::InvReq.wire_value(), 0x1F);
        assert_eq!(ErrorCode::ReqTimeout.wire_value(), 0x20);
    }

    #[test]
    fn messages_match_fixed_table() {
        assert_eq!(ErrorCode::UserExists.message(), "User Already Exist");
        assert_eq!(ErrorCode::Server.message(), "Server Error");
    }
}
