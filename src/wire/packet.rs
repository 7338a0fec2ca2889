//! The closed sets of packet types for each dialect (§6), modeled as
//! tagged variants rather than raw integers — conversion from `u8` happens
//! only at the wire boundary (`decode_header`'s caller).

use std::convert::TryFrom;

/// Packet types exchanged under the client dialect (6-byte header),
/// including the server→manager diagnostic packet which reuses this
/// dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPacketType {
    SysSuccess,
    SysError,
    AccLogin,
    AccLoginSuccess,
    AccLogout,
    AccCreate,
    AccEdit,
    ChtSend,
    LstGet,
    LstResponse,
    GrpJoin,
    GrpExit,
    GrpCreate,
    /// Server→manager diagnostic packet (wire value 0x0A, same byte as
    /// `AccLogin` — the two share a value because they belong to
    /// different logical channels that never read each other's frames).
    SvrDiagnostic,
}

impl ClientPacketType {
    pub fn wire_value(self) -> u8 {
        match self {
            ClientPacketType::SysSuccess => 0x00,
            ClientPacketType::SysError => 0x01,
            ClientPacketType::AccLogin => 0x0A,
            ClientPacketType::AccLoginSuccess => 0x0B,
            ClientPacketType::AccLogout => 0x0C,
            ClientPacketType::AccCreate => 0x0D,
            ClientPacketType::AccEdit => 0x0E,
            ClientPacketType::ChtSend => 0x14,
            ClientPacketType::LstGet => 0x1E,
            ClientPacketType::LstResponse => 0x1F,
            ClientPacketType::GrpJoin => 0x28,
            ClientPacketType::GrpExit => 0x29,
            ClientPacketType::GrpCreate => 0x2A,
            ClientPacketType::SvrDiagnostic => 0x0A,
        }
    }

    /// Convert an incoming header's raw `type` byte to a packet type,
    /// treating `AccLogin`'s wire value as the client-originated variant
    /// (diagnostics are never read back by this decoder; they are only
    /// ever encoded for the manager socket).
    pub fn from_request_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => ClientPacketType::SysSuccess,
            0x01 => ClientPacketType::SysError,
            0x0A => ClientPacketType::AccLogin,
            0x0B => ClientPacketType::AccLoginSuccess,
            0x0C => ClientPacketType::AccLogout,
            0x0D => ClientPacketType::AccCreate,
            0x0E => ClientPacketType::AccEdit,
            0x14 => ClientPacketType::ChtSend,
            0x1E => ClientPacketType::LstGet,
            0x1F => ClientPacketType::LstResponse,
            0x28 => ClientPacketType::GrpJoin,
            0x29 => ClientPacketType::GrpExit,
            0x2A => ClientPacketType::GrpCreate,
            _ => return None,
        })
    }
}

impl TryFrom<u8> for ClientPacketType {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_request_byte(byte).ok_or(())
    }
}

/// Packet types exchanged under the manager dialect (4-byte header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerPacketType {
    ManSuccess,
    ManError,
    SvrDiagnostic,
    UsrOnline,
    SvrOnline,
    SvrOffline,
    SvrStart,
    SvrStop,
}

impl ManagerPacketType {
    pub fn wire_value(self) -> u8 {
        match self {
            ManagerPacketType::ManSuccess => 0x00,
            ManagerPacketType::ManError => 0x01,
            ManagerPacketType::SvrDiagnostic => 0x0A,
            ManagerPacketType::UsrOnline => 0x0B,
            ManagerPacketType::SvrOnline => 0x0C,
            ManagerPacketType::SvrOffline => 0x0D,
            ManagerPacketType::SvrStart => 0x14,
            ManagerPacketType::SvrStop => 0x15,
        }
    }
}

impl TryFrom<u8> for ManagerPacketType {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x00 => ManagerPacketType::ManSuccess,
            0x01 => ManagerPacketType::ManError,
            0x0A => ManagerPacketType::SvrDiagnostic,
            0x0B => ManagerPacketType::UsrOnline,
            0x0C => ManagerPacketType::SvrOnline,
            0x0D => ManagerPacketType::SvrOffline,
            0x14 => ManagerPacketType::SvrStart,
            0x15 => ManagerPacketType::SvrStop,
            _ => return Err(()),
        })
    }
}
