//! # chatd
//!
//! Core of a small multi-tenant chat server: a binary wire protocol, a
//! single-threaded connection multiplexer, and a lifecycle coordinator
//! ("starter") that forks/execs the chat server on command from a separate
//! server-manager process.

pub mod accounts;
pub mod chat;
pub mod cli;
pub mod diagnostics;
pub mod lifecycle;
pub mod logging;
pub mod multiplexer;
pub mod session;
pub mod store;
pub mod wire;

pub use cli::Args;
pub use multiplexer::Multiplexer;
pub use wire::{ErrorCode, Header};

/// The current version of chatd.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Self bind address.
    pub const ADDRESS: &str = "127.0.0.1";
    /// Self bind port.
    pub const PORT: u16 = 8000;
    /// Server-manager address, as dialed by the starter.
    pub const MANAGER_ADDRESS: &str = "192.168.0.130";
    /// Server-manager port.
    pub const MANAGER_PORT: u16 = 9000;
    /// Slot table capacity (includes the listening socket's slot).
    pub const CAPACITY: usize = 5;
    /// Readiness-wait timeout driving persistence sync and diagnostics.
    pub const TICK: Duration = Duration::from_secs(5);
    /// Protocol version emitted by this implementation.
    pub const PROTOCOL_VERSION: u8 = 3;
    /// Default directory for the file-backed key-value store.
    pub const STORE_DIR: &str = "./chatd-data";
    /// Environment variable naming the inherited management descriptor.
    pub const MANAGER_FD_VAR: &str = "CHATD_MANAGER_FD";
    /// Default value of that descriptor (matches the historical compile-time constant).
    pub const MANAGER_FD_DEFAULT: i32 = 3;
}
