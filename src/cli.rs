//! # Command-Line Interface Module
//!
//! Argument parsing shared by both binaries (`chatd-server`, `chatd-starter`).
//! Both accept the same address/port surface described by the wire
//! specification's §6 CLI table; each binary only reads the fields it needs.

use clap::{
    builder::styling::{AnsiColor, Styles},
    Parser,
};
use std::path::PathBuf;

use crate::defaults;

/// Defines the styles for the help message to replicate clap v3's appearance.
fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// chatd — a small multi-tenant chat server and its lifecycle coordinator.
///
/// Used by both `chatd-server` (the multiplexer) and `chatd-starter` (the
/// lifecycle coordinator); each binary consumes only the options relevant
/// to its role.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Address this process binds to
    #[arg(short = 'a', long = "address", default_value = defaults::ADDRESS, help_heading = "Self")]
    pub address: String,

    /// Port this process binds to
    #[arg(short = 'p', long = "port", default_value_t = defaults::PORT, help_heading = "Self")]
    pub port: u16,

    /// Address of the server manager
    #[arg(short = 'A', long = "manager-address", default_value = defaults::MANAGER_ADDRESS, help_heading = "Manager")]
    pub manager_address: String,

    /// Port of the server manager
    #[arg(short = 'P', long = "manager-port", default_value_t = defaults::MANAGER_PORT, help_heading = "Manager")]
    pub manager_port: u16,

    /// Slot-table capacity (number of concurrently tracked client sockets,
    /// including the listening socket's own slot)
    #[arg(long, default_value_t = defaults::CAPACITY, help_heading = "Multiplexer")]
    pub capacity: usize,

    /// Directory backing the key-value store (account records, USER_PK)
    #[arg(long, default_value = defaults::STORE_DIR, help_heading = "Multiplexer")]
    pub store_dir: PathBuf,

    /// Path to the chat-server binary the starter should fork/exec.
    /// Ignored by chatd-server.
    #[arg(long, default_value = "chatd-server", help_heading = "Starter")]
    pub server_bin: PathBuf,

    /// Silence all user-facing informational output on stdout
    #[arg(short = 'q', long, help_heading = "Output and Logging")]
    pub quiet: bool,

    /// Increase diagnostic log verbosity on stderr.
    ///
    /// Can be used multiple times to increase detail:
    ///  -v: info
    ///  -vv: debug
    ///  -vvv: trace
    /// By default, only WARNING and ERROR messages are shown.
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Output and Logging")]
    pub verbose: u8,

    /// Write detailed logs to this file (or "stderr") instead of a daily
    /// rolling file in the current directory
    #[arg(long, help_heading = "Output and Logging")]
    pub log_file: Option<String>,
}

/// Multiplexer configuration derived from CLI args.
///
/// This is the internal, validated shape consumed by [`crate::multiplexer::Multiplexer`];
/// it exists so the multiplexer does not depend on `clap` types directly.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub capacity: usize,
    pub store_dir: PathBuf,
    pub manager_fd_var: &'static str,
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        Self {
            address: args.address.clone(),
            port: args.port,
            capacity: args.capacity.max(1),
            store_dir: args.store_dir.clone(),
            manager_fd_var: defaults::MANAGER_FD_VAR,
        }
    }
}

/// Starter configuration derived from CLI args.
#[derive(Clone, Debug)]
pub struct StarterConfig {
    pub manager_address: String,
    pub manager_port: u16,
    pub server_bin: PathBuf,
    pub server_args: Vec<String>,
}

impl From<&Args> for StarterConfig {
    fn from(args: &Args) -> Self {
        Self {
            manager_address: args.manager_address.clone(),
            manager_port: args.manager_port,
            server_bin: args.server_bin.clone(),
            server_args: vec![
                "--address".to_string(),
                args.address.clone(),
                "--port".to_string(),
                args.port.to_string(),
                "--capacity".to_string(),
                args.capacity.to_string(),
                "--store-dir".to_string(),
                args.store_dir.to_string_lossy().to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_from_args_applies_defaults() {
        let args = Args::parse_from(["chatd-server"]);
        let config = ServerConfig::from(&args);
        assert_eq!(config.address, defaults::ADDRESS);
        assert_eq!(config.port, defaults::PORT);
        assert_eq!(config.capacity, defaults::CAPACITY);
    }

    #[test]
    fn server_config_rejects_zero_capacity_by_clamping() {
        let args = Args::parse_from(["chatd-server", "--capacity", "0"]);
        let config = ServerConfig::from(&args);
        assert_eq!(config.capacity, 1);
    }

    #[test]
    fn starter_config_forwards_bind_address_to_child() {
        let args = Args::parse_from(["chatd-starter", "-a", "0.0.0.0", "-p", "9100"]);
        let config = StarterConfig::from(&args);
        assert!(config.server_args.contains(&"0.0.0.0".to_string()));
        assert!(config.server_args.contains(&"9100".to_string()));
    }
}
