//! Entry point for the chat server: the connection multiplexer.
//!
//! If the environment variable named by [`chatd::defaults::MANAGER_FD_VAR`]
//! holds a valid descriptor number, it is adopted as the management socket
//! handed down by the starter (§6 "Inherited descriptor"). Running the
//! binary standalone, without a starter, is supported too: diagnostics are
//! simply not emitted anywhere.

use anyhow::Result;
use clap::Parser;
use chatd::cli::ServerConfig;
use chatd::lifecycle::adopt_inherited_socket;
use chatd::logging;
use chatd::multiplexer::{install_sigint_handler, Multiplexer, MultiplexerConfig};
use chatd::{defaults, Args};
use std::net::TcpStream;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(&args, "chatd-server.log");

    install_sigint_handler()?;

    let server_config = ServerConfig::from(&args);
    let management = adopt_management_socket();

    let multiplexer_config = MultiplexerConfig {
        address: server_config.address,
        port: server_config.port,
        capacity: server_config.capacity,
        store_dir: server_config.store_dir,
        version: defaults::PROTOCOL_VERSION,
        tick: defaults::TICK,
    };

    info!(
        address = %multiplexer_config.address,
        port = multiplexer_config.port,
        "chatd-server starting"
    );

    let mut multiplexer = Multiplexer::bind(multiplexer_config, management)?;
    multiplexer.run()
}

/// Read the inherited management descriptor, if the environment variable
/// the starter sets is present and names a valid descriptor.
fn adopt_management_socket() -> Option<TcpStream> {
    let raw = std::env::var(defaults::MANAGER_FD_VAR).ok()?;
    let fd: i32 = raw.parse().ok()?;
    match adopt_inherited_socket(fd) {
        Ok(stream) => {
            info!(fd, "adopted inherited management socket");
            Some(stream)
        }
        Err(e) => {
            warn!(error = %e, fd, "failed to adopt inherited management socket, diagnostics disabled");
            None
        }
    }
}
