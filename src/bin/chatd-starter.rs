//! Entry point for the lifecycle coordinator: owns the manager connection
//! and forks/execs the chat server on command (§4.3).

use anyhow::Result;
use clap::Parser;
use chatd::cli::StarterConfig;
use chatd::defaults;
use chatd::lifecycle::{ChildSpec, Coordinator};
use chatd::logging;
use chatd::Args;
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(&args, "chatd-starter.log");

    let starter_config = StarterConfig::from(&args);

    let child_spec = ChildSpec {
        binary: starter_config.server_bin,
        args: starter_config.server_args,
        manager_fd_var: defaults::MANAGER_FD_VAR,
        manager_fd: defaults::MANAGER_FD_DEFAULT,
    };

    info!(
        manager_address = %starter_config.manager_address,
        manager_port = starter_config.manager_port,
        "chatd-starter connecting to server manager"
    );

    let mut coordinator = Coordinator::connect(
        &starter_config.manager_address,
        starter_config.manager_port,
        child_spec,
    )?;
    coordinator.run()
}
