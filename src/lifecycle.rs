//! # Lifecycle Coordinator ("starter")
//!
//! Owns the manager connection and the chat-server child process, and
//! implements the `SVR_START`/`SVR_STOP` command loop (§4.3, §8 scenario 5).
//!
//! The management socket is handed to the child on a well-known inherited
//! descriptor rather than passed as a CLI argument or environment payload,
//! so the child treats "a non-negative value there" as the manager channel
//! regardless of how it was launched (§6 "Inherited descriptor").

use anyhow::{anyhow, Context, Result};
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{dup2, Pid};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

use crate::wire::header::{Dialect, Header};
use crate::wire::packet::ManagerPacketType;

/// Runtime state of the coordinated chat server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// Configuration needed to fork/exec the chat server.
#[derive(Clone, Debug)]
pub struct ChildSpec {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub manager_fd_var: &'static str,
    /// Descriptor number the child should find the management socket on.
    pub manager_fd: RawFd,
}

/// Owns the manager connection and drives the `STOPPED`/`RUNNING` state
/// machine described in §4.3.
pub struct Coordinator {
    manager: TcpStream,
    child_spec: ChildSpec,
    state: RunState,
    child: Option<Child>,
}

impl Coordinator {
    /// Dial the server manager at `address:port`.
    pub fn connect(address: &str, port: u16, child_spec: ChildSpec) -> Result<Self> {
        let manager = TcpStream::connect((address, port))
            .with_context(|| format!("connecting to manager at {address}:{port}"))?;
        Ok(Self {
            manager,
            child_spec,
            state: RunState::Stopped,
            child: None,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the blocking command loop: read one 4-byte manager-dialect
    /// header at a time, dispatch `SVR_START`/`SVR_STOP`, reply, and loop
    /// until the manager closes the connection or a stop completes.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let mut header_bytes = [0u8; 4];
            match self.manager.read_exact(&mut header_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    info!("manager closed the connection, starter exiting");
                    return Ok(());
                }
                Err(e) => return Err(e).context("reading manager command header"),
            }

            let header = Header::decode(&header_bytes, Dialect::Manager)
                .map_err(|_| anyhow!("malformed manager header"))?;

            if header.payload_len > 0 {
                let mut discard = vec![0u8; header.payload_len as usize];
                self.manager
                    .read_exact(&mut discard)
                    .context("reading manager command payload")?;
            }

            let version_ok = header.version == crate::defaults::PROTOCOL_VERSION;

            match (version_ok, ManagerPacketType::try_from(header.packet_type)) {
                (true, Ok(ManagerPacketType::SvrStart)) => {
                    self.handle_start()?;
                }
                (true, Ok(ManagerPacketType::SvrStop)) => {
                    self.handle_stop()?;
                    return Ok(());
                }
                (false, Ok(ManagerPacketType::SvrStart | ManagerPacketType::SvrStop)) => {
                    warn!(
                        version = header.version,
                        packet_type = header.packet_type,
                        "manager command has unexpected version, ignoring"
                    );
                    self.reply(ManagerPacketType::ManError)?;
                }
                _ => {
                    warn!(packet_type = header.packet_type, "unexpected manager command");
                    self.reply(ManagerPacketType::ManError)?;
                }
            }
        }
    }

    /// `SVR_START`: spawn the child if not already running (idempotent —
    /// two starts in a row from `STOPPED` still produce one child and two
    /// `SVR_ONLINE` replies, §8 property 7), then acknowledge.
    fn handle_start(&mut self) -> Result<()> {
        if self.state == RunState::Stopped {
            let child = spawn_child(&self.child_spec, self.manager.as_raw_fd())?;
            info!(pid = child.id(), "chat server started");
            self.child = Some(child);
            self.state = RunState::Running;
        } else {
            debug!("SVR_START received while already running, ignoring duplicate spawn");
        }
        self.reply(ManagerPacketType::SvrOnline)
    }

    /// `SVR_STOP`: signal the child, wait for it to exit, then acknowledge
    /// and tear down.
    fn handle_stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            let pid = Pid::from_raw(child.id() as i32);
            kill(pid, Signal::SIGINT).context("sending SIGINT to chat server")?;
            child.wait().context("waiting for chat server to exit")?;
            info!("chat server stopped");
        }
        self.state = RunState::Stopped;
        self.reply(ManagerPacketType::SvrOffline)
    }

    fn reply(&mut self, packet_type: ManagerPacketType) -> Result<()> {
        let header = Header::new(packet_type.wire_value(), crate::defaults::PROTOCOL_VERSION, 0, 0);
        let mut out = Vec::with_capacity(4);
        header.encode(Dialect::Manager, &mut out);
        self.manager.write_all(&out).context("writing manager reply")
    }
}

/// Fork/exec the chat-server binary with the management socket
/// `source_fd` duplicated onto `child_spec.manager_fd` in the child, close-
/// on-exec cleared so it survives the `execve`.
fn spawn_child(child_spec: &ChildSpec, source_fd: RawFd) -> Result<Child> {
    let target_fd = child_spec.manager_fd;

    let mut command = Command::new(&child_spec.binary);
    command
        .args(&child_spec.args)
        .env(child_spec.manager_fd_var, target_fd.to_string())
        .stdin(Stdio::null());

    // Safety: `pre_exec` runs in the forked child strictly between `fork`
    // and `execve`, where only async-signal-safe calls are sound; `dup2`
    // and `fcntl` both are.
    unsafe {
        command.pre_exec(move || {
            dup2(source_fd, target_fd).map_err(nix_to_io)?;
            clear_cloexec(target_fd)?;
            Ok(())
        });
    }

    command
        .spawn()
        .with_context(|| format!("spawning chat server binary {:?}", child_spec.binary))
}

fn clear_cloexec(fd: RawFd) -> std::io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFD).map_err(nix_to_io)?;
    let mut flags = FdFlag::from_bits_truncate(flags);
    flags.remove(FdFlag::FD_CLOEXEC);
    fcntl(fd, FcntlArg::F_SETFD(flags)).map_err(nix_to_io)?;
    Ok(())
}

fn nix_to_io(e: nix::Error) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

/// Recover the management socket the starter handed down on `fd`.
///
/// Used by the server binary at startup, not by the starter itself.
pub fn adopt_inherited_socket(fd: RawFd) -> Result<TcpStream> {
    use std::os::fd::FromRawFd;
    if fd < 0 {
        return Err(anyhow!("inherited descriptor {fd} is not valid"));
    }
    // Safety: the caller asserts `fd` names a socket handed down by the
    // starter and that no other code in this process owns it.
    let stream = unsafe { TcpStream::from_raw_fd(fd) };
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_spec_carries_manager_fd_var_name() {
        let spec = ChildSpec {
            binary: PathBuf::from("chatd-server"),
            args: vec![],
            manager_fd_var: "CHATD_MANAGER_FD",
            manager_fd: 3,
        };
        assert_eq!(spec.manager_fd_var, "CHATD_MANAGER_FD");
        assert_eq!(spec.manager_fd, 3);
    }
}
