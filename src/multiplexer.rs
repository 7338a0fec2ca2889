//! # Connection Multiplexer
//!
//! The single-threaded, readiness-based event loop (§4.2). Built directly
//! on `mio` rather than on the teacher's usual `tokio` stack: the
//! specification requires one thread, no task spawning, and a
//! fixed-capacity slot table whose indices stay stable across the run —
//! none of which tokio's per-connection-task model expresses naturally.
//! `mio::Token` wraps the slot index directly so registration and lookup
//! never disagree.

use anyhow::{Context, Result};
use mio::net::{TcpListener, TcpStream as MioTcpStream};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Socket, Type};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream as StdTcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::accounts::AccountStore;
use crate::chat;
use crate::diagnostics::Diagnostic;
use crate::session::{Session, SessionState};
use crate::store::FileStore;
use crate::wire::header::{Dialect, Header};
use crate::wire::packet::ClientPacketType;
use crate::wire::payload::{decode_payload, PayloadView};
use crate::wire::response::{encode_error, encode_response, ResponseSpec};
use crate::wire::ErrorCode;

const LISTENER_TOKEN: Token = Token(0);

/// Flipped by the process's `SIGINT` handler; checked once per loop
/// iteration so shutdown happens between, not during, readiness events.
pub static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_: i32) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Install a `SIGINT` handler that flips [`SHUTDOWN`]. `Multiplexer::run`
/// notices it on the next loop iteration and exits in an orderly fashion.
pub fn install_sigint_handler() -> Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    let action = SigAction::new(
        SigHandler::Handler(request_shutdown),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // Safety: the handler only stores to a `static AtomicBool`, which is
    // async-signal-safe.
    unsafe { sigaction(Signal::SIGINT, &action) }.context("installing SIGINT handler")?;
    Ok(())
}

struct ClientSlot {
    stream: MioTcpStream,
    session: Session,
    inbuf: Vec<u8>,
}

impl ClientSlot {
    fn new(stream: MioTcpStream, client_id: u16) -> Self {
        Self {
            stream,
            session: Session::new(client_id),
            inbuf: Vec::with_capacity(256),
        }
    }
}

/// Configuration the multiplexer needs beyond what [`crate::cli::ServerConfig`]
/// already validated.
pub struct MultiplexerConfig {
    pub address: String,
    pub port: u16,
    pub capacity: usize,
    pub store_dir: std::path::PathBuf,
    pub version: u8,
    pub tick: Duration,
}

/// Owns the listening socket, the fixed-capacity slot table, and the
/// persistence/diagnostic state touched on each tick.
pub struct Multiplexer {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    slots: Vec<Option<ClientSlot>>,
    management: Option<StdTcpStream>,
    diagnostic: Diagnostic,
    accounts: AccountStore,
    store: FileStore,
    version: u8,
    tick: Duration,
    user_index: u32,
    msg_count: u32,
}

impl Multiplexer {
    /// Bind the listening socket and prepare the slot table. `capacity`
    /// includes slot 0, reserved for the listener, so at most
    /// `capacity - 1` clients are tracked concurrently.
    pub fn bind(config: MultiplexerConfig, management: Option<StdTcpStream>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.address, config.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", config.address, config.port))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)
            .context("creating listening socket")?;
        socket.set_reuse_address(true).ok();
        socket.bind(&addr.into()).context("binding listening socket")?;
        socket.listen(128).context("marking socket as listening")?;
        socket.set_nonblocking(true).context("setting listener non-blocking")?;

        let mut listener = TcpListener::from_std(socket.into());

        let poll = Poll::new().context("creating mio poll instance")?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .context("registering listening socket")?;

        let store = FileStore::open(&config.store_dir)
            .with_context(|| format!("opening store at {}", config.store_dir.display()))?;
        let user_index = store.read_user_pk().context("reading initial USER_PK")?;

        if let Some(m) = &management {
            m.set_nonblocking(false).ok();
        }

        let capacity = config.capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Ok(Self {
            poll,
            events: Events::with_capacity(1024),
            listener,
            slots,
            management,
            diagnostic: Diagnostic::new(config.version),
            accounts: AccountStore::new(store.clone()),
            store,
            version: config.version,
            tick: config.tick,
            user_index,
            msg_count: 0,
        })
    }

    /// The listening socket's bound address. Useful when `bind` was given
    /// port 0 and the caller needs to discover the port actually assigned.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the event loop until `SHUTDOWN` is set.
    pub fn run(&mut self) -> Result<()> {
        info!("multiplexer starting");
        while !SHUTDOWN.load(Ordering::Relaxed) {
            match self.poll.poll(&mut self.events, Some(self.tick)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    info!("poll interrupted, shutting down");
                    break;
                }
                Err(e) => return Err(e).context("polling for readiness"),
            }

            if self.events.is_empty() {
                self.on_tick()?;
                continue;
            }

            let tokens: Vec<Token> = self.events.iter().map(|e| e.token()).collect();
            let hangups: Vec<Token> = self
                .events
                .iter()
                .filter(|e| e.is_error() || e.is_read_closed())
                .map(|e| e.token())
                .collect();

            for token in tokens {
                if token == LISTENER_TOKEN {
                    self.accept_all();
                } else {
                    self.service_slot(token.0);
                }
            }

            for token in hangups {
                if token != LISTENER_TOKEN {
                    self.free_slot(token.0);
                }
            }
        }
        info!("multiplexer stopped");
        Ok(())
    }

    /// Accept every pending connection until the listener would block,
    /// placing each into the first free slot; if none is free, the
    /// accepted socket is dropped (closed) immediately.
    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => match self.free_slot_index() {
                    Some(idx) => {
                        let token = Token(idx);
                        if let Err(e) = self
                            .poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                        {
                            warn!(error = %e, "failed to register accepted connection");
                            continue;
                        }
                        debug!(slot = idx, %peer, "accepted connection");
                        self.slots[idx] = Some(ClientSlot::new(stream, idx as u16));
                    }
                    None => {
                        debug!(%peer, "no free slot, dropping connection");
                    }
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn free_slot_index(&self) -> Option<usize> {
        (1..self.slots.len()).find(|&i| self.slots[i].is_none())
    }

    /// Read whatever is available on a client slot and dispatch every
    /// complete frame it yields.
    fn service_slot(&mut self, idx: usize) {
        let mut peer_closed = false;
        let mut read_error = false;
        if let Some(slot) = self.slots[idx].as_mut() {
            let mut buf = [0u8; 4096];
            loop {
                match slot.stream.read(&mut buf) {
                    Ok(0) => {
                        peer_closed = true;
                        break;
                    }
                    Ok(n) => slot.inbuf.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(_) => {
                        read_error = true;
                        break;
                    }
                }
            }
        }

        let mut closed = false;
        loop {
            let outcome = {
                let slot = match self.slots[idx].as_mut() {
                    Some(s) => s,
                    None => break,
                };
                Self::try_take_frame(&mut slot.inbuf)
            };
            match outcome {
                Some(Ok((header, payload))) => self.dispatch(idx, header, &payload),
                Some(Err(_)) => {
                    self.write_error(idx, ErrorCode::InvReq, ClientPacketType::SysError);
                    closed = true;
                    break;
                }
                None => break,
            }
            if self.slots[idx].as_ref().map(|s| s.session.is_closed()) == Some(true) {
                closed = true;
                break;
            }
        }

        // A genuine read error (anything but WouldBlock) is not a clean
        // disconnect: §4.2 step 2 requires marking EC_SERVER and closing,
        // whether or not a partial frame happens to be buffered.
        if !closed && read_error {
            self.write_error(idx, ErrorCode::Server, ClientPacketType::SysError);
            closed = true;
        }

        // The peer closed mid-frame: it declared a payload_len it never
        // finished sending. That is a short read, a protocol error (§8
        // scenario 3), not a silent disconnect.
        if !closed && peer_closed {
            let has_partial_frame = self.slots[idx]
                .as_ref()
                .map(|s| !s.inbuf.is_empty())
                .unwrap_or(false);
            if has_partial_frame {
                self.write_error(idx, ErrorCode::InvReq, ClientPacketType::SysError);
            }
            closed = true;
        }

        if closed {
            self.free_slot(idx);
        }
    }

    /// Pull one complete `(Header, payload)` frame off the front of `buf`
    /// if enough bytes are present, leaving any remainder for the next
    /// call (pipelined requests land in the same read).
    fn try_take_frame(buf: &mut Vec<u8>) -> Option<Result<(Header, Vec<u8>), ErrorCode>> {
        if buf.len() < Dialect::Client.header_len() {
            return None;
        }
        let header = match Header::decode(&buf[..Dialect::Client.header_len()], Dialect::Client) {
            Ok(h) => h,
            Err(e) => {
                buf.clear();
                return Some(Err(e));
            }
        };
        let total = Dialect::Client.header_len() + header.payload_len as usize;
        if buf.len() < total {
            return None;
        }
        let payload = buf[Dialect::Client.header_len()..total].to_vec();
        buf.drain(..total);
        Some(Ok((header, payload)))
    }

    fn dispatch(&mut self, idx: usize, header: Header, payload: &[u8]) {
        let Some(request_type) = ClientPacketType::from_request_byte(header.packet_type) else {
            self.write_error(idx, ErrorCode::InvReq, ClientPacketType::SysError);
            return;
        };

        let result = match request_type {
            ClientPacketType::AccLogin | ClientPacketType::AccCreate => {
                self.handle_account_auth(idx, request_type, &header, payload)
            }
            ClientPacketType::AccLogout => self.handle_logout(idx),
            ClientPacketType::AccEdit => self.handle_edit(idx, &header, payload),
            ClientPacketType::ChtSend => self.handle_chat(idx, &header, payload),
            ClientPacketType::LstGet
            | ClientPacketType::GrpJoin
            | ClientPacketType::GrpExit
            | ClientPacketType::GrpCreate => Err(ErrorCode::InvReq),
            _ => Err(ErrorCode::InvReq),
        };

        if let Err(code) = result {
            self.write_error(idx, code, request_type);
        }
    }

    fn handle_account_auth(
        &mut self,
        idx: usize,
        request_type: ClientPacketType,
        header: &Header,
        payload: &[u8],
    ) -> Result<(), ErrorCode> {
        let (username, password) = match decode_payload(header, payload)? {
            PayloadView::AccLogin { username, password } => (username, password),
            PayloadView::AccCreate { username, password } => (username, password),
            _ => unreachable!("decode_payload matched the header's own packet type"),
        };

        let user_id = match request_type {
            ClientPacketType::AccLogin => self.accounts.authenticate(&username, &password)?,
            ClientPacketType::AccCreate => {
                let id = self.accounts.create(&username, &password)?;
                self.user_index = self.store.read_user_pk().unwrap_or(self.user_index);
                id
            }
            _ => unreachable!(),
        };

        if let Some(slot) = self.slots[idx].as_mut() {
            slot.session.authenticate(user_id);
        }
        self.write_response(idx, ResponseSpec::LoginOrCreateSuccess { user_id });
        Ok(())
    }

    fn handle_logout(&mut self, idx: usize) -> Result<(), ErrorCode> {
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.session.close();
        }
        Ok(())
    }

    fn handle_edit(&mut self, idx: usize, header: &Header, payload: &[u8]) -> Result<(), ErrorCode> {
        let user_id = self
            .slots[idx]
            .as_ref()
            .and_then(|s| s.session.user_id)
            .ok_or(ErrorCode::InvUserId)?;

        let new_password = match decode_payload(header, payload)? {
            PayloadView::AccEdit { new_password } => new_password,
            _ => unreachable!("decode_payload matched the header's own packet type"),
        };
        self.accounts.edit(user_id, &new_password)?;
        self.write_response(idx, ResponseSpec::Success { user_id: None });
        Ok(())
    }

    fn handle_chat(&mut self, idx: usize, header: &Header, payload: &[u8]) -> Result<(), ErrorCode> {
        let authed = self.slots[idx]
            .as_ref()
            .map(|s| s.session.is_authed())
            .unwrap_or(false);
        if !authed {
            return Err(ErrorCode::InvUserId);
        }
        let message = match decode_payload(header, payload)? {
            PayloadView::ChtSend { message } => message,
            _ => unreachable!("decode_payload matched the header's own packet type"),
        };
        chat::handle_send(&message)?;
        self.msg_count += 1;
        Ok(())
    }

    fn write_response(&mut self, idx: usize, spec: ResponseSpec) {
        let bytes = encode_response(&spec, self.version);
        self.write_and_maybe_close(idx, &bytes, false);
    }

    fn write_error(&mut self, idx: usize, code: ErrorCode, request_type: ClientPacketType) {
        if let Some(bytes) = encode_error(code, request_type, self.version) {
            self.write_and_maybe_close(idx, &bytes, true);
        } else if let Some(slot) = self.slots[idx].as_mut() {
            slot.session.close();
        }
    }

    fn write_and_maybe_close(&mut self, idx: usize, bytes: &[u8], close_after: bool) {
        let write_failed = match self.slots[idx].as_mut() {
            Some(slot) => slot.stream.write_all(bytes).is_err(),
            None => return,
        };
        if let Some(slot) = self.slots[idx].as_mut() {
            if close_after || write_failed || slot.session.is_closed() {
                slot.session.close();
            }
        }
    }

    fn free_slot(&mut self, idx: usize) {
        if let Some(mut slot) = self.slots[idx].take() {
            let _ = self.poll.registry().deregister(&mut slot.stream);
            debug!(slot = idx, "slot freed");
        }
    }

    /// Persist `USER_PK`, recompute `user_count`, and emit a diagnostic on
    /// the management descriptor if one is configured.
    fn on_tick(&mut self) -> Result<()> {
        self.store
            .write_user_pk(self.user_index)
            .context("persisting USER_PK on tick")?;

        let user_count = self
            .slots
            .iter()
            .filter(|s| matches!(s, Some(slot) if slot.session.state == SessionState::Authed))
            .count() as u16;

        if let Some(management) = self.management.as_mut() {
            let bytes = self.diagnostic.render(user_count, self.msg_count);
            if let Err(e) = management.write_all(bytes) {
                warn!(error = %e, "failed to write diagnostic, manager may have disconnected");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_take_frame_waits_for_full_header() {
        let mut buf = vec![0x0Cu8, 0x03, 0x00];
        assert!(Multiplexer::try_take_frame(&mut buf).is_none());
    }

    #[test]
    fn try_take_frame_waits_for_full_payload() {
        let mut buf = vec![0x0Cu8, 0x03, 0x00, 0x00, 0x00, 0x05, 0x01, 0x02];
        assert!(Multiplexer::try_take_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn try_take_frame_yields_frame_and_drains_buffer() {
        let mut buf = vec![0x14u8, 0x03, 0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB];
        let (header, payload) = Multiplexer::try_take_frame(&mut buf).unwrap().unwrap();
        assert_eq!(header.packet_type, 0x14);
        assert_eq!(payload, vec![0xAA, 0xBB]);
        assert!(buf.is_empty());
    }

    #[test]
    fn try_take_frame_leaves_pipelined_remainder() {
        let mut buf = vec![0x0Cu8, 0x03, 0x00, 0x00, 0x00, 0x00, 0x0Cu8, 0x03, 0x00, 0x00, 0x00, 0x00];
        let (header, _) = Multiplexer::try_take_frame(&mut buf).unwrap().unwrap();
        assert_eq!(header.packet_type, 0x0C);
        assert_eq!(buf.len(), 6);
    }
}
