//! End-to-end exercises of the wire protocol against a real `Multiplexer`
//! bound to an ephemeral port, covering the concrete scenarios in spec §8.

use chatd::multiplexer::{Multiplexer, MultiplexerConfig, SHUTDOWN};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::tempdir;

/// Start a multiplexer on an ephemeral port with a fast tick, optionally
/// wired to a management socket, and return its address plus a join handle.
fn start_server(
    management: Option<TcpStream>,
) -> (std::net::SocketAddr, std::thread::JoinHandle<()>) {
    SHUTDOWN.store(false, Ordering::Relaxed);
    let dir = tempdir().unwrap();
    let config = MultiplexerConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        capacity: 5,
        store_dir: dir.path().to_path_buf(),
        version: 3,
        tick: Duration::from_millis(50),
    };
    let mut multiplexer = Multiplexer::bind(config, management).unwrap();
    let addr = multiplexer.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        // Keep the tempdir alive for the run's duration.
        let _dir = dir;
        multiplexer.run().unwrap();
    });
    // Give the listener a moment to start accepting before the first connect.
    std::thread::sleep(Duration::from_millis(20));
    (addr, handle)
}

fn shutdown(handle: std::thread::JoinHandle<()>) {
    SHUTDOWN.store(true, Ordering::Relaxed);
    handle.join().unwrap();
}

#[test]
fn handshake_create_then_login_scenario() {
    let (addr, handle) = start_server(None);

    // §8 scenario 1: ACC_CREATE for "ali"/"pw".
    let mut client = TcpStream::connect(addr).unwrap();
    client
        .write_all(&[
            0x0D, 0x03, 0x00, 0x00, 0x00, 0x09, 0x0C, 0x03, b'a', b'l', b'i', 0x0C, 0x02, b'p',
            b'w',
        ])
        .unwrap();

    let mut reply = [0u8; 9];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(
        reply,
        [0x0B, 0x03, 0x00, 0x00, 0x00, 0x03, 0x02, 0x01, 0x01]
    );

    // A second client can now log in with the same credentials.
    let mut second = TcpStream::connect(addr).unwrap();
    second
        .write_all(&[
            0x0A, 0x03, 0x00, 0x00, 0x00, 0x09, 0x0C, 0x03, b'a', b'l', b'i', 0x0C, 0x02, b'p',
            b'w',
        ])
        .unwrap();
    let mut login_reply = [0u8; 9];
    second.read_exact(&mut login_reply).unwrap();
    assert_eq!(login_reply[0], 0x0B);
    assert_eq!(login_reply[6..9], [0x02, 0x01, 0x01]);

    shutdown(handle);
}

#[test]
fn bad_version_byte_is_still_answered_with_version_three() {
    let (addr, handle) = start_server(None);

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .write_all(&[
            0x0D, 0x02, 0x00, 0x00, 0x00, 0x09, 0x0C, 0x03, b'b', b'o', b'b', 0x0C, 0x02, b'p',
            b'w',
        ])
        .unwrap();

    let mut reply = [0u8; 9];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(reply[1], 3, "reply version byte must be 3 regardless of request version");

    shutdown(handle);
}

#[test]
fn short_payload_yields_invalid_request_and_closes_slot() {
    let (addr, handle) = start_server(None);

    // §8 scenario 3: header declares payload_len=100 but only 10 bytes
    // arrive before the client closes its write side.
    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(&[0x0D, 0x03, 0x00, 0x00, 0x00, 100]).unwrap();
    client.write_all(&[0u8; 10]).unwrap();
    client.shutdown(std::net::Shutdown::Write).unwrap();

    let mut reply = Vec::new();
    client.read_to_end(&mut reply).unwrap();
    assert_eq!(reply[0], 0x01, "SYS_ERROR");
    assert_eq!(reply[6], 0x02, "INTEGER tag");
    assert_eq!(reply[8], 0x1F, "EC_INV_REQ code");

    shutdown(handle);
}

#[test]
fn logout_produces_no_reply_bytes() {
    let (addr, handle) = start_server(None);

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .write_all(&[
            0x0D, 0x03, 0x00, 0x00, 0x00, 0x09, 0x0C, 0x03, b'j', b'o', b'e', 0x0C, 0x02, b'p',
            b'w',
        ])
        .unwrap();
    let mut create_reply = [0u8; 9];
    client.read_exact(&mut create_reply).unwrap();

    // §8 scenario 6: logout is silent.
    client
        .write_all(&[0x0C, 0x03, 0x00, 0x01, 0x00, 0x00])
        .unwrap();
    client.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut buf = [0u8; 1];
    match client.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("expected no reply bytes or eof, got {n} bytes"),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
    }

    shutdown(handle);
}

#[test]
fn unauthenticated_chat_send_is_rejected() {
    let (addr, handle) = start_server(None);

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .write_all(&[0x14, 0x03, 0x00, 0x00, 0x00, 0x07, 0x0C, 0x05, b'h', b'e', b'l', b'l', b'o'])
        .unwrap();

    let mut reply = Vec::new();
    client.read_to_end(&mut reply).unwrap();
    assert_eq!(reply[0], 0x01, "SYS_ERROR since the session never authenticated");

    shutdown(handle);
}

#[test]
fn reserved_packet_types_are_invalid_request() {
    let (addr, handle) = start_server(None);

    let mut client = TcpStream::connect(addr).unwrap();
    // LST_GET, empty payload.
    client.write_all(&[0x1E, 0x03, 0x00, 0x00, 0x00, 0x00]).unwrap();
    let mut reply = Vec::new();
    client.read_to_end(&mut reply).unwrap();
    assert_eq!(reply[0], 0x01);
    assert_eq!(reply[8], 0x1F);

    shutdown(handle);
}

#[test]
fn diagnostic_reflects_authenticated_users_and_message_count() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let manager_addr = listener.local_addr().unwrap();
    let management = TcpStream::connect(manager_addr).unwrap();
    let (mut manager_side, _) = listener.accept().unwrap();

    let (addr, handle) = start_server(Some(management));

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .write_all(&[
            0x0D, 0x03, 0x00, 0x00, 0x00, 0x09, 0x0C, 0x03, b'x', b'x', b'x', 0x0C, 0x02, b'p',
            b'w',
        ])
        .unwrap();
    let mut create_reply = [0u8; 9];
    client.read_exact(&mut create_reply).unwrap();

    client
        .write_all(&[0x14, 0x03, 0x00, 0x01, 0x00, 0x07, 0x0C, 0x05, b'h', b'e', b'l', b'l', b'o'])
        .unwrap();

    // §8 scenario 4's byte layout, with user_count=1, msg_count=1. Diagnostics
    // fire on every tick; poll a few of them since the very first one can
    // race the client's create/send above.
    manager_side
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut diag = [0u8; 16];
    let mut matched = false;
    for _ in 0..20 {
        manager_side.read_exact(&mut diag).unwrap();
        assert_eq!(diag[0], 0x0A);
        assert_eq!(diag[1], 0x03);
        assert_eq!(u16::from_be_bytes([diag[4], diag[5]]), 10);
        assert_eq!(diag[6], 0x02);
        assert_eq!(diag[7], 0x02);
        assert_eq!(diag[10], 0x02);
        assert_eq!(diag[11], 0x04);
        let user_count = u16::from_be_bytes([diag[8], diag[9]]);
        let msg_count = u32::from_be_bytes([diag[12], diag[13], diag[14], diag[15]]);
        if user_count == 1 && msg_count == 1 {
            matched = true;
            break;
        }
    }
    assert!(matched, "diagnostic never reflected 1 authenticated user / 1 message");

    shutdown(handle);
}
