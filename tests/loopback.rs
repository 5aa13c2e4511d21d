//! End-to-end transfers over real sockets on the loopback interface.

use std::net::{SocketAddr, UdpSocket};
use std::thread;

use tempfile::TempDir;

use rudp::{
    file_md5, receive_file, send_file, Connection, Error, EventLog, Listener, LossSim, State,
};

/// Runs one client/server file transfer and returns both terminal states
/// along with the scratch directory holding `input` and `output`.
fn transfer(input: &[u8], loss: Option<(f32, u64)>) -> (State, State, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input");
    let output_path = dir.path().join("output");
    std::fs::write(&input_path, input).unwrap();

    let listener = Listener::bind(0, EventLog::disabled()).unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut sim = match loss {
            Some((rate, seed)) => LossSim::seeded(rate, seed),
            None => LossSim::new(0.0),
        };
        receive_file(&mut conn, &output_path, &mut sim).unwrap();
        conn.state()
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let mut conn = Connection::connect(addr, EventLog::disabled()).unwrap();
    send_file(&mut conn, &input_path).unwrap();

    let server_state = server.join().unwrap();
    (conn.state(), server_state, dir)
}

#[test]
fn clean_small_file_arrives_intact() {
    let (client_state, server_state, dir) = transfer(b"hello\n", None);

    let received = std::fs::read(dir.path().join("output")).unwrap();
    assert_eq!(received, b"hello\n");
    assert_eq!(
        file_md5(&dir.path().join("input")).unwrap(),
        file_md5(&dir.path().join("output")).unwrap()
    );

    // a clean run finishes the whole four-way close on both sides
    assert_eq!(client_state, State::TimeWait);
    assert_eq!(server_state, State::Closed);
}

#[test]
fn transfer_larger_than_the_window_stays_ordered() {
    // 15 full-size frames: the window refills mid-stream more than once
    let input: Vec<u8> = (0..15 * 1024).map(|i| (i % 251) as u8).collect();

    let (_, _, dir) = transfer(&input, None);

    let received = std::fs::read(dir.path().join("output")).unwrap();
    assert_eq!(received.len(), 15 * 1024);
    assert_eq!(received, input);
}

#[test]
fn lossy_link_is_healed_by_retransmission() {
    let input: Vec<u8> = (0..8 * 1024).map(|i| (i % 13) as u8).collect();

    let (_, _, dir) = transfer(&input, Some((0.3, 1)));

    let received = std::fs::read(dir.path().join("output")).unwrap();
    assert_eq!(received, input);
    assert_eq!(
        file_md5(&dir.path().join("input")).unwrap(),
        file_md5(&dir.path().join("output")).unwrap()
    );
}

#[test]
fn silent_server_times_out_the_handshake() {
    // bound but never answered: the SYN disappears into this socket
    let mute = UdpSocket::bind(("127.0.0.1", 0)).unwrap();
    let addr = mute.local_addr().unwrap();

    let err = Connection::connect(addr, EventLog::disabled()).unwrap_err();
    assert!(matches!(err, Error::Handshake(_)));
}
