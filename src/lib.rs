//! Reliable, connection-oriented byte streams over UDP.
//!
//! A client/server pair establishes a connection with a three-way handshake,
//! moves bytes through a ten-packet sliding window driven by cumulative ACKs
//! and a fixed 500 ms retransmission timeout, and tears the connection down
//! with a symmetric four-way close. Two applications ride on the transport:
//! one-way file transfer (with an MD5 fingerprint printed by the receiver)
//! and line-oriented chat.
//!
//! The substrate is a plain `UdpSocket`; it may drop, reorder, or duplicate
//! datagrams, and the window plus in-order-only delivery put the stream back
//! together. Set `RUDP_LOG=1` to get a timestamped trace of every frame in
//! `client_log.txt` / `server_log.txt`.

mod err;
pub use err::*;

mod conn;
pub use conn::{
    chat, receive_file, send_file, Connection, Listener, State, ACK_WAIT, CLOSE_TIMEOUT,
    HANDSHAKE_TIMEOUT, RTO, WINDOW_SIZE,
};

mod log;
pub use log::EventLog;

mod util;
pub use util::{file_md5, initial_seq, LossSim};

pub mod wire;
