use std::io::{self, BufRead};
use std::os::fd::AsRawFd;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use crate::log::event;
use crate::wire::{Header, ACK, ADVERTISED_WINDOW, MAX_DATAGRAM, MAX_DATA_SIZE};
use crate::Error;

use super::Connection;

/// Line-oriented chat over the established connection.
///
/// One loop multiplexes the terminal and the socket. Messages are
/// fire-and-forget: each is framed once with the current cursor and never
/// retransmitted, so a message lost underneath is lost to the conversation.
/// `/quit` (or end of input) starts the orderly close; a peer that vanishes
/// with a literal `/quit` payload instead of a FIN just ends the session.
pub fn chat(conn: &mut Connection) -> Result<(), Error> {
    println!("chat mode started. type /quit to exit");

    let stdin = io::stdin();
    let mut line = String::new();
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        let mut fds = [
            PollFd::new(stdin.as_raw_fd(), PollFlags::POLLIN),
            PollFd::new(conn.raw_fd(), PollFlags::POLLIN),
        ];
        match poll(&mut fds, -1) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(Error::Io(e.into())),
        }
        let stdin_ready = fds[0].revents().map_or(false, |r| r.intersects(PollFlags::POLLIN));
        let socket_ready = fds[1].revents().map_or(false, |r| r.intersects(PollFlags::POLLIN));

        if stdin_ready {
            line.clear();
            let n = stdin.lock().read_line(&mut line)?;
            let msg = line.trim_end_matches('\n');

            // end of input behaves like an explicit /quit
            if n == 0 || msg == "/quit" {
                conn.close()?;
                return Ok(());
            }

            let bytes = msg.as_bytes();
            let len = bytes.len().min(MAX_DATA_SIZE);
            let seq = conn.local_seq;
            conn.send_frame(
                &Header {
                    seq_num: seq,
                    ack_num: 0,
                    flags: 0,
                    window_size: ADVERTISED_WINDOW,
                },
                &bytes[..len],
            )?;
            event!(conn.log, "SND DATA SEQ={seq} LEN={len}");
            conn.local_seq = seq.wrapping_add(len as u32);
        }

        if socket_ready {
            let Some((header, payload)) = conn.recv_frame(&mut buf)? else {
                continue;
            };

            if header.is_fin() {
                event!(conn.log, "RCV FIN SEQ={}", header.seq_num);
                conn.close_passive(header.seq_num)?;
                return Ok(());
            }

            // a bare ACK acknowledges nothing new and answering it would
            // bounce ACKs between the peers forever
            if header.is_ack() && payload.is_empty() {
                continue;
            }

            if !payload.is_empty() {
                let text = String::from_utf8_lossy(payload);
                if text == "/quit" {
                    println!("peer disconnected");
                    return Ok(());
                }
                println!("received: {text}");
            }

            let ack_num = header.seq_num.wrapping_add(payload.len() as u32);
            conn.send_frame(
                &Header {
                    seq_num: conn.local_seq,
                    ack_num,
                    flags: ACK,
                    window_size: ADVERTISED_WINDOW,
                },
                &[],
            )?;
            event!(conn.log, "SND ACK={ack_num}");
        }
    }
}
