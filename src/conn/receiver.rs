use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::log::event;
use crate::util::LossSim;
use crate::wire::{Header, ACK, ADVERTISED_WINDOW, MAX_DATAGRAM};
use crate::Error;

use super::Connection;

/// Receives one file into `path`, writing only in-order bytes and answering
/// every frame with the cumulative ACK for the next byte it still needs.
///
/// Out-of-order and duplicate frames are never written; re-ACKing the current
/// expectation is what steers the sender back to the gap. The peer's FIN ends
/// the transfer and hands off to the passive close.
pub fn receive_file(conn: &mut Connection, path: &Path, loss: &mut LossSim) -> Result<(), Error> {
    let mut file = File::create(path).map_err(Error::Source)?;
    let mut expected = conn.peer_seq.wrapping_add(1);
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        let Some((header, payload)) = conn.recv_frame(&mut buf)? else {
            continue;
        };

        if header.is_fin() {
            event!(conn.log, "RCV FIN SEQ={}", header.seq_num);
            conn.close_passive(header.seq_num)?;
            return Ok(());
        }

        if loss.should_drop() {
            event!(conn.log, "DROP DATA SEQ={}", header.seq_num);
            continue;
        }

        event!(
            conn.log,
            "RCV DATA SEQ={} LEN={}",
            header.seq_num,
            payload.len()
        );

        if header.seq_num == expected {
            file.write_all(payload).map_err(Error::Source)?;
            expected = expected.wrapping_add(payload.len() as u32);
        }

        let ack = Header {
            seq_num: conn.local_seq,
            ack_num: expected,
            flags: ACK,
            window_size: ADVERTISED_WINDOW,
        };
        conn.send_frame(&ack, &[])?;
        event!(conn.log, "SND ACK={expected} WIN={ADVERTISED_WINDOW}");
    }
}
