use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

use crate::log::event;
use crate::wire::{Header, ADVERTISED_WINDOW, MAX_DATAGRAM, MAX_DATA_SIZE};
use crate::Error;

use super::window::{Inflight, SendWindow};
use super::{Connection, ACK_WAIT, RTO};

/// Streams a file to the peer through the sliding window and closes the
/// connection once the last byte is acknowledged.
///
/// The file is the retransmission buffer: each in-flight entry remembers the
/// offset its payload was read from, and a timed-out packet is rebuilt from
/// there. A source failure aborts the transfer but the close handshake still
/// runs so the peer is not left hanging.
pub fn send_file(conn: &mut Connection, path: &Path) -> Result<(), Error> {
    let mut file = File::open(path).map_err(Error::Source)?;

    match pump(conn, &mut file) {
        Ok(()) => conn.close(),
        Err(e) => {
            let _ = conn.close();
            Err(e)
        }
    }
}

fn pump(conn: &mut Connection, file: &mut File) -> Result<(), Error> {
    let mut window = SendWindow::new();
    let mut data = [0u8; MAX_DATA_SIZE];
    let mut pos: u64 = 0;
    let mut exhausted = false;

    loop {
        // keep the window full while the source lasts
        while !window.is_full() && !exhausted {
            file.seek(SeekFrom::Start(pos)).map_err(Error::Source)?;
            let n = file.read(&mut data).map_err(Error::Source)?;
            if n == 0 {
                exhausted = true;
                break;
            }

            let seq = conn.local_seq;
            let header = Header {
                seq_num: seq,
                ack_num: 0,
                flags: 0,
                window_size: ADVERTISED_WINDOW,
            };
            // a failed send is healed by the retransmission timer, so the
            // entry is recorded either way
            if let Err(e) = conn.send_frame(&header, &data[..n]) {
                eprintln!("send failed: {e}");
            }
            event!(conn.log, "SND DATA SEQ={seq} LEN={n}");

            window.push(Inflight {
                seq,
                len: n,
                offset: pos,
                sent_at: Instant::now(),
                retransmitted: false,
            });

            conn.local_seq = seq.wrapping_add(n as u32);
            pos += n as u64;
        }

        if exhausted && window.is_empty() {
            return Ok(());
        }

        if conn.wait_readable(Some(ACK_WAIT))? {
            let mut buf = [0u8; MAX_DATAGRAM];
            if let Some((header, _)) = conn.recv_frame(&mut buf)? {
                // anything that is not an ACK is noise during the transfer
                if header.is_ack() {
                    event!(conn.log, "RCV ACK={}", header.ack_num);
                    window.advance(header.ack_num);
                }
            }
        } else {
            let now = Instant::now();
            for entry in window.expired_mut(now, RTO) {
                event!(conn.log, "TIMEOUT SEQ={}", entry.seq);

                file.seek(SeekFrom::Start(entry.offset))
                    .map_err(Error::Source)?;
                file.read_exact(&mut data[..entry.len])
                    .map_err(Error::Source)?;

                let header = Header {
                    seq_num: entry.seq,
                    ack_num: 0,
                    flags: 0,
                    window_size: ADVERTISED_WINDOW,
                };
                if let Err(e) = conn.send_frame(&header, &data[..entry.len]) {
                    eprintln!("send failed: {e}");
                }
                event!(conn.log, "RETX DATA SEQ={} LEN={}", entry.seq, entry.len);

                entry.sent_at = now;
                entry.retransmitted = true;
            }
        }
    }
}
