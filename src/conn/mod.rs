use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use crate::log::{event, EventLog};
use crate::util;
use crate::wire::{self, Header, ACK, ADVERTISED_WINDOW, FIN, MAX_DATAGRAM, SYN};
use crate::Error;

mod chat;
mod receiver;
mod sender;
mod window;

pub use chat::chat;
pub use receiver::receive_file;
pub use sender::send_file;
pub use window::WINDOW_SIZE;

/// Dead-wall limit on the opener's wait for a SYN-ACK.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-receive limit while the four-way close runs.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
/// The sender's readiness quantum between retransmission checks.
pub const ACK_WAIT: Duration = Duration::from_millis(100);
/// Age past which an in-flight packet is retransmitted. Fixed; there is no
/// round-trip estimation.
pub const RTO: Duration = Duration::from_millis(500);

/*
             opener                                listener
               |                                       |
   SynSent     |  SYN      seq=C0                      |
               | ------------------------------------> |  SynRcvd
               |  SYN|ACK  seq=S0 ack=C0+1             |
               | <------------------------------------ |
               |  ACK      seq=C0 ack=S0+1             |
   Established | ------------------------------------> |  Established
               |                                       |
               =  data / cumulative ACKs               =
               |                                       |
   FinWait1    |  FIN ----------------------------->   |
   FinWait2    |  <------------------------------ ACK  |  CloseWait
               |  <------------------------------ FIN  |  LastAck
   TimeWait    |  ACK ----------------------------->   |  Closed
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    SynSent,
    SynRcvd,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    LastAck,
    TimeWait,
}

/// A bound but not yet connected passive endpoint.
pub struct Listener {
    socket: UdpSocket,
    log: EventLog,
}

impl Listener {
    pub fn bind(port: u16, log: EventLog) -> Result<Self, Error> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .map_err(|e| Error::Setup(format!("failed to bind port {port}: {e}")))?;

        Ok(Listener { socket, log })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Blocks for the first SYN, answers with SYN-ACK, and waits for the
    /// final ACK of the handshake. One peer per run: the socket is connected
    /// to whichever address the SYN came from, so later strays from other
    /// sources never reach the connection.
    pub fn accept(self) -> Result<Connection, Error> {
        let Listener { socket, mut log } = self;

        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, peer) = socket.recv_from(&mut buf)?;
        let (header, _) = wire::parse(&buf[..n]).map_err(|_| Error::Handshake("expected SYN"))?;
        if !header.is_syn() {
            return Err(Error::Handshake("expected SYN"));
        }

        let peer_seq = header.seq_num;
        event!(log, "RCV SYN SEQ={peer_seq}");

        socket.connect(peer)?;

        let isn = util::initial_seq();
        let mut conn = Connection {
            socket,
            peer,
            state: State::SynRcvd,
            local_seq: isn,
            peer_seq,
            log,
        };

        let ack_num = peer_seq.wrapping_add(1);
        conn.send_frame(
            &Header {
                seq_num: isn,
                ack_num,
                flags: SYN | ACK,
                window_size: ADVERTISED_WINDOW,
            },
            &[],
        )?;
        event!(conn.log, "SND SYN-ACK SEQ={isn} ACK={ack_num}");

        let Some((header, _)) = conn.recv_frame(&mut buf)? else {
            return Err(Error::Handshake("invalid ACK in handshake"));
        };
        if !header.is_ack() || header.ack_num != isn.wrapping_add(1) {
            return Err(Error::Handshake("invalid ACK in handshake"));
        }

        event!(conn.log, "RCV ACK FOR SYN");
        conn.state = State::Established;
        // the SYN occupies one sequence number; data starts past it
        conn.local_seq = isn.wrapping_add(1);

        Ok(conn)
    }
}

/// One established connection: the socket, the peer, both sides' sequence
/// cursors, and the event sink. Owned by a single thread; nothing here is
/// shared.
#[derive(Debug)]
pub struct Connection {
    socket: UdpSocket,
    peer: SocketAddr,
    state: State,
    /// Sequence number of the next byte this side will send.
    pub(crate) local_seq: u32,
    /// The peer's initial sequence number captured during the handshake.
    pub(crate) peer_seq: u32,
    pub(crate) log: EventLog,
}

impl Connection {
    /// Active open: SYN, then up to ten seconds for the SYN-ACK, then the
    /// completing ACK.
    pub fn connect(peer: SocketAddr, log: EventLog) -> Result<Self, Error> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .map_err(|e| Error::Setup(format!("failed to create socket: {e}")))?;
        socket.connect(peer)?;

        let isn = util::initial_seq();
        let mut conn = Connection {
            socket,
            peer,
            state: State::Closed,
            local_seq: isn,
            peer_seq: 0,
            log,
        };

        conn.send_frame(
            &Header {
                seq_num: isn,
                ack_num: 0,
                flags: SYN,
                window_size: ADVERTISED_WINDOW,
            },
            &[],
        )?;
        event!(conn.log, "SND SYN SEQ={isn}");
        conn.state = State::SynSent;

        if !conn.wait_readable(Some(HANDSHAKE_TIMEOUT))? {
            return Err(Error::Handshake("connection timeout: server not responding"));
        }

        let mut buf = [0u8; MAX_DATAGRAM];
        let Some((header, _)) = conn.recv_frame(&mut buf)? else {
            return Err(Error::Handshake("expected SYN-ACK"));
        };
        if !(header.is_syn() && header.is_ack()) {
            return Err(Error::Handshake("expected SYN-ACK"));
        }

        event!(
            conn.log,
            "RCV SYN-ACK SEQ={} ACK={}",
            header.seq_num,
            header.ack_num
        );

        if header.ack_num != isn.wrapping_add(1) {
            return Err(Error::Handshake("invalid ACK number in SYN-ACK"));
        }
        conn.peer_seq = header.seq_num;

        let ack_num = conn.peer_seq.wrapping_add(1);
        conn.send_frame(
            &Header {
                seq_num: isn,
                ack_num,
                flags: ACK,
                window_size: ADVERTISED_WINDOW,
            },
            &[],
        )?;
        event!(conn.log, "SND ACK FOR SYN");

        conn.state = State::Established;
        conn.local_seq = isn.wrapping_add(1);

        Ok(conn)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Active side of the four-way close: FIN, their ACK, their FIN, final
    /// ACK. Every receive is bounded by `CLOSE_TIMEOUT`; a silent peer just
    /// means the remaining steps are abandoned. The socket always comes back
    /// in blocking mode.
    pub fn close(&mut self) -> Result<(), Error> {
        self.socket.set_read_timeout(Some(CLOSE_TIMEOUT))?;
        let result = self.close_active();
        let restore = self.socket.set_read_timeout(None);
        result?;
        restore.map_err(Error::Io)
    }

    fn close_active(&mut self) -> Result<(), Error> {
        let fin_seq = self.local_seq;
        self.send_frame(
            &Header {
                seq_num: fin_seq,
                ack_num: 0,
                flags: FIN,
                window_size: ADVERTISED_WINDOW,
            },
            &[],
        )?;
        event!(self.log, "SND FIN SEQ={fin_seq}");
        self.state = State::FinWait1;

        let mut buf = [0u8; MAX_DATAGRAM];
        if let Some((header, _)) = self.recv_frame(&mut buf)? {
            if header.is_ack() {
                event!(self.log, "RCV ACK FOR FIN");
                self.state = State::FinWait2;
            }
        }

        if let Some((header, _)) = self.recv_frame(&mut buf)? {
            if header.is_fin() {
                event!(self.log, "RCV FIN SEQ={}", header.seq_num);

                let ack_num = header.seq_num.wrapping_add(1);
                self.send_frame(
                    &Header {
                        seq_num: self.local_seq,
                        ack_num,
                        flags: ACK,
                        window_size: ADVERTISED_WINDOW,
                    },
                    &[],
                )?;
                event!(self.log, "SND ACK={ack_num}");
                self.state = State::TimeWait;
            }
        }

        Ok(())
    }

    /// Passive side of the four-way close. The peer's FIN has already been
    /// consumed (and logged) by the caller; its sequence number arrives here.
    pub fn close_passive(&mut self, peer_fin_seq: u32) -> Result<(), Error> {
        self.socket.set_read_timeout(Some(CLOSE_TIMEOUT))?;
        let result = self.close_passive_inner(peer_fin_seq);
        let restore = self.socket.set_read_timeout(None);
        result?;
        restore.map_err(Error::Io)
    }

    fn close_passive_inner(&mut self, peer_fin_seq: u32) -> Result<(), Error> {
        let ack_num = peer_fin_seq.wrapping_add(1);
        self.send_frame(
            &Header {
                seq_num: self.local_seq,
                ack_num,
                flags: ACK,
                window_size: ADVERTISED_WINDOW,
            },
            &[],
        )?;
        event!(self.log, "SND ACK FOR FIN");
        self.state = State::CloseWait;

        let fin_seq = self.local_seq;
        self.send_frame(
            &Header {
                seq_num: fin_seq,
                ack_num: 0,
                flags: FIN,
                window_size: ADVERTISED_WINDOW,
            },
            &[],
        )?;
        event!(self.log, "SND FIN SEQ={fin_seq}");
        self.state = State::LastAck;

        let mut buf = [0u8; MAX_DATAGRAM];
        if let Some((header, _)) = self.recv_frame(&mut buf)? {
            if header.is_ack() {
                event!(self.log, "RCV ACK={}", header.ack_num);
                self.state = State::Closed;
            }
        }

        Ok(())
    }

    pub(crate) fn raw_fd(&self) -> i32 {
        self.socket.as_raw_fd()
    }

    /// Waits until the socket is readable or the timeout elapses. `None`
    /// waits forever. Interrupted waits are retried.
    pub(crate) fn wait_readable(&self, timeout: Option<Duration>) -> Result<bool, Error> {
        let timeout_ms = timeout.map_or(-1, |t| t.as_millis() as i32);

        loop {
            let mut fds = [PollFd::new(self.socket.as_raw_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, timeout_ms) {
                Ok(0) => return Ok(false),
                Ok(_) => return Ok(true),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(Error::Io(e.into())),
            }
        }
    }

    pub(crate) fn send_frame(&self, header: &Header, payload: &[u8]) -> Result<(), Error> {
        let mut out = [0u8; MAX_DATAGRAM];
        let n = wire::encode(header, payload, &mut out);
        self.socket.send(&out[..n])?;
        Ok(())
    }

    /// Receives one datagram and frames it. Returns `Ok(None)` when nothing
    /// usable arrived: a receive timeout expired, or the datagram was too
    /// short to carry a header (logged and discarded).
    pub(crate) fn recv_frame<'a>(
        &mut self,
        buf: &'a mut [u8; MAX_DATAGRAM],
    ) -> Result<Option<(Header, &'a [u8])>, Error> {
        let n = match self.socket.recv(buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(None)
            }
            Err(e) => return Err(Error::Io(e)),
        };

        match wire::parse(&buf[..n]) {
            Ok((header, payload)) => Ok(Some((header, payload))),
            Err(Error::Truncated(len)) => {
                event!(self.log, "RCV MALFORMED LEN={len}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
