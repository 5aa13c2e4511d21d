use crate::Error;

/// Fixed header length on the wire.
pub const HEADER_LEN: usize = 12;
/// Largest payload a single data frame may carry.
pub const MAX_DATA_SIZE: usize = 1024;
/// Largest datagram either side ever produces.
pub const MAX_DATAGRAM: usize = HEADER_LEN + MAX_DATA_SIZE;
/// Receive buffer size advertised in every outgoing header. Senders do not
/// throttle on the peer's advertisement yet.
pub const ADVERTISED_WINDOW: u16 = 8192;

pub const SYN: u16 = 0x1;
pub const ACK: u16 = 0x2;
pub const FIN: u16 = 0x4;

/// The 12 bytes in front of every datagram.
///
/// `seq_num` is the stream offset of the first payload byte for data frames,
/// or the sender's current cursor for control frames. `ack_num` is cumulative:
/// every byte below it has been received. All fields are big-endian on the
/// wire; conversion happens only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub seq_num: u32,
    pub ack_num: u32,
    pub flags: u16,
    pub window_size: u16,
}

impl Header {
    pub fn is_syn(&self) -> bool {
        self.flags & SYN != 0
    }

    pub fn is_ack(&self) -> bool {
        self.flags & ACK != 0
    }

    pub fn is_fin(&self) -> bool {
        self.flags & FIN != 0
    }
}

/// Writes `header ‖ payload` into `out` and returns the datagram length.
///
/// `out` must hold at least `HEADER_LEN + payload.len()` bytes; the payload
/// must not exceed `MAX_DATA_SIZE`.
pub fn encode(header: &Header, payload: &[u8], out: &mut [u8]) -> usize {
    debug_assert!(payload.len() <= MAX_DATA_SIZE);

    out[0..4].copy_from_slice(&header.seq_num.to_be_bytes());
    out[4..8].copy_from_slice(&header.ack_num.to_be_bytes());
    out[8..10].copy_from_slice(&header.flags.to_be_bytes());
    out[10..12].copy_from_slice(&header.window_size.to_be_bytes());
    out[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

    HEADER_LEN + payload.len()
}

/// Splits a datagram into header and payload. The payload length is implicit
/// in the datagram length; anything shorter than the header is rejected.
pub fn parse(datagram: &[u8]) -> Result<(Header, &[u8]), Error> {
    if datagram.len() < HEADER_LEN {
        return Err(Error::Truncated(datagram.len()));
    }

    let header = Header {
        seq_num: u32::from_be_bytes(datagram[0..4].try_into().unwrap()),
        ack_num: u32::from_be_bytes(datagram[4..8].try_into().unwrap()),
        flags: u16::from_be_bytes(datagram[8..10].try_into().unwrap()),
        window_size: u16::from_be_bytes(datagram[10..12].try_into().unwrap()),
    };

    Ok((header, &datagram[HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_fields_and_payload() {
        let header = Header {
            seq_num: 4821,
            ack_num: 1193046,
            flags: SYN | ACK,
            window_size: ADVERTISED_WINDOW,
        };
        let mut out = [0u8; MAX_DATAGRAM];

        let n = encode(&header, b"hello\n", &mut out);
        assert_eq!(n, HEADER_LEN + 6);

        let (parsed, payload) = parse(&out[..n]).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(payload, b"hello\n");
        assert!(parsed.is_syn() && parsed.is_ack() && !parsed.is_fin());
    }

    #[test]
    fn header_fields_are_big_endian() {
        let header = Header {
            seq_num: 0x01020304,
            ack_num: 0x0a0b0c0d,
            flags: FIN,
            window_size: 0x2000,
        };
        let mut out = [0u8; HEADER_LEN];

        encode(&header, &[], &mut out);

        assert_eq!(&out[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&out[4..8], &[0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(&out[8..10], &[0x00, 0x04]);
        assert_eq!(&out[10..12], &[0x20, 0x00]);
    }

    #[test]
    fn short_datagram_is_rejected() {
        assert!(matches!(parse(&[0u8; 5]), Err(Error::Truncated(5))));
        assert!(matches!(parse(&[]), Err(Error::Truncated(0))));
    }

    #[test]
    fn control_frame_has_empty_payload() {
        let header = Header {
            seq_num: 1000,
            ack_num: 0,
            flags: SYN,
            window_size: ADVERTISED_WINDOW,
        };
        let mut out = [0u8; MAX_DATAGRAM];

        let n = encode(&header, &[], &mut out);
        assert_eq!(n, HEADER_LEN);

        let (_, payload) = parse(&out[..n]).unwrap();
        assert!(payload.is_empty());
    }
}
