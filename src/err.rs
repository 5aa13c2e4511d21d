use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Setup(String),

    #[error("handshake failed: {0}")]
    Handshake(&'static str),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("file error: {0}")]
    Source(#[source] io::Error),

    #[error("datagram of {0} bytes is shorter than the fixed header")]
    Truncated(usize),
}
