//! Transport-level error type.

use core::fmt;
use std::io;

/// Failure on a network connection. Domain outcomes (duplicate item,
/// insufficient stock, ...) are values, not errors; this type covers only
/// plumbing.
#[derive(Debug)]
pub enum WireError {
    Connect(String),
    Codec(String),
    Io(io::Error),
    Handshake(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Connect(e) => write!(f, "connection failed: {e}"),
            WireError::Codec(e) => write!(f, "codec error: {e}"),
            WireError::Io(e) => write!(f, "IO error: {e}"),
            WireError::Handshake(e) => write!(f, "handshake failed: {e}"),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        // The framing layer reports malformed and over-length frames as
        // `InvalidData`; everything else is genuine transport trouble.
        if e.kind() == io::ErrorKind::InvalidData {
            WireError::Codec(e.to_string())
        } else {
            WireError::Io(e)
        }
    }
}

impl From<WireError> for io::Error {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Io(io_err) => io_err,
            other => io::Error::other(other),
        }
    }
}
