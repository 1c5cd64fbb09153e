//! Sentinel error taxonomy for the fabric.
//!
//! Every blocking operation on a `Ring`, `Connection` or `Listener` can fail
//! for one of four reasons: a bad argument, the object being closed, a read
//! hitting end of stream, or a deadline elapsing. `NetError` is the single
//! public enum carrying all four, plus an `Io` escape hatch for the rare case
//! of a poisoned internal lock, mirroring `TiiError`'s shape.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io;

pub type NetResult<T> = Result<T, NetError>;

#[derive(Debug)]
#[non_exhaustive]
pub enum NetError {
  /// A call was made with an invalid argument. Out-of-range capacities are
  /// normalised rather than rejected - this variant is for genuinely
  /// malformed calls only.
  InvalidArgument(&'static str),
  /// Write after close, or read/dial/accept against a closed object in a
  /// direction that no longer admits the operation.
  Closed,
  /// A read observed a closed, fully drained `Ring`.
  EndOfStream,
  /// A blocking operation's deadline elapsed before it could make progress.
  DeadlineExceeded,
  /// Wraps a lower-level I/O failure (in practice: a poisoned mutex).
  Io(io::Error),
}

impl NetError {
  pub fn kind(&self) -> io::ErrorKind {
    match self {
      NetError::Io(io) => io.kind(),
      NetError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
      NetError::Closed => io::ErrorKind::BrokenPipe,
      NetError::EndOfStream => io::ErrorKind::UnexpectedEof,
      NetError::DeadlineExceeded => io::ErrorKind::TimedOut,
    }
  }
}

impl Display for NetError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      NetError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
      NetError::Closed => f.write_str("use of closed network connection"),
      NetError::EndOfStream => f.write_str("EOF"),
      NetError::DeadlineExceeded => f.write_str("i/o timeout"),
      NetError::Io(err) => Display::fmt(err, f),
    }
  }
}

impl Error for NetError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      NetError::Io(err) => Some(err),
      _ => None,
    }
  }
}

impl From<io::Error> for NetError {
  fn from(value: io::Error) -> Self {
    NetError::Io(value)
  }
}

/// Maps the fabric's sentinel errors onto the `io::ErrorKind`s an
/// `std::io::Read`/`Write` caller already knows how to interpret, so a
/// `Connection` driven through the generic traits sees idiomatic `io::Error`s
/// (`BrokenPipe`, `UnexpectedEof`, `TimedOut`) without needing to know about
/// `NetError` at all.
impl From<NetError> for io::Error {
  fn from(value: NetError) -> Self {
    match value {
      NetError::Io(io) => io,
      NetError::EndOfStream => io::Error::new(io::ErrorKind::UnexpectedEof, "EOF"),
      other => io::Error::new(other.kind(), other.to_string()),
    }
  }
}
