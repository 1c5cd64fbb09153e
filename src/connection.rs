//! A full-duplex endpoint built from two `Ring`s.

use crate::error::NetError;
use crate::ring::Ring;
use crate::trace_log;
use crate::util::next_id;
use defer_heavy::defer;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One half of an in-process connection pair. Reads delegate to the inbound
/// `Ring`, writes to the outbound `Ring` - the peer `Connection` holds the
/// same two rings crossed, so a write here becomes a read there.
///
/// `Connection` does not own its rings exclusively: each ring is jointly
/// referenced by exactly two connections, and lives as long as the longer-
/// lived of the two.
#[derive(Clone, Debug)]
pub struct Connection {
  id: u128,
  inbound: Ring,
  outbound: Ring,
  local_addr: Arc<str>,
  remote_addr: Arc<str>,
}

impl Connection {
  pub(crate) fn new(inbound: Ring, outbound: Ring, local_addr: Arc<str>, remote_addr: Arc<str>) -> Connection {
    Connection { id: next_id(), inbound, outbound, local_addr, remote_addr }
  }

  /// Reads buffered bytes from the inbound ring, blocking per the read
  /// deadline currently in effect. Prefer this over the `std::io::Read` impl
  /// when you want the precise `NetError` sentinel instead of `io::Error`.
  ///
  /// The `Ring` itself reports a zero-length read against a closed ring as
  /// `Closed` (it cannot tell "closed-and-drained" from "closed with data
  /// still sitting there" without actually attempting the read). A
  /// `Connection`'s read side is specifically about the inbound direction
  /// going quiet, so it reinterprets that as `EndOfStream` instead - the
  /// same way a non-zero-length read against a closed, drained ring already
  /// does.
  pub fn read(&self, dst: &mut [u8]) -> Result<usize, NetError> {
    match self.inbound.read(dst) {
      Err(NetError::Closed) => Err(NetError::EndOfStream),
      other => other,
    }
  }

  /// Writes bytes into the outbound ring, blocking per the write deadline
  /// currently in effect.
  pub fn write(&self, src: &[u8]) -> Result<usize, NetError> {
    self.outbound.write(src)
  }

  /// Closes both rings this connection holds. Closing one endpoint makes
  /// further writes from either side fail with `Closed`, and reads by the
  /// peer drain remaining data then see `EndOfStream`. Idempotent.
  pub fn close(&self) {
    trace_log!("memnet: connection[{:x}]: closing", self.id);
    defer! {
      self.outbound.close();
    }
    self.inbound.close();
  }

  pub fn local_addr(&self) -> &str {
    &self.local_addr
  }

  pub fn remote_addr(&self) -> &str {
    &self.remote_addr
  }

  /// Applies `deadline` to both the read and write direction.
  pub fn set_deadline(&self, deadline: Option<Instant>) -> Result<(), NetError> {
    self.inbound.set_read_deadline(deadline)?;
    self.outbound.set_write_deadline(deadline)
  }

  pub fn set_read_deadline(&self, deadline: Option<Instant>) -> Result<(), NetError> {
    self.inbound.set_read_deadline(deadline)
  }

  pub fn set_write_deadline(&self, deadline: Option<Instant>) -> Result<(), NetError> {
    self.outbound.set_write_deadline(deadline)
  }

  /// Convenience over `set_deadline` taking a duration from now, for callers
  /// who think in relative timeouts rather than absolute instants.
  pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), NetError> {
    self.set_deadline(timeout.map(|d| Instant::now() + d))
  }
}

/// `Connection` implements the standard `Read`/`Write` traits directly so it
/// is sufficient to drive any caller expecting a generic connection-oriented
/// stream. The fabric's sentinel errors are mapped onto the `io::ErrorKind`s
/// those callers already know how to interpret.
impl io::Read for Connection {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    match Connection::read(self, buf) {
      Ok(n) => Ok(n),
      Err(NetError::EndOfStream) => Ok(0),
      Err(err) => Err(err.into()),
    }
  }
}

impl io::Write for Connection {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    Connection::write(self, buf).map_err(io::Error::from)
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
