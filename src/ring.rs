//! The transport primitive: a fixed-capacity circular byte buffer with a
//! blocking reader side and a blocking writer side.

use crate::error::{NetError, NetResult};
use crate::util::{next_id, unwrap_poison};
use crate::waiter::{WaitOutcome, Waiter};
use crate::{debug_log, trace_log};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

struct RingState {
  buf: Box<[u8]>,
  /// Index of the next byte to be read.
  read_cursor: usize,
  /// Index of the next byte to be written.
  write_cursor: usize,
  /// Populated byte count `n`. Invariant: `(read_cursor + len) % capacity == write_cursor`.
  len: usize,
  closed: bool,
  read_deadline: Option<Instant>,
  write_deadline: Option<Instant>,
}

impl RingState {
  fn drain_into(&mut self, dst: &mut [u8]) -> usize {
    let capacity = self.buf.len();
    let n = dst.len().min(self.len);
    for (i, slot) in dst.iter_mut().enumerate().take(n) {
      #[expect(clippy::indexing_slicing)] // (read_cursor + i) % capacity is always in bounds
      {
        *slot = self.buf[(self.read_cursor + i) % capacity];
      }
    }
    self.read_cursor = (self.read_cursor + n) % capacity;
    self.len -= n;
    n
  }

  fn append_from(&mut self, src: &[u8]) -> usize {
    let capacity = self.buf.len();
    let free = capacity - self.len;
    let n = src.len().min(free);
    for (i, byte) in src.iter().enumerate().take(n) {
      #[expect(clippy::indexing_slicing)] // (write_cursor + i) % capacity is always in bounds
      {
        self.buf[(self.write_cursor + i) % capacity] = *byte;
      }
    }
    self.write_cursor = (self.write_cursor + n) % capacity;
    self.len += n;
    n
  }
}

struct RingInner {
  id: u128,
  state: Mutex<RingState>,
  data_avail: Waiter,
  space_avail: Waiter,
}

/// A fixed-capacity FIFO byte buffer with blocking read/write, a close
/// protocol, and per-direction deadlines.
///
/// Cloning a `Ring` hands out another reference to the *same* underlying
/// buffer - this is how a single ring ends up jointly referenced by its
/// producer-side and consumer-side `Connection`. The buffer is torn down
/// once every clone is dropped.
#[derive(Clone)]
pub struct Ring {
  inner: Arc<RingInner>,
}

impl Debug for Ring {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Ring").field("id", &self.inner.id).finish()
  }
}

fn deadline_expired(deadline: Option<Instant>) -> bool {
  deadline.is_some_and(|dl| dl <= Instant::now())
}

impl Ring {
  /// Constructs a ring of capacity `capacity` (bytes), which must be at
  /// least 1. Callers within this crate (the `Listener`) already enforce
  /// that, so this is `pub(crate)` rather than validating again here.
  pub(crate) fn new(capacity: usize) -> Ring {
    debug_assert!(capacity >= 1, "ring capacity must be at least 1 byte");
    let id = next_id();
    trace_log!("memnet: ring[{id:x}]: created, capacity={capacity}");
    Ring {
      inner: Arc::new(RingInner {
        id,
        state: Mutex::new(RingState {
          buf: vec![0u8; capacity].into_boxed_slice(),
          read_cursor: 0,
          write_cursor: 0,
          len: 0,
          closed: false,
          read_deadline: None,
          write_deadline: None,
        }),
        data_avail: Waiter::new(),
        space_avail: Waiter::new(),
      }),
    }
  }

  fn lock_state(&self) -> NetResult<MutexGuard<'_, RingState>> {
    unwrap_poison(self.inner.state.lock()).map_err(NetError::from)
  }

  /// Fills `dst` with as many bytes as are currently buffered, blocking if
  /// none are available yet.
  pub fn read(&self, dst: &mut [u8]) -> NetResult<usize> {
    if dst.is_empty() {
      let state = self.lock_state()?;
      if state.closed {
        return Err(NetError::Closed);
      }
      if deadline_expired(state.read_deadline) {
        return Err(NetError::DeadlineExceeded);
      }
      return Ok(0);
    }

    loop {
      let (since, deadline) = {
        let mut state = self.lock_state()?;
        if state.len > 0 {
          let n = state.drain_into(dst);
          drop(state);
          self.inner.space_avail.wake_all();
          trace_log!("memnet: ring[{:x}]: read {n} bytes", self.inner.id);
          return Ok(n);
        }
        if state.closed {
          return Err(NetError::EndOfStream);
        }
        if deadline_expired(state.read_deadline) {
          return Err(NetError::DeadlineExceeded);
        }
        (self.inner.data_avail.generation(), state.read_deadline)
      };

      match self.inner.data_avail.wait_for_change(since, deadline) {
        WaitOutcome::TimedOut => return Err(NetError::DeadlineExceeded),
        WaitOutcome::Woken => continue,
      }
    }
  }

  /// Copies as many bytes from `src` as fit into the free capacity, blocking
  /// if the ring is full.
  pub fn write(&self, src: &[u8]) -> NetResult<usize> {
    if src.is_empty() {
      let state = self.lock_state()?;
      if state.closed {
        return Err(NetError::Closed);
      }
      if deadline_expired(state.write_deadline) {
        return Err(NetError::DeadlineExceeded);
      }
      return Ok(0);
    }

    loop {
      let (since, deadline) = {
        let mut state = self.lock_state()?;
        if state.closed {
          return Err(NetError::Closed);
        }
        let capacity = state.buf.len();
        if state.len < capacity {
          let n = state.append_from(src);
          drop(state);
          self.inner.data_avail.wake_all();
          trace_log!("memnet: ring[{:x}]: wrote {n} bytes", self.inner.id);
          return Ok(n);
        }
        if deadline_expired(state.write_deadline) {
          return Err(NetError::DeadlineExceeded);
        }
        (self.inner.space_avail.generation(), state.write_deadline)
      };

      match self.inner.space_avail.wait_for_change(since, deadline) {
        WaitOutcome::TimedOut => return Err(NetError::DeadlineExceeded),
        WaitOutcome::Woken => continue,
      }
    }
  }

  /// Idempotent. Marks the ring closed and wakes every waiter on both
  /// directions - pending reads observe EOF once drained, pending writes
  /// observe `Closed` immediately.
  pub fn close(&self) {
    let already_closed = {
      let Ok(mut state) = self.inner.state.lock() else {
        return;
      };
      let was = state.closed;
      state.closed = true;
      was
    };

    if already_closed {
      return;
    }

    debug_log!("memnet: ring[{:x}]: closed", self.inner.id);
    self.inner.data_avail.wake_all();
    self.inner.space_avail.wake_all();
  }

  pub fn is_closed(&self) -> bool {
    self.lock_state().map(|s| s.closed).unwrap_or(true)
  }

  /// Sets (or clears, with `None`) the read deadline. A deadline already in
  /// the past fails any blocked-or-future read immediately; changing it
  /// wakes the read-side waiter so the new value takes effect promptly.
  pub fn set_read_deadline(&self, deadline: Option<Instant>) -> NetResult<()> {
    let mut state = self.lock_state()?;
    state.read_deadline = deadline;
    drop(state);
    self.inner.data_avail.wake_all();
    Ok(())
  }

  /// Sets (or clears, with `None`) the write deadline. See `set_read_deadline`.
  pub fn set_write_deadline(&self, deadline: Option<Instant>) -> NetResult<()> {
    let mut state = self.lock_state()?;
    state.write_deadline = deadline;
    drop(state);
    self.inner.space_avail.wake_all();
    Ok(())
  }
}
