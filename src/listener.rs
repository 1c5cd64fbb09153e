//! The rendezvous that pairs dialers with acceptors.

use crate::connection::Connection;
use crate::error::{NetError, NetResult};
use crate::ring::Ring;
use crate::util::{next_id, unwrap_poison};
use crate::waiter::{WaitOutcome, Waiter};
use crate::{debug_log, trace_log};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Per-ring byte capacity used when none is configured explicitly via
/// `ListenerBuilder::ring_capacity`. The accept-queue depth and the per-ring
/// byte capacity are independent knobs; this one defaults generously since
/// most callers never need to think about it.
pub const DEFAULT_RING_CAPACITY: usize = 4096;

struct QueueState {
  pending: VecDeque<Connection>,
  closed: bool,
}

struct ListenerInner {
  id: u128,
  address: Arc<str>,
  capacity: usize,
  ring_capacity: usize,
  timeout: Option<Duration>,
  queue: Mutex<QueueState>,
  /// Signalled when an item is dequeued, freeing room for a blocked `Dial`.
  space_avail: Waiter,
  /// Signalled when an item is enqueued, waking a blocked `Accept`.
  pending_avail: Waiter,
}

/// Address-bound rendezvous that pairs dialers with acceptors. `Listener` is
/// cheap to clone - every clone refers to the same accept queue, the way a
/// real listening socket is shared between threads that all call `Accept`.
#[derive(Clone)]
pub struct Listener {
  inner: Arc<ListenerInner>,
}

impl Debug for Listener {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Listener")
      .field("id", &self.inner.id)
      .field("addr", &self.inner.address)
      .finish()
  }
}

impl Listener {
  fn lock_queue(&self) -> NetResult<MutexGuard<'_, QueueState>> {
    unwrap_poison(self.inner.queue.lock()).map_err(NetError::from)
  }

  fn absolute_deadline(&self) -> Option<Instant> {
    self.inner.timeout.map(|t| Instant::now() + t)
  }

  /// Dials a new connection. Blocks while the accept queue is at capacity,
  /// until a slot frees up, the listener closes (`Closed`), or the accept
  /// timeout elapses (`DeadlineExceeded`).
  pub fn dial(&self) -> NetResult<Connection> {
    let deadline = self.absolute_deadline();

    loop {
      let since = {
        let mut queue = self.lock_queue()?;
        if queue.closed {
          return Err(NetError::Closed);
        }

        if queue.pending.len() < self.inner.capacity {
          let forward = Ring::new(self.inner.ring_capacity);
          let backward = Ring::new(self.inner.ring_capacity);
          let addr = Arc::clone(&self.inner.address);

          let dialer_side = Connection::new(backward.clone(), forward.clone(), Arc::clone(&addr), Arc::clone(&addr));
          let acceptor_side = Connection::new(forward, backward, addr.clone(), addr);

          queue.pending.push_back(acceptor_side);
          drop(queue);
          self.inner.pending_avail.wake_all();
          trace_log!("memnet: listener[{:x}]: dial enqueued a connection", self.inner.id);
          return Ok(dialer_side);
        }

        self.inner.space_avail.generation()
      };

      match self.inner.space_avail.wait_for_change(since, deadline) {
        WaitOutcome::TimedOut => return Err(NetError::DeadlineExceeded),
        WaitOutcome::Woken => continue,
      }
    }
  }

  /// Accepts the oldest pending connection in FIFO order. Blocks while the
  /// queue is empty, until a `Dial` arrives, the listener closes
  /// (`Closed`), or the accept timeout elapses (`DeadlineExceeded`).
  pub fn accept(&self) -> NetResult<Connection> {
    let deadline = self.absolute_deadline();

    loop {
      let since = {
        let mut queue = self.lock_queue()?;
        if queue.closed && queue.pending.is_empty() {
          return Err(NetError::Closed);
        }

        if let Some(conn) = queue.pending.pop_front() {
          drop(queue);
          self.inner.space_avail.wake_all();
          trace_log!("memnet: listener[{:x}]: accept dequeued a connection", self.inner.id);
          return Ok(conn);
        }

        self.inner.pending_avail.generation()
      };

      match self.inner.pending_avail.wait_for_change(since, deadline) {
        WaitOutcome::TimedOut => return Err(NetError::DeadlineExceeded),
        WaitOutcome::Woken => continue,
      }
    }
  }

  /// Idempotent. Connections already handed to callers keep working; any
  /// connection still sitting on the accept queue is discarded - its rings
  /// are released once no endpoint references them.
  pub fn close(&self) {
    let discarded = {
      let Ok(mut queue) = self.inner.queue.lock() else {
        return;
      };
      if queue.closed {
        return;
      }
      queue.closed = true;
      queue.pending.drain(..).count()
    };

    debug_log!("memnet: listener[{:x}]: closed, discarded {discarded} pending connection(s)", self.inner.id);
    self.inner.pending_avail.wake_all();
    self.inner.space_avail.wake_all();
  }

  /// The address this listener was constructed with; used only for equality
  /// and display, never parsed or resolved.
  pub fn addr(&self) -> &str {
    &self.inner.address
  }
}

/// Builds a `Listener`. [`listen`] keeps the flat
/// `listen(capacity, timeout_ms, address)` shape for simple call sites;
/// `ListenerBuilder` additionally exposes the per-ring byte capacity as
/// configuration.
pub struct ListenerBuilder {
  address: String,
  capacity: usize,
  timeout_ms: u64,
  ring_capacity: usize,
}

impl ListenerBuilder {
  pub fn new(address: impl Into<String>) -> Self {
    ListenerBuilder { address: address.into(), capacity: 1, timeout_ms: 0, ring_capacity: DEFAULT_RING_CAPACITY }
  }

  /// Maximum number of simultaneously pending (dialed-but-not-yet-accepted)
  /// connections. Values less than 1 are normalised up to 1.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity.max(1);
    self
  }

  /// Shared accept/dial timeout in milliseconds. `0` means "block forever",
  /// since it is not otherwise a meaningful wait duration.
  pub fn accept_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = timeout_ms;
    self
  }

  /// Per-ring byte capacity. Defaults to [`DEFAULT_RING_CAPACITY`].
  pub fn ring_capacity(mut self, bytes: usize) -> Self {
    self.ring_capacity = bytes.max(1);
    self
  }

  pub fn build(self) -> NetResult<Listener> {
    let id = next_id();
    trace_log!(
      "memnet: listener[{id:x}]: listening on {:?}, capacity={}, ring_capacity={}",
      self.address,
      self.capacity,
      self.ring_capacity
    );
    Ok(Listener {
      inner: Arc::new(ListenerInner {
        id,
        address: Arc::from(self.address.into_boxed_str()),
        capacity: self.capacity,
        ring_capacity: self.ring_capacity,
        timeout: if self.timeout_ms == 0 { None } else { Some(Duration::from_millis(self.timeout_ms)) },
        queue: Mutex::new(QueueState { pending: VecDeque::new(), closed: false }),
        space_avail: Waiter::new(),
        pending_avail: Waiter::new(),
      }),
    })
  }

  pub fn build_arc(self) -> NetResult<Arc<Listener>> {
    self.build().map(Arc::new)
  }
}

/// Constructs a `Listener` with capacity `capacity` (max pending accepts,
/// normalised up to 1), accept/dial timeout `timeout_ms` milliseconds, and
/// logical address `address`.
pub fn listen(capacity: usize, timeout_ms: u64, address: impl Into<String>) -> NetResult<Listener> {
  ListenerBuilder::new(address).capacity(capacity).accept_timeout_ms(timeout_ms).build()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn addr_round_trips() {
    let listener = listen(1, 10, "0.0.0.0:4434").unwrap();
    assert_eq!(listener.addr(), "0.0.0.0:4434");
  }

  #[test]
  fn closed_listener_rejects_dial() {
    let listener = listen(1, 10, "0.0.0.0:4434").unwrap();
    listener.close();
    assert!(matches!(listener.dial(), Err(NetError::Closed)));
  }

  #[test]
  fn closed_listener_with_empty_queue_rejects_accept() {
    let listener = listen(1, 10, "0.0.0.0:4434").unwrap();
    listener.close();
    assert!(matches!(listener.accept(), Err(NetError::Closed)));
  }

  #[test]
  fn close_is_idempotent() {
    let listener = listen(1, 10, "0.0.0.0:4434").unwrap();
    listener.close();
    listener.close();
    assert!(matches!(listener.dial(), Err(NetError::Closed)));
  }

  #[test]
  fn accept_returns_pending_connections_in_fifo_order() {
    let listener = listen(4, 0, "fifo:1").unwrap();
    let _a = listener.dial().unwrap();
    let _b = listener.dial().unwrap();
    let _c = listener.dial().unwrap();

    // Tag each accepted connection by writing a distinguishing byte from the
    // dialer side, then confirm accept() drains them oldest-first.
    _a.write(b"1").unwrap();
    _b.write(b"2").unwrap();
    _c.write(b"3").unwrap();

    for expected in [b'1', b'2', b'3'] {
      let accepted = listener.accept().unwrap();
      let mut buf = [0u8; 1];
      accepted.read(&mut buf).unwrap();
      assert_eq!(buf[0], expected);
    }
  }

  #[test]
  fn dial_blocks_when_accept_queue_is_full_then_unblocks_on_accept() {
    let listener = listen(1, 0, "backpressure:1").unwrap();
    let _first = listener.dial().unwrap();

    let l2 = listener.clone();
    let handle = thread::spawn(move || l2.dial());

    thread::sleep(std::time::Duration::from_millis(50));
    let accepted_first = listener.accept().unwrap();
    drop(accepted_first);

    handle.join().unwrap().unwrap();
  }

  #[test]
  fn dial_times_out_when_queue_stays_full() {
    let listener = listen(1, 20, "backpressure:2").unwrap();
    let _first = listener.dial().unwrap();
    assert!(matches!(listener.dial(), Err(NetError::DeadlineExceeded)));
  }

  #[test]
  fn accept_times_out_on_empty_queue() {
    let listener = listen(1, 20, "accept-timeout:1").unwrap();
    assert!(matches!(listener.accept(), Err(NetError::DeadlineExceeded)));
  }

  #[test]
  fn capacity_less_than_one_normalises_to_one() {
    let listener = listen(0, 20, "zero-cap:1").unwrap();
    let _first = listener.dial().unwrap();
    assert!(matches!(listener.dial(), Err(NetError::DeadlineExceeded)));
  }

  #[test]
  fn connections_handed_out_survive_listener_close() {
    let listener = listen(1, 0, "survive:1").unwrap();
    let local = listener.dial().unwrap();
    let remote = listener.accept().unwrap();
    listener.close();

    assert_eq!(local.write(b"still alive").unwrap(), 11);
    let mut out = [0u8; 11];
    assert_eq!(remote.read(&mut out).unwrap(), 11);
    assert_eq!(&out, b"still alive");
  }
}
