//! Condition-variable wait/signal primitive shared by `Ring`'s two directions
//! and the listener's accept queue.
//!
//! Grounded on `extras::connector::ConnWait`: a `Mutex<()>` held only for the
//! instant it takes to order a generation bump against a parked waiter, plus
//! a `Condvar` to actually park. The counter lives outside the mutex (an
//! atomic) since the predicate it tracks ("has anything changed since I last
//! looked") has nothing to do with the data the caller's own lock protects -
//! `Ring` and the accept queue each guard their own state separately and only
//! reach into a `Waiter` to park once they've decided they need to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Instant;

pub(crate) enum WaitOutcome {
  /// Something changed (or the wait was otherwise cut short) - the caller
  /// must recheck its predicate under its own lock.
  Woken,
  TimedOut,
}

#[derive(Debug, Default)]
pub(crate) struct Waiter {
  mutex: Mutex<()>,
  generation: AtomicU64,
  condvar: Condvar,
}

impl Waiter {
  pub(crate) fn new() -> Self {
    Self { mutex: Mutex::new(()), generation: AtomicU64::new(0), condvar: Condvar::new() }
  }

  /// Snapshot of the current generation. Callers take this *while still
  /// holding their own state lock*, then drop that lock before calling
  /// `wait_for_change` - any state-changing call racing in between is then
  /// guaranteed to either land before the lock was dropped (and so already be
  /// visible via the caller's own re-check) or to bump the generation after
  /// this snapshot (and so be visible to `wait_for_change`).
  pub(crate) fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  /// Wakes every thread currently parked on this waiter, and bumps the
  /// generation so any thread that is between snapshotting it and parking
  /// observes the change instead of blocking. Must be called every time the
  /// state the waiter protects changes in a way that could unblock someone.
  pub(crate) fn wake_all(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
    if let Ok(guard) = self.mutex.lock() {
      self.condvar.notify_all();
      drop(guard);
    }
  }

  /// Parks until the generation moves past `since`, `deadline` elapses, or
  /// `deadline` was already in the past (in which case this never blocks).
  pub(crate) fn wait_for_change(&self, since: u64, deadline: Option<Instant>) -> WaitOutcome {
    let Ok(mut guard) = self.mutex.lock() else {
      return WaitOutcome::Woken;
    };

    loop {
      if self.generation.load(Ordering::SeqCst) != since {
        return WaitOutcome::Woken;
      }

      let remaining = match deadline {
        None => None,
        Some(dl) => {
          let now = Instant::now();
          if dl <= now {
            return WaitOutcome::TimedOut;
          }
          Some(dl - now)
        }
      };

      guard = match remaining {
        None => match self.condvar.wait(guard) {
          Ok(g) => g,
          Err(_) => return WaitOutcome::Woken,
        },
        Some(dur) => match self.condvar.wait_timeout(guard, dur) {
          Ok((g, result)) => {
            if result.timed_out() && self.generation.load(Ordering::SeqCst) == since {
              return WaitOutcome::TimedOut;
            }
            g
          }
          Err(_) => return WaitOutcome::Woken,
        },
      };
    }
  }
}
