// src/runtime/waitgroup.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// An asynchronous WaitGroup, similar to Go's `sync.WaitGroup`.
///
/// The network client and server register every connection and accept task
/// here, so `close()` can wait until they have all delivered their final callbacks.
#[derive(Debug, Clone)]
pub(crate) struct WaitGroup {
  count: Arc<AtomicUsize>,
  notify_on_done: Arc<Notify>,
}

impl WaitGroup {
  /// Creates a new WaitGroup with an initial count of zero.
  pub fn new() -> Self {
    Self {
      count: Arc::new(AtomicUsize::new(0)),
      notify_on_done: Arc::new(Notify::new()),
    }
  }

  /// Registers one task and returns a guard that marks it done when dropped,
  /// including when the task is cancelled or unwinds.
  pub fn enter(&self) -> WaitGroupGuard {
    self.count.fetch_add(1, Ordering::Relaxed);
    WaitGroupGuard { group: self.clone() }
  }

  fn done(&self) {
    let old_count = self.count.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(old_count > 0, "WaitGroup count went below zero");
    if old_count == 1 {
      tracing::trace!("WaitGroup count reached zero, notifying waiters");
    }
    self.notify_on_done.notify_waiters();
  }

  /// Waits asynchronously until the WaitGroup counter becomes zero.
  ///
  /// If the counter is already zero when called, returns immediately.
  pub async fn wait(&self) {
    self.wait_for(0).await
  }

  /// Waits until at most `remaining` tasks are still registered.
  ///
  /// A task waiting for the others passes its own registration as `remaining = 1`.
  pub async fn wait_for(&self, remaining: usize) {
    loop {
      // Register interest before checking, so a `done` in between is not missed.
      let notified = self.notify_on_done.notified();
      if self.count.load(Ordering::Acquire) <= remaining {
        return;
      }
      notified.await;
    }
  }

  /// Returns the current count.
  pub fn get_count(&self) -> usize {
    self.count.load(Ordering::Acquire)
  }
}

/// Marks one task of a [`WaitGroup`] done when dropped.
#[derive(Debug)]
pub(crate) struct WaitGroupGuard {
  group: WaitGroup,
}

impl Drop for WaitGroupGuard {
  fn drop(&mut self) {
    self.group.done();
  }
}
