// src/network/io_runtime.rs

use std::cell::Cell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::error::CourierError;
use crate::network::{NetworkConnection, NetworkOptions};
use crate::runtime::WaitGroup;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
  // Id of the I/O runtime this thread works for, zero elsewhere.
  static CURRENT_RUNTIME_ID: Cell<u64> = Cell::new(0);
}

/// The parts of an [`IoRuntime`] that tasks running on it need.
#[derive(Clone)]
pub(crate) struct IoShared {
  pub(crate) options: Arc<NetworkOptions>,
  pub(crate) shutdown: CancellationToken,
  tasks: WaitGroup,
  next_connection_id: Arc<AtomicU64>,
}

impl IoShared {
  pub(crate) fn new_connection(&self) -> NetworkConnection {
    let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
    NetworkConnection::new(id, self.shutdown.child_token())
  }

  /// Spawns a task counted by `close()`. Must be called from inside the runtime.
  pub(crate) fn spawn_tracked(&self, task: impl Future<Output = ()> + Send + 'static) {
    let guard = self.tasks.enter();
    tokio::spawn(async move {
      let _guard = guard;
      task.await;
    });
  }
}

/// A dedicated multi-threaded tokio runtime owned by one client or server.
pub(crate) struct IoRuntime {
  id: u64,
  role: &'static str,
  shared: IoShared,
  runtime: Mutex<Option<Runtime>>,
}

impl IoRuntime {
  pub(crate) fn new(role: &'static str, options: NetworkOptions) -> Result<Self, CourierError> {
    let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
    let runtime = options.build_runtime(role, move || CURRENT_RUNTIME_ID.with(|current| current.set(id)))?;
    tracing::debug!(role, io_threads = options.io_threads, "I/O runtime started");
    Ok(Self {
      id,
      role,
      shared: IoShared {
        options: Arc::new(options),
        shutdown: CancellationToken::new(),
        tasks: WaitGroup::new(),
        next_connection_id: Arc::new(AtomicU64::new(1)),
      },
      runtime: Mutex::new(Some(runtime)),
    })
  }

  pub(crate) fn shared(&self) -> &IoShared {
    &self.shared
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.runtime.lock().is_none()
  }

  /// Number of connection and accept tasks still running.
  pub(crate) fn active_tasks(&self) -> usize {
    self.shared.tasks.get_count()
  }

  /// Runs `f` inside the runtime's context, e.g. to register std sockets with its reactor.
  pub(crate) fn enter<T>(&self, f: impl FnOnce(&IoShared) -> T) -> Result<T, CourierError> {
    let runtime = self.runtime.lock();
    let runtime = runtime
      .as_ref()
      .ok_or(CourierError::InvalidState("network runtime is closed"))?;
    let _context = runtime.enter();
    Ok(f(&self.shared))
  }

  pub(crate) fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) -> Result<(), CourierError> {
    self.enter(|shared| shared.spawn_tracked(task))
  }

  /// Cancels every connection, waits for their tasks, then stops the I/O threads.
  ///
  /// Idempotent. The whole close is bounded by `close_timeout`. Called from an
  /// endpoint callback, it waits for every other task and leaves the calling
  /// connection to wind down once the callback returns.
  pub(crate) fn close(&self) {
    let Some(runtime) = self.runtime.lock().take() else {
      return;
    };
    tracing::debug!(role = self.role, "Closing network runtime");
    self.shared.shutdown.cancel();

    let tasks = self.shared.tasks.clone();
    let timeout = self.shared.options.close_timeout;
    let role = self.role;

    if self.is_own_thread() {
      // The calling task holds one count and cannot finish before we return.
      tokio::task::block_in_place(|| runtime.block_on(wait_for_tasks(&tasks, 1, timeout, role)));
      runtime.shutdown_background();
      tracing::debug!(role, "Network runtime closed from one of its own tasks");
      return;
    }

    let closer = move || {
      let started = std::time::Instant::now();
      runtime.block_on(wait_for_tasks(&tasks, 0, timeout, role));
      runtime.shutdown_timeout(timeout.saturating_sub(started.elapsed()));
    };

    // block_on is not allowed on a thread that already drives a runtime, so close from a fresh one.
    std::thread::scope(|scope| {
      let spawned = std::thread::Builder::new()
        .name(format!("courier-{role}-close"))
        .spawn_scoped(scope, closer);
      match spawned {
        Ok(handle) => {
          if handle.join().is_err() {
            tracing::error!(role, "Network runtime shutdown panicked");
          }
        }
        Err(e) => tracing::error!(role, "Failed to spawn shutdown thread: {}", e),
      }
    });
    tracing::debug!(role, "Network runtime closed");
  }

  fn is_own_thread(&self) -> bool {
    CURRENT_RUNTIME_ID.with(|current| current.get() == self.id)
  }
}

async fn wait_for_tasks(tasks: &WaitGroup, remaining: usize, timeout: Duration, role: &'static str) {
  if tokio::time::timeout(timeout, tasks.wait_for(remaining)).await.is_err() {
    tracing::warn!(role, remaining = tasks.get_count(), "Timed out waiting for connections to close");
  }
}

impl Drop for IoRuntime {
  fn drop(&mut self) {
    self.close();
  }
}
