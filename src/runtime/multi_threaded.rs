// src/runtime/multi_threaded.rs

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::CourierError;
use crate::runtime::actors::{Actors, ActorsConfig, ActorsCore, FinishedNotifier};
use crate::runtime::failure::run_guarded;
use crate::runtime::{ActorThread, Executor};

struct Shared {
  core: ActorsCore,
  threads: Mutex<Vec<ActorThread>>,
  actor_handles: Mutex<Vec<JoinHandle<()>>>,
  worker_handles: Mutex<Vec<JoinHandle<()>>>,
  failure: Mutex<Option<CourierError>>,
}

impl Shared {
  /// Records the first fatal error and closes every mailbox.
  fn fail(&self, error: CourierError) {
    tracing::error!("Actor runtime halted: {}", error);
    {
      let mut failure = self.failure.lock();
      if failure.is_none() {
        *failure = Some(error);
      }
    }
    self.stop_all();
  }

  fn stop_all(&self) {
    for thread in self.threads.lock().iter() {
      thread.stop();
    }
  }
}

/// Worker-per-actor strategy: every actor thread is an OS thread blocking on its mailbox.
///
/// Actors on different threads run in parallel; messages of one actor thread are
/// still processed one at a time and in order.
pub struct MultiThreadedActors {
  shared: Arc<Shared>,
  executor: OnceCell<Executor>,
}

impl MultiThreadedActors {
  pub fn new(config: ActorsConfig) -> Self {
    Self {
      shared: Arc::new(Shared {
        core: ActorsCore::new(config),
        threads: Mutex::new(Vec::new()),
        actor_handles: Mutex::new(Vec::new()),
        worker_handles: Mutex::new(Vec::new()),
        failure: Mutex::new(None),
      }),
      executor: OnceCell::new(),
    }
  }

  /// Stops every actor thread after its queued messages, joins all actor and
  /// worker threads, and returns the first fatal failure if there was one.
  ///
  /// Must not be called from an actor thread of any runtime.
  pub fn shutdown(&self) -> Result<(), CourierError> {
    if ActorThread::current().is_some() {
      return Err(CourierError::InvalidState("shutdown called from an actor thread"));
    }
    tracing::debug!("Shutting down multi-threaded actors");
    loop {
      // Workers first, so their completions still reach live actors.
      let workers = std::mem::take(&mut *self.shared.worker_handles.lock());
      join_all(workers, "worker");
      self.shared.stop_all();
      let actors = std::mem::take(&mut *self.shared.actor_handles.lock());
      let idle = actors.is_empty() && self.shared.worker_handles.lock().is_empty();
      join_all(actors, "actor");
      if idle {
        break;
      }
    }
    match self.shared.failure.lock().take() {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }

  fn origin_thread(&self) -> ActorThread {
    ActorThread::current().unwrap_or_else(|| self.executor().thread().clone())
  }
}

fn join_all(handles: Vec<JoinHandle<()>>, kind: &str) {
  for handle in handles {
    if handle.join().is_err() {
      tracing::error!(kind, "Thread panicked outside message processing");
    }
  }
}

/// Keeps `handle` for joining, releasing the handles of threads that already exited.
fn push_handle(handles: &Mutex<Vec<JoinHandle<()>>>, handle: JoinHandle<()>) {
  let mut handles = handles.lock();
  handles.retain(|h| !h.is_finished());
  handles.push(handle);
}

impl Default for MultiThreadedActors {
  fn default() -> Self {
    Self::new(ActorsConfig::default())
  }
}

impl Actors for MultiThreadedActors {
  fn start_actor_thread(&self) -> ActorThread {
    let (thread, mailbox) = self.shared.core.new_actor_thread(None);
    {
      let mut threads = self.shared.threads.lock();
      threads.retain(|t| !t.is_stopped());
      threads.push(thread.clone());
    }

    let shared = self.shared.clone();
    let drained = thread.clone();
    let spawned = thread::Builder::new()
      .name(format!("courier-{}", thread.id()))
      .spawn(move || {
        while let Ok(envelope) = mailbox.recv_blocking() {
          if let Err(error) = shared.core.process(&drained, envelope) {
            shared.fail(error);
            break;
          }
        }
        tracing::trace!(actor = %drained.id(), "Actor thread exited");
      });

    match spawned {
      Ok(handle) => push_handle(&self.shared.actor_handles, handle),
      Err(e) => {
        thread.stop();
        self.shared.fail(CourierError::Io(e));
      }
    }
    thread
  }

  fn executor(&self) -> Executor {
    self
      .executor
      .get_or_init(|| Executor::new(self.start_actor_thread()))
      .clone()
  }

  fn start_unattended_worker(&self, work: Box<dyn FnOnce() + Send>, on_finished: Box<dyn FnOnce() + Send>) {
    // Built before spawning so the callback is delivered even if the spawn fails.
    let notify = FinishedNotifier::new(self.origin_thread(), on_finished);
    let worker = self.shared.core.next_actor_id();
    let shared = self.shared.clone();
    let spawned = thread::Builder::new()
      .name(format!("courier-worker-{}", worker.as_u64()))
      .spawn(move || {
        let _notify = notify;
        if let Err(failure) = run_guarded(worker, "unattended_worker", work) {
          tracing::warn!(worker = %worker, "Unattended worker failed: {}", failure.message);
          if let Err(error) = shared.core.failure_policy().handle(failure) {
            shared.fail(error);
          }
        }
      });

    match spawned {
      Ok(handle) => push_handle(&self.shared.worker_handles, handle),
      Err(e) => tracing::error!("Failed to spawn unattended worker: {}", e),
    }
  }
}

impl Drop for MultiThreadedActors {
  fn drop(&mut self) {
    // Lets the drain loops run out; joining is left to `shutdown`.
    self.shared.stop_all();
  }
}
