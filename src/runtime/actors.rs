// src/runtime/actors.rs

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::CourierError;
use crate::runtime::actor_ref::CurrentThreadGuard;
use crate::runtime::failure::{run_guarded, FailurePolicy};
use crate::runtime::logging::{MessageLogger, NullMessageLogger};
use crate::runtime::mailbox::{self, Envelope, MailboxReceiver, Task};
use crate::runtime::{ActorId, ActorThread, Executor};

/// The lifecycle operations shared by both scheduling strategies.
pub trait Actors: Send + Sync {
  /// Creates a new mailbox with its own drain.
  fn start_actor_thread(&self) -> ActorThread;

  /// Runs submitted work as messages of an internal actor thread of this runtime.
  fn executor(&self) -> Executor;

  /// Runs `work` outside of any actor, then delivers `on_finished` to the actor
  /// thread that called this (the executor's thread when called from outside).
  /// `on_finished` is delivered even if `work` panics.
  fn start_unattended_worker(&self, work: Box<dyn FnOnce() + Send>, on_finished: Box<dyn FnOnce() + Send>);
}

/// Construction-time settings of an actor runtime.
#[derive(Clone)]
pub struct ActorsConfig {
  pub logger: Arc<dyn MessageLogger>,
  pub failure_policy: FailurePolicy,
}

impl Default for ActorsConfig {
  fn default() -> Self {
    Self {
      logger: Arc::new(NullMessageLogger),
      failure_policy: FailurePolicy::default(),
    }
  }
}

impl ActorsConfig {
  pub fn with_logger(mut self, logger: Arc<dyn MessageLogger>) -> Self {
    self.logger = logger;
    self
  }

  pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
    self.failure_policy = failure_policy;
    self
  }
}

impl fmt::Debug for ActorsConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActorsConfig")
      .field("failure_policy", &self.failure_policy)
      .finish_non_exhaustive()
  }
}

/// State and message processing shared by the scheduling strategies.
pub(crate) struct ActorsCore {
  next_actor_id: AtomicU64,
  logger: Arc<dyn MessageLogger>,
  failure_policy: FailurePolicy,
}

impl ActorsCore {
  pub(crate) fn new(config: ActorsConfig) -> Self {
    Self {
      next_actor_id: AtomicU64::new(1),
      logger: config.logger,
      failure_policy: config.failure_policy,
    }
  }

  pub(crate) fn next_actor_id(&self) -> ActorId {
    ActorId(self.next_actor_id.fetch_add(1, Ordering::Relaxed))
  }

  pub(crate) fn failure_policy(&self) -> &FailurePolicy {
    &self.failure_policy
  }

  pub(crate) fn new_actor_thread(&self, ready: Option<async_channel::Sender<ActorId>>) -> (ActorThread, MailboxReceiver) {
    let (tx, rx) = mailbox::mailbox();
    let thread = ActorThread::new(self.next_actor_id(), tx, ready, self.logger.clone());
    tracing::debug!(actor = %thread.id(), "Actor thread started");
    (thread, rx)
  }

  /// Replays one envelope on `thread`. An `Err` means the runtime must stop draining.
  pub(crate) fn process(&self, thread: &ActorThread, envelope: Envelope) -> Result<(), CourierError> {
    let actor = thread.id();
    self.logger.on_processing_started(actor, envelope.label);
    let outcome = {
      let _current = CurrentThreadGuard::enter(thread);
      run_guarded(actor, envelope.label, envelope.task)
    };
    self.logger.on_processing_finished(actor);

    match outcome {
      Ok(()) => Ok(()),
      Err(failure) => {
        tracing::warn!(actor = %actor, method = failure.method, "Uncaught failure: {}", failure.message);
        self.failure_policy.handle(failure)
      }
    }
  }
}

/// Delivers a worker's completion callback to its origin thread when dropped,
/// so the callback also arrives when the work unwinds.
pub(crate) struct FinishedNotifier {
  origin: ActorThread,
  on_finished: Option<Task>,
}

impl FinishedNotifier {
  pub(crate) fn new(origin: ActorThread, on_finished: Task) -> Self {
    Self {
      origin,
      on_finished: Some(on_finished),
    }
  }
}

impl Drop for FinishedNotifier {
  fn drop(&mut self) {
    if let Some(on_finished) = self.on_finished.take() {
      self.origin.enqueue("worker_finished", "worker finished", move |_| on_finished());
    }
  }
}
