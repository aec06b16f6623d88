// src/runtime/executor.rs

use std::fmt;

use crate::runtime::ActorThread;

/// Runs work on an actor runtime.
///
/// Each submission is a message to an internal actor thread, so work runs in
/// submission order, never on the submitting thread, and goes through the
/// runtime's failure policy and message logger.
#[derive(Clone)]
pub struct Executor {
  thread: ActorThread,
}

impl Executor {
  pub(crate) fn new(thread: ActorThread) -> Self {
    Self { thread }
  }

  pub fn execute(&self, work: impl FnOnce() + Send + 'static) {
    self.thread.enqueue("execute", "execute", move |_| work());
  }

  /// The actor thread backing this executor.
  pub fn thread(&self) -> &ActorThread {
    &self.thread
  }
}

impl fmt::Debug for Executor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Executor").field("actor", &self.thread.id()).finish()
  }
}
