// src/runtime/failure.rs

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::CourierError;
use crate::runtime::ActorId;

/// A message handler that panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorFailure {
  pub actor: ActorId,
  pub method: &'static str,
  pub message: String,
}

impl ActorFailure {
  pub(crate) fn from_panic(actor: ActorId, method: &'static str, payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
      (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
      text.clone()
    } else {
      "non-string panic payload".to_string()
    };
    Self { actor, method, message }
  }
}

impl fmt::Display for ActorFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} failed in `{}`: {}", self.actor, self.method, self.message)
  }
}

/// Runs `work`, turning a panic into an [`ActorFailure`].
pub(crate) fn run_guarded(actor: ActorId, method: &'static str, work: impl FnOnce()) -> Result<(), ActorFailure> {
  panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| ActorFailure::from_panic(actor, method, payload))
}

/// What a runtime does when a message handler panics. Chosen when the runtime is built.
#[derive(Clone, Default)]
pub enum FailurePolicy {
  /// The failure is fatal to the runtime: draining stops and the error reaches whoever drives it.
  #[default]
  Propagate,
  /// The failure is handed to the callback and draining continues.
  Suppress(Arc<dyn Fn(&ActorFailure) + Send + Sync>),
}

impl FailurePolicy {
  pub fn suppress(handler: impl Fn(&ActorFailure) + Send + Sync + 'static) -> Self {
    FailurePolicy::Suppress(Arc::new(handler))
  }

  /// Suppresses failures after logging them at error level.
  pub fn log_and_continue() -> Self {
    Self::suppress(|failure| tracing::error!(actor = %failure.actor, method = failure.method, "{}", failure))
  }

  /// `Ok` if processing may continue, otherwise the error to surface.
  pub(crate) fn handle(&self, failure: ActorFailure) -> Result<(), CourierError> {
    match self {
      FailurePolicy::Propagate => Err(CourierError::UncaughtFailure(failure)),
      FailurePolicy::Suppress(handler) => {
        tracing::debug!(actor = %failure.actor, method = failure.method, "Suppressing actor failure");
        handler(&failure);
        Ok(())
      }
    }
  }
}

impl fmt::Debug for FailurePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FailurePolicy::Propagate => f.write_str("Propagate"),
      FailurePolicy::Suppress(_) => f.write_str("Suppress(..)"),
    }
  }
}
