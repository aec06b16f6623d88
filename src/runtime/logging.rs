// src/runtime/logging.rs

//! Diagnostic hooks for message traffic between actors.

use std::fmt;

use parking_lot::Mutex;

use crate::runtime::ActorId;

/// Observes every message sent to, and processed by, the actors of one runtime.
///
/// Called on hot paths, so implementations should be cheap when disabled.
pub trait MessageLogger: Send + Sync {
  fn on_message_sent(&self, target: ActorId, message: &dyn fmt::Debug);

  fn on_processing_started(&self, actor: ActorId, method: &'static str);

  fn on_processing_finished(&self, actor: ActorId);
}

/// Discards everything. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMessageLogger;

impl MessageLogger for NullMessageLogger {
  fn on_message_sent(&self, _target: ActorId, _message: &dyn fmt::Debug) {}

  fn on_processing_started(&self, _actor: ActorId, _method: &'static str) {}

  fn on_processing_finished(&self, _actor: ActorId) {}
}

/// Emits one `tracing` event per message on the `courier::messages` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMessageLogger;

impl MessageLogger for TracingMessageLogger {
  fn on_message_sent(&self, target: ActorId, message: &dyn fmt::Debug) {
    tracing::debug!(target: "courier::messages", actor = %target, "-> {:?}", message);
  }

  fn on_processing_started(&self, actor: ActorId, method: &'static str) {
    tracing::debug!(target: "courier::messages", actor = %actor, method, "processing");
  }

  fn on_processing_finished(&self, actor: ActorId) {
    tracing::trace!(target: "courier::messages", actor = %actor, "processing finished");
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Sent,
  Processed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
  pub direction: Direction,
  pub actor: ActorId,
  pub message: String,
}

/// Keeps an in-memory, append-only record of the traffic. Meant for tests and debugging.
#[derive(Debug, Default)]
pub struct MessageTrace {
  records: Mutex<Vec<MessageRecord>>,
}

impl MessageTrace {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> Vec<MessageRecord> {
    self.records.lock().clone()
  }

  pub fn records_for(&self, actor: ActorId) -> Vec<MessageRecord> {
    self.records.lock().iter().filter(|r| r.actor == actor).cloned().collect()
  }
}

impl MessageLogger for MessageTrace {
  fn on_message_sent(&self, target: ActorId, message: &dyn fmt::Debug) {
    self.records.lock().push(MessageRecord {
      direction: Direction::Sent,
      actor: target,
      message: format!("{:?}", message),
    });
  }

  fn on_processing_started(&self, actor: ActorId, method: &'static str) {
    self.records.lock().push(MessageRecord {
      direction: Direction::Processed,
      actor,
      message: method.to_string(),
    });
  }

  fn on_processing_finished(&self, _actor: ActorId) {}
}
