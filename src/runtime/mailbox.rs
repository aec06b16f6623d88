// src/runtime/mailbox.rs

//! Mailbox types for actor threads, based on `async-channel`.

use std::fmt;

/// A unit of work queued for one actor thread.
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// One queued message: the replay closure plus the method name for logging and failure reports.
pub(crate) struct Envelope {
  pub(crate) label: &'static str,
  pub(crate) task: Task,
}

impl fmt::Debug for Envelope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Envelope").field("label", &self.label).finish_non_exhaustive()
  }
}

/// The sending end of an actor thread's mailbox.
/// It is cloneable; every `ActorRef` bound to the thread holds one.
pub(crate) type MailboxSender = async_channel::Sender<Envelope>;

/// The receiving end of an actor thread's mailbox.
/// Exactly one drain loop owns and receives from a `MailboxReceiver` at a time.
pub(crate) type MailboxReceiver = async_channel::Receiver<Envelope>;

/// Creates a new mailbox channel pair.
///
/// Mailboxes are unbounded so that `tell()` never blocks the caller.
pub(crate) fn mailbox() -> (MailboxSender, MailboxReceiver) {
  async_channel::unbounded()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mailbox_is_fifo() {
    let (tx, rx) = mailbox();
    for label in ["first", "second", "third"] {
      tx.try_send(Envelope {
        label,
        task: Box::new(|| {}),
      })
      .unwrap();
    }
    let drained: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.label).collect();
    assert_eq!(drained, vec!["first", "second", "third"]);
  }
}
