// src/runtime/single_threaded.rs

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::CourierError;
use crate::runtime::actor_ref::CurrentThreadGuard;
use crate::runtime::actors::{Actors, ActorsConfig, ActorsCore, FinishedNotifier};
use crate::runtime::mailbox::MailboxReceiver;
use crate::runtime::{ActorId, ActorThread, Executor};

/// Cooperative strategy: every actor thread of the runtime is drained on the
/// caller's thread by [`process_events_until_idle`](Self::process_events_until_idle).
///
/// Each enqueued envelope also pushes its actor id onto a runtime-wide ready
/// queue; draining pops ids in that order, which replays the oldest pending
/// envelope across all mailboxes first.
pub struct SingleThreadedActors {
  core: ActorsCore,
  ready_tx: async_channel::Sender<ActorId>,
  ready_rx: async_channel::Receiver<ActorId>,
  threads: Mutex<HashMap<ActorId, (ActorThread, MailboxReceiver)>>,
  executor: OnceCell<Executor>,
}

impl SingleThreadedActors {
  pub fn new(config: ActorsConfig) -> Self {
    let (ready_tx, ready_rx) = async_channel::unbounded();
    Self {
      core: ActorsCore::new(config),
      ready_tx,
      ready_rx,
      threads: Mutex::new(HashMap::new()),
      executor: OnceCell::new(),
    }
  }

  /// Processes messages until no mailbox of this runtime has pending work,
  /// including mailboxes created and messages sent while draining.
  ///
  /// With [`FailurePolicy::Propagate`](crate::FailurePolicy::Propagate) the first
  /// failure stops the drain and is returned; the remaining messages stay queued.
  pub fn process_events_until_idle(&self) -> Result<(), CourierError> {
    while let Ok(actor) = self.ready_rx.try_recv() {
      // Clone out of the map so handlers can start new actor threads.
      let entry = self.threads.lock().get(&actor).cloned();
      let Some((thread, mailbox)) = entry else {
        continue;
      };
      let next = mailbox.try_recv();
      if mailbox.is_closed() && mailbox.is_empty() {
        self.threads.lock().remove(&actor);
      }
      if let Ok(envelope) = next {
        self.core.process(&thread, envelope)?;
      }
    }
    Ok(())
  }

  fn origin_thread(&self) -> ActorThread {
    ActorThread::current().unwrap_or_else(|| self.executor().thread().clone())
  }
}

impl Default for SingleThreadedActors {
  fn default() -> Self {
    Self::new(ActorsConfig::default())
  }
}

impl Actors for SingleThreadedActors {
  fn start_actor_thread(&self) -> ActorThread {
    let (thread, mailbox) = self.core.new_actor_thread(Some(self.ready_tx.clone()));
    self.threads.lock().insert(thread.id(), (thread.clone(), mailbox));
    thread
  }

  fn executor(&self) -> Executor {
    self
      .executor
      .get_or_init(|| Executor::new(self.start_actor_thread()))
      .clone()
  }

  fn start_unattended_worker(&self, work: Box<dyn FnOnce() + Send>, on_finished: Box<dyn FnOnce() + Send>) {
    let origin = self.origin_thread();
    let worker = self.start_actor_thread();
    worker.enqueue("unattended_worker", "unattended worker", move |_| {
      let _notify = FinishedNotifier::new(origin, on_finished);
      let _outside = CurrentThreadGuard::detach();
      work();
    });
    // One message per worker slot; the slot is released once it has been drained.
    worker.stop();
  }
}
