// src/runtime/actor_ref.rs

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::CourierError;
use crate::eventizer::{Contract, Event, MessageSender};
use crate::runtime::logging::MessageLogger;
use crate::runtime::mailbox::{Envelope, MailboxSender};

/// Identifies one mailbox (one actor thread) within a runtime. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub(crate) u64);

impl ActorId {
  pub fn as_u64(self) -> u64 {
    self.0
  }
}

impl fmt::Display for ActorId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "actor-{}", self.0)
  }
}

thread_local! {
  static CURRENT_THREAD: RefCell<Option<ActorThread>> = const { RefCell::new(None) };
}

/// Marks the OS thread as processing a message of `thread` until dropped.
pub(crate) struct CurrentThreadGuard {
  previous: Option<ActorThread>,
}

impl CurrentThreadGuard {
  pub(crate) fn enter(thread: &ActorThread) -> Self {
    let previous = CURRENT_THREAD.with(|current| current.replace(Some(thread.clone())));
    Self { previous }
  }

  /// Clears the marker until dropped, for work that runs outside of any actor.
  pub(crate) fn detach() -> Self {
    let previous = CURRENT_THREAD.with(|current| current.replace(None));
    Self { previous }
  }
}

impl Drop for CurrentThreadGuard {
  fn drop(&mut self) {
    let previous = self.previous.take();
    CURRENT_THREAD.with(|current| *current.borrow_mut() = previous);
  }
}

pub(crate) struct ActorThreadInner {
  id: ActorId,
  mailbox: MailboxSender,
  // Cooperative runtimes learn about pending work through this queue.
  ready: Option<async_channel::Sender<ActorId>>,
  logger: Arc<dyn MessageLogger>,
}

/// Owner of one mailbox. Every actor bound to it shares the mailbox and its single drain.
#[derive(Clone)]
pub struct ActorThread {
  inner: Arc<ActorThreadInner>,
}

impl ActorThread {
  pub(crate) fn new(
    id: ActorId,
    mailbox: MailboxSender,
    ready: Option<async_channel::Sender<ActorId>>,
    logger: Arc<dyn MessageLogger>,
  ) -> Self {
    Self {
      inner: Arc::new(ActorThreadInner {
        id,
        mailbox,
        ready,
        logger,
      }),
    }
  }

  pub fn id(&self) -> ActorId {
    self.inner.id
  }

  /// The actor thread whose message is being processed on the calling OS thread, if any.
  pub fn current() -> Option<ActorThread> {
    CURRENT_THREAD.with(|current| current.borrow().clone())
  }

  /// Binds `target` to this thread and returns a reference through which it can be told things.
  pub fn bind_actor<C: Contract + ?Sized>(&self, target: Box<C>) -> ActorRef<C> {
    tracing::trace!(actor = %self.inner.id, contract = C::NAME, "Binding actor");
    ActorRef::from_sender(Arc::new(ActorSender {
      thread: self.clone(),
      target: Arc::new(Mutex::new(target)),
    }))
  }

  /// Closes the mailbox. Messages already queued are still processed; later ones are dropped.
  pub fn stop(&self) {
    if self.inner.mailbox.close() {
      tracing::debug!(actor = %self.inner.id, "Actor thread stopped");
    }
  }

  pub fn is_stopped(&self) -> bool {
    self.inner.mailbox.is_closed()
  }

  /// Queues `deliver(message)` on this thread's mailbox. Returns false if the mailbox is closed.
  pub(crate) fn enqueue<M>(&self, label: &'static str, message: M, deliver: impl FnOnce(M) + Send + 'static) -> bool
  where
    M: fmt::Debug + Send + 'static,
  {
    self.inner.logger.on_message_sent(self.inner.id, &message);
    let envelope = Envelope {
      label,
      task: Box::new(move || deliver(message)),
    };
    if self.inner.mailbox.try_send(envelope).is_err() {
      tracing::trace!(actor = %self.inner.id, label, "Mailbox closed, dropping message");
      return false;
    }
    if let Some(ready) = &self.inner.ready {
      // The ready queue lives as long as the runtime that handed it out.
      let _ = ready.try_send(self.inner.id);
    }
    true
  }
}

impl fmt::Debug for ActorThread {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActorThread")
      .field("id", &self.inner.id)
      .field("stopped", &self.is_stopped())
      .finish()
  }
}

struct ActorSender<C: Contract + ?Sized> {
  thread: ActorThread,
  target: Arc<Mutex<Box<C>>>,
}

impl<C: Contract + ?Sized> MessageSender<C::Event> for ActorSender<C> {
  fn send(&self, event: C::Event) {
    let target = self.target.clone();
    self.thread.enqueue(event.method_name(), event, move |event: C::Event| {
      event.fire_on(&mut **target.lock());
    });
  }
}

/// A contract-typed handle to an actor. Cheap to clone and safe to share between threads.
pub struct ActorRef<C: Contract + ?Sized> {
  sender: Arc<dyn MessageSender<C::Event>>,
}

impl<C: Contract + ?Sized> ActorRef<C> {
  /// Wraps any event sink, e.g. a remote connection, as an actor reference.
  pub fn from_sender(sender: Arc<dyn MessageSender<C::Event>>) -> Self {
    Self { sender }
  }

  /// A frontend whose calls are queued on the actor's mailbox. Never blocks.
  pub fn tell(&self) -> C::Frontend {
    C::frontend(self.sender.clone())
  }
}

impl<C: Contract + ?Sized> Clone for ActorRef<C> {
  fn clone(&self) -> Self {
    Self {
      sender: self.sender.clone(),
    }
  }
}

impl<C: Contract + ?Sized> fmt::Debug for ActorRef<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActorRef").field("contract", &C::NAME).finish_non_exhaustive()
  }
}

/// Binds `target` to the actor thread currently processing a message.
///
/// Lets a handler create helper actors that share its own mailbox, so their
/// messages are serialized with the handler's.
pub fn create_secondary_actor<C: Contract + ?Sized>(target: Box<C>) -> Result<ActorRef<C>, CourierError> {
  let thread = ActorThread::current().ok_or(CourierError::InvalidState(
    "secondary actors can only be created from inside an actor thread",
  ))?;
  Ok(thread.bind_actor(target))
}
