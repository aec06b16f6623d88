// src/eventizer/remote.rs

use std::fmt;
use std::sync::Arc;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Contract, Event, MessageSender};

/// An event of contract `C` as it travels over the network.
///
/// On the wire it is the pair (contract name, event). Decoding checks the
/// name, so a peer speaking a different contract is reported as a corrupt
/// message instead of being replayed on the wrong trait.
pub struct RemoteEvent<C: Contract + ?Sized> {
  event: C::Event,
}

impl<C: Contract + ?Sized> RemoteEvent<C> {
  pub fn new(event: C::Event) -> Self {
    Self { event }
  }

  pub fn event(&self) -> &C::Event {
    &self.event
  }

  pub fn into_event(self) -> C::Event {
    self.event
  }

  pub fn fire_on(&self, target: &mut C) {
    self.event.fire_on(target)
  }
}

impl<C: Contract + ?Sized> Clone for RemoteEvent<C> {
  fn clone(&self) -> Self {
    Self {
      event: self.event.clone(),
    }
  }
}

impl<C: Contract + ?Sized> fmt::Debug for RemoteEvent<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RemoteEvent")
      .field("contract", &C::NAME)
      .field("event", &self.event)
      .finish()
  }
}

#[derive(Serialize)]
struct TaggedEventRef<'a, E> {
  contract: &'a str,
  event: &'a E,
}

#[derive(Deserialize)]
struct TaggedEvent<E> {
  contract: String,
  event: E,
}

impl<C> Serialize for RemoteEvent<C>
where
  C: Contract + ?Sized,
  C::Event: Serialize,
{
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    TaggedEventRef {
      contract: C::NAME,
      event: &self.event,
    }
    .serialize(serializer)
  }
}

impl<'de, C> Deserialize<'de> for RemoteEvent<C>
where
  C: Contract + ?Sized,
  C::Event: DeserializeOwned,
{
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let tagged = TaggedEvent::<C::Event>::deserialize(deserializer)?;
    if tagged.contract != C::NAME {
      return Err(de::Error::custom(format!(
        "event for contract `{}` received where `{}` was expected",
        tagged.contract,
        C::NAME
      )));
    }
    Ok(Self { event: tagged.event })
  }
}

/// Adapts a sink of [`RemoteEvent`]s (such as a network connection) into a sink of plain events.
pub struct RemoteSender<C: Contract + ?Sized> {
  inner: Arc<dyn MessageSender<RemoteEvent<C>>>,
}

impl<C: Contract + ?Sized> RemoteSender<C> {
  pub fn new(inner: Arc<dyn MessageSender<RemoteEvent<C>>>) -> Self {
    Self { inner }
  }
}

impl<C: Contract + ?Sized> MessageSender<C::Event> for RemoteSender<C> {
  fn send(&self, event: C::Event) {
    self.inner.send(RemoteEvent::new(event));
  }
}

/// A frontend of `C` whose calls are shipped to the other side of `sender`.
pub fn remote_frontend<C: Contract + ?Sized>(sender: Arc<dyn MessageSender<RemoteEvent<C>>>) -> C::Frontend {
  C::frontend(Arc::new(RemoteSender::new(sender)))
}
