// src/eventizer/mod.rs

//! Capability contracts and the events that carry calls on them.
//!
//! A contract is a trait whose methods take `&mut self` and return nothing. The
//! [`eventizer!`](crate::eventizer!) macro generates, for one such trait:
//! - an event enum with one variant per method (the captured call),
//! - a frontend struct that implements the trait by sending events to a sink,
//! - the [`Event`] impl that replays an event on a real implementation,
//! - the [`Contract`] impl for `dyn Trait` tying the three together.
//!
//! ```
//! use courier::eventizer;
//!
//! eventizer! {
//!   pub trait Greeter {
//!     fn greet(&mut self, name: String);
//!   }
//!   #[derive(serde::Serialize, serde::Deserialize)]
//!   pub enum GreeterEvent;
//!   pub struct GreeterFrontend;
//! }
//! ```

mod remote;

use std::fmt;
use std::sync::Arc;

pub use remote::{remote_frontend, RemoteEvent, RemoteSender};

/// A non-blocking sink for messages of type `T`.
///
/// Actor mailboxes, network connections and test doubles all implement this.
/// `send` must never block; a sink that can no longer deliver drops the message.
pub trait MessageSender<T>: Send + Sync {
  fn send(&self, message: T);
}

impl<T, F> MessageSender<T> for F
where
  F: Fn(T) + Send + Sync,
{
  fn send(&self, message: T) {
    self(message)
  }
}

/// One captured call on contract `C`.
pub trait Event<C: ?Sized>: fmt::Debug + Clone + Send + 'static {
  /// Replays the call against `target`. Arguments are cloned, so an event can be fired more than once.
  fn fire_on(&self, target: &mut C);

  /// Name of the contract method this event invokes.
  fn method_name(&self) -> &'static str;
}

/// Implemented for `dyn Trait` of every capability contract.
pub trait Contract: Send + 'static {
  type Event: Event<Self>;
  type Frontend: Clone + Send + Sync + 'static;

  /// Stable contract identifier embedded in the wire form of its events.
  const NAME: &'static str;

  /// Builds a frontend that turns every call into an event sent to `sender`.
  fn frontend(sender: Arc<dyn MessageSender<Self::Event>>) -> Self::Frontend;
}

/// Generates a capability contract, its event enum and its frontend.
///
/// The trait gets a `Send` supertrait so implementations can be bound to actor threads.
/// Argument types must be `Clone + Debug + Send + 'static`; add serde derives on the
/// event enum to make the contract usable across the network.
#[macro_export]
macro_rules! eventizer {
  (
    $(#[$contract_meta:meta])*
    $vis:vis trait $contract:ident {
      $(
        $(#[$method_meta:meta])*
        fn $method:ident(&mut self $(, $arg:ident : $arg_ty:ty)*);
      )+
    }
    $(#[$event_meta:meta])*
    $event_vis:vis enum $event:ident;
    $frontend_vis:vis struct $frontend:ident;
  ) => {
    $crate::__private::paste! {
      $(#[$contract_meta])*
      $vis trait $contract: Send {
        $(
          $(#[$method_meta])*
          fn $method(&mut self $(, $arg: $arg_ty)*);
        )+
      }

      #[derive(Debug, Clone)]
      $(#[$event_meta])*
      $event_vis enum $event {
        $( [<$method:camel>] { $($arg: $arg_ty),* }, )+
      }

      impl $crate::eventizer::Event<dyn $contract> for $event {
        fn fire_on(&self, target: &mut (dyn $contract + 'static)) {
          match self {
            $(
              $event::[<$method:camel>] { $($arg),* } => {
                target.$method($(::std::clone::Clone::clone($arg)),*)
              }
            )+
          }
        }

        fn method_name(&self) -> &'static str {
          match self {
            $( $event::[<$method:camel>] { .. } => stringify!($method), )+
          }
        }
      }

      #[derive(Clone)]
      $frontend_vis struct $frontend {
        sender: ::std::sync::Arc<dyn $crate::eventizer::MessageSender<$event>>,
      }

      impl ::std::fmt::Debug for $frontend {
        fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
          f.debug_struct(stringify!($frontend)).finish_non_exhaustive()
        }
      }

      impl $contract for $frontend {
        $(
          fn $method(&mut self $(, $arg: $arg_ty)*) {
            self.sender.send($event::[<$method:camel>] { $($arg),* });
          }
        )+
      }

      impl $crate::eventizer::Contract for dyn $contract {
        type Event = $event;
        type Frontend = $frontend;

        const NAME: &'static str = concat!(module_path!(), "::", stringify!($contract));

        fn frontend(
          sender: ::std::sync::Arc<dyn $crate::eventizer::MessageSender<$event>>,
        ) -> $frontend {
          $frontend { sender }
        }
      }
    }
  };
}

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;

  crate::eventizer! {
    trait Recorder {
      fn record(&mut self, label: String, count: u32);
      fn reset(&mut self);
    }
    enum RecorderEvent;
    struct RecorderFrontend;
  }

  #[derive(Default)]
  struct Log(Vec<String>);

  impl Recorder for Log {
    fn record(&mut self, label: String, count: u32) {
      self.0.push(format!("{label}:{count}"));
    }

    fn reset(&mut self) {
      self.0.clear();
    }
  }

  fn capturing_frontend() -> (RecorderFrontend, Arc<Mutex<Vec<RecorderEvent>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    let frontend = <dyn Recorder>::frontend(Arc::new(move |event: RecorderEvent| sink.lock().push(event)));
    (frontend, captured)
  }

  #[test]
  fn frontend_captures_calls_instead_of_running_them() {
    let (mut frontend, captured) = capturing_frontend();
    frontend.record("a".into(), 1);
    frontend.reset();

    let events = captured.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].method_name(), "record");
    assert_eq!(events[1].method_name(), "reset");
  }

  #[test]
  fn firing_an_event_twice_repeats_the_call() {
    let (mut frontend, captured) = capturing_frontend();
    frontend.record("x".into(), 7);

    let event = captured.lock()[0].clone();
    let mut log = Log::default();
    event.fire_on(&mut log);
    event.fire_on(&mut log);
    assert_eq!(log.0, vec!["x:7".to_string(), "x:7".to_string()]);
  }

  #[test]
  fn events_fire_on_boxed_implementations() {
    let (mut frontend, captured) = capturing_frontend();
    frontend.record("boxed".into(), 2);
    frontend.reset();

    let mut target: Box<dyn Recorder> = Box::new(Log::default());
    for event in captured.lock().iter() {
      event.fire_on(&mut *target);
    }
    let mut log = Log::default();
    captured.lock()[0].fire_on(&mut log);
    assert_eq!(log.0, vec!["boxed:2".to_string()]);
  }

  #[test]
  fn contract_name_includes_the_module_path() {
    assert!(<dyn Recorder as Contract>::NAME.ends_with("eventizer::tests::Recorder"));
  }
}
