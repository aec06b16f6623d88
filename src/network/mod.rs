// src/network/mod.rs

//! Framed TCP transport.
//!
//! Every connection gets its own [`NetworkEndpoint`] and its own task on the I/O
//! runtime of the client or server that owns it, so a stalled connection never
//! holds up another. Messages are bincode payloads in length-prefixed frames.

pub mod client;
pub mod codec;
pub mod connection;
mod io_runtime;
pub mod options;
pub mod server;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CourierError;
use crate::eventizer::MessageSender;

pub use client::NetworkClient;
pub use codec::FrameCodec;
pub use connection::{ConnectionState, NetworkConnection};
pub use options::NetworkOptions;
pub use server::NetworkServer;

/// The local side of one connection.
///
/// Callbacks for one connection are never concurrent. `on_disconnected` is
/// delivered exactly once after `on_connected`, and nothing follows it.
pub trait NetworkEndpoint: Send + 'static {
  type In: DeserializeOwned + fmt::Debug + Send + 'static;
  type Out: Serialize + fmt::Debug + Send + 'static;

  fn on_connected(&mut self, connection: NetworkConnection, sender: Arc<dyn MessageSender<Self::Out>>);

  fn on_message(&mut self, message: Self::In);

  fn on_disconnected(&mut self);

  /// A transport or decoding error. For an established connection the
  /// connection is torn down and `on_disconnected` follows.
  fn on_fault(&mut self, error: &CourierError) {
    tracing::warn!("Network fault: {}", error);
  }
}

/// Produces a fresh endpoint for every accepted connection.
pub trait NetworkEndpointFactory<E: NetworkEndpoint>: Send + Sync + 'static {
  fn create_endpoint(&self) -> E;
}

impl<E, F> NetworkEndpointFactory<E> for F
where
  E: NetworkEndpoint,
  F: Fn() -> E + Send + Sync + 'static,
{
  fn create_endpoint(&self) -> E {
    self()
  }
}
