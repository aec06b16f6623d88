// src/network/connection.rs

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::error::CourierError;
use crate::eventizer::MessageSender;
use crate::network::codec::FrameCodec;
use crate::network::{NetworkEndpoint, NetworkOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Connecting,
  Connected,
  /// Terminal.
  Disconnected,
}

impl ConnectionState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => ConnectionState::Connecting,
      1 => ConnectionState::Connected,
      _ => ConnectionState::Disconnected,
    }
  }
}

struct ConnectionInner {
  id: u64,
  state: AtomicU8,
  peer: Mutex<Option<SocketAddr>>,
  cancel: CancellationToken,
}

/// Handle to one live byte channel owned by a client or server.
#[derive(Clone)]
pub struct NetworkConnection {
  inner: Arc<ConnectionInner>,
}

impl NetworkConnection {
  pub(crate) fn new(id: u64, cancel: CancellationToken) -> Self {
    Self {
      inner: Arc::new(ConnectionInner {
        id,
        state: AtomicU8::new(ConnectionState::Connecting as u8),
        peer: Mutex::new(None),
        cancel,
      }),
    }
  }

  pub fn id(&self) -> u64 {
    self.inner.id
  }

  pub fn state(&self) -> ConnectionState {
    ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
  }

  pub fn peer_addr(&self) -> Option<SocketAddr> {
    *self.inner.peer.lock()
  }

  /// Closes the connection. Returns immediately; the endpoint's
  /// `on_disconnected` follows asynchronously.
  pub fn disconnect(&self) {
    tracing::debug!(connection = self.inner.id, "Disconnect requested");
    self.inner.cancel.cancel();
  }

  pub(crate) fn cancellation(&self) -> &CancellationToken {
    &self.inner.cancel
  }

  fn set_state(&self, state: ConnectionState) {
    self.inner.state.store(state as u8, Ordering::Release);
  }
}

impl fmt::Debug for NetworkConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NetworkConnection")
      .field("id", &self.inner.id)
      .field("state", &self.state())
      .field("peer", &self.peer_addr())
      .finish()
  }
}

/// Queues outbound messages for the connection task. Never blocks.
struct ConnectionSender<T> {
  connection: u64,
  outbound: async_channel::Sender<T>,
}

impl<T: Send> MessageSender<T> for ConnectionSender<T> {
  fn send(&self, message: T) {
    if self.outbound.try_send(message).is_err() {
      tracing::trace!(connection = self.connection, "Connection closed, dropping outbound message");
    }
  }
}

/// Runs the endpoint callbacks of one established connection until it ends.
///
/// `on_connected` comes first and `on_disconnected` last, exactly once; all
/// callbacks run on this task, one at a time. Reading and writing progress
/// independently, so a peer that is slow to read never stalls inbound traffic.
pub(crate) async fn run_connection<E: NetworkEndpoint>(
  stream: TcpStream,
  mut endpoint: E,
  connection: NetworkConnection,
  options: Arc<NetworkOptions>,
) {
  let id = connection.id();
  let peer = stream.peer_addr().ok();
  *connection.inner.peer.lock() = peer;
  if let Err(e) = options.apply_to(&stream) {
    tracing::warn!(connection = id, "Failed to apply TCP options: {}", e);
  }

  let (read_half, write_half) = stream.into_split();
  let mut reader = FramedRead::new(read_half, FrameCodec::<E::In>::new(options.max_frame_length));
  let mut writer = FramedWrite::new(write_half, FrameCodec::<E::Out>::new(options.max_frame_length));
  let (outbound_tx, outbound_rx) = async_channel::unbounded::<E::Out>();

  connection.set_state(ConnectionState::Connected);
  tracing::debug!(connection = id, peer = ?peer, "Connection established");
  endpoint.on_connected(
    connection.clone(),
    Arc::new(ConnectionSender {
      connection: id,
      outbound: outbound_tx.clone(),
    }),
  );

  // Cancelling the connection stops both halves; either half ending stops the other.
  let stop = connection.cancellation().child_token();
  let (read_fault, write_fault) = tokio::join!(
    read_loop(id, &mut reader, &mut endpoint, &stop, options.log_traffic),
    write_loop(id, &mut writer, &outbound_rx, &stop, options.log_traffic),
  );
  let fault = read_fault.or(write_fault);

  outbound_tx.close();
  connection.set_state(ConnectionState::Disconnected);
  // Dropping the halves shuts the socket down.
  drop(reader);
  drop(writer);

  if let Some(error) = fault {
    tracing::debug!(connection = id, "Connection failed: {}", error);
    endpoint.on_fault(&error);
  }
  tracing::debug!(connection = id, peer = ?peer, "Connection closed");
  endpoint.on_disconnected();
}

/// Reports a connection that never got established. No other callback follows.
pub(crate) fn connect_failed<E: NetworkEndpoint>(endpoint: &mut E, connection: &NetworkConnection, error: CourierError) {
  connection.set_state(ConnectionState::Disconnected);
  tracing::debug!(connection = connection.id(), "Connect failed: {}", error);
  endpoint.on_fault(&error);
}

/// Feeds inbound frames to the endpoint. Returns the error that ended the stream, if any.
async fn read_loop<E: NetworkEndpoint>(
  id: u64,
  reader: &mut FramedRead<OwnedReadHalf, FrameCodec<E::In>>,
  endpoint: &mut E,
  stop: &CancellationToken,
  log_traffic: bool,
) -> Option<CourierError> {
  let fault = loop {
    tokio::select! {
      biased;
      _ = stop.cancelled() => break None,
      inbound = reader.next() => match inbound {
        Some(Ok(message)) => {
          if log_traffic {
            tracing::debug!(connection = id, "<- {:?}", message);
          }
          endpoint.on_message(message);
        }
        Some(Err(e)) => break Some(e),
        None => break None, // Peer closed the stream.
      },
    }
  };
  stop.cancel();
  fault
}

/// Drains the outbound queue onto the socket, independently of reading.
async fn write_loop<T: Serialize + fmt::Debug>(
  id: u64,
  writer: &mut FramedWrite<OwnedWriteHalf, FrameCodec<T>>,
  outbound: &async_channel::Receiver<T>,
  stop: &CancellationToken,
  log_traffic: bool,
) -> Option<CourierError> {
  let fault = loop {
    let message = tokio::select! {
      biased;
      _ = stop.cancelled() => break None,
      outbound = outbound.recv() => match outbound {
        Ok(message) => message,
        Err(_) => break None,
      },
    };
    if log_traffic {
      tracing::debug!(connection = id, "-> {:?}", message);
    }
    let written = tokio::select! {
      _ = stop.cancelled() => break None,
      written = writer.send(message) => written,
    };
    if let Err(e) = written {
      break Some(e);
    }
  };
  stop.cancel();
  fault
}
