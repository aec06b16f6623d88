// src/network/client.rs

use tokio::net::TcpStream;

use crate::error::CourierError;
use crate::network::connection::{connect_failed, run_connection};
use crate::network::io_runtime::IoRuntime;
use crate::network::{NetworkConnection, NetworkEndpoint, NetworkOptions};

/// Opens outgoing connections. Owns its own I/O threads.
pub struct NetworkClient {
  io: IoRuntime,
}

impl NetworkClient {
  pub fn new(options: NetworkOptions) -> Result<Self, CourierError> {
    Ok(Self {
      io: IoRuntime::new("client", options)?,
    })
  }

  /// Starts connecting to `host:port` and returns at once.
  ///
  /// `endpoint` gets `on_connected` when the connection is up; if it cannot be
  /// established, it gets `on_fault` and nothing else.
  pub fn connect<E: NetworkEndpoint>(&self, host: &str, port: u16, endpoint: E) -> Result<NetworkConnection, CourierError> {
    let shared = self.io.shared().clone();
    let connection = shared.new_connection();
    let address = format!("{host}:{port}");
    tracing::debug!(connection = connection.id(), address = %address, "Connecting");

    let task_connection = connection.clone();
    self.io.spawn(async move {
      let mut endpoint = endpoint;
      let cancel = task_connection.cancellation().clone();
      let connected = tokio::select! {
        _ = cancel.cancelled() => Err(CourierError::ConnectionClosed),
        result = TcpStream::connect(address.as_str()) => {
          result.map_err(|e| CourierError::from_io_endpoint(e, &address))
        }
      };
      match connected {
        Ok(stream) => run_connection(stream, endpoint, task_connection, shared.options.clone()).await,
        Err(error) => connect_failed(&mut endpoint, &task_connection, error),
      }
    })?;
    Ok(connection)
  }

  /// Disconnects every connection and stops the I/O threads. Idempotent.
  ///
  /// When this returns, no endpoint of this client receives further callbacks.
  /// Called from inside an endpoint callback, the calling endpoint still gets its
  /// `on_disconnected` after the callback returns.
  pub fn close(&self) {
    self.io.close();
  }

  pub fn is_closed(&self) -> bool {
    self.io.is_closed()
  }

  /// Connections of this client that have not finished yet.
  pub fn active_connections(&self) -> usize {
    self.io.active_tasks()
  }
}

impl std::fmt::Debug for NetworkClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NetworkClient")
      .field("closed", &self.is_closed())
      .field("active_connections", &self.active_connections())
      .finish()
  }
}
