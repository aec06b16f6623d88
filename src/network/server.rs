// src/network/server.rs

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::sleep;

use crate::error::CourierError;
use crate::network::connection::run_connection;
use crate::network::io_runtime::{IoRuntime, IoShared};
use crate::network::{NetworkEndpoint, NetworkEndpointFactory, NetworkOptions};

/// Accepts incoming connections, with one fresh endpoint per connection. Owns its own I/O threads.
pub struct NetworkServer {
  io: IoRuntime,
}

impl NetworkServer {
  pub fn new(options: NetworkOptions) -> Result<Self, CourierError> {
    Ok(Self {
      io: IoRuntime::new("server", options)?,
    })
  }

  /// Binds an ephemeral port on the configured address and starts accepting.
  ///
  /// Bind failures are returned here; everything after that is reported to the endpoints.
  pub fn listen_on_any_port<E, F>(&self, factory: F) -> Result<u16, CourierError>
  where
    E: NetworkEndpoint,
    F: NetworkEndpointFactory<E>,
  {
    let bind_addr = SocketAddr::new(self.io.shared().options.bind_address, 0);
    let endpoint = bind_addr.to_string();
    let std_listener = bind_std_listener(bind_addr).map_err(|e| CourierError::from_io_endpoint(e, &endpoint))?;
    let local_addr = std_listener.local_addr()?;

    let factory = Arc::new(factory);
    self.io.enter(move |shared| -> Result<(), CourierError> {
      let listener = TcpListener::from_std(std_listener)?;
      shared.spawn_tracked(accept_loop(listener, local_addr, factory, shared.clone()));
      Ok(())
    })??;

    tracing::info!(address = %local_addr, "Listening");
    Ok(local_addr.port())
  }

  /// Stops accepting, disconnects every connection and stops the I/O threads. Idempotent.
  ///
  /// When this returns, no endpoint of this server receives further callbacks.
  /// Called from inside an endpoint callback, the calling endpoint still gets its
  /// `on_disconnected` after the callback returns.
  pub fn close(&self) {
    self.io.close();
  }

  pub fn is_closed(&self) -> bool {
    self.io.is_closed()
  }

  /// Accept loops and connections of this server that have not finished yet.
  pub fn active_tasks(&self) -> usize {
    self.io.active_tasks()
  }
}

impl std::fmt::Debug for NetworkServer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NetworkServer")
      .field("closed", &self.is_closed())
      .field("active_tasks", &self.active_tasks())
      .finish()
  }
}

fn bind_std_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
  let domain = if addr.is_ipv4() {
    socket2::Domain::IPV4
  } else {
    socket2::Domain::IPV6
  };
  let socket = socket2::Socket::new(domain, socket2::Type::STREAM, None)?;
  socket.set_reuse_address(true)?;
  socket.bind(&addr.into())?;
  socket.listen(128)?;
  let listener: std::net::TcpListener = socket.into();
  listener.set_nonblocking(true)?;
  Ok(listener)
}

fn is_fatal_accept_error(e: &io::Error) -> bool {
  matches!(e.kind(), io::ErrorKind::InvalidInput | io::ErrorKind::BrokenPipe)
}

async fn accept_loop<E, F>(listener: TcpListener, local_addr: SocketAddr, factory: Arc<F>, shared: IoShared)
where
  E: NetworkEndpoint,
  F: NetworkEndpointFactory<E>,
{
  loop {
    tokio::select! {
      biased;
      _ = shared.shutdown.cancelled() => break,
      accepted = listener.accept() => match accepted {
        Ok((stream, peer)) => {
          let connection = shared.new_connection();
          tracing::debug!(connection = connection.id(), peer = %peer, "Accepted connection");
          let endpoint = factory.create_endpoint();
          shared.spawn_tracked(run_connection(stream, endpoint, connection, shared.options.clone()));
        }
        Err(e) => {
          tracing::error!(address = %local_addr, "Error accepting TCP connection: {}", e);
          if is_fatal_accept_error(&e) {
            break;
          }
          sleep(Duration::from_millis(100)).await;
        }
      },
    }
  }
  tracing::debug!(address = %local_addr, "Accept loop stopped");
}
