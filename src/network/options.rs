// src/network/options.rs

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use crate::error::CourierError;

/// Default upper bound for one frame's payload (16 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Settings shared by [`NetworkClient`](super::NetworkClient) and [`NetworkServer`](super::NetworkServer).
#[derive(Debug, Clone)]
pub struct NetworkOptions {
  /// Interface the server listens on.
  pub bind_address: IpAddr,
  /// Worker threads of the I/O runtime owned by each client or server.
  pub io_threads: usize,
  /// Frames with a longer payload are rejected on both send and receive.
  pub max_frame_length: usize,
  pub tcp_nodelay: bool,
  pub tcp_keepalive: Option<Duration>,
  /// Upper bound for `close()` waiting on connections and I/O threads.
  pub close_timeout: Duration,
  /// Log every frame sent and received at debug level.
  pub log_traffic: bool,
}

impl Default for NetworkOptions {
  fn default() -> Self {
    Self {
      bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
      io_threads: 2,
      max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
      tcp_nodelay: true,
      tcp_keepalive: None,
      close_timeout: Duration::from_secs(5),
      log_traffic: false,
    }
  }
}

impl NetworkOptions {
  pub fn with_log_traffic(mut self, log_traffic: bool) -> Self {
    self.log_traffic = log_traffic;
    self
  }

  pub(crate) fn apply_to(&self, stream: &TcpStream) -> Result<(), CourierError> {
    let socket_ref = SockRef::from(stream);
    socket_ref.set_nodelay(self.tcp_nodelay)?;
    if let Some(time) = self.tcp_keepalive {
      socket_ref.set_tcp_keepalive(&TcpKeepalive::new().with_time(time))?;
    }
    Ok(())
  }

  /// Builds the dedicated I/O runtime of one client or server.
  pub(crate) fn build_runtime(
    &self,
    role: &str,
    on_thread_start: impl Fn() + Send + Sync + 'static,
  ) -> Result<tokio::runtime::Runtime, CourierError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .worker_threads(self.io_threads.max(1))
      .thread_name(format!("courier-{role}-io"))
      .on_thread_start(on_thread_start)
      .enable_all()
      .build()?;
    Ok(runtime)
  }
}
