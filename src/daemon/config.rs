// src/daemon/config.rs

use std::time::Duration;

use crate::network::NetworkOptions;

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// How the daemon finds its launcher and when it gives up.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
  pub launcher_host: String,
  pub launcher_port: u16,
  /// Halt if no launcher has connected by then.
  pub startup_timeout: Duration,
  /// Halt this long after the last launcher disconnected. Zero halts at once.
  pub idle_timeout: Duration,
  /// Trace every actor message through `tracing`.
  pub log_actor_messages: bool,
  pub network: NetworkOptions,
}

impl DaemonConfig {
  pub fn new(launcher_port: u16) -> Self {
    Self {
      launcher_host: "127.0.0.1".to_string(),
      launcher_port,
      startup_timeout: DEFAULT_STARTUP_TIMEOUT,
      idle_timeout: DEFAULT_IDLE_TIMEOUT,
      log_actor_messages: false,
      network: NetworkOptions::default(),
    }
  }

  pub fn with_startup_timeout(mut self, startup_timeout: Duration) -> Self {
    self.startup_timeout = startup_timeout;
    self
  }

  pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
    self.idle_timeout = idle_timeout;
    self
  }
}
