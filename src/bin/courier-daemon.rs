// src/bin/courier-daemon.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use courier::daemon::{halt, Daemon, DaemonConfig, HaltReason, NoopSuiteRunner};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "courier-daemon", version, about = "Crash-only courier daemon")]
struct Args {
  /// Port the launcher listens on
  #[clap(long, env = "COURIER_LAUNCHER_PORT")]
  launcher_port: u16,

  /// Host the launcher listens on
  #[clap(long, env = "COURIER_LAUNCHER_HOST", default_value = "127.0.0.1")]
  launcher_host: String,

  /// Halt if no launcher connects within this many milliseconds
  #[clap(long, env = "COURIER_STARTUP_TIMEOUT_MS", default_value_t = 30_000)]
  startup_timeout_ms: u64,

  /// Halt this many milliseconds after the last launcher disconnects
  #[clap(long, env = "COURIER_IDLE_TIMEOUT_MS", default_value_t = 1_000)]
  idle_timeout_ms: u64,

  /// Trace every actor message
  #[clap(long, env = "COURIER_LOG_ACTOR_MESSAGES", action)]
  log_actor_messages: bool,

  /// Trace every network frame
  #[clap(long, env = "COURIER_LOG_NETWORK", action)]
  log_network: bool,
}

impl Args {
  fn into_config(self) -> DaemonConfig {
    let mut config = DaemonConfig::new(self.launcher_port)
      .with_startup_timeout(Duration::from_millis(self.startup_timeout_ms))
      .with_idle_timeout(Duration::from_millis(self.idle_timeout_ms));
    config.launcher_host = self.launcher_host;
    config.log_actor_messages = self.log_actor_messages;
    config.network = config.network.with_log_traffic(self.log_network);
    config
  }
}

fn main() -> Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

  let config = Args::parse().into_config();
  match Daemon::start(config, Arc::new(NoopSuiteRunner)) {
    Ok(daemon) => daemon.run(),
    Err(e) => {
      tracing::error!("Daemon failed to start: {}", e);
      halt(&HaltReason::InternalError(e.to_string()))
    }
  }
}
