// src/daemon/mod.rs

//! The crash-only daemon.
//!
//! A daemon connects to its launcher, takes commands from it and reports suite
//! progress back. It never exits normally: every path out of it goes through
//! [`halt`], whether a lifecycle timeout expired, a launcher asked it to shut
//! down, or its own machinery failed.

pub mod config;
pub mod coordinator;
pub mod endpoint;
pub mod halt;
pub mod protocol;
pub mod timeout;

use std::sync::Arc;
use std::time::Duration;

use crate::error::CourierError;
use crate::network::{NetworkClient, NetworkConnection};
use crate::runtime::logging::{MessageLogger, NullMessageLogger, TracingMessageLogger};
use crate::runtime::{ActorRef, Actors, ActorsConfig, FailurePolicy, MultiThreadedActors};

pub use config::DaemonConfig;
pub use coordinator::{NoopSuiteRunner, SuiteRunner, TestRunCoordinator};
pub use endpoint::DaemonNetworkEndpoint;
pub use halt::{halt, halt_channel, HaltReason, HaltReceiver, HaltSignal, HALT_STATUS};
pub use protocol::{CommandListener, RequestListener, SuiteConfiguration, SuiteListener};
pub use timeout::{CommandExecutingTimeout, Timeout, VacancyTimeout};

/// A running daemon: its actors, its launcher connection and its halt channel.
pub struct Daemon {
  // Field order matters on drop: the connection closes before the actors stop.
  client: NetworkClient,
  connection: NetworkConnection,
  coordinator: ActorRef<dyn CommandListener>,
  actors: Arc<MultiThreadedActors>,
  halt_rx: HaltReceiver,
}

impl Daemon {
  /// Builds the actors, arms the startup timeout and starts connecting to the launcher.
  pub fn start(config: DaemonConfig, runner: Arc<dyn SuiteRunner>) -> Result<Self, CourierError> {
    let (halt_signal, halt_rx) = halt_channel();

    // Any failure inside an actor ends the daemon.
    let failure_halt = halt_signal.clone();
    let failure_policy =
      FailurePolicy::suppress(move |failure| failure_halt.request(HaltReason::InternalError(failure.to_string())));
    let logger: Arc<dyn MessageLogger> = if config.log_actor_messages {
      Arc::new(TracingMessageLogger)
    } else {
      Arc::new(NullMessageLogger)
    };
    let actors = Arc::new(MultiThreadedActors::new(
      ActorsConfig::default()
        .with_logger(logger)
        .with_failure_policy(failure_policy),
    ));

    let shared_actors: Arc<dyn Actors> = actors.clone();
    let coordinator = actors
      .start_actor_thread()
      .bind_actor::<dyn CommandListener>(Box::new(TestRunCoordinator::new(
        &shared_actors,
        runner,
        halt_signal.clone(),
      )));

    let startup_halt = halt_signal.clone();
    let startup_timeout: Arc<dyn Timeout> = Arc::new(CommandExecutingTimeout::new(config.startup_timeout, move || {
      startup_halt.request(HaltReason::StartupTimeout)
    }));
    let idle_halt = halt_signal;
    let idle_timeout: Arc<dyn Timeout> = Arc::new(CommandExecutingTimeout::new(config.idle_timeout, move || {
      idle_halt.request(HaltReason::IdleTimeout)
    }));
    let connections = Arc::new(VacancyTimeout::new(idle_timeout));
    startup_timeout.start();

    let client = NetworkClient::new(config.network.clone())?;
    let endpoint = DaemonNetworkEndpoint::new(coordinator.clone(), startup_timeout, connections);
    let connection = client.connect(&config.launcher_host, config.launcher_port, endpoint)?;
    tracing::info!(
      host = %config.launcher_host,
      port = config.launcher_port,
      startup_timeout = ?config.startup_timeout,
      idle_timeout = ?config.idle_timeout,
      "Daemon started"
    );

    Ok(Self {
      client,
      connection,
      coordinator,
      actors,
      halt_rx,
    })
  }

  pub fn coordinator(&self) -> &ActorRef<dyn CommandListener> {
    &self.coordinator
  }

  pub fn actors(&self) -> &Arc<MultiThreadedActors> {
    &self.actors
  }

  pub fn connection(&self) -> &NetworkConnection {
    &self.connection
  }

  /// Waits for a halt request without halting. For embedding and tests.
  pub fn await_halt(&self, timeout: Duration) -> Option<HaltReason> {
    self.halt_rx.wait_timeout(timeout)
  }

  /// Drives the daemon until something requests a halt, then halts the process.
  pub fn run(self) -> ! {
    let reason = self.halt_rx.wait();
    halt(&reason)
  }
}

impl std::fmt::Debug for Daemon {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Daemon")
      .field("connection", &self.connection)
      .field("client", &self.client)
      .finish_non_exhaustive()
  }
}
