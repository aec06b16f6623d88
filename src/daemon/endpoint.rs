// src/daemon/endpoint.rs

use std::sync::Arc;

use crate::daemon::protocol::{CommandListener, RequestListener, SuiteListener};
use crate::daemon::timeout::{Timeout, VacancyTimeout};
use crate::error::CourierError;
use crate::eventizer::{remote_frontend, MessageSender, RemoteEvent};
use crate::network::{NetworkConnection, NetworkEndpoint};
use crate::runtime::ActorRef;

/// Binds one launcher connection to the coordinator actor.
///
/// Inbound requests are fired on the coordinator; the connection's outbound side
/// is registered with the coordinator as a suite listener. Every endpoint of a
/// daemon shares the same startup timeout and vacancy counter.
pub struct DaemonNetworkEndpoint {
  coordinator: ActorRef<dyn CommandListener>,
  startup_timeout: Arc<dyn Timeout>,
  connections: Arc<VacancyTimeout>,
}

impl DaemonNetworkEndpoint {
  pub fn new(
    coordinator: ActorRef<dyn CommandListener>,
    startup_timeout: Arc<dyn Timeout>,
    connections: Arc<VacancyTimeout>,
  ) -> Self {
    Self {
      coordinator,
      startup_timeout,
      connections,
    }
  }
}

impl NetworkEndpoint for DaemonNetworkEndpoint {
  type In = RemoteEvent<dyn RequestListener>;
  type Out = RemoteEvent<dyn SuiteListener>;

  fn on_connected(&mut self, connection: NetworkConnection, sender: Arc<dyn MessageSender<Self::Out>>) {
    tracing::info!(connection = connection.id(), peer = ?connection.peer_addr(), "Launcher connected");
    self.startup_timeout.cancel();
    self.connections.check_in();

    let listener = remote_frontend::<dyn SuiteListener>(sender);
    self.coordinator.tell().add_suite_listener(listener);
  }

  fn on_message(&mut self, message: Self::In) {
    message.fire_on(&mut self.coordinator.tell());
  }

  fn on_disconnected(&mut self) {
    tracing::info!("Launcher disconnected");
    self.connections.check_out();
  }

  fn on_fault(&mut self, error: &CourierError) {
    tracing::warn!("Launcher connection fault: {}", error);
  }
}
