// src/daemon/coordinator.rs

use std::sync::{Arc, Weak};

use crate::daemon::halt::{HaltReason, HaltSignal};
use crate::daemon::protocol::{CommandListener, SuiteConfiguration, SuiteListener, SuiteListenerFrontend};
use crate::runs::{RunId, RunIdSequence};
use crate::runtime::{create_secondary_actor, ActorRef, Actors, WorkerGroup};

/// Runs one suite. Discovery and execution live outside this crate.
///
/// Called on an unattended worker; may fan out further work through `workers`.
/// The suite counts as finished once every worker of the group has returned.
pub trait SuiteRunner: Send + Sync + 'static {
  fn run_suite(
    &self,
    run_id: RunId,
    suite: SuiteConfiguration,
    listener: ActorRef<dyn SuiteListener>,
    actors: &Arc<dyn Actors>,
    workers: &WorkerGroup,
  );
}

/// Accepts every suite and reports nothing but its start and finish.
#[derive(Debug, Default)]
pub struct NoopSuiteRunner;

impl SuiteRunner for NoopSuiteRunner {
  fn run_suite(
    &self,
    run_id: RunId,
    suite: SuiteConfiguration,
    _listener: ActorRef<dyn SuiteListener>,
    _actors: &Arc<dyn Actors>,
    _workers: &WorkerGroup,
  ) {
    tracing::info!(run_id = %run_id, include = %suite.include_pattern, "No suite runner configured");
  }
}

/// Forwards every notification to all registered launchers.
struct SuiteListenerBroadcast {
  listeners: Vec<SuiteListenerFrontend>,
}

impl SuiteListener for SuiteListenerBroadcast {
  fn on_suite_started(&mut self, run_id: RunId) {
    for listener in &mut self.listeners {
      listener.on_suite_started(run_id);
    }
  }

  fn on_internal_error(&mut self, message: String) {
    for listener in &mut self.listeners {
      listener.on_internal_error(message.clone());
    }
  }

  fn on_suite_finished(&mut self, run_id: RunId) {
    for listener in &mut self.listeners {
      listener.on_suite_finished(run_id);
    }
  }
}

/// The daemon's central actor: collects launchers and starts suite runs.
///
/// It lives on one of the threads of `actors`, so it only holds them weakly.
pub struct TestRunCoordinator {
  actors: Weak<dyn Actors>,
  runner: Arc<dyn SuiteRunner>,
  halt: HaltSignal,
  listeners: Vec<SuiteListenerFrontend>,
  run_ids: RunIdSequence,
}

impl TestRunCoordinator {
  pub fn new(actors: &Arc<dyn Actors>, runner: Arc<dyn SuiteRunner>, halt: HaltSignal) -> Self {
    Self {
      actors: Arc::downgrade(actors),
      runner,
      halt,
      listeners: Vec::new(),
      run_ids: RunIdSequence::new(),
    }
  }
}

impl CommandListener for TestRunCoordinator {
  fn add_suite_listener(&mut self, listener: SuiteListenerFrontend) {
    tracing::debug!(listeners = self.listeners.len() + 1, "Suite listener added");
    self.listeners.push(listener);
  }

  fn run_tests(&mut self, suite: SuiteConfiguration) {
    let Some(actors) = self.actors.upgrade() else {
      tracing::warn!("Suite requested after the actors were released");
      return;
    };
    let run_id = self.run_ids.next_run_id();
    tracing::info!(run_id = %run_id, "Starting suite");

    // Bound to this actor's own thread, so notifications keep their order.
    let broadcast: Box<dyn SuiteListener> = Box::new(SuiteListenerBroadcast {
      listeners: self.listeners.clone(),
    });
    let listener = match create_secondary_actor(broadcast) {
      Ok(listener) => listener,
      Err(e) => {
        self.halt.request(HaltReason::InternalError(e.to_string()));
        return;
      }
    };
    listener.tell().on_suite_started(run_id);

    let finished = listener.clone();
    let workers = WorkerGroup::new(move || finished.tell().on_suite_finished(run_id));
    let runner = self.runner.clone();
    let group = workers.clone();
    let worker_actors = actors.clone();
    workers.start_worker(&*actors, move || {
      runner.run_suite(run_id, suite, listener, &worker_actors, &group);
    });
  }

  fn shutdown(&mut self) {
    tracing::info!("Shutdown command received");
    self.halt.request(HaltReason::ShutdownRequested);
  }
}
