// src/daemon/protocol.rs

//! Contracts spoken between a launcher and the daemon.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::eventizer;
use crate::runs::RunId;

/// What to run. Interpreting it is up to the [`SuiteRunner`](super::SuiteRunner).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfiguration {
  pub class_path: Vec<PathBuf>,
  pub runner_options: Vec<String>,
  pub include_pattern: String,
}

eventizer! {
  /// Commands a launcher sends to the daemon.
  pub trait RequestListener {
    fn run_tests(&mut self, suite: SuiteConfiguration);
    fn shutdown(&mut self);
  }
  #[derive(Serialize, Deserialize)]
  pub enum RequestListenerEvent;
  pub struct RequestListenerFrontend;
}

eventizer! {
  /// Progress the daemon reports to every connected launcher.
  pub trait SuiteListener {
    fn on_suite_started(&mut self, run_id: RunId);
    fn on_internal_error(&mut self, message: String);
    fn on_suite_finished(&mut self, run_id: RunId);
  }
  #[derive(Serialize, Deserialize)]
  pub enum SuiteListenerEvent;
  pub struct SuiteListenerFrontend;
}

eventizer! {
  /// The coordinator's contract: the remote commands plus listener registration.
  pub trait CommandListener {
    fn add_suite_listener(&mut self, listener: SuiteListenerFrontend);
    fn run_tests(&mut self, suite: SuiteConfiguration);
    fn shutdown(&mut self);
  }
  pub enum CommandListenerEvent;
  pub struct CommandListenerFrontend;
}

// Remote commands are fired straight onto the coordinator's frontend.
impl RequestListener for CommandListenerFrontend {
  fn run_tests(&mut self, suite: SuiteConfiguration) {
    CommandListener::run_tests(self, suite);
  }

  fn shutdown(&mut self) {
    CommandListener::shutdown(self);
  }
}
