// src/daemon/halt.rs

//! The one way a daemon ends.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

/// Exit status of a halted daemon. Never zero.
pub const HALT_STATUS: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
  /// No launcher connected before the startup timeout.
  StartupTimeout,
  /// The last connection closed and nobody came back before the idle timeout.
  IdleTimeout,
  /// A launcher sent the shutdown command.
  ShutdownRequested,
  /// A failure in the daemon's own machinery.
  InternalError(String),
}

impl fmt::Display for HaltReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HaltReason::StartupTimeout => f.write_str("startup timeout"),
      HaltReason::IdleTimeout => f.write_str("idle timeout"),
      HaltReason::ShutdownRequested => f.write_str("shutdown requested"),
      HaltReason::InternalError(message) => write!(f, "internal error: {message}"),
    }
  }
}

/// Asks the daemon's drive loop to halt. Cheap to clone; safe to use from any thread.
#[derive(Debug, Clone)]
pub struct HaltSignal {
  tx: Sender<HaltReason>,
}

impl HaltSignal {
  pub fn request(&self, reason: HaltReason) {
    tracing::info!(reason = %reason, "Halt requested");
    // Nobody waiting means the drive loop is already halting.
    let _ = self.tx.try_send(reason);
  }
}

/// The drive loop's end of the halt channel.
#[derive(Debug)]
pub struct HaltReceiver {
  rx: Receiver<HaltReason>,
}

impl HaltReceiver {
  /// Blocks until the first halt request.
  pub fn wait(&self) -> HaltReason {
    self
      .rx
      .recv()
      .unwrap_or_else(|_| HaltReason::InternalError("halt channel disconnected".to_string()))
  }

  pub fn wait_timeout(&self, timeout: Duration) -> Option<HaltReason> {
    self.rx.recv_timeout(timeout).ok()
  }
}

pub fn halt_channel() -> (HaltSignal, HaltReceiver) {
  let (tx, rx) = crossbeam_channel::unbounded();
  (HaltSignal { tx }, HaltReceiver { rx })
}

/// Terminates the process with [`HALT_STATUS`]. Does not unwind and does not return.
///
/// Only the daemon's top-level drive loop calls this.
pub fn halt(reason: &HaltReason) -> ! {
  tracing::info!(reason = %reason, status = HALT_STATUS, "Halting");
  std::process::exit(HALT_STATUS)
}
