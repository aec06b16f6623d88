// src/daemon/timeout.rs

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A countdown that fires an action unless cancelled first.
pub trait Timeout: Send + Sync {
  /// Starts the countdown, superseding one already running.
  fn start(&self);

  /// Cancels a running countdown. No-op if none is running.
  fn cancel(&self);
}

#[derive(Default)]
struct TimerState {
  // Bumped by every start and cancel; a countdown only fires if it is still current.
  generation: u64,
}

/// Runs a command on a timer thread when the countdown expires.
///
/// The command runs while the timer lock is held, so a `cancel` that returns
/// has either stopped the countdown or waited for the command to finish. The
/// command must not call back into the same timeout.
pub struct CommandExecutingTimeout {
  duration: Duration,
  command: Arc<dyn Fn() + Send + Sync>,
  state: Arc<(Mutex<TimerState>, Condvar)>,
}

impl CommandExecutingTimeout {
  pub fn new(duration: Duration, command: impl Fn() + Send + Sync + 'static) -> Self {
    Self {
      duration,
      command: Arc::new(command),
      state: Arc::new((Mutex::new(TimerState::default()), Condvar::new())),
    }
  }
}

impl Timeout for CommandExecutingTimeout {
  fn start(&self) {
    let generation = {
      let (lock, condvar) = &*self.state;
      let mut state = lock.lock();
      state.generation += 1;
      condvar.notify_all();
      state.generation
    };

    let deadline = Instant::now() + self.duration;
    let state = self.state.clone();
    let command = self.command.clone();
    let spawned = thread::Builder::new().name("courier-timeout".to_string()).spawn(move || {
      let (lock, condvar) = &*state;
      let mut guard = lock.lock();
      loop {
        if guard.generation != generation {
          return;
        }
        if Instant::now() >= deadline {
          break;
        }
        condvar.wait_until(&mut guard, deadline);
      }
      tracing::debug!(generation, "Timeout expired");
      command();
      drop(guard);
    });
    if let Err(e) = spawned {
      tracing::error!("Failed to spawn timeout thread: {}", e);
    }
  }

  fn cancel(&self) {
    let (lock, condvar) = &*self.state;
    lock.lock().generation += 1;
    condvar.notify_all();
  }
}

impl fmt::Debug for CommandExecutingTimeout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommandExecutingTimeout")
      .field("duration", &self.duration)
      .finish_non_exhaustive()
  }
}

/// Starts a timeout while nobody is checked in.
///
/// The countdown is cancelled when the count goes from zero to one and started
/// again when it returns to zero. The count is only touched under the lock, so
/// concurrent check-ins and check-outs are never lost.
pub struct VacancyTimeout {
  timeout: Arc<dyn Timeout>,
  occupants: Mutex<usize>,
}

impl VacancyTimeout {
  pub fn new(timeout: Arc<dyn Timeout>) -> Self {
    Self {
      timeout,
      occupants: Mutex::new(0),
    }
  }

  pub fn check_in(&self) {
    let mut occupants = self.occupants.lock();
    *occupants += 1;
    if *occupants == 1 {
      self.timeout.cancel();
    }
  }

  pub fn check_out(&self) {
    let mut occupants = self.occupants.lock();
    match occupants.checked_sub(1) {
      Some(remaining) => *occupants = remaining,
      None => {
        tracing::warn!("Check-out without a matching check-in");
        return;
      }
    }
    if *occupants == 0 {
      self.timeout.start();
    }
  }

  pub fn occupants(&self) -> usize {
    *self.occupants.lock()
  }
}

impl fmt::Debug for VacancyTimeout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VacancyTimeout")
      .field("occupants", &self.occupants())
      .finish_non_exhaustive()
  }
}
