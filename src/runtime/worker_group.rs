// src/runtime/worker_group.rs

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::runtime::mailbox::Task;
use crate::runtime::Actors;

struct GroupState {
  outstanding: usize,
  on_all_finished: Option<Task>,
}

/// Tracks a fan-out of unattended workers and fires one callback when the last finishes.
///
/// The callback runs exactly once, on the actor thread that receives the final
/// worker completion. Workers may start further workers in the same group;
/// the group only completes when the count returns to zero.
#[derive(Clone)]
pub struct WorkerGroup {
  state: Arc<Mutex<GroupState>>,
}

impl WorkerGroup {
  pub fn new(on_all_finished: impl FnOnce() + Send + 'static) -> Self {
    Self {
      state: Arc::new(Mutex::new(GroupState {
        outstanding: 0,
        on_all_finished: Some(Box::new(on_all_finished)),
      })),
    }
  }

  /// Starts `work` as an unattended worker of `actors` and counts it in this group.
  pub fn start_worker(&self, actors: &dyn Actors, work: impl FnOnce() + Send + 'static) {
    {
      let mut state = self.state.lock();
      if state.on_all_finished.is_none() {
        tracing::warn!("Worker started in a group that has already finished");
      }
      state.outstanding += 1;
    }
    let group = self.clone();
    actors.start_unattended_worker(Box::new(work), Box::new(move || group.worker_finished()));
  }

  pub fn outstanding(&self) -> usize {
    self.state.lock().outstanding
  }

  fn worker_finished(&self) {
    let callback = {
      let mut state = self.state.lock();
      state.outstanding = state.outstanding.saturating_sub(1);
      if state.outstanding == 0 {
        state.on_all_finished.take()
      } else {
        None
      }
    };
    if let Some(callback) = callback {
      callback();
    }
  }
}

impl fmt::Debug for WorkerGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerGroup")
      .field("outstanding", &self.outstanding())
      .finish()
  }
}
