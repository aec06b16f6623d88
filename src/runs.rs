// src/runs.rs

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Identifies one suite run within a daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(u32);

impl RunId {
  pub const FIRST_ID: u32 = 1;

  pub fn new(id: u32) -> Self {
    Self(id)
  }

  pub fn to_int(self) -> u32 {
    self.0
  }
}

impl fmt::Display for RunId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "RunId({})", self.0)
  }
}

/// Hands out gap-free, increasing run ids. Safe to share between threads.
#[derive(Debug)]
pub struct RunIdSequence {
  next: AtomicU32,
}

impl RunIdSequence {
  pub fn new() -> Self {
    Self {
      next: AtomicU32::new(RunId::FIRST_ID),
    }
  }

  pub fn next_run_id(&self) -> RunId {
    RunId(self.next.fetch_add(1, Ordering::Relaxed))
  }
}

impl Default for RunIdSequence {
  fn default() -> Self {
    Self::new()
  }
}
