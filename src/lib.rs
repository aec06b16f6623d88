// src/lib.rs

//! courier - actors that talk to each other through mailboxes, in one process or across a socket.
//!
//! The crate has three layers:
//! - an eventizer that turns calls on a capability contract into serializable events,
//! - an actor runtime with a cooperative and a thread-per-actor scheduling strategy,
//! - a length-prefixed TCP transport plus the crash-only daemon built on top of both.

/// Crash-only daemon: remote endpoint adapter, lifecycle timeouts and halting.
pub mod daemon;
/// Defines custom error types used throughout the library.
pub mod error;
/// Capability contracts, events and the `eventizer!` macro.
pub mod eventizer;
/// Framed TCP client and server with per-connection endpoints.
pub mod network;
/// Actor threads, mailboxes, scheduling strategies and failure policies.
pub mod runtime;
/// Sequential run identifiers.
pub mod runs;

// Re-export core types for user convenience (e.g. `courier::CourierError`, `courier::ActorRef`).
pub use error::CourierError;
pub use eventizer::{Contract, Event, MessageSender, RemoteEvent};
pub use network::{NetworkClient, NetworkConnection, NetworkEndpoint, NetworkOptions, NetworkServer};
pub use runtime::{
  create_secondary_actor, ActorFailure, ActorId, ActorRef, ActorThread, Actors, ActorsConfig, Executor,
  FailurePolicy, MultiThreadedActors, SingleThreadedActors, WorkerGroup,
};
pub use runs::{RunId, RunIdSequence};

// Used by the `eventizer!` expansion; not part of the public API.
#[doc(hidden)]
pub mod __private {
  pub use paste::paste;
}

// --- Top-Level Library Information Functions ---

/// Major version number of the courier library.
const VERSION_MAJOR: i32 = 0;
/// Minor version number of the courier library.
const VERSION_MINOR: i32 = 1;
/// Patch version number of the courier library.
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
