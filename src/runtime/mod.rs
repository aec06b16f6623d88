// src/runtime/mod.rs

//! Actor runtime: mailboxes, actor threads and the two scheduling strategies.

pub mod actor_ref;
pub mod actors;
pub mod executor;
pub mod failure;
pub mod logging;
pub(crate) mod mailbox;
pub mod multi_threaded;
pub mod single_threaded;
pub(crate) mod waitgroup;
pub mod worker_group;

pub use actor_ref::{create_secondary_actor, ActorId, ActorRef, ActorThread};
pub use actors::{Actors, ActorsConfig};
pub use executor::Executor;
pub use failure::{ActorFailure, FailurePolicy};
pub use logging::{Direction, MessageLogger, MessageRecord, MessageTrace, NullMessageLogger, TracingMessageLogger};
pub use multi_threaded::MultiThreadedActors;
pub use single_threaded::SingleThreadedActors;
pub(crate) use waitgroup::WaitGroup;
pub use worker_group::WorkerGroup;

static_assertions::assert_impl_all!(ActorThread: Send, Sync, Clone);
static_assertions::assert_impl_all!(Executor: Send, Sync, Clone);
static_assertions::assert_impl_all!(SingleThreadedActors: Send, Sync);
static_assertions::assert_impl_all!(MultiThreadedActors: Send, Sync);
