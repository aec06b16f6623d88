// tests/common.rs
#![allow(dead_code)] // Each test binary uses a different subset of the helpers.

use std::sync::Once;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Upper bound for anything a test waits on.
pub const ASSERT_TIMEOUT: Duration = Duration::from_millis(2_000);

/// How long to watch for something that must not happen.
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

static TRACING_INIT: Once = Once::new();

// Can be overridden by the RUST_LOG env variable.
pub fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=debug,warn"));

    let subscriber = FmtSubscriber::builder()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_test_writer()
      .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber");
  });
}

/// Receives the next item or fails the test after [`ASSERT_TIMEOUT`].
pub fn recv<T>(rx: &Receiver<T>, what: &str) -> T {
  rx.recv_timeout(ASSERT_TIMEOUT)
    .unwrap_or_else(|e| panic!("Timed out waiting for {what}: {e}"))
}

/// Asserts that nothing arrives during [`QUIET_PERIOD`].
pub fn assert_quiet<T: std::fmt::Debug>(rx: &Receiver<T>, what: &str) {
  if let Ok(unexpected) = rx.recv_timeout(QUIET_PERIOD) {
    panic!("Unexpected {what}: {unexpected:?}");
  }
}

/// A local port nothing listens on.
pub fn unused_port() -> u16 {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind a throwaway listener");
  listener.local_addr().expect("Throwaway listener has no address").port()
}
