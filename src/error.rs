// src/error.rs

use std::io;
use thiserror::Error;

use crate::runtime::ActorFailure;

#[derive(Error, Debug)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum CourierError {
  // --- I/O Errors ---
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Operation timed out")]
  Timeout,

  // --- Connection/Binding Errors ---
  #[error("Address already in use: {0}")]
  AddrInUse(String),
  #[error("Address not available: {0}")]
  AddrNotAvailable(String),
  #[error("Connection refused by peer: {0}")]
  ConnectionRefused(String),
  #[error("Connection closed by peer or transport")]
  ConnectionClosed,
  #[error("Permission denied for endpoint: {0}")]
  PermissionDenied(String),
  #[error("Invalid endpoint: {0}")]
  InvalidEndpoint(String),

  // --- Framing Errors ---
  #[error("Corrupt message: {0}")]
  CorruptMessage(String),
  #[error("Frame of {size} bytes exceeds the limit of {limit} bytes")]
  FrameTooLarge { size: usize, limit: usize },
  #[error("Failed to encode message: {0}")]
  EncodeFailed(String),

  // --- Actor Errors ---
  #[error("uncaught exception: {0}")]
  UncaughtFailure(ActorFailure),

  // --- State Errors ---
  #[error("Operation is invalid for the current state: {0}")]
  InvalidState(&'static str),

  // --- Internal Errors ---
  #[error("Internal library error: {0}")]
  Internal(String),
}

// Helper function to map common std::io::Error kinds
impl CourierError {
  pub fn from_io_endpoint(e: io::Error, endpoint: &str) -> Self {
    match e.kind() {
      io::ErrorKind::AddrInUse => CourierError::AddrInUse(endpoint.to_string()),
      io::ErrorKind::AddrNotAvailable => CourierError::AddrNotAvailable(endpoint.to_string()),
      io::ErrorKind::ConnectionRefused => CourierError::ConnectionRefused(endpoint.to_string()),
      io::ErrorKind::PermissionDenied => CourierError::PermissionDenied(endpoint.to_string()),
      io::ErrorKind::InvalidInput => CourierError::InvalidEndpoint(endpoint.to_string()),
      io::ErrorKind::TimedOut => CourierError::Timeout,
      io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => {
        CourierError::ConnectionClosed
      }
      _ => CourierError::Io(e), // Default fallback
    }
  }

  /// True for errors that mean the peer sent bytes we cannot interpret.
  pub fn is_corrupt_message(&self) -> bool {
    matches!(self, CourierError::CorruptMessage(_) | CourierError::FrameTooLarge { .. })
  }
}

static_assertions::assert_impl_all!(CourierError: Send, Sync);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_io_errors_using_the_endpoint() {
    let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
    match CourierError::from_io_endpoint(refused, "127.0.0.1:1") {
      CourierError::ConnectionRefused(endpoint) => assert_eq!(endpoint, "127.0.0.1:1"),
      other => panic!("unexpected mapping: {other:?}"),
    }

    let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
    assert!(matches!(
      CourierError::from_io_endpoint(reset, "x"),
      CourierError::ConnectionClosed
    ));

    let other = io::Error::new(io::ErrorKind::Other, "boom");
    assert!(matches!(CourierError::from_io_endpoint(other, "x"), CourierError::Io(_)));
  }

  #[test]
  fn frame_errors_count_as_corrupt_messages() {
    assert!(CourierError::CorruptMessage("bad".into()).is_corrupt_message());
    assert!(CourierError::FrameTooLarge { size: 10, limit: 1 }.is_corrupt_message());
    assert!(!CourierError::ConnectionClosed.is_corrupt_message());
  }
}
