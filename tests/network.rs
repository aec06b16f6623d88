// tests/network.rs

mod common;

use std::fmt::Debug;
use std::sync::Arc;

use courier::network::ConnectionState;
use courier::{
  eventizer, CourierError, MessageSender, NetworkClient, NetworkConnection, NetworkEndpoint, NetworkOptions,
  NetworkServer, RemoteEvent,
};
use crossbeam_channel::{Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Everything an endpoint was told, in order.
enum Seen<In, Out> {
  Connected(NetworkConnection, Arc<dyn MessageSender<Out>>),
  Message(In),
  Fault(CourierError),
  Disconnected,
}

impl<In: Debug, Out> Debug for Seen<In, Out> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Seen::Connected(connection, _) => write!(f, "Connected({connection:?})"),
      Seen::Message(message) => write!(f, "Message({message:?})"),
      Seen::Fault(error) => write!(f, "Fault({error})"),
      Seen::Disconnected => f.write_str("Disconnected"),
    }
  }
}

/// Forwards its callbacks to a channel and optionally answers every message.
struct Observer<In, Out> {
  events: Sender<Seen<In, Out>>,
  reply: fn(&In) -> Option<Out>,
  sender: Option<Arc<dyn MessageSender<Out>>>,
}

impl<In, Out> Clone for Observer<In, Out> {
  fn clone(&self) -> Self {
    Self {
      events: self.events.clone(),
      reply: self.reply,
      sender: None,
    }
  }
}

impl<In, Out> NetworkEndpoint for Observer<In, Out>
where
  In: DeserializeOwned + Debug + Send + 'static,
  Out: Serialize + Debug + Send + 'static,
{
  type In = In;
  type Out = Out;

  fn on_connected(&mut self, connection: NetworkConnection, sender: Arc<dyn MessageSender<Out>>) {
    self.sender = Some(sender.clone());
    let _ = self.events.send(Seen::Connected(connection, sender));
  }

  fn on_message(&mut self, message: In) {
    if let (Some(reply), Some(sender)) = ((self.reply)(&message), &self.sender) {
      sender.send(reply);
    }
    let _ = self.events.send(Seen::Message(message));
  }

  fn on_disconnected(&mut self) {
    let _ = self.events.send(Seen::Disconnected);
  }

  fn on_fault(&mut self, error: &CourierError) {
    let copy = match error {
      CourierError::CorruptMessage(reason) => CourierError::CorruptMessage(reason.clone()),
      CourierError::ConnectionRefused(endpoint) => CourierError::ConnectionRefused(endpoint.clone()),
      other => CourierError::Internal(other.to_string()),
    };
    let _ = self.events.send(Seen::Fault(copy));
  }
}

fn observer<In, Out>(reply: fn(&In) -> Option<Out>) -> (Observer<In, Out>, Receiver<Seen<In, Out>>) {
  let (events, rx) = crossbeam_channel::unbounded();
  (
    Observer {
      events,
      reply,
      sender: None,
    },
    rx,
  )
}

fn silent<In, Out>(_: &In) -> Option<Out> {
  None
}

fn expect_connected<In: Debug, Out>(rx: &Receiver<Seen<In, Out>>) -> (NetworkConnection, Arc<dyn MessageSender<Out>>) {
  match common::recv(rx, "on_connected") {
    Seen::Connected(connection, sender) => (connection, sender),
    other => panic!("expected on_connected, got {other:?}"),
  }
}

fn expect_message<In: Debug, Out>(rx: &Receiver<Seen<In, Out>>) -> In {
  match common::recv(rx, "on_message") {
    Seen::Message(message) => message,
    other => panic!("expected on_message, got {other:?}"),
  }
}

fn expect_disconnected<In: Debug, Out>(rx: &Receiver<Seen<In, Out>>) {
  match common::recv(rx, "on_disconnected") {
    Seen::Disconnected => {}
    other => panic!("expected on_disconnected, got {other:?}"),
  }
}

fn start_server<In, Out>(reply: fn(&In) -> Option<Out>) -> (NetworkServer, u16, Receiver<Seen<In, Out>>)
where
  In: DeserializeOwned + Debug + Send + 'static,
  Out: Serialize + Debug + Send + 'static,
{
  common::setup_tracing();
  let server = NetworkServer::new(NetworkOptions::default().with_log_traffic(true)).unwrap();
  let (endpoint, rx) = observer(reply);
  let port = server.listen_on_any_port(move || endpoint.clone()).unwrap();
  (server, port, rx)
}

#[test]
fn client_and_server_exchange_messages() {
  let (server, port, server_rx) = start_server::<u32, String>(|_| Some("hello".to_string()));
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<String, u32>(silent);
  let connection = client.connect("127.0.0.1", port, endpoint).unwrap();

  let (connected, sender) = expect_connected(&client_rx);
  assert_eq!(connected.id(), connection.id());
  assert_eq!(connection.state(), ConnectionState::Connected);
  assert_eq!(connection.peer_addr().map(|addr| addr.port()), Some(port));
  expect_connected(&server_rx);

  sender.send(123);
  assert_eq!(expect_message(&server_rx), 123);
  assert_eq!(expect_message(&client_rx), "hello");

  client.close();
  server.close();
}

#[test]
fn clients_only_see_their_own_replies() {
  let (server, port, _server_rx) = start_server::<u32, String>(|n| Some(format!("echo {n}")));
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (first, first_rx) = observer::<String, u32>(silent);
  let (second, second_rx) = observer::<String, u32>(silent);
  client.connect("127.0.0.1", port, first).unwrap();
  client.connect("127.0.0.1", port, second).unwrap();

  let (_, first_sender) = expect_connected(&first_rx);
  let (_, second_sender) = expect_connected(&second_rx);
  first_sender.send(1);
  second_sender.send(2);
  first_sender.send(3);

  assert_eq!(expect_message(&first_rx), "echo 1");
  assert_eq!(expect_message(&first_rx), "echo 3");
  assert_eq!(expect_message(&second_rx), "echo 2");
  common::assert_quiet(&second_rx, "message for the second client");

  client.close();
  server.close();
}

#[test]
fn client_disconnect_is_seen_once_on_both_sides() {
  let (server, port, server_rx) = start_server::<u32, u32>(silent);
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<u32, u32>(silent);
  let connection = client.connect("127.0.0.1", port, endpoint).unwrap();
  expect_connected(&client_rx);
  expect_connected(&server_rx);

  connection.disconnect();
  expect_disconnected(&client_rx);
  expect_disconnected(&server_rx);
  common::assert_quiet(&client_rx, "client callback after disconnect");
  common::assert_quiet(&server_rx, "server callback after disconnect");
  assert_eq!(connection.state(), ConnectionState::Disconnected);

  client.close();
  server.close();
}

#[test]
fn server_disconnect_is_seen_once_on_both_sides() {
  let (server, port, server_rx) = start_server::<u32, u32>(silent);
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<u32, u32>(silent);
  client.connect("127.0.0.1", port, endpoint).unwrap();
  expect_connected(&client_rx);
  let (server_side, _) = expect_connected(&server_rx);

  server_side.disconnect();
  expect_disconnected(&server_rx);
  expect_disconnected(&client_rx);
  common::assert_quiet(&client_rx, "client callback after disconnect");
  common::assert_quiet(&server_rx, "server callback after disconnect");

  client.close();
  server.close();
}

#[test]
fn closing_the_server_disconnects_everything() {
  let (server, port, server_rx) = start_server::<u32, u32>(silent);
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<u32, u32>(silent);
  client.connect("127.0.0.1", port, endpoint).unwrap();
  expect_connected(&client_rx);
  expect_connected(&server_rx);

  server.close();
  assert!(server.is_closed());
  assert_eq!(server.active_tasks(), 0);
  expect_disconnected(&server_rx);
  expect_disconnected(&client_rx);

  server.close();
  client.close();
  assert!(client.is_closed());
  assert_eq!(client.active_connections(), 0);
  common::assert_quiet(&client_rx, "client callback after close");
}

#[test]
fn closing_the_client_ends_its_connections() {
  let (server, port, server_rx) = start_server::<u32, u32>(silent);
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<u32, u32>(silent);
  let connection = client.connect("127.0.0.1", port, endpoint).unwrap();
  expect_connected(&client_rx);
  expect_connected(&server_rx);

  client.close();
  assert_eq!(client.active_connections(), 0);
  assert_eq!(connection.state(), ConnectionState::Disconnected);
  expect_disconnected(&client_rx);
  expect_disconnected(&server_rx);

  server.close();
}

eventizer! {
  trait Alpha {
    fn ping(&mut self, value: u32);
  }
  #[derive(Serialize, Deserialize)]
  enum AlphaEvent;
  struct AlphaFrontend;
}

eventizer! {
  trait Beta {
    fn ping(&mut self, value: u32);
  }
  #[derive(Serialize, Deserialize)]
  enum BetaEvent;
  struct BetaFrontend;
}

#[test]
fn mismatched_contract_is_a_fault_that_closes_the_connection() {
  let (server, port, server_rx) = start_server::<RemoteEvent<dyn Alpha>, u32>(silent);
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<u32, RemoteEvent<dyn Beta>>(silent);
  client.connect("127.0.0.1", port, endpoint).unwrap();
  let (_, sender) = expect_connected(&client_rx);
  expect_connected(&server_rx);

  sender.send(RemoteEvent::new(BetaEvent::Ping { value: 1 }));
  match common::recv(&server_rx, "on_fault") {
    Seen::Fault(CourierError::CorruptMessage(_)) => {}
    other => panic!("expected a corrupt message fault, got {other:?}"),
  }
  expect_disconnected(&server_rx);
  expect_disconnected(&client_rx);

  client.close();
  server.close();
}

#[test]
fn refused_connection_only_reports_a_fault() {
  common::setup_tracing();
  let port = common::unused_port();
  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<u32, u32>(silent);
  let connection = client.connect("127.0.0.1", port, endpoint).unwrap();

  match common::recv(&client_rx, "on_fault") {
    Seen::Fault(CourierError::ConnectionRefused(_)) => {}
    other => panic!("expected a refused connection, got {other:?}"),
  }
  common::assert_quiet(&client_rx, "callback after a failed connect");
  assert_eq!(connection.state(), ConnectionState::Disconnected);
  client.close();
}

#[test]
fn closed_client_and_server_reject_new_work() {
  common::setup_tracing();
  let server = NetworkServer::new(NetworkOptions::default()).unwrap();
  server.close();
  let (endpoint, _rx) = observer::<u32, u32>(silent);
  assert!(matches!(
    server.listen_on_any_port(move || endpoint.clone()),
    Err(CourierError::InvalidState(_))
  ));

  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  client.close();
  let (endpoint, _rx) = observer::<u32, u32>(silent);
  assert!(matches!(
    client.connect("127.0.0.1", 1, endpoint),
    Err(CourierError::InvalidState(_))
  ));
}

const FLOOD_FRAMES: usize = 4;
const FLOOD_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Sends large frames as soon as it connects and reports once it received as many.
#[derive(Clone)]
struct Flooder {
  received: usize,
  done: Sender<&'static str>,
  side: &'static str,
}

impl NetworkEndpoint for Flooder {
  type In = Vec<u8>;
  type Out = Vec<u8>;

  fn on_connected(&mut self, _connection: NetworkConnection, sender: Arc<dyn MessageSender<Vec<u8>>>) {
    for i in 0..FLOOD_FRAMES {
      sender.send(vec![i as u8; FLOOD_FRAME_LEN]);
    }
  }

  fn on_message(&mut self, message: Vec<u8>) {
    assert_eq!(message.len(), FLOOD_FRAME_LEN);
    self.received += 1;
    if self.received == FLOOD_FRAMES {
      let _ = self.done.send(self.side);
    }
  }

  fn on_disconnected(&mut self) {}
}

#[test]
fn both_peers_can_flood_each_other_at_once() {
  common::setup_tracing();
  let (done, done_rx) = crossbeam_channel::unbounded();
  let server = NetworkServer::new(NetworkOptions::default()).unwrap();
  let server_side = Flooder {
    received: 0,
    done: done.clone(),
    side: "server",
  };
  let port = server.listen_on_any_port(move || server_side.clone()).unwrap();

  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  client
    .connect(
      "127.0.0.1",
      port,
      Flooder {
        received: 0,
        done,
        side: "client",
      },
    )
    .unwrap();

  let mut finished = Vec::new();
  for _ in 0..2 {
    finished.push(
      done_rx
        .recv_timeout(std::time::Duration::from_secs(15))
        .expect("duplex traffic stalled"),
    );
  }
  finished.sort_unstable();
  assert_eq!(finished, vec!["client", "server"]);

  client.close();
  server.close();
}

/// Closes the server it belongs to from inside its first `on_message`.
#[derive(Clone)]
struct ClosingOnMessage {
  server: Arc<parking_lot::Mutex<Option<Arc<NetworkServer>>>>,
  closed: Sender<std::time::Duration>,
}

impl NetworkEndpoint for ClosingOnMessage {
  type In = u32;
  type Out = u32;

  fn on_connected(&mut self, _connection: NetworkConnection, _sender: Arc<dyn MessageSender<u32>>) {}

  fn on_message(&mut self, _message: u32) {
    if let Some(server) = self.server.lock().take() {
      let started = std::time::Instant::now();
      server.close();
      let _ = self.closed.send(started.elapsed());
    }
  }

  fn on_disconnected(&mut self) {}
}

#[test]
fn server_can_close_itself_from_a_callback() {
  common::setup_tracing();
  let options = NetworkOptions {
    io_threads: 1,
    close_timeout: std::time::Duration::from_secs(10),
    ..NetworkOptions::default()
  };
  let server = Arc::new(NetworkServer::new(options).unwrap());
  let slot = Arc::new(parking_lot::Mutex::new(Some(server.clone())));
  let (closed, closed_rx) = crossbeam_channel::unbounded();
  let endpoint = ClosingOnMessage { server: slot, closed };
  let port = server.listen_on_any_port(move || endpoint.clone()).unwrap();

  let client = NetworkClient::new(NetworkOptions::default()).unwrap();
  let (endpoint, client_rx) = observer::<u32, u32>(silent);
  client.connect("127.0.0.1", port, endpoint).unwrap();
  let (_, sender) = expect_connected(&client_rx);
  sender.send(1);

  let elapsed = common::recv(&closed_rx, "close from the callback");
  assert!(elapsed < common::ASSERT_TIMEOUT, "close took {elapsed:?}");
  expect_disconnected(&client_rx);
  assert!(server.is_closed());
  client.close();
}
