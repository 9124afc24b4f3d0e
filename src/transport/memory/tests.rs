use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrokerOp, MemoryBroker, MemoryTransport};
use crate::config::ClientConfig;
use crate::message::Message;
use crate::transport::{ConnectRequest, FilterRequest, OutboundMessage, Transport, TransportError, TransportEvents};
use crate::types::{QosLevel, Time};

const URI: &str = "tcp://memory:1883";
const WAIT: Duration = Duration::from_secs(2);

enum Event {
    Message(Message),
    Lost(String),
}

struct Collector {
    tx: Mutex<Sender<Event>>,
}

impl TransportEvents for Collector {
    fn on_message(&self, message: Message) {
        let _ = self.tx.lock().unwrap().send(Event::Message(message));
    }

    fn on_connection_lost(&self, cause: &str) {
        let _ = self.tx.lock().unwrap().send(Event::Lost(cause.to_string()));
    }
}

fn collector() -> (Arc<dyn TransportEvents>, Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(Collector { tx: Mutex::new(tx) }), rx)
}

fn request(client_id: &str, uri: &str) -> ConnectRequest {
    let mut config = ClientConfig::new(client_id, vec![uri.to_string()]);
    config.connect_timeout = Time::from_millis(20);
    ConnectRequest::new(&config, uri)
}

fn filter(filter: &str, qos: QosLevel) -> FilterRequest {
    FilterRequest {
        filter: filter.to_string(),
        qos,
    }
}

fn next_message(rx: &Receiver<Event>) -> Message {
    match rx.recv_timeout(WAIT).unwrap() {
        Event::Message(m) => m,
        Event::Lost(cause) => panic!("unexpected connection loss: {cause}"),
    }
}

#[test]
fn test_connect_and_disconnect() {
    let broker = MemoryBroker::new();
    let transport = MemoryTransport::new(&broker);
    let (events, _rx) = collector();

    assert!(!transport.is_connected());
    transport.connect(&request("c1", URI), events).unwrap();
    assert!(transport.is_connected());
    assert!(broker.is_session_open("c1"));

    transport.disconnect(None).unwrap();
    assert!(!transport.is_connected());
    assert_eq!(
        broker.journal(),
        vec![
            BrokerOp::Connect {
                client_id: "c1".into(),
                uri: URI.into()
            },
            BrokerOp::Disconnect { client_id: "c1".into() },
        ]
    );
}

#[test]
fn test_unreachable_and_unresponsive() {
    let broker = MemoryBroker::new();
    let transport = MemoryTransport::new(&broker);
    broker.set_unreachable("tcp://down:1883", true);
    broker.set_unresponsive("tcp://slow:1883", true);

    let (events, _rx) = collector();
    let refused = transport.connect(&request("c1", "tcp://down:1883"), events.clone());
    assert!(matches!(refused, Err(TransportError::ConnectionRefused(_))));

    let timed_out = transport.connect(&request("c1", "tcp://slow:1883"), events);
    assert_eq!(timed_out, Err(TransportError::Timeout));
    assert!(!transport.is_connected());
}

#[test]
fn test_requests_need_a_session() {
    let broker = MemoryBroker::new();
    let transport = MemoryTransport::new(&broker);

    assert_eq!(
        transport.subscribe(&[filter("a", QosLevel::Zero)], None),
        Err(TransportError::NotConnected)
    );
    assert_eq!(transport.disconnect(None), Err(TransportError::NotConnected));
}

#[test]
fn test_qos_grant_is_capped() {
    let broker = MemoryBroker::new();
    broker.set_max_granted_qos(QosLevel::One);
    broker.reject_filter("forbidden/#");
    let transport = MemoryTransport::new(&broker);
    let (events, _rx) = collector();
    transport.connect(&request("c1", URI), events).unwrap();

    let grants = transport
        .subscribe(
            &[
                filter("a/#", QosLevel::Two),
                filter("b", QosLevel::Zero),
                filter("forbidden/#", QosLevel::One),
            ],
            None,
        )
        .unwrap();

    assert_eq!(grants, vec![Some(QosLevel::One), Some(QosLevel::Zero), None]);
    assert_eq!(broker.granted("c1", "a/#"), Some(QosLevel::One));
    assert_eq!(broker.granted("c1", "forbidden/#"), None);
}

#[test]
fn test_routing_between_sessions() {
    let broker = MemoryBroker::new();
    let publisher = MemoryTransport::new(&broker);
    let subscriber = MemoryTransport::new(&broker);
    let (pub_events, _pub_rx) = collector();
    let (sub_events, sub_rx) = collector();
    publisher.connect(&request("pub", URI), pub_events).unwrap();
    subscriber.connect(&request("sub", URI), sub_events).unwrap();

    subscriber
        .subscribe(&[filter("home/+/temp", QosLevel::One), filter("home/#", QosLevel::Zero)], None)
        .unwrap();

    let outbound = OutboundMessage {
        topic: "home/kitchen/temp",
        payload: b"21",
        qos: QosLevel::Two,
        retained: false,
    };
    publisher.publish(&outbound, None).unwrap();

    let received = next_message(&sub_rx);
    assert_eq!(received.topic, "home/kitchen/temp");
    assert_eq!(received.payload, b"21");
    // once per session, at the best grant
    assert_eq!(received.qos, QosLevel::One);
    assert!(received.metadata.unwrap().timestamp.is_some());
    assert!(sub_rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn test_retained_replay_on_subscribe() {
    let broker = MemoryBroker::new();
    broker.inject(Message::new("status", b"up".to_vec()).with_retained(true));
    assert!(broker.retained("status").is_some());

    let transport = MemoryTransport::new(&broker);
    let (events, rx) = collector();
    transport.connect(&request("c1", URI), events).unwrap();
    transport.subscribe(&[filter("status", QosLevel::One)], None).unwrap();

    let replayed = next_message(&rx);
    assert!(replayed.retained);
    assert_eq!(replayed.payload, b"up");

    broker.inject(Message::new("status", Vec::new()).with_retained(true));
    assert!(broker.retained("status").is_none());
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let broker = MemoryBroker::new();
    let transport = MemoryTransport::new(&broker);
    let (events, rx) = collector();
    transport.connect(&request("c1", URI), events).unwrap();
    transport.subscribe(&[filter("a", QosLevel::Zero)], None).unwrap();
    transport.unsubscribe(&["a".to_string()], None).unwrap();

    assert_eq!(broker.subscription_count("c1"), 0);
    broker.inject(Message::new("a", b"x".to_vec()));
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn test_clean_session_drops_subscriptions() {
    let broker = MemoryBroker::new();
    let transport = MemoryTransport::new(&broker);
    let mut clean = request("c1", URI);
    clean.clean_session = true;

    let (events, _rx) = collector();
    transport.connect(&clean, events).unwrap();
    transport.subscribe(&[filter("a", QosLevel::Zero)], None).unwrap();
    transport.disconnect(None).unwrap();
    assert_eq!(broker.subscription_count("c1"), 0);

    let (events, _rx) = collector();
    transport.connect(&request("c1", URI), events).unwrap();
    transport.subscribe(&[filter("b", QosLevel::Zero)], None).unwrap();
    transport.disconnect(None).unwrap();
    assert_eq!(broker.subscription_count("c1"), 1);
}

#[test]
fn test_stalled_ack_times_out() {
    let broker = MemoryBroker::new();
    broker.set_stall_acks(true);
    let transport = MemoryTransport::new(&broker);
    let (events, _rx) = collector();
    transport.connect(&request("c1", URI), events).unwrap();

    let message = Message::new("t", b"1".to_vec());
    assert!(transport.publish(&(&message).into(), Some(Duration::from_millis(10))).is_ok());

    let acked = message.with_qos(QosLevel::One);
    assert_eq!(
        transport.publish(&(&acked).into(), Some(Duration::from_millis(10))),
        Err(TransportError::Timeout)
    );
}

#[test]
fn test_sever_reports_connection_loss() {
    let broker = MemoryBroker::new();
    let transport = MemoryTransport::new(&broker);
    let (events, rx) = collector();
    transport.connect(&request("c1", URI), events).unwrap();

    assert!(broker.sever("c1"));
    match rx.recv_timeout(WAIT).unwrap() {
        Event::Lost(cause) => assert!(!cause.is_empty()),
        Event::Message(_) => panic!("expected connection loss"),
    }
    assert!(!transport.is_connected());
    assert!(!broker.sever("c1"));

    // the transport can open a new session afterwards
    let (events, _rx) = collector();
    transport.connect(&request("c1", URI), events).unwrap();
    assert!(transport.is_connected());
}
