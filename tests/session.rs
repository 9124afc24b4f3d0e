//! End-to-end session behaviour through the public API and the in-process
//! transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mqtt_session::transport::{
    BrokerOp, ConnectRequest, FilterRequest, MemoryBroker, MemoryTransport, OutboundMessage, Transport,
    TransportError, TransportEvents,
};
use mqtt_session::{
    Client, ClientConfig, ClientState, Error, Message, PublicationConfig, QosLevel, READ_LENGTH_UNLIMITED,
    SubscriptionConfig, Time, WriteParams,
};

const URI: &str = "tcp://broker.local:1883";

fn config(id: &str) -> ClientConfig {
    let mut config = ClientConfig::new(id, vec![URI.to_string()]);
    config.reconnect = false;
    config.max_connection_retries = 1;
    config.connect_timeout = Time::from_millis(20);
    config.max_reply_timeout = Time::from_millis(100);
    config
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn connect_outcome_decides_state() {
    let broker = MemoryBroker::new();
    let client = Client::new(config("ok"), MemoryTransport::new(&broker)).unwrap();
    assert!(client.connect().is_ok());
    assert_eq!(client.state(), ClientState::Connected);

    broker.set_unreachable(URI, true);
    let failing = Client::new(config("fails"), MemoryTransport::new(&broker)).unwrap();
    assert!(failing.connect().is_err());
    assert_eq!(failing.state(), ClientState::Disconnected);
}

#[test]
fn operations_fail_with_state_error_when_disconnected() {
    let broker = MemoryBroker::new();
    let client = Client::new(config("idle"), MemoryTransport::new(&broker)).unwrap();

    let sub = client.subscribe(&SubscriptionConfig::new(["x/#"], QosLevel::Zero));
    assert!(matches!(
        sub,
        Err(Error::State {
            state: ClientState::Disconnected,
            ..
        })
    ));
    let publication = client.publish(&PublicationConfig::new("x", QosLevel::Zero));
    assert!(matches!(publication, Err(Error::State { .. })));
    assert!(broker.journal().is_empty());
}

#[test]
fn unlimited_read_is_exclusive_until_returned() {
    let broker = MemoryBroker::new();
    let client = Client::new(config("reader"), MemoryTransport::new(&broker)).unwrap();
    client.connect().unwrap();
    let subscription = client
        .subscribe(&SubscriptionConfig::new(["data"], QosLevel::One))
        .unwrap();

    broker.inject(Message::new("data", b"1".to_vec()));
    assert!(wait_until(|| subscription.pending().unwrap() == 1));

    let loan = subscription.read(READ_LENGTH_UNLIMITED).unwrap();
    assert_eq!(loan.messages()[0].payload, b"1".to_vec());
    assert!(matches!(subscription.read(READ_LENGTH_UNLIMITED), Err(Error::Loan(_))));

    // deliveries during the loan land in a fresh buffer
    broker.inject(Message::new("data", b"2".to_vec()));
    assert!(wait_until(|| subscription.pending().unwrap() == 1));
    assert_eq!(loan.len(), 1);

    subscription.return_loan(loan).unwrap();
    let next = subscription.read(READ_LENGTH_UNLIMITED).unwrap();
    assert_eq!(next.messages()[0].payload, b"2".to_vec());
    subscription.return_loan(next).unwrap();
}

#[test]
fn samples_survive_the_round_trip_through_the_broker() {
    let broker = MemoryBroker::new();
    let client = Client::new(config("loop"), MemoryTransport::new(&broker)).unwrap();
    client.connect().unwrap();
    let subscription = client
        .subscribe(&SubscriptionConfig::new(["loop/+"], QosLevel::Two))
        .unwrap();
    let publication = client
        .publish(&PublicationConfig::new("", QosLevel::Zero).with_message_info())
        .unwrap();

    let sent = Message::new("loop/a", vec![0, 159, 146, 150]).with_qos(QosLevel::Two);
    publication.write(&sent.to_sample().unwrap()).unwrap();
    assert!(wait_until(|| subscription.pending().unwrap() == 1));

    let batch = subscription.read(1).unwrap();
    let samples = batch.to_samples().unwrap();
    let received = Message::from_sample(&samples[0]).unwrap();
    assert_eq!(received.topic, sent.topic);
    assert_eq!(received.payload, sent.payload);
    assert_eq!(received.qos, sent.qos);
    assert_eq!(received.retained, sent.retained);
}

#[test]
fn disconnect_unsubscribes_everything_first() {
    let broker = MemoryBroker::new();
    let client = Client::new(config("tidy"), MemoryTransport::new(&broker)).unwrap();
    client.connect().unwrap();
    client
        .subscribe(&SubscriptionConfig::new(["a/#"], QosLevel::One))
        .unwrap();
    client
        .subscribe(&SubscriptionConfig::new(["b/+"], QosLevel::Zero))
        .unwrap();
    broker.clear_journal();

    client.disconnect().unwrap();
    assert_eq!(client.state(), ClientState::Disconnected);
    assert_eq!(broker.subscription_count("tidy"), 0);
    assert_eq!(
        broker.journal(),
        vec![
            BrokerOp::Unsubscribe {
                client_id: "tidy".into(),
                filter: "a/#".into()
            },
            BrokerOp::Unsubscribe {
                client_id: "tidy".into(),
                filter: "b/+".into()
            },
            BrokerOp::Disconnect {
                client_id: "tidy".into()
            },
        ]
    );
}

#[test]
fn granted_qos_is_recorded() {
    let broker = MemoryBroker::new();
    broker.set_max_granted_qos(QosLevel::One);
    let client = Client::new(config("qos"), MemoryTransport::new(&broker)).unwrap();
    client.connect().unwrap();

    let subscription = client
        .subscribe(&SubscriptionConfig::new(["q"], QosLevel::Two))
        .unwrap();
    assert_eq!(subscription.qos().unwrap(), QosLevel::One);
    assert_eq!(broker.granted("qos", "q"), Some(QosLevel::One));
}

#[test]
fn full_queue_keeps_newest_messages() {
    let broker = MemoryBroker::new();
    let client = Client::new(config("bounded"), MemoryTransport::new(&broker)).unwrap();
    client.connect().unwrap();
    let subscription = client
        .subscribe(&SubscriptionConfig::new(["q"], QosLevel::Zero).with_queue_size(2))
        .unwrap();

    for payload in ["A", "B", "C"] {
        broker.inject(Message::new("q", payload.as_bytes().to_vec()));
    }
    assert!(wait_until(|| subscription.dropped_messages().unwrap() == 1));

    let batch = subscription.read(10).unwrap();
    let payloads: Vec<&[u8]> = batch.iter().map(|m| m.payload.as_slice()).collect();
    assert_eq!(payloads, vec![b"B".as_slice(), b"C".as_slice()]);
}

/// Wraps the in-process transport and records when each publish starts and
/// ends.
struct Recording {
    inner: MemoryTransport,
    in_flight: AtomicUsize,
    overlaps: Arc<AtomicUsize>,
    sends: Arc<Mutex<Vec<(bool, Vec<u8>)>>>,
}

impl Transport for Recording {
    fn connect(&self, request: &ConnectRequest, events: Arc<dyn TransportEvents>) -> Result<(), TransportError> {
        self.inner.connect(request, events)
    }

    fn disconnect(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.inner.disconnect(timeout)
    }

    fn subscribe(
        &self,
        filters: &[FilterRequest],
        timeout: Option<Duration>,
    ) -> Result<Vec<Option<QosLevel>>, TransportError> {
        self.inner.subscribe(filters, timeout)
    }

    fn unsubscribe(&self, filters: &[String], timeout: Option<Duration>) -> Result<(), TransportError> {
        self.inner.unsubscribe(filters, timeout)
    }

    fn publish(&self, message: &OutboundMessage<'_>, timeout: Option<Duration>) -> Result<(), TransportError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.sends.lock().unwrap().push((true, message.payload.to_vec()));
        thread::sleep(Duration::from_millis(1));
        let result = self.inner.publish(message, timeout);
        self.sends.lock().unwrap().push((false, message.payload.to_vec()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

#[test]
fn concurrent_writes_do_not_interleave() {
    let broker = MemoryBroker::new();
    let overlaps = Arc::new(AtomicUsize::new(0));
    let sends = Arc::new(Mutex::new(Vec::new()));
    let transport = Recording {
        inner: MemoryTransport::new(&broker),
        in_flight: AtomicUsize::new(0),
        overlaps: overlaps.clone(),
        sends: sends.clone(),
    };
    let client = Client::new(config("writer"), transport).unwrap();
    client.connect().unwrap();
    let publication = client
        .publish(&PublicationConfig::new("out", QosLevel::One))
        .unwrap();

    let writers: Vec<_> = (0..2u8)
        .map(|writer| {
            let publication = publication.clone();
            thread::spawn(move || {
                for i in 0..20u8 {
                    publication
                        .write_w_params(&[writer, i], "out", &WriteParams::new(QosLevel::One, false))
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let sends = sends.lock().unwrap();
    assert_eq!(sends.len(), 80);
    for pair in sends.chunks(2) {
        assert!(pair[0].0 && !pair[1].0);
        assert_eq!(pair[0].1, pair[1].1);
    }
}

#[test]
fn connect_rotates_across_servers() {
    let broker = MemoryBroker::new();
    let uris = ["tcp://one:1883", "tcp://two:1883", "tcp://three:1883"];
    for uri in &uris[..2] {
        broker.set_unreachable(uri, true);
    }
    let mut cfg = ClientConfig::new("rotor", uris.iter().map(|u| u.to_string()).collect());
    cfg.reconnect = false;
    cfg.max_connection_retries = 2;
    let client = Client::new(cfg, MemoryTransport::new(&broker)).unwrap();

    client.connect().unwrap();
    assert_eq!(client.connected_uri().as_deref(), Some("tcp://three:1883"));
}
