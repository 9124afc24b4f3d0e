use super::{ConnectRequest, OutboundMessage};
use crate::config::{ClientConfig, Credentials, ProtocolVersion};
use crate::message::Message;
use crate::types::{QosLevel, Time};
use crate::utils::error::Error;
use crate::transport::TransportError;

#[test]
fn test_connect_request_from_config() {
    let mut config = ClientConfig::new("sensor-1", vec!["tcp://a:1883".into(), "tcp://b:1883".into()]);
    config.protocol_version = ProtocolVersion::V5;
    config.keep_alive_period = Time::from_secs(30);
    config.max_unack_messages = 4;
    config.credentials = Some(Credentials {
        username: "user".into(),
        password: Some("secret".into()),
    });

    let request = ConnectRequest::new(&config, "tcp://b:1883");
    assert_eq!(request.uri, "tcp://b:1883");
    assert_eq!(request.client_id, "sensor-1");
    assert_eq!(request.protocol_version, ProtocolVersion::V5);
    assert_eq!(request.keep_alive, Time::from_secs(30));
    assert_eq!(request.max_inflight, 4);
    assert_eq!(request.credentials.unwrap().username, "user");
}

#[test]
fn test_outbound_message_borrows_message() {
    let message = Message::new("a/b", b"payload".to_vec())
        .with_qos(QosLevel::One)
        .with_retained(true);
    let outbound = OutboundMessage::from(&message);

    assert_eq!(outbound.topic, "a/b");
    assert_eq!(outbound.payload, b"payload");
    assert_eq!(outbound.to_message(), message);
}

#[test]
fn test_transport_error_mapping() {
    assert!(Error::transport("subscribe", TransportError::Timeout).is_timeout());
    assert!(matches!(
        Error::transport("subscribe", TransportError::NotConnected),
        Error::Transport {
            operation: "subscribe",
            source: TransportError::NotConnected
        }
    ));
}
