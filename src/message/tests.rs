use super::{Message, MessageMetadata, Sample, from_sample, to_sample};
use crate::types::{QosLevel, Time};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn test_to_sample_layout() {
    let msg = Message::new("sensors/temp", b"hi".to_vec())
        .with_qos(QosLevel::One)
        .with_retained(true);
    let sample = to_sample(&msg).unwrap();

    assert_eq!(
        sample.as_value(),
        &json!({
            "info": { "topic": "sensors/temp", "qos_level": 1, "retained": true },
            "payload": { "data": [104, 105] }
        })
    );
}

#[test]
fn test_metadata_round_trip() {
    let msg = Message {
        topic: "a/b".to_string(),
        payload: vec![1, 2, 3],
        qos: QosLevel::Two,
        retained: false,
        metadata: Some(MessageMetadata {
            timestamp: Some(Time::new(17, 5)),
            content_type: Some("application/octet-stream".to_string()),
        }),
    };
    let back = from_sample(&to_sample(&msg).unwrap()).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn test_empty_metadata_decodes_to_none() {
    let msg = Message {
        metadata: Some(MessageMetadata::default()),
        ..Message::new("t", vec![9])
    };
    let back = Message::from_sample(&msg.to_sample().unwrap()).unwrap();
    assert_eq!(back.metadata, None);
    assert_eq!(back.payload, vec![9]);
}

#[test]
fn test_sample_without_info_uses_defaults() {
    let sample = Sample::from_payload(b"raw".to_vec());
    assert_eq!(sample.info().unwrap(), None);
    assert_eq!(sample.payload().unwrap(), b"raw".to_vec());

    let msg = from_sample(&sample).unwrap();
    assert_eq!(msg.topic, "");
    assert_eq!(msg.qos, QosLevel::Zero);
    assert!(!msg.retained);
    assert_eq!(msg.metadata, None);
}

#[test]
fn test_malformed_sample_is_rejected() {
    let sample = Sample::from_value(json!({ "payload": { "data": "not bytes" } }));
    assert!(from_sample(&sample).is_err());

    let sample = Sample::from_value(json!({ "info": { "topic": "t", "qos_level": 9 } }));
    assert!(sample.info().is_err());
}

#[test]
fn test_stamped_keeps_existing_timestamp() {
    let original = Time::new(1, 0);
    let msg = Message {
        metadata: Some(MessageMetadata {
            timestamp: Some(original),
            content_type: None,
        }),
        ..Message::new("t", vec![])
    };
    let stamped = msg.stamped(Time::new(99, 0));
    assert_eq!(stamped.metadata.unwrap().timestamp, Some(original));

    let fresh = Message::new("t", vec![]).stamped(Time::new(99, 0));
    assert_eq!(fresh.metadata.unwrap().timestamp, Some(Time::new(99, 0)));
}

fn qos_strategy() -> impl Strategy<Value = QosLevel> {
    prop_oneof![
        Just(QosLevel::Zero),
        Just(QosLevel::One),
        Just(QosLevel::Two)
    ]
}

proptest! {
    #[test]
    fn prop_sample_round_trip_preserves_publish_fields(
        topic in "[a-z0-9/]{0,32}",
        payload in proptest::collection::vec(any::<u8>(), 0..256),
        qos in qos_strategy(),
        retained in any::<bool>(),
    ) {
        let msg = Message { topic, payload, qos, retained, metadata: None };
        let back = from_sample(&to_sample(&msg).unwrap()).unwrap();

        prop_assert_eq!(&back.topic, &msg.topic);
        prop_assert_eq!(&back.payload, &msg.payload);
        prop_assert_eq!(back.qos, msg.qos);
        prop_assert_eq!(back.retained, msg.retained);
    }
}
