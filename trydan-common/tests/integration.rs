//! Integration tests for trydan-common library.

use trydan_common::{
    FieldValue, Snapshot, TIMESTAMP_FIELD, TopicBuilder, encode, field_payload,
};

#[test]
fn test_snapshot_to_topics_workflow() {
    let topics = TopicBuilder::new("garage/trydan");
    let snapshot = Snapshot::new()
        .with_field("charging_power", 7400.0)
        .with_field("charging_current", 32)
        .with_field("locked", 0)
        .with_field("firmware_version", "2.1.7");

    // Per-field messages, as the bridge publishes them
    let messages: Vec<(String, Vec<u8>)> = snapshot
        .fields()
        .map(|(name, value)| (topics.sensor(name), field_payload(value)))
        .collect();

    assert_eq!(messages.len(), 4);
    assert!(messages.contains(&(
        "garage/trydan/sensor/charging_current".to_string(),
        b"32".to_vec()
    )));
    assert!(messages.contains(&(
        "garage/trydan/sensor/firmware_version".to_string(),
        b"2.1.7".to_vec()
    )));
    assert!(
        messages
            .iter()
            .all(|(topic, _)| !topic.ends_with(TIMESTAMP_FIELD))
    );

    // Aggregate message
    let payload = encode(&snapshot).expect("JSON encode failed");
    let json: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&payload).expect("JSON decode failed");

    assert_eq!(json.len(), snapshot.field_count() + 1);
    assert_eq!(json["charging_power"], 7400.0);
    assert_eq!(json["firmware_version"], "2.1.7");
    assert_eq!(
        json[TIMESTAMP_FIELD].as_str(),
        Some(snapshot.timestamp_string().as_str())
    );
}

#[test]
fn test_command_topic_roundtrip() {
    let topics = TopicBuilder::default();

    for name in ["set_charge_current", "pause", "resume", "lock", "unlock"] {
        let topic = topics.command(name);
        assert_eq!(topics.parse_command(&topic), Some(name));
    }

    assert_eq!(topics.command_filter(), "trydan/command/+");
}

#[test]
fn test_field_value_json_shapes() {
    let values = [
        (FieldValue::Integer(16), serde_json::json!(16)),
        (FieldValue::Float(229.5), serde_json::json!(229.5)),
        (FieldValue::Text("ready".to_string()), serde_json::json!("ready")),
        (FieldValue::Boolean(true), serde_json::json!(true)),
    ];

    for (value, expected) in values {
        assert_eq!(serde_json::to_value(&value).unwrap(), expected);
        let decoded: FieldValue = serde_json::from_value(expected).unwrap();
        assert_eq!(decoded, value);
    }
}
