//! Schema Evolution Tests
//!
//! Writer/reader resolution and compatibility across schema versions.

use schema_evolution::{
    decode, encode, is_backward_compatible, CompatibilityChecker, CompatibilityLevel, Record, Schema, SchemaError,
    Value,
};
use serde_json::json;

fn fixture(name: &str) -> Schema {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    Schema::parse_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn s1() -> Schema {
    Schema::build(json!({
        "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
        "fields": [
            {"name": "name", "type": "string"},
            {"name": "value", "type": "float"}
        ]
    }))
    .unwrap()
}

fn s2() -> Schema {
    Schema::build(json!({
        "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
        "fields": [
            {"name": "ip", "type": "string", "default": "DEFAULT"},
            {"name": "name", "type": "string"},
            {"name": "value", "type": "float"}
        ]
    }))
    .unwrap()
}

fn s2_without_default() -> Schema {
    Schema::build(json!({
        "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
        "fields": [
            {"name": "ip", "type": "string"},
            {"name": "name", "type": "string"},
            {"name": "value", "type": "float"}
        ]
    }))
    .unwrap()
}

fn email_message() -> Value {
    let email = Record::new("com.softwaremill.schema.Email")
        .with("addressTo", "x")
        .with("title", "t")
        .with("text", "body");
    Value::Record(
        Record::new("com.softwaremill.schema.MessageToSend")
            .with("text", "type")
            .with("correlationId", "correlationId")
            .with("payload", email),
    )
}

// =============================================================================
// Field Evolution
// =============================================================================

#[test]
fn test_added_field_with_default_is_filled_in() {
    let old = Value::Record(Record::new("keyar.domain.generic_avro").with("name", "ABC").with("value", 123f32));

    assert!(is_backward_compatible(&s1(), &s2()));

    let bytes = encode(&s1(), &old).unwrap();
    let record = decode(&s1(), &s2(), &bytes).unwrap().into_record().unwrap();
    assert_eq!(record.get("ip").and_then(Value::as_str), Some("DEFAULT"));
    assert_eq!(record.get("name").and_then(Value::as_str), Some("ABC"));
    assert_eq!(record.get("value").and_then(Value::as_f32), Some(123.0));

    // Reader field order is kept
    let names: Vec<&str> = record.fields().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["ip", "name", "value"]);
}

#[test]
fn test_added_field_without_default_is_incompatible() {
    let old = Value::Record(Record::new("generic_avro").with("name", "ABC").with("value", 123f32));

    assert!(!is_backward_compatible(&s1(), &s2_without_default()));

    let bytes = encode(&s1(), &old).unwrap();
    match decode(&s1(), &s2_without_default(), &bytes) {
        Err(SchemaError::MissingField { record, field }) => {
            assert_eq!(record, "keyar.domain.generic_avro");
            assert_eq!(field, "ip");
        }
        other => panic!("Expected MissingField, got {:?}", other),
    }
}

#[test]
fn test_writer_only_field_is_dropped() {
    let new = Value::Record(
        Record::new("generic_avro")
            .with("ip", "IP")
            .with("name", "ABC")
            .with("value", 1f32),
    );
    let bytes = encode(&s2(), &new).unwrap();
    let record = decode(&s2(), &s1(), &bytes).unwrap().into_record().unwrap();
    assert_eq!(record.len(), 2);
    assert!(record.get("ip").is_none());
    assert_eq!(record.get("name").and_then(Value::as_str), Some("ABC"));
}

#[test]
fn test_end_to_end_two_versions() {
    let first = Value::Record(Record::new("keyar.domain.generic_avro").with("name", "ABC").with("value", 123f32));
    let second = Value::Record(
        Record::new("keyar.domain.generic_avro")
            .with("ip", "IP")
            .with("name", "ABC")
            .with("value", 123f32),
    );
    let first_bytes = encode(&s1(), &first).unwrap();
    let second_bytes = encode(&s2(), &second).unwrap();

    // Both read back with S1: the ip of record 2 is parsed and dropped
    assert_eq!(decode(&s1(), &s1(), &first_bytes).unwrap(), first);
    let dropped = decode(&s2(), &s1(), &second_bytes).unwrap();
    assert_eq!(dropped, first);

    // Record 1 read with S2 picks up the default
    let upgraded = decode(&s1(), &s2(), &first_bytes).unwrap().into_record().unwrap();
    assert_eq!(upgraded.get("ip").and_then(Value::as_str), Some("DEFAULT"));
}

#[test]
fn test_metric_read_as_metric_v2() {
    let metric = fixture("metric.avsc");
    let metric_v2 = fixture("metric_v2.avsc");
    assert!(is_backward_compatible(&metric, &metric_v2));

    let old = Value::Record(
        Record::new("keyar.domain.Metric")
            .with("ip", "Ip")
            .with("name", "MyName")
            .with("value", 1.23f32),
    );
    let bytes = encode(&metric, &old).unwrap();
    let record = decode(&metric, &metric_v2, &bytes).unwrap().into_record().unwrap();

    assert_eq!(record.name(), "keyar.domain.MetricV2");
    assert_eq!(record.get("time").and_then(Value::as_str), Some("12345"));
    assert_eq!(record.get("value").and_then(Value::as_f32), Some(1.23));
}

// =============================================================================
// Field aliases
// =============================================================================

fn record(fields: serde_json::Value) -> Schema {
    Schema::build(json!({"type": "record", "name": "R", "fields": fields})).unwrap()
}

#[test]
fn test_renamed_field_read_through_alias() {
    let writer = record(json!([{"name": "ip", "type": "string"}, {"name": "name", "type": "string"}]));
    let reader = record(json!([
        {"name": "address", "type": "string", "aliases": ["ip"]},
        {"name": "name", "type": "string"}
    ]));
    assert!(is_backward_compatible(&writer, &reader));

    let value = Value::Record(Record::new("R").with("ip", "10.0.0.1").with("name", "host"));
    let decoded = decode(&writer, &reader, &encode(&writer, &value).unwrap()).unwrap();
    assert_eq!(
        decoded,
        Value::Record(Record::new("R").with("address", "10.0.0.1").with("name", "host"))
    );
}

#[test]
fn test_alias_does_not_steal_a_field_bound_by_name() {
    // x is read into x; y only answers to x through its alias and stays unfilled
    let writer = record(json!([{"name": "x", "type": "string"}]));
    let reader = record(json!([
        {"name": "x", "type": "string"},
        {"name": "y", "type": "string", "aliases": ["x"]}
    ]));
    let bytes = encode(&writer, &Value::Record(Record::new("R").with("x", "v"))).unwrap();

    assert!(!is_backward_compatible(&writer, &reader));
    match decode(&writer, &reader, &bytes) {
        Err(SchemaError::MissingField { record, field }) => {
            assert_eq!(record, "R");
            assert_eq!(field, "y");
        }
        other => panic!("Expected MissingField, got {:?}", other),
    }
}

#[test]
fn test_alias_of_claimed_field_is_skipped() {
    // b would alias onto a, which a already claimed by name, so b is dropped
    let writer = record(json!([{"name": "a", "type": "int"}, {"name": "b", "type": "string"}]));
    let reader = record(json!([{"name": "a", "type": "int", "aliases": ["b"]}]));
    let value = Value::Record(Record::new("R").with("a", 1).with("b", "skipped"));

    assert!(is_backward_compatible(&writer, &reader));
    let decoded = decode(&writer, &reader, &encode(&writer, &value).unwrap()).unwrap();
    assert_eq!(decoded, Value::Record(Record::new("R").with("a", 1)));
}

// =============================================================================
// Unions
// =============================================================================

#[test]
fn test_renamed_union_variant_resolved_by_alias() {
    let writer = fixture("message_to_send.avsc");
    let reader = fixture("message_to_send_v2.avsc");

    let bytes = encode(&writer, &email_message()).unwrap();
    let message = decode(&writer, &reader, &bytes).unwrap().into_record().unwrap();

    let payload = message.get("payload").and_then(Value::as_record).unwrap();
    assert_eq!(payload.name(), "com.softwaremill.schema.EmailV2");
    assert_eq!(payload.get("addressFrom").and_then(Value::as_str), Some("andrzej@test.pl"));
    assert_eq!(payload.get("addressTo").and_then(Value::as_str), Some("x"));
    assert_eq!(payload.get("title").and_then(Value::as_str), Some("t"));
    assert_eq!(payload.get("text").and_then(Value::as_str), Some("body"));
    assert_eq!(message.get("correlationId").and_then(Value::as_str), Some("correlationId"));

    assert!(is_backward_compatible(&writer, &reader));
}

#[test]
fn test_renamed_union_variant_without_alias_fails() {
    let writer = fixture("message_to_send.avsc");
    let mut definition = writer.to_json();
    // Rename Email to EmailV2 without leaving an alias behind
    definition["fields"][2]["type"][1]["name"] = json!("EmailV2");
    let reader = Schema::build(definition).unwrap();

    let bytes = encode(&writer, &email_message()).unwrap();
    assert!(matches!(
        decode(&writer, &reader, &bytes),
        Err(SchemaError::UnresolvedUnionVariant { .. })
    ));
    assert!(!is_backward_compatible(&writer, &reader));
}

#[test]
fn test_other_union_variants_unaffected() {
    let writer = fixture("message_to_send.avsc");
    let reader = fixture("message_to_send_v2.avsc");

    let sms = Record::new("Sms").with("phoneNumber", "123").with("text", "hi");
    let value = Value::Record(
        Record::new("MessageToSend")
            .with("text", "t")
            .with("correlationId", "c")
            .with("payload", sms),
    );
    let bytes = encode(&writer, &value).unwrap();
    let message = decode(&writer, &reader, &bytes).unwrap().into_record().unwrap();
    let payload = message.get("payload").and_then(Value::as_record).unwrap();
    assert_eq!(payload.name(), "com.softwaremill.schema.Sms");
    assert_eq!(payload.get("phoneNumber").and_then(Value::as_str), Some("123"));
}

// =============================================================================
// Fixed and construction
// =============================================================================

#[test]
fn test_fixed_size_is_enforced() {
    let schema = fixture("handshake_request.avsc");
    let handshake = |client: usize| {
        Value::Record(
            Record::new("HandshakeRequest")
                .with("clientHash", Value::Fixed(vec![1; client]))
                .with("clientProtocol", Value::Null)
                .with("serverHash", Value::Fixed(vec![2; 16]))
                .with("meta", Value::Null),
        )
    };

    let bytes = encode(&schema, &handshake(16)).unwrap();
    assert_eq!(decode(&schema, &schema, &bytes).unwrap(), handshake(16));

    for size in [15, 17] {
        match encode(&schema, &handshake(size)) {
            Err(SchemaError::FixedSizeMismatch { path, expected, actual }) => {
                assert_eq!(path, "clientHash");
                assert_eq!(expected, 16);
                assert_eq!(actual, size);
            }
            other => panic!("Expected FixedSizeMismatch, got {:?}", other),
        }
    }
}

#[test]
fn test_building_twice_is_interchangeable() {
    let a = fixture("message_to_send.avsc");
    let b = fixture("message_to_send.avsc");
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());

    let bytes = encode(&a, &email_message()).unwrap();
    assert_eq!(bytes, encode(&b, &email_message()).unwrap());
    assert_eq!(decode(&b, &a, &bytes).unwrap(), email_message());
}

#[test]
fn test_canonical_form_round_trips() {
    for name in [
        "metric.avsc",
        "metric_v2.avsc",
        "message_to_send.avsc",
        "message_to_send_v2.avsc",
        "handshake_request.avsc",
    ] {
        let schema = fixture(name);
        let rebuilt = Schema::parse_str(&schema.canonical_form()).unwrap();
        assert_eq!(rebuilt, schema, "{}", name);
    }
}

#[test]
fn test_emitted_json_is_valid_avro() {
    for name in ["metric_v2.avsc", "message_to_send_v2.avsc", "handshake_request.avsc"] {
        let schema = fixture(name);
        assert!(
            apache_avro::Schema::parse_str(&schema.canonical_form()).is_ok(),
            "{} did not parse as Avro",
            name
        );
    }
}

// =============================================================================
// Compatibility levels
// =============================================================================

#[test]
fn test_full_compatibility_requires_both_directions() {
    let full = CompatibilityChecker::new(CompatibilityLevel::Full);
    // Defaulted addition reads both ways
    assert!(full.check_pair(&s1(), &s2()).is_compatible);
    // Required addition cannot read old data
    assert!(!full.check_pair(&s1(), &s2_without_default()).is_compatible);
    // Dropping a required field breaks old readers
    assert!(!full.check_pair(&s2_without_default(), &s1()).is_compatible);
}
