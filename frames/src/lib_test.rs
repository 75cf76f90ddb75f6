use super::*;

fn snapshot_frame() -> Frame {
    Frame {
        id: "id-1".to_owned(),
        parent_id: None,
        ts: 42,
        from: Some("authority".to_owned()),
        syscall: GAME_STATE.to_owned(),
        status: Status::Item,
        data: serde_json::json!({
            "is_calling": true,
            "players": [
                {"id": "p-1", "name": "Guest", "selected_card": 3},
                {"id": "p-2", "name": "Ada", "selected_card": null}
            ]
        }),
    }
}

#[test]
fn status_wire_values_are_stable() {
    assert_eq!(Status::Request.to_wire() as i32, 0);
    assert_eq!(Status::Item.to_wire() as i32, 1);
    assert_eq!(Status::Done.to_wire() as i32, 2);
    assert_eq!(Status::Error.to_wire() as i32, 3);
}

#[test]
fn status_from_wire_rejects_unknown_value() {
    let err = Status::from_wire(42).expect_err("status should be invalid");
    assert!(matches!(err, CodecError::InvalidStatus(42)));
}

#[test]
fn snapshot_survives_encoding_with_integer_cards() {
    let frame = snapshot_frame();
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode should succeed");
    assert_eq!(decoded, frame);
    assert_eq!(decoded.data["players"][0]["selected_card"].as_u64(), Some(3));
}

#[test]
fn fractional_numbers_stay_fractional() {
    let frame = Frame::push(GAME_STATE, serde_json::json!({"x": 1.25}));
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.data["x"].as_f64(), Some(1.25));
}

#[test]
fn decode_rejects_malformed_bytes() {
    let err = decode_frame(&[0xff, 0x00, 0x01]).expect_err("bytes should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_rejects_invalid_wire_status() {
    let wire = WireFrame {
        id: "id-1".to_owned(),
        parent_id: None,
        ts: 1,
        from: None,
        syscall: GAME_STATE.to_owned(),
        status: 77,
        data: None,
    };
    let err = decode_frame(&wire.encode_to_vec()).expect_err("status should fail");
    assert!(matches!(err, CodecError::InvalidStatus(77)));
}

#[test]
fn missing_data_decodes_as_empty_object() {
    let wire = WireFrame {
        id: "id-2".to_owned(),
        parent_id: None,
        ts: 1,
        from: None,
        syscall: SESSION_CONNECTED.to_owned(),
        status: 1,
        data: None,
    };
    let frame = decode_frame(&wire.encode_to_vec()).expect("decode");
    assert_eq!(frame.data, serde_json::json!({}));
    assert_eq!(frame.status, Status::Item);
}

#[test]
fn push_constructor_sets_item_status_and_fresh_id() {
    let a = Frame::push(GAME_STATE, serde_json::json!({}));
    let b = Frame::push(GAME_STATE, serde_json::json!({}));
    assert_eq!(a.status, Status::Item);
    assert_ne!(a.id, b.id);
    assert!(a.ts > 0);
    assert_eq!(a.parent_id, None);
    assert_eq!(a.from, None);
}

#[test]
fn error_message_prefers_message_then_error() {
    let mut frame = Frame::push("game:call", serde_json::json!({"message": "m1", "error": "m2"}));
    assert_eq!(frame.error_message(), Some("m1"));
    frame.data = serde_json::json!({"error": "m2"});
    assert_eq!(frame.error_message(), Some("m2"));
    frame.data = serde_json::json!({});
    assert_eq!(frame.error_message(), None);
}
