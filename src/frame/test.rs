use super::*;

use serde_json::json;

#[test]
fn markers_round_trip() {
    let promise = marker(MarkerKind::Promise, 1);
    assert_eq!(promise, json!({"$promise": 1}));
    assert_eq!(as_marker(&promise), Some((MarkerKind::Promise, 1)));

    let sequence = marker(MarkerKind::Sequence, 9);
    assert_eq!(sequence, json!({"$asyncIterator": 9}));
    assert_eq!(as_marker(&sequence), Some((MarkerKind::Sequence, 9)));
}

#[test]
fn single_key_rule() {
    // a second key makes it user data
    assert_eq!(as_marker(&json!({"$promise": 1, "x": 2})), None);
    // unknown keys are user data
    assert_eq!(as_marker(&json!({"$future": 1})), None);
    // ids must be unsigned integers
    assert_eq!(as_marker(&json!({"$promise": "1"})), None);
    assert_eq!(as_marker(&json!({"$promise": -1})), None);
    assert_eq!(as_marker(&json!({"$promise": 1.5})), None);
    // non-objects are never markers
    assert_eq!(as_marker(&json!([1])), None);
    assert_eq!(as_marker(&json!(1)), None);
}

#[test]
fn update_decodes_id_and_payload() {
    let (id, payload) = decode_update(json!([3, {"$resolve": "ok"}])).unwrap();
    assert_eq!(id, 3);
    assert_eq!(payload, json!({"$resolve": "ok"}));
}

#[test]
fn update_shape_is_enforced() {
    assert!(matches!(
        decode_update(json!("nope")),
        Err(FrameError::NotAnUpdate(_))
    ));
    assert!(matches!(
        decode_update(json!([1])),
        Err(FrameError::NotAnUpdate(_))
    ));
    assert!(matches!(
        decode_update(json!([1, 2, 3])),
        Err(FrameError::NotAnUpdate(_))
    ));
    assert!(matches!(
        decode_update(json!(["1", {}])),
        Err(FrameError::InvalidId(_))
    ));
}

#[test]
fn settlement_wrappers() {
    assert_eq!(
        decode_settlement(json!({"$resolve": [1, 2]})),
        Settlement::Resolve(json!([1, 2]))
    );
    assert_eq!(
        decode_settlement(json!({"$reject": "bad"})),
        Settlement::Reject(json!("bad"))
    );
}

#[test]
fn bare_payloads_resolve() {
    // the legacy variant carries the resolved value with no wrapper
    assert_eq!(
        decode_settlement(json!("resolved")),
        Settlement::Resolve(json!("resolved"))
    );
    // a single-key object that is not a wrapper is an ordinary value
    assert_eq!(
        decode_settlement(json!({"answer": 42})),
        Settlement::Resolve(json!({"answer": 42}))
    );
}

#[test]
fn item_payloads() {
    assert_eq!(
        decode_item(json!({"done": false, "value": "x"})).unwrap(),
        (false, Some(json!("x")))
    );
    assert_eq!(decode_item(json!({"done": true})).unwrap(), (true, None));
    // unknown keys are ignored
    assert_eq!(
        decode_item(json!({"done": false, "value": 1, "extra": true})).unwrap(),
        (false, Some(json!(1)))
    );
    assert!(matches!(
        decode_item(json!({"value": 1})),
        Err(FrameError::PayloadMismatch(_))
    ));
    assert!(matches!(
        decode_item(json!(17)),
        Err(FrameError::PayloadMismatch(_))
    ));
}

#[test]
fn frames_serialize_like_their_values() {
    let frames = [
        Frame::Root(json!({"a": {"$promise": 1}})),
        Frame::Update(1, UpdatePayload::Resolve(json!("done"))),
        Frame::Update(2, UpdatePayload::Reject(json!({"code": 7}))),
        Frame::Update(3, UpdatePayload::Item { done: false, value: Some(json!(5)) }),
        Frame::Update(3, UpdatePayload::Item { done: true, value: None }),
    ];
    for frame in &frames {
        assert_eq!(serde_json::to_value(frame).unwrap(), frame.to_value());
    }
}

#[test]
fn finished_items_omit_the_value_key() {
    let done = UpdatePayload::Item { done: true, value: None }.to_value();
    assert_eq!(done, json!({"done": true}));
    assert!(done.get("value").is_none());
}
