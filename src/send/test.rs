use super::*;
use crate::{
    buffer::FetchPolicy,
    frame::{Frame, UpdatePayload},
    reject::{ErrorObject, Rejection},
    value::AsyncValue,
};

use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use futures::{executor::block_on, future, stream, task::noop_waker, Stream, StreamExt};
use proptest::prelude::*;
use serde_json::{json, Value};

fn frames(root: AsyncValue) -> Vec<Value> {
    block_on(
        ObjectSerializer::new(root)
            .map(|frame| frame.to_value())
            .collect(),
    )
}

#[test]
fn plain_graphs_are_a_single_frame() {
    let root = AsyncValue::object([
        ("id", AsyncValue::from(7)),
        ("tags", AsyncValue::from(json!(["a", "b"]))),
    ]);
    assert_eq!(frames(root), vec![json!({"id": 7, "tags": ["a", "b"]})]);
}

#[test]
fn futures_become_promise_markers() {
    let root = AsyncValue::future(future::ready(Ok(AsyncValue::from("resolved"))));
    assert_eq!(
        frames(root),
        vec![json!({"$promise": 1}), json!([1, {"$resolve": "resolved"}])],
    );
}

#[test]
fn ids_follow_encounter_order() {
    let root = AsyncValue::array([
        AsyncValue::future(future::ready(Ok(AsyncValue::from("a")))),
        AsyncValue::from(2),
        AsyncValue::future(future::ready(Ok(AsyncValue::from("b")))),
    ]);
    assert_eq!(
        frames(root),
        vec![
            json!([{"$promise": 1}, 2, {"$promise": 2}]),
            json!([1, {"$resolve": "a"}]),
            json!([2, {"$resolve": "b"}]),
        ],
    );
}

#[test]
fn sequences_yield_until_exhausted() {
    let root = AsyncValue::object([(
        "numbers",
        AsyncValue::stream(stream::iter([1i64, 2, 3]).map(AsyncValue::from)),
    )]);
    assert_eq!(
        frames(root),
        vec![
            json!({"numbers": {"$asyncIterator": 1}}),
            json!([1, {"done": false, "value": 1}]),
            json!([1, {"done": false, "value": 2}]),
            json!([1, {"done": false, "value": 3}]),
            json!([1, {"done": true}]),
        ],
    );
}

#[test]
fn empty_sequences_finish_immediately() {
    let root = AsyncValue::stream(stream::empty());
    assert_eq!(
        frames(root),
        vec![json!({"$asyncIterator": 1}), json!([1, {"done": true}])],
    );
}

#[test]
fn ready_sequences_interleave_in_id_order() {
    let root = AsyncValue::object([
        (
            "a",
            AsyncValue::stream(stream::iter([1i64, 2]).map(AsyncValue::from)),
        ),
        (
            "b",
            AsyncValue::stream(stream::iter([10i64, 20]).map(AsyncValue::from)),
        ),
    ]);
    assert_eq!(
        frames(root),
        vec![
            json!({"a": {"$asyncIterator": 1}, "b": {"$asyncIterator": 2}}),
            json!([1, {"done": false, "value": 1}]),
            json!([2, {"done": false, "value": 10}]),
            json!([1, {"done": false, "value": 2}]),
            json!([2, {"done": false, "value": 20}]),
            json!([1, {"done": true}]),
            json!([2, {"done": true}]),
        ],
    );
}

#[test]
fn resolved_values_are_walked_again() {
    let inner = AsyncValue::future(future::ready(Ok(AsyncValue::from("resolved"))));
    let root = AsyncValue::object([(
        "promise1",
        AsyncValue::future(future::ready(Ok(AsyncValue::object([("promise2", inner)])))),
    )]);
    assert_eq!(
        frames(root),
        vec![
            json!({"promise1": {"$promise": 1}}),
            json!([1, {"$resolve": {"promise2": {"$promise": 2}}}]),
            json!([2, {"$resolve": "resolved"}]),
        ],
    );
}

#[test]
fn futures_can_resolve_to_sequences() {
    let root = AsyncValue::future(future::ready(Ok(AsyncValue::stream(
        stream::iter([1i64]).map(AsyncValue::from),
    ))));
    assert_eq!(
        frames(root),
        vec![
            json!({"$promise": 1}),
            json!([1, {"$resolve": {"$asyncIterator": 2}}]),
            json!([2, {"done": false, "value": 1}]),
            json!([2, {"done": true}]),
        ],
    );
}

#[test]
fn sequence_items_are_walked_for_new_sources() {
    let root = AsyncValue::stream(stream::iter([AsyncValue::object([(
        "inner",
        AsyncValue::future(future::ready(Ok(AsyncValue::from(41)))),
    )])]));
    assert_eq!(
        frames(root),
        vec![
            json!({"$asyncIterator": 1}),
            json!([1, {"done": false, "value": {"inner": {"$promise": 2}}}]),
            json!([2, {"$resolve": 41}]),
            json!([1, {"done": true}]),
        ],
    );
}

#[test]
fn rejections_carry_their_error_shape() {
    let root = AsyncValue::future(future::ready(Err(Rejection::Error(ErrorObject::new(
        "Error", "boom",
    )))));
    assert_eq!(
        frames(root),
        vec![
            json!({"$promise": 1}),
            json!([1, {"$reject": {"$error": {"name": "Error", "message": "boom"}}}]),
        ],
    );
}

#[test]
fn rejections_can_carry_plain_values() {
    let root = AsyncValue::future(future::ready(Err(Rejection::Value(json!({"code": 418})))));
    assert_eq!(
        frames(root),
        vec![
            json!({"$promise": 1}),
            json!([1, {"$reject": {"code": 418}}]),
        ],
    );
}

/// Always has another item ready; counts how many times it has been fetched.
struct CountingStream {
    yielded: i64,
    fetches: Arc<AtomicUsize>,
}

impl Stream for CountingStream {
    type Item = AsyncValue;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.fetches.fetch_add(1, Ordering::SeqCst);
        this.yielded += 1;
        Poll::Ready(Some(AsyncValue::from(this.yielded)))
    }
}

#[test]
fn eager_fetches_stay_at_most_one_item_ahead() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut serializer = ObjectSerializer::new(AsyncValue::stream(CountingStream {
        yielded: 0,
        fetches: fetches.clone(),
    }));

    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);

    // the first pull hands back the root and grants the first fetch
    match Pin::new(&mut serializer).poll_next(&mut cx) {
        Poll::Ready(Some(Frame::Root(root))) => assert_eq!(root, json!({"$asyncIterator": 1})),
        other => panic!("expected the root frame, got {other:?}"),
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    // each later pull delivers item n with the fetch for n + 1 started and
    // nothing beyond it
    for n in 1..=5i64 {
        match Pin::new(&mut serializer).poll_next(&mut cx) {
            Poll::Ready(Some(Frame::Update(1, UpdatePayload::Item { done: false, value }))) => {
                assert_eq!(value, Some(Value::from(n)));
            }
            other => panic!("expected item {n}, got {other:?}"),
        }
        assert_eq!(fetches.load(Ordering::SeqCst), n as usize + 1);
    }
}

#[test]
fn lazy_fetches_wait_for_an_empty_buffer() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut serializer = ObjectSerializer::with_policy(
        AsyncValue::stream(CountingStream {
            yielded: 0,
            fetches: fetches.clone(),
        }),
        FetchPolicy::OnEmpty,
    );

    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);

    // the root was buffered, so nothing has been fetched yet
    assert!(matches!(
        Pin::new(&mut serializer).poll_next(&mut cx),
        Poll::Ready(Some(Frame::Root(_)))
    ));
    assert_eq!(fetches.load(Ordering::SeqCst), 0);

    // an empty buffer triggers exactly one fetch per pull
    for n in 1..=3i64 {
        match Pin::new(&mut serializer).poll_next(&mut cx) {
            Poll::Ready(Some(Frame::Update(1, UpdatePayload::Item { done: false, value }))) => {
                assert_eq!(value, Some(Value::from(n)));
            }
            other => panic!("expected item {n}, got {other:?}"),
        }
        assert_eq!(fetches.load(Ordering::SeqCst), n as usize);
    }
}

#[test]
fn lazy_policy_still_drives_futures() {
    let root = AsyncValue::future(future::ready(Ok(AsyncValue::from(1))));
    let collected = block_on(
        ObjectSerializer::with_policy(root, FetchPolicy::OnEmpty)
            .map(|frame| frame.to_value())
            .collect::<Vec<_>>(),
    );
    assert_eq!(
        collected,
        vec![json!({"$promise": 1}), json!([1, {"$resolve": 1}])],
    );
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::vec(("[a-z]{1,5}", inner), 0..4).prop_map(|entries| {
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    map.insert(key, value);
                }
                Value::Object(map)
            }),
        ]
    })
}

/// Rebuilds a finished value as a structural tree, forcing the walk to
/// recurse instead of passing the whole thing through as one leaf.
fn lift(value: Value) -> AsyncValue {
    match value {
        Value::Array(items) => AsyncValue::Array(items.into_iter().map(lift).collect()),
        Value::Object(map) => {
            AsyncValue::Object(map.into_iter().map(|(key, value)| (key, lift(value))).collect())
        }
        leaf => AsyncValue::Plain(leaf),
    }
}

proptest! {
    #[test]
    fn async_free_graphs_pass_through_verbatim(value in arb_json()) {
        prop_assert_eq!(frames(lift(value.clone())), vec![value]);
    }
}
