//! Wire-shape tests against the relay's flat-object schema.
//!
//! The transport chooses the concrete encoding, but the field layout must
//! match the relay's schema regardless of encoding. JSON is used here as a
//! readable stand-in to pin the field names and nesting.

#![allow(clippy::unwrap_used)]

use linewire_proto::{LineQuery, Request, Response};
use proptest::prelude::*;
use serde_json::{Value, json};

fn to_value(request: &Request) -> Value {
    serde_json::to_value(request).unwrap()
}

#[test]
fn challenge_request_shape() {
    assert_eq!(to_value(&Request::challenge("abc123")), json!({"challenge": "abc123"}));
}

#[test]
fn login_request_shape() {
    assert_eq!(to_value(&Request::login("t0k3n")), json!({"login": "t0k3n"}));
}

#[test]
fn version_request_shape() {
    assert_eq!(to_value(&Request::version()), json!({"info": {"query": "version"}}));
}

#[test]
fn window_list_request_shape() {
    assert_eq!(to_value(&Request::window_list()), json!({"window": {"get": {}}}));
}

#[test]
fn dehilight_request_shape() {
    assert_eq!(to_value(&Request::dehilight(5)), json!({"window": {"dehilight": [5]}}));
}

#[test]
fn line_query_request_shape() {
    let mut request = Request::line_query(7, LineQuery::latest(25));
    request.id = Some(3);
    assert_eq!(
        to_value(&request),
        json!({
            "id": 3,
            "line": {"get": {"7": {"lv": 1, "count": 25, "text": true}}}
        })
    );
}

#[test]
fn line_query_window_bounds_shape() {
    let query = LineQuery { after_line: Some(100), before_line: Some(200), ..LineQuery::default() };
    let request = Request::line_query(7, query);
    assert_eq!(
        to_value(&request),
        json!({
            "line": {"get": {"7": {
                "lv": 1,
                "count": 10,
                "afterLine": 100,
                "beforeLine": 200,
                "text": true
            }}}
        })
    );
}

#[test]
fn subscription_request_shapes() {
    assert_eq!(
        to_value(&Request::subscribe(42)),
        json!({"line": {"sub_add": {"add": {"view": [42], "lv": 1, "text": true}}}})
    );
    assert_eq!(
        to_value(&Request::unsubscribe(42)),
        json!({"line": {"sub_rm": {"add": {"view": [42], "lv": 1, "text": true}}}})
    );
}

#[test]
fn input_request_shape() {
    assert_eq!(
        to_value(&Request::input(3, "hello there")),
        json!({"input": {"windowId": 3, "text": "hello there"}})
    );
}

#[test]
fn response_with_multiple_populated_fields_parses() {
    let raw = json!({
        "id": 9,
        "window": [{"id": 1, "view": 10, "name": "#rust", "activity": 2}],
        "line": {"10": [{"time": "12:00", "text": "hello"}]}
    });

    let response: Response = serde_json::from_value(raw).unwrap();
    assert_eq!(response.id, Some(9));
    assert!(response.window.is_some());
    assert!(response.line.is_some());
    assert!(response.challenge.is_none());
    assert!(response.login.is_none());
    assert!(response.line_added.is_none());
}

#[test]
fn unsolicited_line_added_parses() {
    let raw = json!({
        "lineAdded": {"42": [{"text": "new line"}]}
    });

    let response: Response = serde_json::from_value(raw).unwrap();
    let lines = response.line_added.unwrap().into_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].view_id, 42);
    assert_eq!(lines[0].text, "new line");
}

proptest! {
    /// Requests survive an encode/decode cycle regardless of encoding
    /// details the transport might pick.
    #[test]
    fn request_round_trips(
        id in proptest::option::of(0u64..10_000),
        view in 0u64..10_000,
        count in 1u32..500,
        level in 0i64..4,
        text in any::<bool>(),
    ) {
        let mut request = Request::line_query(view, LineQuery {
            level,
            count,
            after_line: None,
            before_line: None,
            text,
        });
        request.id = id;

        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: Request = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(request, decoded);
    }

    /// Input text round-trips byte for byte.
    #[test]
    fn input_round_trips(window_id in any::<u64>(), text in ".*") {
        let request = Request::input(window_id, text);
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: Request = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(request, decoded);
    }
}
