//! fetch end-to-end against the mock transport.

mod common;

use std::sync::Arc;

use common::*;
use paserati_vm_builtins::engine::Engine;
use paserati_vm_builtins::fetch::transport::{
    Transport, TransportFuture, WireRequest, WireResponse, ok_response,
};
use paserati_vm_core::object::PropertyKey;
use paserati_vm_core::Value;

fn fulfilled_response(engine: &Engine, p: &Value) -> Value {
    let mut cx = engine.context();
    engine.run_to_completion(&mut cx);
    let promise = p.as_promise().expect("promise result");
    assert!(
        promise.is_fulfilled(),
        "expected fulfillment, got {:?}",
        promise.state()
    );
    promise.value().unwrap()
}

fn do_fetch(engine: &Engine, url: &str, init: Option<Value>) -> Value {
    let mut cx = engine.context();
    let fetch = global(engine, &mut cx, "fetch");
    let mut args = vec![Value::string(url)];
    if let Some(init) = init {
        args.push(init);
    }
    cx.call(&fetch, &Value::Undefined, &args).unwrap()
}

#[test]
fn fetch_resolves_with_a_response_object() {
    let (engine, transport) = engine_with_mock();
    transport.push_response(ok_response(
        "http://example.test/data",
        br#"{"answer":42}"#,
        "application/json",
    ));

    let p = do_fetch(&engine, "http://example.test/data", None);
    let response = fulfilled_response(&engine, &p);
    let mut cx = engine.context();

    assert_eq!(get(&mut cx, &response, "ok").as_boolean(), Some(true));
    assert_eq!(number_of(&get(&mut cx, &response, "status")), 200.0);
    assert_eq!(string_of(&get(&mut cx, &response, "statusText")), "OK");
    assert_eq!(
        string_of(&get(&mut cx, &response, "url")),
        "http://example.test/data"
    );
    assert_eq!(get(&mut cx, &response, "redirected").as_boolean(), Some(false));
    assert_eq!(string_of(&get(&mut cx, &response, "type")), "basic");

    // Headers surface through the Headers object.
    let headers = get(&mut cx, &response, "headers");
    let ct = call_method(&mut cx, &headers, "get", &[Value::string("Content-Type")]).unwrap();
    assert_eq!(string_of(&ct), "application/json");

    // json() parses the body.
    let body_promise = call_method(&mut cx, &response, "json", &[]).unwrap();
    engine.run_to_completion(&mut cx);
    let body = body_promise.as_promise().unwrap().value().unwrap();
    assert_eq!(number_of(&get(&mut cx, &body, "answer")), 42.0);

    let sent = transport.recorded();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, "GET");
}

#[test]
fn body_is_single_use() {
    let (engine, transport) = engine_with_mock();
    transport.push_response(ok_response("http://example.test/", b"hello", "text/plain"));

    let p = do_fetch(&engine, "http://example.test/", None);
    let response = fulfilled_response(&engine, &p);
    let mut cx = engine.context();

    assert_eq!(get(&mut cx, &response, "bodyUsed").as_boolean(), Some(false));
    let text_promise = call_method(&mut cx, &response, "text", &[]).unwrap();
    engine.run_to_completion(&mut cx);
    let text = text_promise.as_promise().unwrap().value().unwrap();
    assert_eq!(string_of(&text), "hello");
    assert_eq!(get(&mut cx, &response, "bodyUsed").as_boolean(), Some(true));

    // Second read rejects.
    let second = call_method(&mut cx, &response, "json", &[]).unwrap();
    engine.run_to_completion(&mut cx);
    let promise = second.as_promise().unwrap();
    assert!(promise.is_rejected());
    assert!(string_of(&promise.reason().unwrap()).contains("body already used"));
}

#[test]
fn method_is_uppercased_and_body_json_encoded() {
    let (engine, transport) = engine_with_mock();
    transport.push_response(ok_response("http://example.test/", b"{}", "application/json"));

    let mut cx = engine.context();
    let object_ctor = global(&engine, &mut cx, "Object");
    let init = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&init, &PropertyKey::string("method"), Value::string("post"))
        .unwrap();
    let payload = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&payload, &PropertyKey::string("a"), Value::int32(1))
        .unwrap();
    cx.set(&init, &PropertyKey::string("body"), payload).unwrap();

    let p = do_fetch(&engine, "http://example.test/", Some(init));
    fulfilled_response(&engine, &p);

    let sent = transport.recorded();
    assert_eq!(sent[0].method, "POST");
    assert_eq!(sent[0].body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
    assert!(
        sent[0]
            .headers
            .iter()
            .any(|(n, v)| n == "content-type" && v == "application/json")
    );
}

#[test]
fn redirects_follow_up_to_the_hop_limit() {
    let (engine, transport) = engine_with_mock();
    transport.push_response(WireResponse {
        status: 302,
        status_text: "Found".into(),
        headers: vec![("location".into(), "/moved".into())],
        body: Vec::new(),
        url: "http://example.test/start".into(),
    });
    transport.push_response(ok_response("http://example.test/moved", b"done", "text/plain"));

    let p = do_fetch(&engine, "http://example.test/start", None);
    let response = fulfilled_response(&engine, &p);
    let mut cx = engine.context();
    assert_eq!(get(&mut cx, &response, "redirected").as_boolean(), Some(true));
    assert_eq!(
        string_of(&get(&mut cx, &response, "url")),
        "http://example.test/moved"
    );
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn redirect_mode_error_rejects() {
    let (engine, transport) = engine_with_mock();
    transport.push_response(WireResponse {
        status: 301,
        status_text: "Moved Permanently".into(),
        headers: vec![("location".into(), "http://elsewhere.test/".into())],
        body: Vec::new(),
        url: "http://example.test/".into(),
    });

    let mut cx = engine.context();
    let object_ctor = global(&engine, &mut cx, "Object");
    let init = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&init, &PropertyKey::string("redirect"), Value::string("error"))
        .unwrap();

    let p = do_fetch(&engine, "http://example.test/", Some(init));
    engine.run_to_completion(&mut cx);
    let promise = p.as_promise().unwrap();
    assert!(promise.is_rejected());
    assert!(string_of(&promise.reason().unwrap()).starts_with("TypeError"));
}

#[test]
fn redirect_mode_manual_returns_opaqueredirect() {
    let (engine, transport) = engine_with_mock();
    transport.push_response(WireResponse {
        status: 307,
        status_text: "Temporary Redirect".into(),
        headers: vec![("location".into(), "http://elsewhere.test/".into())],
        body: Vec::new(),
        url: "http://example.test/".into(),
    });

    let mut cx = engine.context();
    let object_ctor = global(&engine, &mut cx, "Object");
    let init = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&init, &PropertyKey::string("redirect"), Value::string("manual"))
        .unwrap();

    let p = do_fetch(&engine, "http://example.test/", Some(init));
    let response = fulfilled_response(&engine, &p);
    assert_eq!(string_of(&get(&mut cx, &response, "type")), "opaqueredirect");
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn too_many_redirects_rejects_with_range_error() {
    let (engine, transport) = engine_with_mock();
    for i in 0..25 {
        transport.push_response(WireResponse {
            status: 302,
            status_text: "Found".into(),
            headers: vec![("location".into(), format!("/hop/{i}"))],
            body: Vec::new(),
            url: format!("http://example.test/hop/{i}"),
        });
    }

    let p = do_fetch(&engine, "http://example.test/", None);
    let mut cx = engine.context();
    engine.run_to_completion(&mut cx);
    let promise = p.as_promise().unwrap();
    assert!(promise.is_rejected());
    assert!(string_of(&promise.reason().unwrap()).starts_with("RangeError"));
    // Initial request plus 20 followed hops.
    assert_eq!(transport.request_count(), 21);
}

#[test]
fn network_failure_surfaces_as_rejection() {
    let (engine, transport) = engine_with_mock();
    transport.push_error("connection refused");

    let p = do_fetch(&engine, "http://example.test/", None);
    let mut cx = engine.context();
    engine.run_to_completion(&mut cx);
    let promise = p.as_promise().unwrap();
    assert!(promise.is_rejected());
    let reason = string_of(&promise.reason().unwrap());
    assert!(reason.contains("connection refused"));
}

/// Transport whose response never arrives; the abort poller must win.
struct HangingTransport {
    requests: parking_lot::Mutex<usize>,
}

impl Transport for HangingTransport {
    fn execute(&self, _request: WireRequest) -> TransportFuture {
        *self.requests.lock() += 1;
        Box::pin(std::future::pending())
    }
}

#[test]
fn in_flight_abort_rejects_with_abort_error() {
    let transport = Arc::new(HangingTransport {
        requests: parking_lot::Mutex::new(0),
    });
    let engine = Engine::with_transport(transport.clone()).unwrap();
    let mut cx = engine.context();

    let controller_ctor = global(&engine, &mut cx, "AbortController");
    let controller = construct(&mut cx, &controller_ctor, &[]).unwrap();
    let signal = get(&mut cx, &controller, "signal");

    let object_ctor = global(&engine, &mut cx, "Object");
    let init = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&init, &PropertyKey::string("signal"), signal).unwrap();

    let p = do_fetch(&engine, "http://example.test/slow", Some(init));
    assert!(p.as_promise().unwrap().is_pending());

    // Abort while the request hangs; the worker's poller observes it.
    call_method(&mut cx, &controller, "abort", &[Value::string("took too long")]).unwrap();
    engine.run_to_completion(&mut cx);

    let promise = p.as_promise().unwrap();
    assert!(promise.is_rejected());
    let reason = string_of(&promise.reason().unwrap());
    assert!(reason.starts_with("AbortError"));
    assert!(reason.contains("took too long"));
    assert_eq!(*transport.requests.lock(), 1);
}

#[test]
fn fetch_accepts_a_request_object() {
    let (engine, transport) = engine_with_mock();
    transport.push_response(ok_response("http://example.test/api", b"ok", "text/plain"));

    let mut cx = engine.context();
    let object_ctor = global(&engine, &mut cx, "Object");
    let init = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&init, &PropertyKey::string("method"), Value::string("delete"))
        .unwrap();
    let request_ctor = global(&engine, &mut cx, "Request");
    let request = construct(
        &mut cx,
        &request_ctor,
        &[Value::string("http://example.test/api"), init],
    )
    .unwrap();

    // Request normalizes eagerly.
    assert_eq!(string_of(&get(&mut cx, &request, "method")), "DELETE");
    assert_eq!(string_of(&get(&mut cx, &request, "credentials")), "same-origin");

    let fetch = global(&engine, &mut cx, "fetch");
    let p = cx.call(&fetch, &Value::Undefined, &[request]).unwrap();
    fulfilled_response(&engine, &p);

    let sent = transport.recorded();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, "DELETE");
    assert_eq!(sent[0].url, "http://example.test/api");
}

#[test]
fn headers_are_case_insensitive_and_ordered() {
    let engine = engine();
    let mut cx = engine.context();
    let headers_ctor = global(&engine, &mut cx, "Headers");
    let headers = construct(&mut cx, &headers_ctor, &[]).unwrap();

    call_method(
        &mut cx,
        &headers,
        "set",
        &[Value::string("X-Token"), Value::string("abc")],
    )
    .unwrap();
    call_method(
        &mut cx,
        &headers,
        "append",
        &[Value::string("Accept"), Value::string("text/html")],
    )
    .unwrap();
    call_method(
        &mut cx,
        &headers,
        "append",
        &[Value::string("accept"), Value::string("application/json")],
    )
    .unwrap();

    let token = call_method(&mut cx, &headers, "get", &[Value::string("x-token")]).unwrap();
    assert_eq!(string_of(&token), "abc");
    let accept = call_method(&mut cx, &headers, "get", &[Value::string("Accept")]).unwrap();
    assert_eq!(string_of(&accept), "text/html, application/json");

    let has = call_method(&mut cx, &headers, "has", &[Value::string("X-TOKEN")]).unwrap();
    assert_eq!(has.as_boolean(), Some(true));
    call_method(&mut cx, &headers, "delete", &[Value::string("x-token")]).unwrap();
    let gone = call_method(&mut cx, &headers, "get", &[Value::string("X-Token")]).unwrap();
    assert!(gone.is_null());
}

#[test]
fn response_static_factories() {
    let engine = engine();
    let mut cx = engine.context();
    let response_ctor = global(&engine, &mut cx, "Response");

    let error_response = call_method(&mut cx, &response_ctor, "error", &[]).unwrap();
    assert_eq!(string_of(&get(&mut cx, &error_response, "type")), "error");
    assert_eq!(number_of(&get(&mut cx, &error_response, "status")), 0.0);

    let redirect = call_method(
        &mut cx,
        &response_ctor,
        "redirect",
        &[Value::string("http://example.test/next"), Value::int32(303)],
    )
    .unwrap();
    assert_eq!(number_of(&get(&mut cx, &redirect, "status")), 303.0);
    let headers = get(&mut cx, &redirect, "headers");
    let location = call_method(&mut cx, &headers, "get", &[Value::string("location")]).unwrap();
    assert_eq!(string_of(&location), "http://example.test/next");

    let bad = call_method(
        &mut cx,
        &response_ctor,
        "redirect",
        &[Value::string("http://example.test/"), Value::int32(200)],
    );
    assert!(matches!(bad, Err(paserati_vm_core::VmError::RangeError(_))));

    let object_ctor = global(&engine, &mut cx, "Object");
    let data = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&data, &PropertyKey::string("ok"), Value::boolean(true))
        .unwrap();
    let json_response =
        call_method(&mut cx, &response_ctor, "json", &[data]).unwrap();
    let headers = get(&mut cx, &json_response, "headers");
    let ct = call_method(&mut cx, &headers, "get", &[Value::string("content-type")]).unwrap();
    assert_eq!(string_of(&ct), "application/json");
}
