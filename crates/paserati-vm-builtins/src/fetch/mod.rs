//! `fetch` and its object family: `Headers`, `Request`, `Response`.
//!
//! The call path: validate and normalize on the VM thread, reject
//! synchronously on a pre-aborted signal (no worker, no socket), otherwise
//! register an external operation and hand the wire work to a worker. The
//! worker drives the redirect loop hop by hop, polls the abort signal at a
//! fixed interval, and publishes its outcome as a settlement job; the
//! `Response` object is materialized on the VM thread at settlement.

pub mod headers;
pub mod request;
pub mod response;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use paserati_vm_core::builtin_builder::native_callable;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::promise::JsPromise;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

use response::ResponseParts;
use transport::{HttpTransport, Transport, WireRequest, WireResponse};

/// Redirect hop limit in `follow` mode.
const MAX_REDIRECTS: usize = 20;

pub struct FetchBuiltin {
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
}

impl Default for FetchBuiltin {
    fn default() -> Self {
        Self {
            transport: Arc::new(HttpTransport::new()),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl FetchBuiltin {
    /// Substitute the wire transport (tests use a mock).
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Builtin for FetchBuiltin {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn priority(&self) -> u32 {
        priority::FETCH
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_type_alias(
            "Response",
            Type::Object(vec![
                ("ok".into(), Type::Boolean),
                ("status".into(), Type::Number),
                ("statusText".into(), Type::String),
                ("url".into(), Type::String),
                ("bodyUsed".into(), Type::Boolean),
                ("redirected".into(), Type::Boolean),
                (
                    "text".into(),
                    Type::function(vec![], Type::promise_of(Type::String)),
                ),
                (
                    "json".into(),
                    Type::function(vec![], Type::promise_of(Type::Any)),
                ),
            ]),
        );
        tcx.define_type_alias(
            "RequestInit",
            Type::Object(vec![
                ("method".into(), Type::union(vec![Type::String, Type::Undefined])),
                ("headers".into(), Type::Any),
                ("body".into(), Type::Any),
                ("signal".into(), Type::union(vec![Type::named("AbortSignal"), Type::Undefined])),
                ("redirect".into(), Type::union(vec![Type::String, Type::Undefined])),
            ]),
        );
        tcx.define_global(
            "fetch",
            Type::function(
                vec![Type::String, Type::named("RequestInit")],
                Type::promise_of(Type::named("Response")),
            ),
        );
        tcx.define_global("Headers", Type::ctor(vec![Type::Any], Type::named("Headers")));
        tcx.define_global(
            "Request",
            Type::ctor(
                vec![Type::String, Type::named("RequestInit")],
                Type::named("Request"),
            ),
        );
        tcx.define_global(
            "Response",
            Type::ctor(vec![Type::Any, Type::Any], Type::named("Response")),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        headers::install(rcx)?;
        request::install(rcx)?;
        response::install(rcx)?;

        let realm = rcx.realm();
        let transport = self.transport.clone();
        let poll_interval = self.poll_interval;
        let fetch_fn = native_callable(&realm, "fetch", 1, move |_this, args, cx| {
            fetch_call(cx, args, transport.clone(), poll_interval)
        });
        rcx.define_global("fetch", fetch_fn);
        Ok(())
    }
}

/// Serialize a RequestInit/Response body. Objects JSON-serialize; the
/// content type is inferred when none is present yet.
pub(crate) fn body_to_bytes(
    cx: &mut NativeContext,
    body: &Value,
    headers: &mut Vec<(String, String)>,
) -> VmResult<Vec<u8>> {
    let has_content_type = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    let content_type_is_json = headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("content-type") && value.to_ascii_lowercase().contains("json")
    });

    match body {
        Value::String(s) => {
            if content_type_is_json {
                return Ok(s.as_str().as_bytes().to_vec());
            }
            if !has_content_type {
                headers.push((
                    "content-type".to_string(),
                    "text/plain;charset=UTF-8".to_string(),
                ));
            }
            Ok(s.as_str().as_bytes().to_vec())
        }
        Value::ArrayBuffer(buffer) => Ok(buffer.with_data(<[u8]>::to_vec).unwrap_or_default()),
        Value::TypedArray(ta) => Ok(ta.bytes().unwrap_or_default()),
        other if other.is_object() => {
            let serialized = crate::json::stringify_value(cx, other)?
                .ok_or_else(|| VmError::type_error("Request body is not serializable"))?;
            if !has_content_type {
                headers.push((
                    "content-type".to_string(),
                    "application/json".to_string(),
                ));
            }
            Ok(serialized.into_bytes())
        }
        other => {
            let text = cx.to_string_value(other)?;
            Ok(text.as_str().as_bytes().to_vec())
        }
    }
}

// ---------------------------------------------------------------------------
// The fetch call
// ---------------------------------------------------------------------------

enum FetchFailure {
    Aborted(String),
    Network(String),
    RedirectRefused(String),
    TooManyRedirects,
}

struct Exchange {
    response: WireResponse,
    redirected: bool,
    response_type: &'static str,
}

fn fetch_call(
    cx: &mut NativeContext,
    args: &[Value],
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
) -> VmResult<Value> {
    let init = arg(args, 1).clone();
    let record = request::normalize(cx, arg(args, 0), &init)?;

    // Pre-aborted signal: reject synchronously, no worker is spawned and
    // nothing reaches the transport.
    if let Some(signal) = &record.signal {
        if signal_aborted(signal) {
            let reason = signal_reason(signal);
            return Ok(cx.new_rejected_promise(Value::string(format!("AbortError: {reason}"))));
        }
    }

    let promise = JsPromise::new_pending();
    let result = Value::Promise(promise.clone());

    let host = cx.async_host().clone();
    host.begin_external_op();

    let worker_host = host.clone();
    let signal = record.signal.clone();
    let redirect_mode = record.redirect.clone();
    let wire = WireRequest {
        url: record.url.clone(),
        method: record.method.clone(),
        headers: record.headers.clone(),
        body: record.body.clone().map(bytes::Bytes::from),
    };

    host.spawn_worker(Box::pin(async move {
        let outcome = tokio::select! {
            result = run_request(transport, wire, redirect_mode) => result,
            reason = watch_abort(signal, poll_interval) => Err(FetchFailure::Aborted(reason)),
        };
        let settled = promise.clone();
        worker_host.submit(Box::new(move |cx| settle(cx, &settled, outcome)));
        worker_host.end_external_op();
    }));

    Ok(result)
}

fn settle(
    cx: &mut NativeContext,
    promise: &GcRef<JsPromise>,
    outcome: Result<Exchange, FetchFailure>,
) {
    match outcome {
        Ok(exchange) => {
            let parts = ResponseParts {
                status: exchange.response.status,
                status_text: exchange.response.status_text.clone(),
                headers: exchange.response.headers.clone(),
                body: exchange.response.body.clone(),
                url: exchange.response.url.clone(),
                redirected: exchange.redirected,
                response_type: exchange.response_type.to_string(),
            };
            let realm = cx.current_realm();
            let value = response::make_response(&realm, parts);
            cx.resolve_promise(promise, value);
        }
        Err(FetchFailure::Aborted(reason)) => {
            cx.reject_promise(promise, Value::string(format!("AbortError: {reason}")));
        }
        Err(FetchFailure::Network(message)) => {
            cx.reject_promise(
                promise,
                Value::string(format!("TypeError: Failed to fetch: {message}")),
            );
        }
        Err(FetchFailure::RedirectRefused(url)) => {
            cx.reject_promise(
                promise,
                Value::string(format!("TypeError: Redirect to {url} refused by redirect mode")),
            );
        }
        Err(FetchFailure::TooManyRedirects) => {
            cx.reject_promise(
                promise,
                Value::string(format!(
                    "RangeError: Exceeded the maximum of {MAX_REDIRECTS} redirects"
                )),
            );
        }
    }
}

/// Drive the redirect loop, one transport exchange per hop.
async fn run_request(
    transport: Arc<dyn Transport>,
    mut wire: WireRequest,
    redirect_mode: String,
) -> Result<Exchange, FetchFailure> {
    let mut hops = 0usize;
    loop {
        let response = transport
            .execute(wire.clone())
            .await
            .map_err(FetchFailure::Network)?;

        let location = match (response.is_redirect(), response.location()) {
            (true, Some(location)) => location.to_string(),
            _ => {
                return Ok(Exchange {
                    response,
                    redirected: hops > 0,
                    response_type: "basic",
                });
            }
        };

        match redirect_mode.as_str() {
            "manual" => {
                return Ok(Exchange {
                    response,
                    redirected: false,
                    response_type: "opaqueredirect",
                });
            }
            "error" => return Err(FetchFailure::RedirectRefused(location)),
            _ => {
                hops += 1;
                if hops > MAX_REDIRECTS {
                    return Err(FetchFailure::TooManyRedirects);
                }
                let base = url::Url::parse(&response.url)
                    .or_else(|_| url::Url::parse(&wire.url))
                    .map_err(|e| FetchFailure::Network(e.to_string()))?;
                let next = base
                    .join(&location)
                    .map_err(|e| FetchFailure::Network(e.to_string()))?;
                // 303 (and 301/302 on POST) re-issue as a bodyless GET.
                if response.status == 303
                    || (matches!(response.status, 301 | 302) && wire.method == "POST")
                {
                    wire.method = "GET".to_string();
                    wire.body = None;
                }
                wire.url = next.to_string();
            }
        }
    }
}

/// Resolves with the abort reason once the signal flips; pends forever
/// without a signal.
async fn watch_abort(signal: Option<GcRef<JsObject>>, interval: Duration) -> String {
    let Some(signal) = signal else {
        std::future::pending::<()>().await;
        unreachable!()
    };
    loop {
        tokio::time::sleep(interval).await;
        if signal_aborted(&signal) {
            return signal_reason(&signal);
        }
    }
}

fn signal_aborted(signal: &GcRef<JsObject>) -> bool {
    signal
        .get_own(&PropertyKey::string("aborted"))
        .and_then(|d| d.data_value().cloned())
        .is_some_and(|v| v.to_boolean())
}

fn signal_reason(signal: &GcRef<JsObject>) -> String {
    let reason = signal
        .get_own(&PropertyKey::string("reason"))
        .and_then(|d| d.data_value().cloned())
        .unwrap_or(Value::Undefined);
    if reason.is_undefined() {
        return "signal is aborted without reason".to_string();
    }
    paserati_vm_core::convert::primitive_to_string(&reason)
        .unwrap_or_else(|_| "signal is aborted without reason".to_string())
}
