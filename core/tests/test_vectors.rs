//! Drive the pipeline through the scenarios in `test-vectors/pipeline.json`.
//!
//! Each case seeds storage, scripts the transport's responses, sends one
//! descriptor, and checks the outgoing requests, the envelope, the final
//! storage contents, and how many times sign-out and error tracking fired.
//! Bodies are compared as parsed JSON so key order does not matter.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use courier_client::{
    ClientConfig, CredentialProvider, ErrorReport, ErrorTracker, HttpMethod, HttpRequest,
    HttpResponse, MemoryBackend, Pipeline, PrefixedStorage, RequestDescriptor, SessionKey,
    Transport, TransportError,
};
use serde_json::Value;

struct Scripted {
    replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl Transport for Scripted {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies.lock().unwrap().pop_front().expect("more requests than scripted responses")
    }
}

#[derive(Default)]
struct CountingTracker(AtomicUsize);

impl ErrorTracker for CountingTracker {
    fn capture(&self, _report: &ErrorReport) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn scripted(case: &Value) -> Scripted {
    let replies = case["responses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| match r.get("transport_error") {
            Some(msg) => Err(TransportError::Connect(msg.as_str().unwrap().to_string())),
            None => Ok(HttpResponse {
                status: r["status"].as_u64().unwrap() as u16,
                headers: Vec::new(),
                body: r["body"].as_str().unwrap().to_string(),
            }),
        })
        .collect();
    Scripted {
        replies: Mutex::new(replies),
        seen: Mutex::new(Vec::new()),
    }
}

fn descriptor(raw: &Value) -> RequestDescriptor {
    let method: HttpMethod = serde_json::from_value(raw["method"].clone()).unwrap();
    let mut d = RequestDescriptor::new(method, raw["url"].as_str().unwrap());
    if let Some(data) = raw.get("data") {
        d = d.data(data.clone());
    }
    if let Some(headers) = raw.get("headers").and_then(Value::as_array) {
        for pair in headers {
            let pair = pair.as_array().unwrap();
            d = d.header(pair[0].as_str().unwrap(), pair[1].as_str().unwrap());
        }
    }
    d
}

fn session_key(name: &str) -> SessionKey {
    match name {
        "accessToken" => SessionKey::AccessToken,
        "userId" => SessionKey::UserId,
        "customerId" => SessionKey::CustomerId,
        "agentId" => SessionKey::AgentId,
        other => panic!("unknown storage key: {other}"),
    }
}

#[test]
fn pipeline_test_vectors() {
    let raw = include_str!("../../test-vectors/pipeline.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let base_url = vectors["base_url"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();

        let storage = Arc::new(PrefixedStorage::new("vanoma", MemoryBackend::new()));
        for (key, value) in case["storage"].as_object().unwrap() {
            storage.set(session_key(key), value.as_str().unwrap()).unwrap();
        }

        let sign_outs = Arc::new(AtomicUsize::new(0));
        let sign_out_counter = Arc::clone(&sign_outs);
        let tracker = Arc::new(CountingTracker::default());

        let config = ClientConfig::new(base_url);
        let pipeline = Pipeline::new(config, scripted(case), Arc::clone(&storage))
            .with_tracker(Arc::clone(&tracker))
            .with_sign_out(move || {
                sign_out_counter.fetch_add(1, Ordering::SeqCst);
            });

        let envelope = pipeline.call(&descriptor(&case["descriptor"]));

        // Outgoing requests
        let seen = pipeline.transport().seen.lock().unwrap().clone();
        let expected_requests = case["expected_requests"].as_array().unwrap();
        assert_eq!(seen.len(), expected_requests.len(), "{name}: request count");
        for (i, (req, expected)) in seen.iter().zip(expected_requests).enumerate() {
            let method: HttpMethod = serde_json::from_value(expected["method"].clone()).unwrap();
            assert_eq!(req.method, method, "{name}: request {i} method");
            assert_eq!(
                req.url,
                format!("{base_url}{}", expected["path"].as_str().unwrap()),
                "{name}: request {i} url"
            );
            for (header, value) in expected["headers"].as_object().unwrap() {
                assert_eq!(
                    req.header(header),
                    value.as_str(),
                    "{name}: request {i} header {header}"
                );
            }
            if let Some(raw) = expected.get("raw_body") {
                assert_eq!(req.body.as_deref(), raw.as_str(), "{name}: request {i} raw body");
                continue;
            }
            match &expected["body"] {
                Value::Null => {
                    assert!(req.body.is_none(), "{name}: request {i} body should be None")
                }
                body => {
                    let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                    assert_eq!(&sent, body, "{name}: request {i} body");
                }
            }
        }

        // Envelope
        let expected = &case["expected"];
        if let Some(data) = expected.get("data") {
            assert_eq!(envelope.data(), Some(data), "{name}: data");
            assert!(envelope.error().is_none(), "{name}: unexpected error");
        } else {
            let err = envelope.error().unwrap_or_else(|| panic!("{name}: expected an error"));
            assert!(envelope.data().is_none(), "{name}: data alongside error");
            assert_eq!(err.to_string(), expected["error"].as_str().unwrap(), "{name}: message");
            let kind = serde_json::to_value(err.kind()).unwrap();
            assert_eq!(kind, expected["kind"], "{name}: kind");
            if let Some(code) = expected.get("code") {
                assert_eq!(err.code(), code.as_str(), "{name}: code");
            }
        }

        // Side effects
        for key in ["accessToken", "userId"] {
            let stored = storage.get(session_key(key)).unwrap();
            let expected = case["expected_storage"].get(key).and_then(Value::as_str);
            assert_eq!(stored.as_deref(), expected, "{name}: stored {key}");
        }
        assert_eq!(
            sign_outs.load(Ordering::SeqCst) as u64,
            case["expected_sign_outs"].as_u64().unwrap(),
            "{name}: sign-outs"
        );
        assert_eq!(
            tracker.0.load(Ordering::SeqCst) as u64,
            case["expected_reports"].as_u64().unwrap(),
            "{name}: error reports"
        );
    }
}
