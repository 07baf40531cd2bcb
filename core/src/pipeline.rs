//! Authenticated request pipeline.
//!
//! # Design
//! `Pipeline` turns a `RequestDescriptor` into an `Envelope`. It never
//! returns a bare error and never panics: connectivity problems, 500s and
//! API-level failures all come back as an `Envelope` whose `result` is
//! `Err(ApiError)`.
//!
//! A call runs at most two sends. The first uses the stored token. If it
//! answers 401, a user id is stored, and the call is not itself the
//! sign-out request, the pipeline exchanges the user id for a new token
//! and sends once more. A failed refresh dispatches sign-out and returns
//! the refresh's own envelope. The second send is never retried.
//!
//! Refreshes are serialized. A call that reaches the refresh step after
//! another call has already replaced the token it was rejected with reuses
//! that token instead of refreshing again.

use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::descriptor::RequestDescriptor;
use crate::envelope::{parse_body, Attempt, Envelope};
use crate::error::{ApiError, ErrorBody};
use crate::hooks::{ClearSession, ErrorReport, ErrorTracker, SignOutHandler, TracingTracker};
use crate::http::{find_header, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
use crate::storage::{CredentialProvider, SessionKey};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";

/// States a single logical call moves through. Logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Start,
    Sending,
    Success,
    NetworkFail,
    ServerFail,
    DomainFail,
    AuthExpired,
    Refreshing,
    RefreshOk,
    Resend,
    RefreshFail,
    SignedOut,
}

fn enter(state: CallState) {
    tracing::debug!(?state, "call state");
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

type StateSnapshot = Box<dyn Fn() -> Value + Send + Sync>;

pub struct Pipeline<T, C> {
    config: ClientConfig,
    transport: T,
    credentials: C,
    tracker: Box<dyn ErrorTracker>,
    sign_out: Option<Box<dyn SignOutHandler>>,
    state_snapshot: StateSnapshot,
    refresh_guard: Mutex<()>,
}

impl<C: CredentialProvider> Pipeline<UreqTransport, C> {
    /// Pipeline over real HTTP, honouring `config.timeout`.
    pub fn connect(config: ClientConfig, credentials: C) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::new(config, transport, credentials)
    }
}

impl<T: Transport, C: CredentialProvider> Pipeline<T, C> {
    /// Errors are reported through `TracingTracker` and an unrecoverable
    /// session clears `credentials` until overridden.
    pub fn new(config: ClientConfig, transport: T, credentials: C) -> Self {
        Self {
            config,
            transport,
            credentials,
            tracker: Box::new(TracingTracker),
            sign_out: None,
            state_snapshot: Box::new(|| Value::Null),
            refresh_guard: Mutex::new(()),
        }
    }

    pub fn with_tracker(mut self, tracker: impl ErrorTracker + 'static) -> Self {
        self.tracker = Box::new(tracker);
        self
    }

    pub fn with_sign_out(mut self, handler: impl SignOutHandler + 'static) -> Self {
        self.sign_out = Some(Box::new(handler));
        self
    }

    /// Supply the application state attached to error reports.
    pub fn with_state_snapshot(
        mut self,
        snapshot: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.state_snapshot = Box::new(snapshot);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue one logical call. A bare URL is sent as a GET.
    pub fn request(&self, descriptor: impl Into<RequestDescriptor>) -> Envelope {
        let descriptor = descriptor.into();
        self.call(&descriptor)
    }

    pub fn call(&self, descriptor: &RequestDescriptor) -> Envelope {
        let span = tracing::debug_span!(
            "api_call",
            method = %descriptor.method,
            url = %descriptor.url
        );
        let _enter = span.enter();
        enter(CallState::Start);

        let token = self.read(SessionKey::AccessToken);
        let first = self.send(descriptor, token.as_deref(), Attempt::Initial);

        if first.status() != Some(401) || descriptor.url == self.config.sign_out_path {
            return first;
        }
        let Some(user_id) = self.read(SessionKey::UserId) else {
            return first;
        };
        enter(CallState::AuthExpired);

        match self.refresh(&user_id, token.as_deref()) {
            Ok(fresh) => {
                enter(CallState::Resend);
                self.send(descriptor, Some(&fresh), Attempt::AfterRefresh)
            }
            Err(refresh_failure) => {
                enter(CallState::RefreshFail);
                self.dispatch_sign_out();
                enter(CallState::SignedOut);
                refresh_failure
            }
        }
    }

    /// Obtain a replacement for `stale`, or the refresh call's failure.
    fn refresh(&self, user_id: &str, stale: Option<&str>) -> Result<String, Envelope> {
        let _guard = self.refresh_guard.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = self.read(SessionKey::AccessToken) {
            if Some(current.as_str()) != stale {
                tracing::debug!("token already refreshed by a concurrent call");
                return Ok(current);
            }
        }

        enter(CallState::Refreshing);
        let descriptor = RequestDescriptor::post(self.config.refresh_path.as_str())
            .data(json!({ "userId": user_id }));
        let envelope = self.send(&descriptor, stale, Attempt::Initial);
        if !envelope.is_success() {
            tracing::warn!(status = ?envelope.status(), "token refresh rejected");
            return Err(envelope);
        }

        let meta = envelope.meta.clone();
        let fresh = match envelope.decode::<RefreshResponse>() {
            Ok(body) => body.access_token,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh returned no access token");
                return Err(Envelope {
                    result: Err(e),
                    meta,
                });
            }
        };

        if let Err(e) = self.credentials.set_access_token(&fresh) {
            tracing::warn!(error = %e, "failed to persist refreshed token");
        }
        enter(CallState::RefreshOk);
        tracing::info!("access token refreshed");
        Ok(fresh)
    }

    /// One round-trip, classified.
    fn send(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
        attempt: Attempt,
    ) -> Envelope {
        let request = match self.build_request(descriptor, token) {
            Ok(request) => request,
            Err(e) => return Envelope::failure(e, None, attempt),
        };

        enter(CallState::Sending);
        let response = match self.transport.execute(&request) {
            Ok(response) => response,
            Err(TransportError::Body { status, detail }) => {
                tracing::warn!(status, error = %detail, "response body unreadable");
                let received = HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: String::new(),
                };
                return Envelope::failure(ApiError::Codec(detail), Some(received), attempt);
            }
            Err(e) => {
                tracing::warn!(error = %e, "no response received");
                enter(CallState::NetworkFail);
                let error = ApiError::Network {
                    detail: e.to_string(),
                };
                return Envelope::failure(error, None, attempt);
            }
        };

        if response.is_success() {
            enter(CallState::Success);
            let data = parse_body(&response.body);
            return Envelope::success(data, response, attempt);
        }

        let error = classify(&response);
        enter(match error {
            ApiError::Server { .. } => CallState::ServerFail,
            _ => CallState::DomainFail,
        });

        if response.status != 401 {
            self.tracker.capture(&ErrorReport {
                exception: error.clone(),
                method: request.method,
                url: request.url.clone(),
                context: (self.state_snapshot)(),
            });
        }

        Envelope::failure(error, Some(response), attempt)
    }

    /// Merge default headers, caller headers and credentials into an
    /// outgoing request. `descriptor` is only read.
    ///
    /// String data goes out verbatim unless the effective content type is
    /// JSON. Any other data is serialized as JSON.
    pub fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![(CONTENT_TYPE.to_string(), "application/json".to_string())];
        for (name, value) in &descriptor.headers {
            set_header(&mut headers, name, value);
        }
        if let Some(token) = token {
            set_header(&mut headers, AUTHORIZATION, &format!("Bearer {token}"));
        }

        let body = match &descriptor.data {
            None => None,
            Some(Value::String(text)) if !is_json(&headers) => Some(text.clone()),
            Some(data) => {
                Some(serde_json::to_string(data).map_err(|e| ApiError::Codec(e.to_string()))?)
            }
        };

        Ok(HttpRequest {
            method: descriptor.method,
            url: self.config.resolve(&descriptor.url),
            headers,
            body,
        })
    }

    fn read(&self, key: SessionKey) -> Option<String> {
        match self.credentials.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "credential read failed");
                None
            }
        }
    }

    fn dispatch_sign_out(&self) {
        tracing::info!("session could not be refreshed, signing out");
        match &self.sign_out {
            Some(handler) => handler.sign_out(),
            None => ClearSession::new(&self.credentials).sign_out(),
        }
    }
}

/// Replace a header of the same name (any case) or append it.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(slot) => *slot = (name.to_string(), value.to_string()),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

fn is_json(headers: &[(String, String)]) -> bool {
    find_header(headers, CONTENT_TYPE)
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

fn classify(response: &HttpResponse) -> ApiError {
    if response.status == 500 {
        return ApiError::Server {
            detail: response.body.clone(),
        };
    }
    let body = ErrorBody::parse(&response.body);
    ApiError::Domain {
        status: response.status,
        code: body.error_code,
        message: body.error_message,
    }
}
