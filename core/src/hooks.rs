//! Collaborators the pipeline calls out to on failure paths.

use std::sync::Arc;

use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::storage::CredentialProvider;

/// A failed response handed to an `ErrorTracker`.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub exception: ApiError,
    pub method: HttpMethod,
    pub url: String,
    /// Snapshot of application state at the time of the failure.
    pub context: Value,
}

/// Sink for error responses (Sentry or similar).
pub trait ErrorTracker: Send + Sync {
    fn capture(&self, report: &ErrorReport);
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl ErrorTracker for NoopTracker {
    fn capture(&self, _report: &ErrorReport) {}
}

/// Emits reports as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracker;

impl ErrorTracker for TracingTracker {
    fn capture(&self, report: &ErrorReport) {
        tracing::error!(
            method = %report.method,
            url = %report.url,
            kind = ?report.exception.kind(),
            status = ?report.exception.status(),
            code = ?report.exception.code(),
            detail = ?report.exception.detail(),
            context = %report.context,
            "api request failed"
        );
    }
}

impl<T: ErrorTracker + ?Sized> ErrorTracker for Arc<T> {
    fn capture(&self, report: &ErrorReport) {
        (**self).capture(report)
    }
}

/// Invoked when the session cannot be recovered and the user must sign in
/// again.
pub trait SignOutHandler: Send + Sync {
    fn sign_out(&self);
}

impl<F: Fn() + Send + Sync> SignOutHandler for F {
    fn sign_out(&self) {
        self()
    }
}

/// Default handler: wipe the stored session.
pub struct ClearSession<C> {
    credentials: C,
}

impl<C: CredentialProvider> ClearSession<C> {
    pub fn new(credentials: C) -> Self {
        Self { credentials }
    }
}

impl<C: CredentialProvider> SignOutHandler for ClearSession<C> {
    fn sign_out(&self) {
        if let Err(e) = self.credentials.clear() {
            tracing::warn!(error = %e, "failed to clear session on sign-out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PrefixedStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closures_are_sign_out_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = move || {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        handler.sign_out();
        handler.sign_out();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_session_wipes_credentials() {
        let storage = Arc::new(PrefixedStorage::in_memory("vanoma"));
        storage.store_session("abc", "u1").unwrap();

        ClearSession::new(Arc::clone(&storage)).sign_out();

        assert!(storage.access_token().unwrap().is_none());
        assert!(storage.user_id().unwrap().is_none());
    }

    #[test]
    fn clear_session_over_borrowed_storage() {
        let storage = PrefixedStorage::in_memory("vanoma");
        storage.store_session("abc", "u1").unwrap();

        ClearSession::new(&storage).sign_out();

        assert!(storage.access_token().unwrap().is_none());
    }
}
