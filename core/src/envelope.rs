//! The value every pipeline call resolves to.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::messages::Locale;

/// Which send produced a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Attempt {
    #[default]
    Initial,
    /// The resend issued after a successful token refresh.
    AfterRefresh,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    /// The raw response, absent when nothing came back.
    pub response: Option<HttpResponse>,
    pub attempt: Attempt,
}

/// Success data or an error, never both, plus the raw response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub result: Result<Value, ApiError>,
    pub meta: ResponseMeta,
}

impl Envelope {
    pub(crate) fn success(data: Value, response: HttpResponse, attempt: Attempt) -> Self {
        Self {
            result: Ok(data),
            meta: ResponseMeta {
                response: Some(response),
                attempt,
            },
        }
    }

    pub(crate) fn failure(
        error: ApiError,
        response: Option<HttpResponse>,
        attempt: Attempt,
    ) -> Self {
        Self {
            result: Err(error),
            meta: ResponseMeta { response, attempt },
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.result.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn status(&self) -> Option<u16> {
        self.meta.response.as_ref().map(|r| r.status)
    }

    /// Text to show the user, if the call failed.
    pub fn error_message(&self, locale: Locale) -> Option<String> {
        self.error().map(|e| locale.message(e))
    }

    pub fn into_result(self) -> Result<Value, ApiError> {
        self.result
    }

    /// Decode the success payload into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let data = self.result?;
        serde_json::from_value(data).map_err(|e| ApiError::Codec(e.to_string()))
    }
}

/// Interpret a 2xx body: empty means `null`, non-JSON text is kept as a
/// string.
pub(crate) fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
