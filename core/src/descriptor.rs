//! Caller-facing description of an API call.
//!
//! A `RequestDescriptor` says *what* to call; the pipeline decides *how*
//! (base URL, default headers, credentials). Descriptors are plain values
//! and are only ever borrowed by the pipeline, so the same descriptor can
//! be sent again verbatim after a token refresh or by a user-triggered
//! retry.

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpMethod;

#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: HttpMethod,
    pub data: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            data: None,
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    /// Attach a JSON payload.
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize `payload` and attach it as the JSON body.
    pub fn json<T: Serialize>(self, payload: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(payload).map_err(|e| ApiError::Codec(e.to_string()))?;
        Ok(self.data(value))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl From<&str> for RequestDescriptor {
    fn from(url: &str) -> Self {
        Self::get(url)
    }
}

impl From<String> for RequestDescriptor {
    fn from(url: String) -> Self {
        Self::get(url)
    }
}

impl From<&RequestDescriptor> for RequestDescriptor {
    fn from(descriptor: &RequestDescriptor) -> Self {
        descriptor.clone()
    }
}

/// A single query-string value. Lists are sent comma-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::One(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::One(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::One(value.to_string())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::One(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Many(values)
    }
}

/// Build a query string from `(key, value)` pairs.
///
/// Absent and empty values are dropped, list values are joined with `,`,
/// and both keys and values are percent-encoded. Returns an empty string
/// when nothing survives.
pub fn query_string<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<QueryValue>)>,
{
    params
        .into_iter()
        .filter_map(|(key, value)| {
            let encoded = match value? {
                QueryValue::One(v) => encode_component(&v),
                QueryValue::Many(vs) => vs
                    .iter()
                    .filter(|v| !v.is_empty())
                    .map(|v| encode_component(v))
                    .collect::<Vec<_>>()
                    .join(","),
            };
            if encoded.is_empty() {
                return None;
            }
            Some(format!("{}={encoded}", encode_component(key)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
