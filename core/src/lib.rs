//! Authenticated API client for the courier platform.
//!
//! # Overview
//! Every call goes through one `Pipeline`: it attaches default headers and
//! the stored bearer token, sends the request through a `Transport`, and
//! folds the outcome into an `Envelope`. An expired token is refreshed
//! once per call and the request re-sent; if the refresh fails the session
//! is signed out.
//!
//! # Design
//! - The pipeline never fails with a bare error: connectivity problems,
//!   500s and API errors all arrive as `Envelope::result == Err(ApiError)`.
//! - Credentials come from an injected `CredentialProvider`; the default
//!   `PrefixedStorage` keeps them in memory or in a JSON file.
//! - `Transport` is the I/O seam. `UreqTransport` does real HTTP; tests
//!   script responses in-process.
//! - `CourierApi` layers typed endpoints over the pipeline.

pub mod client;
pub mod config;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod hooks;
pub mod http;
pub mod messages;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use client::CourierApi;
pub use config::ClientConfig;
pub use descriptor::{query_string, QueryValue, RequestDescriptor};
pub use envelope::{Attempt, Envelope, ResponseMeta};
pub use error::{ApiError, ErrorKind};
pub use hooks::{
    ClearSession, ErrorReport, ErrorTracker, NoopTracker, SignOutHandler, TracingTracker,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use messages::Locale;
pub use pipeline::{CallState, Pipeline};
pub use storage::{
    CredentialProvider, FileBackend, MemoryBackend, PrefixedStorage, SessionKey, StorageBackend,
    StorageError,
};
pub use types::{
    Account, Contact, ContactList, NewContact, Package, PackageQuery, PackageStatus, Page,
    SendOtpRequest, SendOtpResponse, SignInRequest, SignInResponse,
};
