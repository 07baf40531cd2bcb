//! In-memory stand-in for the courier API.
//!
//! Implements the authentication endpoints (`/otp`, `/sign-in`,
//! `/refresh-token`, `/sign-out`) with real bearer-token checks, plus a
//! few customer-scoped resources. Errors use the API's
//! `{ errorCode, errorMessage }` body.
//!
//! Routes under `/__test` let tests expire tokens, revoke sessions and
//! provoke a 500 without waiting on clocks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Every OTP issued by the mock verifies with this code.
pub const OTP_CODE: &str = "123456";

const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub customer_id: String,
    pub agent_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub package_id: String,
    pub tracking_number: String,
    pub status: String,
    pub tracking_link: String,
    pub driver_id: Option<String>,
    pub total_amount: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub contact_id: String,
    pub customer_id: String,
    pub phone_number_one: String,
    pub phone_number_two: Option<String>,
    pub name: Option<String>,
    pub is_default: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtp {
    pub phone_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignIn {
    pub verification_code: String,
    pub verification_id: String,
    pub phone_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContact {
    pub phone_number_one: String,
    pub phone_number_two: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Default)]
pub struct Store {
    /// otpId -> phone number
    otps: HashMap<String, String>,
    /// phone number -> user id
    users: HashMap<String, String>,
    accounts: HashMap<String, Account>,
    /// access token -> user id
    tokens: HashMap<String, String>,
    /// Users allowed to refresh.
    sessions: HashSet<String>,
    packages: HashMap<String, Vec<Package>>,
    contacts: HashMap<String, Vec<Contact>>,
}

pub type Db = Arc<RwLock<Store>>;

/// `{ errorCode, errorMessage }` with a status.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid or expired access token.")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "errorCode": self.code,
            "errorMessage": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/otp", post(send_otp))
        .route("/sign-in", post(sign_in))
        .route("/refresh-token", post(refresh_token))
        .route("/sign-out", post(sign_out))
        .route("/customers/{customer_id}/packages", get(list_packages))
        .route(
            "/customers/{customer_id}/contacts",
            get(list_contacts).post(create_contact),
        )
        .route("/__test/expire-tokens", post(expire_tokens))
        .route("/__test/revoke-sessions", post(revoke_sessions))
        .route("/__test/fail", get(fail))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the calling user from the bearer token.
fn authenticate(store: &Store, headers: &HeaderMap) -> Result<String, ApiFailure> {
    let token = bearer(headers).ok_or_else(ApiFailure::unauthorized)?;
    store
        .tokens
        .get(token)
        .cloned()
        .ok_or_else(ApiFailure::unauthorized)
}

/// The caller must own `customer_id`.
fn authorize_customer(
    store: &Store,
    headers: &HeaderMap,
    customer_id: &str,
) -> Result<(), ApiFailure> {
    let user_id = authenticate(store, headers)?;
    match store.accounts.get(&user_id) {
        Some(account) if account.customer_id == customer_id => Ok(()),
        _ => Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "You do not have access to this customer.",
        )),
    }
}

fn issue_token(store: &mut Store, user_id: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    store.tokens.insert(token.clone(), user_id.to_string());
    token
}

fn seed_packages(customer_id: &str) -> Vec<Package> {
    ["PENDING", "COMPLETE"]
        .iter()
        .enumerate()
        .map(|(i, status)| {
            let prefix = &customer_id[..8.min(customer_id.len())];
            let tracking_number = format!("VN-{prefix}-{}", i + 1);
            Package {
                package_id: Uuid::new_v4().to_string(),
                tracking_link: format!("https://track.example.com/{tracking_number}"),
                tracking_number,
                status: status.to_string(),
                driver_id: None,
                total_amount: 1500.0,
            }
        })
        .collect()
}

async fn send_otp(
    State(db): State<Db>,
    Json(input): Json<SendOtp>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    if input.phone_number.trim().is_empty() {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "INVALID_PHONE_NUMBER",
            "Phone number is required.",
        ));
    }
    let otp_id = Uuid::new_v4().to_string();
    db.write().await.otps.insert(otp_id.clone(), input.phone_number);
    Ok(Json(serde_json::json!({ "otpId": otp_id })))
}

async fn sign_in(
    State(db): State<Db>,
    Json(input): Json<SignIn>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let mut store = db.write().await;

    let verified = store.otps.get(&input.verification_id) == Some(&input.phone_number)
        && input.verification_code == OTP_CODE;
    if !verified {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "INVALID_OTP",
            "The verification code is invalid.",
        ));
    }
    store.otps.remove(&input.verification_id);

    let user_id = match store.users.get(&input.phone_number) {
        Some(id) => id.clone(),
        None => {
            let id = Uuid::new_v4().to_string();
            let account = Account {
                customer_id: Uuid::new_v4().to_string(),
                agent_id: Uuid::new_v4().to_string(),
            };
            store.packages.insert(account.customer_id.clone(), seed_packages(&account.customer_id));
            store.accounts.insert(id.clone(), account);
            store.users.insert(input.phone_number.clone(), id.clone());
            id
        }
    };

    store.sessions.insert(user_id.clone());
    let access_token = issue_token(&mut store, &user_id);
    let accounts: Vec<Account> = store.accounts.get(&user_id).cloned().into_iter().collect();
    tracing::info!(%user_id, "signed in");

    Ok(Json(serde_json::json!({
        "accessToken": access_token,
        "userId": user_id,
        "accounts": accounts,
    })))
}

async fn refresh_token(
    State(db): State<Db>,
    Json(input): Json<UserRef>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let mut store = db.write().await;
    if !store.sessions.contains(&input.user_id) {
        return Err(ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "SESSION_EXPIRED",
            "Your session has expired. Please sign in again.",
        ));
    }
    store.tokens.retain(|_, owner| owner != &input.user_id);
    let access_token = issue_token(&mut store, &input.user_id);
    tracing::info!(user_id = %input.user_id, "token refreshed");
    Ok(Json(serde_json::json!({ "accessToken": access_token })))
}

async fn sign_out(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<UserRef>,
) -> Result<StatusCode, ApiFailure> {
    let mut store = db.write().await;
    let caller = authenticate(&store, &headers)?;
    if caller != input.user_id {
        return Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "You can only sign yourself out.",
        ));
    }
    store.sessions.remove(&caller);
    store.tokens.retain(|_, owner| owner != &caller);
    tracing::info!(user_id = %caller, "signed out");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_packages(
    State(db): State<Db>,
    Path(customer_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let store = db.read().await;
    authorize_customer(&store, &headers, &customer_id)?;

    let statuses: Option<HashSet<&str>> = params.get("status").map(|s| s.split(',').collect());
    let size: usize = params
        .get("size")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20)
        .clamp(1, MAX_PAGE_SIZE);
    let page: usize = params.get("page").and_then(|s| s.parse().ok()).unwrap_or(1).max(1);
    let offset = (page - 1).saturating_mul(size);

    let matching: Vec<&Package> = store
        .packages
        .get(&customer_id)
        .map(|all| {
            all.iter()
                .filter(|p| statuses.as_ref().map_or(true, |s| s.contains(p.status.as_str())))
                .collect()
        })
        .unwrap_or_default();
    let results: Vec<&Package> = matching.iter().skip(offset).take(size).copied().collect();
    let has_next = offset.saturating_add(size) < matching.len();
    let link = |page: usize| format!("/customers/{customer_id}/packages?page={page}&size={size}");

    Ok(Json(serde_json::json!({
        "count": matching.len(),
        "next": has_next.then(|| link(page + 1)),
        "previous": (page > 1).then(|| link(page - 1)),
        "results": results,
    })))
}

async fn list_contacts(
    State(db): State<Db>,
    Path(customer_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let store = db.read().await;
    authorize_customer(&store, &headers, &customer_id)?;

    let only_default = params.get("isDefault").map(|v| v == "true");
    let contacts: Vec<&Contact> = store
        .contacts
        .get(&customer_id)
        .map(|all| {
            all.iter()
                .filter(|c| only_default.map_or(true, |d| c.is_default == d))
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(serde_json::json!({
        "totalCount": contacts.len(),
        "contacts": contacts,
    })))
}

async fn create_contact(
    State(db): State<Db>,
    Path(customer_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<CreateContact>,
) -> Result<(StatusCode, Json<Contact>), ApiFailure> {
    let mut store = db.write().await;
    authorize_customer(&store, &headers, &customer_id)?;

    let contact = Contact {
        contact_id: Uuid::new_v4().to_string(),
        customer_id: customer_id.clone(),
        phone_number_one: input.phone_number_one,
        phone_number_two: input.phone_number_two,
        name: input.name,
        is_default: input.is_default,
    };
    store.contacts.entry(customer_id).or_default().push(contact.clone());
    Ok((StatusCode::CREATED, Json(contact)))
}

/// Invalidate every access token; sessions stay refreshable.
async fn expire_tokens(State(db): State<Db>) -> StatusCode {
    db.write().await.tokens.clear();
    StatusCode::NO_CONTENT
}

/// Invalidate every token and session.
async fn revoke_sessions(State(db): State<Db>) -> StatusCode {
    let mut store = db.write().await;
    store.tokens.clear();
    store.sessions.clear();
    StatusCode::NO_CONTENT
}

async fn fail() -> ApiFailure {
    ApiFailure::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "KeyError: 'driver_id' in assignments.py line 212",
    )
}
